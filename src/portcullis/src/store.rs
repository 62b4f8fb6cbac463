//! Root authorization store.
//!
//! A trie keyed on normalized path segments. A path is covered when it equals
//! or descends from an authorized node, so lookups cost one hash probe per
//! segment of the requested path regardless of how many roots are stored.
//!
//! A node is authorized while it is *pinned* (static roots added through
//! [`RootStore::insert`]) or while it holds at least one grant lease
//! (see [`crate::grants`]). Leases and pins are tracked separately so that
//! releasing a grant never removes a root something else still relies on.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::normalize::{PathCase, path_segments};

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<OsString, TrieNode>,
    pinned: bool,
    leases: usize,
}

impl TrieNode {
    fn is_authorized(&self) -> bool {
        self.pinned || self.leases > 0
    }

    fn is_vacant(&self) -> bool {
        !self.is_authorized() && self.children.is_empty()
    }

    fn count_authorized(&self) -> usize {
        let own = usize::from(self.is_authorized());
        own + self
            .children
            .values()
            .map(TrieNode::count_authorized)
            .sum::<usize>()
    }

    fn collect_roots(&self, prefix: &mut PathBuf, out: &mut Vec<PathBuf>) {
        if self.is_authorized() {
            out.push(prefix.clone());
        }
        for (segment, child) in &self.children {
            prefix.push(segment);
            child.collect_roots(prefix, out);
            prefix.pop();
        }
    }
}

/// Apply `update` to the node at `segments` and prune nodes left vacant.
fn update_existing(
    node: &mut TrieNode,
    segments: &[OsString],
    update: &mut dyn FnMut(&mut TrieNode) -> bool,
) -> bool {
    match segments.split_first() {
        None => update(node),
        Some((head, rest)) => {
            let Some(child) = node.children.get_mut(head) else {
                return false;
            };
            let changed = update_existing(child, rest, update);
            if child.is_vacant() {
                node.children.remove(head);
            }
            changed
        }
    }
}

/// Prefix store of authorized filesystem roots.
#[derive(Debug)]
pub struct RootStore {
    trie: TrieNode,
    case: PathCase,
}

impl RootStore {
    /// Create an empty store with the given case policy.
    pub fn new(case: PathCase) -> Self {
        Self {
            trie: TrieNode::default(),
            case,
        }
    }

    /// Case policy applied to roots and lookups.
    pub fn case(&self) -> PathCase {
        self.case
    }

    fn node_mut(&mut self, segments: &[OsString]) -> &mut TrieNode {
        let mut node = &mut self.trie;
        for segment in segments {
            node = node.children.entry(segment.clone()).or_default();
        }
        node
    }

    /// Authorize `root` and everything beneath it.
    ///
    /// Idempotent. Returns `true` if the root was not already pinned.
    /// Empty and relative paths are ignored.
    pub fn insert(&mut self, root: &Path) -> bool {
        let Some(segments) = path_segments(root, self.case) else {
            return false;
        };
        let node = self.node_mut(&segments);
        let newly = !node.pinned;
        node.pinned = true;
        newly
    }

    /// Drop the pinned authorization for `root`.
    ///
    /// Idempotent; a no-op when the root is absent. Live grant leases on the
    /// same root keep it authorized.
    pub fn remove(&mut self, root: &Path) -> bool {
        let Some(segments) = path_segments(root, self.case) else {
            return false;
        };
        update_existing(&mut self.trie, &segments, &mut |node: &mut TrieNode| {
            std::mem::replace(&mut node.pinned, false)
        })
    }

    /// Take one grant lease on `root`.
    pub(crate) fn acquire(&mut self, root: &Path) -> bool {
        let Some(segments) = path_segments(root, self.case) else {
            return false;
        };
        let node = self.node_mut(&segments);
        node.leases += 1;
        true
    }

    /// Give back one grant lease on `root`.
    pub(crate) fn release(&mut self, root: &Path) -> bool {
        let Some(segments) = path_segments(root, self.case) else {
            return false;
        };
        update_existing(&mut self.trie, &segments, &mut |node: &mut TrieNode| {
            if node.leases == 0 {
                return false;
            }
            node.leases -= 1;
            true
        })
    }

    /// Whether `path` equals or descends from any authorized root.
    ///
    /// Matching is on whole path segments: a root `/a/b` covers `/a/b` and
    /// `/a/b/c`, never `/a/bc`.
    pub fn covers(&self, path: &Path) -> bool {
        let Some(segments) = path_segments(path, self.case) else {
            return false;
        };

        let mut node = &self.trie;
        for segment in &segments {
            match node.children.get(segment) {
                Some(child) => {
                    if child.is_authorized() {
                        return true;
                    }
                    node = child;
                }
                None => return false,
            }
        }
        false
    }

    /// Whether `root` itself is authorized (exact match).
    pub fn contains(&self, root: &Path) -> bool {
        let Some(segments) = path_segments(root, self.case) else {
            return false;
        };

        let mut node = &self.trie;
        for segment in &segments {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.is_authorized()
    }

    /// Number of authorized roots.
    pub fn len(&self) -> usize {
        self.trie.count_authorized()
    }

    /// Whether no root is authorized.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Authorized roots in normalized (case-folded) form, sorted.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        self.trie.collect_roots(&mut PathBuf::new(), &mut out);
        out.sort();
        out
    }
}

impl Default for RootStore {
    fn default() -> Self {
        Self::new(PathCase::for_platform())
    }
}

/// Thread-safe handle to a [`RootStore`].
///
/// Lookups take a shared lock and mutations an exclusive one, so a lookup
/// observes either the state before or after an insert/removal, never a
/// partially applied one.
#[derive(Debug, Clone, Default)]
pub struct SharedRootStore {
    inner: Arc<RwLock<RootStore>>,
}

impl SharedRootStore {
    /// Wrap a store for shared use.
    pub fn new(store: RootStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn insert(&self, root: &Path) -> bool {
        self.inner.write().insert(root)
    }

    pub fn remove(&self, root: &Path) -> bool {
        self.inner.write().remove(root)
    }

    pub fn covers(&self, path: &Path) -> bool {
        self.inner.read().covers(path)
    }

    pub fn contains(&self, root: &Path) -> bool {
        self.inner.read().contains(root)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.inner.read().roots()
    }

    pub(crate) fn acquire(&self, root: &Path) -> bool {
        self.inner.write().acquire(root)
    }

    pub(crate) fn downgrade(&self) -> WeakRootStore {
        WeakRootStore {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning reference held by revocation handles.
#[derive(Debug, Clone)]
pub(crate) struct WeakRootStore {
    inner: Weak<RwLock<RootStore>>,
}

impl WeakRootStore {
    pub(crate) fn release(&self, root: &Path) -> bool {
        match self.inner.upgrade() {
            Some(store) => store.write().release(root),
            None => false,
        }
    }
}
