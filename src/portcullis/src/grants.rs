//! Scoped grants on the root store.
//!
//! A grant takes a lease on a root and hands back a [`RevocationHandle`].
//! The store never learns who owns a grant; the handle is the only way to
//! give the lease back.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::metrics::GateMetrics;
use crate::store::{SharedRootStore, WeakRootStore};

/// Issues grants against a shared root store.
#[derive(Debug, Clone)]
pub struct GrantManager {
    store: SharedRootStore,
    metrics: Arc<GateMetrics>,
}

impl GrantManager {
    pub fn new(store: SharedRootStore, metrics: Arc<GateMetrics>) -> Self {
        Self { store, metrics }
    }

    /// Authorize `path` until the returned handle is revoked.
    ///
    /// Granting a path that is already authorized (statically or by another
    /// grant) takes an extra lease: revoking this handle only gives back its
    /// own lease. Paths that are not absolute cannot be granted and yield a
    /// handle that does nothing.
    pub fn grant(&self, path: impl AsRef<Path>) -> RevocationHandle {
        let path = path.as_ref();

        if !self.store.acquire(path) {
            warn!(path = %path.display(), "Ignoring grant for a path that is not absolute");
            return RevocationHandle::noop();
        }

        self.metrics.grant_opened();
        debug!(path = %path.display(), "Granted root");

        RevocationHandle {
            inner: Some(Arc::new(HandleInner {
                store: self.store.downgrade(),
                metrics: Arc::clone(&self.metrics),
                root: path.to_path_buf(),
                revoked: AtomicBool::new(false),
            })),
        }
    }

    pub fn store(&self) -> &SharedRootStore {
        &self.store
    }
}

#[derive(Debug)]
struct HandleInner {
    store: WeakRootStore,
    metrics: Arc<GateMetrics>,
    root: PathBuf,
    revoked: AtomicBool,
}

/// Capability that gives back one grant.
///
/// Clones share state: the grant is released once no matter how many clones
/// call [`revoke`](Self::revoke). Dropping a handle does not revoke it.
#[derive(Debug, Clone)]
#[must_use = "a grant stays active until its handle is revoked"]
pub struct RevocationHandle {
    inner: Option<Arc<HandleInner>>,
}

impl RevocationHandle {
    /// A handle that owns no grant.
    pub fn noop() -> Self {
        Self { inner: None }
    }

    /// Release the grant. Returns `true` only for the call that released it.
    pub fn revoke(&self) -> bool {
        let Some(inner) = &self.inner else {
            return false;
        };
        if inner.revoked.swap(true, Ordering::AcqRel) {
            return false;
        }

        inner.store.release(&inner.root);
        inner.metrics.grant_closed();
        debug!(path = %inner.root.display(), "Revoked root");
        true
    }

    /// Whether this handle has been revoked (always `true` for no-op handles).
    pub fn is_revoked(&self) -> bool {
        self.inner
            .as_ref()
            .is_none_or(|inner| inner.revoked.load(Ordering::Acquire))
    }

    /// Root this handle grants, if any.
    pub fn root(&self) -> Option<&Path> {
        self.inner.as_ref().map(|inner| inner.root.as_path())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::normalize::PathCase;
    use crate::store::RootStore;

    fn manager() -> GrantManager {
        GrantManager::new(
            SharedRootStore::new(RootStore::new(PathCase::Sensitive)),
            Arc::new(GateMetrics::new()),
        )
    }

    #[test]
    fn test_grant_then_revoke() {
        let grants = manager();
        let handle = grants.grant("/dev/ext");

        assert!(grants.store().covers(Path::new("/dev/ext/main.js")));
        assert!(!handle.is_revoked());

        assert!(handle.revoke());
        assert!(handle.is_revoked());
        assert!(!grants.store().covers(Path::new("/dev/ext/main.js")));
    }

    #[test]
    fn test_double_revoke_does_not_touch_other_grants() {
        let grants = manager();
        let first = grants.grant("/dev/ext");
        let second = grants.grant("/dev/ext");

        assert!(first.revoke());
        assert!(!first.revoke());
        assert!(!first.clone().revoke());
        assert!(grants.store().covers(Path::new("/dev/ext/main.js")));

        assert!(second.revoke());
        assert!(!grants.store().covers(Path::new("/dev/ext/main.js")));
        assert!(grants.store().is_empty());
    }

    #[test]
    fn test_revoke_keeps_static_root() {
        let grants = manager();
        grants.store().insert(Path::new("/app"));

        let handle = grants.grant("/app");
        handle.revoke();

        assert!(grants.store().covers(Path::new("/app/index.html")));
    }

    #[test]
    fn test_relative_grant_is_noop() {
        let grants = manager();
        let handle = grants.grant("dev/ext");

        assert!(handle.root().is_none());
        assert!(handle.is_revoked());
        assert!(!handle.revoke());
        assert!(grants.store().is_empty());
    }

    #[test]
    fn test_active_grant_metric() {
        let metrics = Arc::new(GateMetrics::new());
        let grants = GrantManager::new(
            SharedRootStore::new(RootStore::new(PathCase::Sensitive)),
            Arc::clone(&metrics),
        );

        let a = grants.grant("/a");
        let b = grants.grant("/b");
        assert_eq!(metrics.active_grants(), 2);

        a.revoke();
        a.revoke();
        assert_eq!(metrics.active_grants(), 1);
        b.revoke();
        assert_eq!(metrics.active_grants(), 0);
    }
}
