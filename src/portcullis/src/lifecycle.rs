//! Binding grants to window lifetimes.
//!
//! When a window signals ready with development or test paths, those paths
//! are granted immediately. The handles are kept per window and revoked on
//! the first terminal event (close or destroy) for that window, so a grant
//! never outlives the window that asked for it. A window that has ended is
//! remembered, and a late ready signal for it is refused.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::grants::{GrantManager, RevocationHandle};

/// Identifier the windowing host assigns to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// Paths a window reports when it becomes ready.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowConfig {
    /// Extension development paths.
    pub dev_paths: Vec<PathBuf>,
    /// Extension test path.
    pub test_path: Option<PathBuf>,
}

impl WindowConfig {
    /// All paths that need a grant.
    pub fn grant_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.dev_paths.iter().chain(self.test_path.iter())
    }
}

/// Lifecycle signal from the windowing host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Ready { window: WindowId, config: WindowConfig },
    Closed(WindowId),
    Destroyed(WindowId),
}

#[derive(Debug, Default)]
struct WindowTable {
    live: HashMap<WindowId, Vec<RevocationHandle>>,
    ended: HashSet<WindowId>,
}

/// Grants roots for ready windows and revokes them when the windows go away.
#[derive(Debug)]
pub struct GrantLifecycleManager {
    grants: GrantManager,
    windows: Mutex<WindowTable>,
}

impl GrantLifecycleManager {
    pub fn new(grants: GrantManager) -> Self {
        Self {
            grants,
            windows: Mutex::new(WindowTable::default()),
        }
    }

    /// Apply one lifecycle event.
    pub fn handle_event(&self, event: WindowEvent) {
        match event {
            WindowEvent::Ready { window, config } => {
                self.window_ready(window, &config);
            }
            WindowEvent::Closed(window) | WindowEvent::Destroyed(window) => {
                self.window_gone(window);
            }
        }
    }

    /// Grant the window's development and test paths.
    ///
    /// A window that signals ready again (e.g. after a reload) keeps its
    /// earlier grants; all of them end with the window. Returns the number of
    /// grants taken. A window that already closed gets nothing.
    pub fn window_ready(&self, window: WindowId, config: &WindowConfig) -> usize {
        // Grants are taken and recorded under one lock so a concurrent close
        // either sees all of them or runs before any exist.
        let mut table = self.windows.lock();
        if table.ended.contains(&window) {
            warn!(%window, "Ignoring ready signal from a window that already closed");
            return 0;
        }

        let handles: Vec<_> = config
            .grant_paths()
            .map(|path| self.grants.grant(path))
            .filter(|handle| handle.root().is_some())
            .collect();

        if handles.is_empty() {
            return 0;
        }

        let granted = handles.len();
        table.live.entry(window).or_default().extend(handles);
        drop(table);

        info!(%window, granted, "Window ready with development paths");
        granted
    }

    /// Revoke every grant owned by `window` and mark the window as ended.
    ///
    /// Safe to call for both terminal events: the second call finds nothing.
    pub fn window_gone(&self, window: WindowId) -> usize {
        let handles = {
            let mut table = self.windows.lock();
            table.ended.insert(window);
            table.live.remove(&window)
        };
        let Some(handles) = handles else {
            return 0;
        };

        let revoked = handles.iter().filter(|handle| handle.revoke()).count();
        info!(%window, revoked, "Window closed, revoked development paths");
        revoked
    }

    /// Number of windows currently holding grants.
    pub fn tracked_windows(&self) -> usize {
        self.windows.lock().live.len()
    }

    /// Revoke every outstanding grant.
    pub fn revoke_all(&self) -> usize {
        let drained: Vec<_> = self.windows.lock().live.drain().collect();
        drained
            .into_iter()
            .flat_map(|(_, handles)| handles)
            .filter(|handle| handle.revoke())
            .count()
    }

    /// Process events until the sender side closes, then revoke whatever is
    /// left.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<WindowEvent>) {
        while let Some(event) = events.recv().await {
            debug!(?event, "Window lifecycle event");
            self.handle_event(event);
        }

        let revoked = self.revoke_all();
        debug!(revoked, "Window event channel closed");
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self: Arc<Self>, events: mpsc::UnboundedReceiver<WindowEvent>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(events).await })
    }
}
