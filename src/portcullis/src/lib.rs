//! Access-control gate for local resource loads.
//!
//! Decides, for every load a rendering surface attempts through the native
//! `file:` scheme or the app-resource scheme, whether the load is permitted.
//! It is the only barrier between the rendering context and the host
//! filesystem, so everything not explicitly authorized is denied.
//!
//! # Architecture
//!
//! ```text
//!   file: request          app-resource request
//!        │                         │
//!        │                  ResourceMapper (host)
//!        ▼                         ▼
//! ┌─────────────────── ResourceGate ───────────────────┐
//! │  1. SharedRootStore::covers   (segment trie)        │
//! │  2. ExtensionAllowList        (.png .jpg ...)       │
//! │  3. deny: ABORTED + one error log record            │
//! └──────────────────────▲──────────────────────────────┘
//!                        │ leases
//!      GrantManager ◄── GrantLifecycleManager ◄── WindowEvent
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use portcullis::{GateConfig, ResourceGate};
//!
//! let config = GateConfig::builder().app_root("/opt/app").build();
//! let gate = ResourceGate::new(&config)?;
//!
//! let decision = gate.handle_file_request("file:///opt/app/index.html").await;
//! assert!(decision.is_served());
//!
//! let handle = gate.grants().grant("/home/dev/my-extension");
//! // ... later, when the window that asked for it closes:
//! handle.revoke();
//! ```

pub mod arbiter;
pub mod config;
pub mod error;
pub mod extensions;
pub mod grants;
pub mod isolation;
pub mod lifecycle;
pub mod mapper;
pub mod metrics;
pub mod normalize;
pub mod request;
pub mod store;

pub use arbiter::ResourceGate;
pub use config::{
    BootstrapRoots, DEFAULT_APP_AUTHORITY, DEFAULT_APP_SCHEME, FileSchemePolicy, GateConfig,
    GateConfigBuilder,
};
pub use error::{GateError, Result};
pub use extensions::{DEFAULT_IMAGE_EXTENSIONS, ExtensionAllowList, extension_of};
pub use grants::{GrantManager, RevocationHandle};
pub use isolation::CrossOriginIsolation;
pub use lifecycle::{GrantLifecycleManager, WindowConfig, WindowEvent, WindowId};
pub use mapper::{AppResourceMapper, ResourceMapper};
pub use metrics::{GateMetrics, MetricsSnapshot};
pub use normalize::PathCase;
pub use request::{Decision, ErrorCode, IncomingRequest, Scheme, ServedResource};
pub use store::{RootStore, SharedRootStore};
