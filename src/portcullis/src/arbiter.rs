//! Request arbiter: the native-file and app-resource protocol handlers.
//!
//! Both handlers share one decision procedure:
//!
//! 1. Resolve the request URL to a normalized filesystem path. App-resource
//!    URLs are first translated to `file:` URLs by the host's
//!    [`ResourceMapper`].
//! 2. Serve if an authorized root covers the path.
//! 3. Otherwise serve if the path's extension is on the allow-list.
//! 4. Otherwise deny with [`ErrorCode::ABORTED`] and log one error record.
//!
//! Nothing here returns an error to the host. Malformed URLs fail closed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};
use url::Url;

use crate::config::{FileSchemePolicy, GateConfig};
use crate::error::Result;
use crate::extensions::ExtensionAllowList;
use crate::grants::GrantManager;
use crate::isolation::CrossOriginIsolation;
use crate::lifecycle::GrantLifecycleManager;
use crate::mapper::{AppResourceMapper, ResourceMapper};
use crate::metrics::GateMetrics;
use crate::normalize::{PathCase, normalize_path_lexically};
use crate::request::{Decision, DenyReason, ErrorCode, IncomingRequest, Scheme, ServedResource};
use crate::store::{RootStore, SharedRootStore};

/// Convert a `file:` URL into a normalized absolute path.
fn file_url_to_path(url: &Url) -> Option<PathBuf> {
    if url.scheme() != "file" {
        return None;
    }
    let path = url.to_file_path().ok()?;
    if !path.is_absolute() {
        return None;
    }
    Some(normalize_path_lexically(&path))
}

/// The access-control gate.
///
/// Owns the root store and is shared (behind an `Arc`) by every protocol
/// handler. Construct one per process; tests construct isolated instances.
pub struct ResourceGate {
    policy: FileSchemePolicy,
    app_scheme: String,
    store: SharedRootStore,
    extensions: ExtensionAllowList,
    mapper: Arc<dyn ResourceMapper>,
    isolation: Option<CrossOriginIsolation>,
    metrics: Arc<GateMetrics>,
}

impl std::fmt::Debug for ResourceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGate")
            .field("policy", &self.policy)
            .field("app_scheme", &self.app_scheme)
            .field("roots", &self.store.len())
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl ResourceGate {
    /// Build a gate using the default app-resource mapper.
    pub fn new(config: &GateConfig) -> Result<Self> {
        let mapper = AppResourceMapper::new(&config.app_scheme, &config.app_authority);
        Self::with_mapper(config, Arc::new(mapper))
    }

    /// Build a gate with a host-supplied app-resource mapper.
    pub fn with_mapper(config: &GateConfig, mapper: Arc<dyn ResourceMapper>) -> Result<Self> {
        Self::with_path_case(config, mapper, PathCase::for_platform())
    }

    /// Build a gate with an explicit path case policy.
    pub fn with_path_case(
        config: &GateConfig,
        mapper: Arc<dyn ResourceMapper>,
        case: PathCase,
    ) -> Result<Self> {
        config.validate()?;

        let mut store = RootStore::new(case);
        for root in config.roots.iter() {
            store.insert(root);
            debug!(root = %root.display(), "Authorized bootstrap root");
        }

        let extensions = match &config.allowed_extensions {
            Some(list) => ExtensionAllowList::new(list),
            None => ExtensionAllowList::images(),
        };

        let isolation = config
            .cross_origin_isolation
            .then(|| CrossOriginIsolation::new(config.isolated_documents.iter().cloned()));

        Ok(Self {
            policy: config.file_scheme_policy(),
            app_scheme: config.app_scheme.clone(),
            store: SharedRootStore::new(store),
            extensions,
            mapper,
            isolation,
            metrics: Arc::new(GateMetrics::new()),
        })
    }

    pub fn policy(&self) -> FileSchemePolicy {
        self.policy
    }

    pub fn store(&self) -> &SharedRootStore {
        &self.store
    }

    pub fn extensions(&self) -> &ExtensionAllowList {
        &self.extensions
    }

    pub fn metrics(&self) -> &Arc<GateMetrics> {
        &self.metrics
    }

    /// Name used for `scheme` in logs.
    pub fn scheme_name(&self, scheme: Scheme) -> &str {
        match scheme {
            Scheme::NativeFile => "file",
            Scheme::AppResource => &self.app_scheme,
        }
    }

    /// Grant manager bound to this gate's store.
    pub fn grants(&self) -> GrantManager {
        GrantManager::new(self.store.clone(), Arc::clone(&self.metrics))
    }

    /// Lifecycle manager that binds grants to windows.
    pub fn lifecycle(&self) -> GrantLifecycleManager {
        GrantLifecycleManager::new(self.grants())
    }

    /// Resolve a request through the handler for its scheme.
    pub async fn handle(&self, request: &IncomingRequest) -> Decision {
        match request.scheme {
            Scheme::NativeFile => self.handle_file_request(&request.url).await,
            Scheme::AppResource => self.handle_app_resource_request(&request.url).await,
        }
    }

    /// Native-file scheme handler.
    pub async fn handle_file_request(&self, url: &str) -> Decision {
        let path = Url::parse(url).ok().and_then(|u| file_url_to_path(&u));

        match (self.policy, path) {
            (FileSchemePolicy::DenyAll, path) => self.deny(
                Scheme::NativeFile,
                path.as_deref(),
                url,
                DenyReason::FileSchemeDisabled,
            ),
            (FileSchemePolicy::Serve, None) => {
                self.deny(Scheme::NativeFile, None, url, DenyReason::MalformedUrl)
            }
            (FileSchemePolicy::Serve, Some(path)) => self.decide(Scheme::NativeFile, path, url),
        }
    }

    /// App-resource scheme handler.
    ///
    /// Not affected by [`FileSchemePolicy::DenyAll`].
    pub async fn handle_app_resource_request(&self, url: &str) -> Decision {
        let parsed = match Url::parse(url) {
            Ok(parsed) if parsed.scheme().eq_ignore_ascii_case(&self.app_scheme) => parsed,
            _ => return self.deny(Scheme::AppResource, None, url, DenyReason::MalformedUrl),
        };

        let path = match self.mapper.to_file_url(&parsed).await {
            Some(file_url) => file_url_to_path(&file_url),
            None => None,
        };

        match path {
            Some(path) => self.decide(Scheme::AppResource, path, url),
            None => self.deny(Scheme::AppResource, None, url, DenyReason::MalformedUrl),
        }
    }

    /// Resolve `request` on a spawned task and deliver the decision through
    /// `reply`. The sender is consumed, so a request resolves exactly once.
    pub fn dispatch(
        self: &Arc<Self>,
        request: IncomingRequest,
        reply: oneshot::Sender<Decision>,
    ) -> JoinHandle<()> {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            let decision = gate.handle(&request).await;
            if reply.send(decision).is_err() {
                debug!(url = %request.url, "Requester went away before the decision was delivered");
            }
        })
    }

    fn decide(&self, scheme: Scheme, path: PathBuf, url: &str) -> Decision {
        if self.store.covers(&path) {
            self.metrics.record_served_by_root();
            trace!(scheme = self.scheme_name(scheme), path = %path.display(), "Serving resource under authorized root");
            return self.serve(path, url);
        }

        if self.extensions.allows_path(&path) {
            self.metrics.record_served_by_extension();
            trace!(scheme = self.scheme_name(scheme), path = %path.display(), "Serving resource by extension");
            return self.serve(path, url);
        }

        self.deny(scheme, Some(&path), url, DenyReason::NotAuthorized)
    }

    fn serve(&self, path: PathBuf, url: &str) -> Decision {
        let headers = match &self.isolation {
            Some(isolation) => isolation.headers_for(&path, url),
            None => Vec::new(),
        };
        Decision::Serve(ServedResource { path, headers })
    }

    fn deny(&self, scheme: Scheme, path: Option<&Path>, url: &str, reason: DenyReason) -> Decision {
        self.metrics.record_denied();

        let path = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unresolved>".to_string());
        error!(
            scheme = self.scheme_name(scheme),
            path = %path,
            url = %url,
            reason = %reason,
            code = ErrorCode::ABORTED.code(),
            "Refused to load resource"
        );

        Decision::aborted()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::isolation::{COEP, COOP};

    fn gate(config: GateConfig) -> ResourceGate {
        let mapper = AppResourceMapper::new(&config.app_scheme, &config.app_authority);
        ResourceGate::with_path_case(&config, Arc::new(mapper), PathCase::Sensitive).unwrap()
    }

    fn app_gate() -> ResourceGate {
        gate(GateConfig::builder().app_root("/app").build())
    }

    #[tokio::test]
    async fn test_serves_under_root() {
        let gate = app_gate();
        let decision = gate.handle_file_request("file:///app/index.html").await;

        assert_eq!(decision.path(), Some(Path::new("/app/index.html")));
        assert_eq!(gate.metrics().snapshot().served_by_root, 1);
    }

    #[tokio::test]
    async fn test_denies_outside_root() {
        let gate = app_gate();
        let decision = gate.handle_file_request("file:///etc/passwd").await;

        assert_eq!(
            decision,
            Decision::Deny {
                code: ErrorCode::ABORTED
            }
        );
        assert_eq!(gate.metrics().denied(), 1);
    }

    #[tokio::test]
    async fn test_sibling_with_shared_prefix_is_denied() {
        let gate = app_gate();
        assert!(gate.handle_file_request("file:///application/secret.txt").await.is_denied());
        assert!(gate.handle_file_request("file:///app2/secret.txt").await.is_denied());
    }

    #[tokio::test]
    async fn test_traversal_is_resolved_before_matching() {
        let gate = app_gate();

        assert!(gate.handle_file_request("file:///app/../etc/passwd").await.is_denied());
        assert!(gate.handle_file_request("file:///app/%2e%2e/etc/passwd").await.is_denied());
        assert!(
            gate.handle_file_request("file:///app/x%2F..%2F..%2Fetc/passwd")
                .await
                .is_denied()
        );

        let decision = gate.handle_file_request("file:///app/sub/../index.html").await;
        assert_eq!(decision.path(), Some(Path::new("/app/index.html")));
    }

    #[tokio::test]
    async fn test_percent_encoded_path_is_decoded() {
        let gate = app_gate();
        let decision = gate.handle_file_request("file:///app/my%20file.html").await;

        assert_eq!(decision.path(), Some(Path::new("/app/my file.html")));
    }

    #[tokio::test]
    async fn test_extension_fallback() {
        let gate = app_gate();

        let image = gate.handle_file_request("file:///unauthorized/dir/image.png").await;
        assert_eq!(image.path(), Some(Path::new("/unauthorized/dir/image.png")));

        let script = gate.handle_file_request("file:///unauthorized/dir/script.js").await;
        assert!(script.is_denied());
        assert_eq!(gate.metrics().snapshot().served_by_extension, 1);
    }

    #[tokio::test]
    async fn test_malformed_urls_fail_closed() {
        let gate = gate(GateConfig::builder().root("/").build());

        assert!(gate.handle_file_request("not a url").await.is_denied());
        assert!(gate.handle_file_request("https://example.com/a.png").await.is_denied());
        assert!(gate.handle_file_request("file://remote-host/share/a.txt").await.is_denied());
        assert!(gate.handle_app_resource_request("::::").await.is_denied());
    }

    #[tokio::test]
    async fn test_deny_all_mode_denies_authorized_paths() {
        let gate = gate(
            GateConfig::builder()
                .app_root("/app")
                .prefer_browser_code_load(true)
                .build(),
        );

        assert!(gate.handle_file_request("file:///app/index.html").await.is_denied());
        assert!(gate.handle_file_request("file:///app/logo.png").await.is_denied());
    }

    #[tokio::test]
    async fn test_deny_all_mode_leaves_app_resource_serving() {
        let gate = gate(
            GateConfig::builder()
                .app_root("/app")
                .prefer_browser_code_load(true)
                .build(),
        );

        let decision = gate
            .handle_app_resource_request("app-resource://app/app/index.html")
            .await;
        assert_eq!(decision.path(), Some(Path::new("/app/index.html")));
    }

    #[tokio::test]
    async fn test_app_resource_matches_resolved_path() {
        let gate = app_gate();

        assert!(
            gate.handle_app_resource_request("app-resource://app/app/main.js")
                .await
                .is_served()
        );
        assert!(
            gate.handle_app_resource_request("app-resource://app/etc/passwd")
                .await
                .is_denied()
        );
        assert!(
            gate.handle_app_resource_request("app-resource://other/app/main.js")
                .await
                .is_denied()
        );
        assert!(
            gate.handle_app_resource_request("file:///app/main.js")
                .await
                .is_denied()
        );
    }

    #[tokio::test]
    async fn test_custom_mapper() {
        let config = GateConfig::builder().root("/srv/bundle").build();
        let mapper = |url: &Url| Url::parse(&format!("file:///srv/bundle{}", url.path())).ok();
        let gate =
            ResourceGate::with_path_case(&config, Arc::new(mapper), PathCase::Sensitive).unwrap();

        let decision = gate
            .handle_app_resource_request("app-resource://anything/js/main.js")
            .await;
        assert_eq!(decision.path(), Some(Path::new("/srv/bundle/js/main.js")));
    }

    #[tokio::test]
    async fn test_grant_is_visible_to_later_requests() {
        let gate = app_gate();
        let url = "file:///dev/ext/main.js";

        assert!(gate.handle_file_request(url).await.is_denied());

        let handle = gate.grants().grant("/dev/ext");
        assert!(gate.handle_file_request(url).await.is_served());

        handle.revoke();
        assert!(gate.handle_file_request(url).await.is_denied());
    }

    #[tokio::test]
    async fn test_isolation_headers() {
        let gate = gate(
            GateConfig::builder()
                .app_root("/app")
                .cross_origin_isolation(true)
                .build(),
        );

        let Decision::Serve(document) = gate.handle_file_request("file:///app/index.html").await
        else {
            panic!("entry document should be served");
        };
        assert_eq!(document.headers, vec![COOP, COEP]);

        let Decision::Serve(worker) = gate.handle_file_request("file:///app/worker.js?coi=2").await
        else {
            panic!("worker should be served");
        };
        assert_eq!(worker.headers, vec![COEP]);

        assert!(
            gate.handle_file_request("file:///etc/passwd?coi=3")
                .await
                .is_denied()
        );
    }

    #[tokio::test]
    async fn test_headers_absent_without_isolation() {
        let gate = app_gate();
        let Decision::Serve(resource) = gate.handle_file_request("file:///app/index.html").await
        else {
            panic!("should be served");
        };
        assert!(resource.headers.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_resolves_once_through_channel() {
        let gate = Arc::new(app_gate());
        let (tx, rx) = oneshot::channel();

        gate.dispatch(IncomingRequest::file("file:///app/index.html"), tx)
            .await
            .unwrap();

        let decision = rx.await.unwrap();
        assert!(decision.is_served());
    }

    #[tokio::test]
    async fn test_dispatch_tolerates_dropped_receiver() {
        let gate = Arc::new(app_gate());
        let (tx, rx) = oneshot::channel();
        drop(rx);

        gate.dispatch(IncomingRequest::file("file:///etc/passwd"), tx)
            .await
            .unwrap();
        assert_eq!(gate.metrics().denied(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = GateConfig::builder().app_root("relative").build();
        assert!(ResourceGate::new(&config).is_err());
    }

    #[test]
    fn test_custom_extension_list() {
        let gate = gate(GateConfig::builder().allowed_extensions([".svg"]).build());

        assert!(gate.extensions().is_allowed(".svg"));
        assert!(!gate.extensions().is_allowed(".png"));
    }
}
