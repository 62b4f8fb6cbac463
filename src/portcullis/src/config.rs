//! Gate configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Default name of the app-resource scheme.
pub const DEFAULT_APP_SCHEME: &str = "app-resource";

/// Default authority accepted by the built-in app-resource mapper.
pub const DEFAULT_APP_AUTHORITY: &str = "app";

/// How the native-file scheme handler treats requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileSchemePolicy {
    /// Run the shared root/extension decision procedure.
    #[default]
    Serve,

    /// Refuse every native-file request. Used when code is loaded through
    /// another path and file-scheme access is never legitimate.
    DenyAll,
}

impl FileSchemePolicy {
    /// Policy implied by the prefer-browser-code-load flag.
    pub fn from_prefer_browser_code_load(prefer: bool) -> Self {
        if prefer {
            FileSchemePolicy::DenyAll
        } else {
            FileSchemePolicy::Serve
        }
    }
}

impl std::fmt::Display for FileSchemePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSchemePolicy::Serve => write!(f, "serve"),
            FileSchemePolicy::DenyAll => write!(f, "deny-all"),
        }
    }
}

/// Trusted roots supplied by the environment at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapRoots {
    /// Application install root.
    pub app_root: Option<PathBuf>,

    /// Installed extensions.
    pub extensions_root: Option<PathBuf>,

    /// Global storage.
    pub global_storage_root: Option<PathBuf>,

    /// Per-workspace storage.
    pub workspace_storage_root: Option<PathBuf>,

    /// Additional roots.
    pub extra: Vec<PathBuf>,
}

impl BootstrapRoots {
    /// All configured roots, named ones first.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [
            &self.app_root,
            &self.extensions_root,
            &self.global_storage_root,
            &self.workspace_storage_root,
        ]
        .into_iter()
        .flatten()
        .chain(self.extra.iter())
        .map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Configuration for a [`crate::ResourceGate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Deny every native-file request (see [`FileSchemePolicy::DenyAll`]).
    #[serde(default)]
    pub prefer_browser_code_load: bool,

    /// Name of the app-resource scheme.
    #[serde(default = "default_app_scheme")]
    pub app_scheme: String,

    /// Authority the default app-resource mapper accepts.
    #[serde(default = "default_app_authority")]
    pub app_authority: String,

    /// Initial trusted roots.
    #[serde(default)]
    pub roots: BootstrapRoots,

    /// Replacement for the default image extension allow-list.
    #[serde(default)]
    pub allowed_extensions: Option<Vec<String>>,

    /// Attach cross-origin isolation headers to served resources.
    #[serde(default)]
    pub cross_origin_isolation: bool,

    /// File names that always receive both isolation headers.
    #[serde(default = "default_isolated_documents")]
    pub isolated_documents: Vec<String>,
}

fn default_app_scheme() -> String {
    DEFAULT_APP_SCHEME.to_string()
}

fn default_app_authority() -> String {
    DEFAULT_APP_AUTHORITY.to_string()
}

fn default_isolated_documents() -> Vec<String> {
    vec!["index.html".to_string()]
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            prefer_browser_code_load: false,
            app_scheme: default_app_scheme(),
            app_authority: default_app_authority(),
            roots: BootstrapRoots::default(),
            allowed_extensions: None,
            cross_origin_isolation: false,
            isolated_documents: default_isolated_documents(),
        }
    }
}

impl GateConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for configuration.
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::new()
    }

    /// Policy for the native-file scheme.
    pub fn file_scheme_policy(&self) -> FileSchemePolicy {
        FileSchemePolicy::from_prefer_browser_code_load(self.prefer_browser_code_load)
    }

    /// Load from a file. `.toml` files are parsed as TOML, anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let config: Self = if is_toml {
            toml::from_str(&content).map_err(|e| GateError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| GateError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Load using a custom variable lookup.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Overlay environment variables onto this config.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let path_var = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        if let Some(root) = path_var("PORTCULLIS_APP_ROOT") {
            self.roots.app_root = Some(root);
        }
        if let Some(root) = path_var("PORTCULLIS_EXTENSIONS_ROOT") {
            self.roots.extensions_root = Some(root);
        }
        if let Some(root) = path_var("PORTCULLIS_GLOBAL_STORAGE_ROOT") {
            self.roots.global_storage_root = Some(root);
        }
        if let Some(root) = path_var("PORTCULLIS_WORKSPACE_STORAGE_ROOT") {
            self.roots.workspace_storage_root = Some(root);
        }

        if let Some(value) = lookup("PORTCULLIS_PREFER_BROWSER_CODE_LOAD") {
            self.prefer_browser_code_load = parse_flag(&value).ok_or_else(|| {
                GateError::Config(format!(
                    "PORTCULLIS_PREFER_BROWSER_CODE_LOAD: expected a boolean, got '{value}'"
                ))
            })?;
        }

        if let Some(scheme) = lookup("PORTCULLIS_APP_SCHEME").filter(|v| !v.is_empty()) {
            self.app_scheme = scheme;
        }

        self.validate()
    }

    /// Check that every bootstrap root is absolute and the scheme is usable.
    pub fn validate(&self) -> Result<()> {
        for root in self.roots.iter() {
            if !root.is_absolute() {
                return Err(GateError::InvalidRoot {
                    path: root.to_path_buf(),
                    reason: "root must be an absolute path".to_string(),
                });
            }
        }

        if self.app_scheme.is_empty() || self.app_scheme.eq_ignore_ascii_case("file") {
            return Err(GateError::Config(format!(
                "invalid app-resource scheme '{}'",
                self.app_scheme
            )));
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Builder for GateConfig.
#[derive(Debug, Default)]
pub struct GateConfigBuilder {
    config: GateConfig,
}

impl GateConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: GateConfig::new(),
        }
    }

    /// Set the prefer-browser-code-load flag.
    pub fn prefer_browser_code_load(mut self, prefer: bool) -> Self {
        self.config.prefer_browser_code_load = prefer;
        self
    }

    /// Set the app-resource scheme name.
    pub fn app_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.app_scheme = scheme.into();
        self
    }

    /// Set the app-resource authority.
    pub fn app_authority(mut self, authority: impl Into<String>) -> Self {
        self.config.app_authority = authority.into();
        self
    }

    pub fn app_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.roots.app_root = Some(path.into());
        self
    }

    pub fn extensions_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.roots.extensions_root = Some(path.into());
        self
    }

    pub fn global_storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.roots.global_storage_root = Some(path.into());
        self
    }

    pub fn workspace_storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.roots.workspace_storage_root = Some(path.into());
        self
    }

    /// Add an extra trusted root.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.roots.extra.push(path.into());
        self
    }

    /// Replace the extension allow-list.
    pub fn allowed_extensions(
        mut self,
        extensions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.config.allowed_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Enable cross-origin isolation headers.
    pub fn cross_origin_isolation(mut self, enabled: bool) -> Self {
        self.config.cross_origin_isolation = enabled;
        self
    }

    /// Build the config.
    pub fn build(self) -> GateConfig {
        self.config
    }
}
