//! Translation of app-resource URLs into `file:` URLs.
//!
//! The host owns this mapping; the gate only needs the resolved `file:` URL
//! so it can check the underlying path. Matching never happens against the
//! opaque app-resource identifier.

use async_trait::async_trait;
use url::Url;

/// Maps an app-resource URL onto its native-file equivalent.
#[async_trait]
pub trait ResourceMapper: Send + Sync {
    /// Returns `None` when the URL does not map to a local file.
    async fn to_file_url(&self, url: &Url) -> Option<Url>;
}

#[async_trait]
impl<F> ResourceMapper for F
where
    F: Fn(&Url) -> Option<Url> + Send + Sync,
{
    async fn to_file_url(&self, url: &Url) -> Option<Url> {
        self(url)
    }
}

/// Default mapper: `<scheme>://<authority>/abs/path` becomes `file:///abs/path`.
///
/// Query and fragment are dropped; URLs with another scheme or authority do
/// not map.
#[derive(Debug, Clone)]
pub struct AppResourceMapper {
    scheme: String,
    authority: String,
}

impl AppResourceMapper {
    pub fn new(scheme: impl Into<String>, authority: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            authority: authority.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    fn map(&self, url: &Url) -> Option<Url> {
        if !url.scheme().eq_ignore_ascii_case(&self.scheme) {
            return None;
        }
        if !url
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.authority))
        {
            return None;
        }

        let mut file_url = Url::parse("file:///").ok()?;
        file_url.set_path(url.path());
        Some(file_url)
    }
}

#[async_trait]
impl ResourceMapper for AppResourceMapper {
    async fn to_file_url(&self, url: &Url) -> Option<Url> {
        self.map(url)
    }
}
