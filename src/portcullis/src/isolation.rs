//! Cross-origin isolation headers for served resources.
//!
//! Headers never influence whether a request is served.

use std::collections::HashSet;
use std::path::Path;

use url::Url;

pub const COOP: (&str, &str) = ("Cross-Origin-Opener-Policy", "same-origin");
pub const COEP: (&str, &str) = ("Cross-Origin-Embedder-Policy", "require-corp");

/// Query parameter selecting headers for non-entry documents.
pub const ISOLATION_QUERY_PARAM: &str = "coi";

/// Chooses isolation headers per served resource.
#[derive(Debug, Clone, Default)]
pub struct CrossOriginIsolation {
    documents: HashSet<String>,
}

impl CrossOriginIsolation {
    /// `documents` are file names that always receive both headers.
    pub fn new(documents: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            documents: documents.into_iter().map(Into::into).collect(),
        }
    }

    /// Headers for `path`, requested through `request_url`.
    ///
    /// Entry documents get both headers. Other resources get them from the
    /// `coi` query parameter: `1` opener, `2` embedder, `3` both.
    pub fn headers_for(&self, path: &Path, request_url: &str) -> Vec<(&'static str, &'static str)> {
        let is_document = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.documents.contains(name));
        if is_document {
            return vec![COOP, COEP];
        }

        let Ok(url) = Url::parse(request_url) else {
            return Vec::new();
        };
        let Some(value) = url
            .query_pairs()
            .find(|(key, _)| key == ISOLATION_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
        else {
            return Vec::new();
        };

        match value.as_str() {
            "1" => vec![COOP],
            "2" => vec![COEP],
            "3" => vec![COOP, COEP],
            _ => Vec::new(),
        }
    }
}
