//! Extension allow-list.
//!
//! Narrow exception for inline image loading: files with these extensions are
//! served even when no authorized root covers them. Only consulted after the
//! root check fails.

use std::collections::HashSet;
use std::path::Path;

/// Image extensions served without root authorization.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".bmp"];

/// Lowercase, dot-inclusive extension of `path` (e.g. `".png"`).
///
/// Returns `None` when the file name has no extension. Dot-files such as
/// `.png` have no extension.
pub fn extension_of(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_lowercase()))
}

/// Fixed set of extensions exempted from root checking.
#[derive(Debug, Clone)]
pub struct ExtensionAllowList {
    extensions: HashSet<String>,
}

impl ExtensionAllowList {
    /// Build an allow-list from extension strings.
    ///
    /// Entries are lowercased and given a leading dot if missing; empty
    /// entries are dropped.
    pub fn new(extensions: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let extensions = extensions
            .into_iter()
            .filter_map(|ext| {
                let ext = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
                if ext.is_empty() {
                    None
                } else {
                    Some(format!(".{ext}"))
                }
            })
            .collect();

        Self { extensions }
    }

    /// The default image allow-list.
    pub fn images() -> Self {
        Self::new(DEFAULT_IMAGE_EXTENSIONS)
    }

    /// An allow-list that exempts nothing.
    pub fn empty() -> Self {
        Self {
            extensions: HashSet::new(),
        }
    }

    /// Whether `extension` (lowercase, dot-inclusive) is allowed.
    pub fn is_allowed(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }

    /// Whether the extension of `path` is allowed.
    pub fn allows_path(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.is_allowed(&ext))
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for ExtensionAllowList {
    fn default() -> Self {
        Self::images()
    }
}
