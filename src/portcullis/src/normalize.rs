//! Path normalization shared by the root store and the request handlers.
//!
//! Roots and requested paths must go through the same normalization or
//! prefix matching silently fails, so both sides call [`path_segments`].

use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

/// Case handling for path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCase {
    /// Segments are compared byte for byte.
    Sensitive,
    /// Segments are lowercased before they are stored or compared.
    Insensitive,
}

impl PathCase {
    /// Case policy of the platform this binary targets.
    ///
    /// Linux filesystems are treated as case-sensitive; Windows and macOS
    /// defaults are case-insensitive.
    pub fn for_platform() -> Self {
        if cfg!(target_os = "linux") {
            PathCase::Sensitive
        } else {
            PathCase::Insensitive
        }
    }

    /// Fold a single segment according to this policy.
    ///
    /// Segments that are not valid UTF-8 are kept as-is; folding them lossily
    /// could make two distinct names collide.
    pub fn fold(&self, segment: &OsStr) -> OsString {
        match self {
            PathCase::Sensitive => segment.to_os_string(),
            PathCase::Insensitive => match segment.to_str() {
                Some(s) => OsString::from(s.to_lowercase()),
                None => segment.to_os_string(),
            },
        }
    }
}

impl Default for PathCase {
    fn default() -> Self {
        Self::for_platform()
    }
}

/// Normalize a path lexically without filesystem access.
///
/// Resolves `.` and `..` components. A `..` at the root of an absolute path
/// stays at the root.
pub fn normalize_path_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() && !path.is_absolute() {
                    normalized.push("..");
                }
            }
            Component::CurDir => {}
            comp => normalized.push(comp),
        }
    }

    normalized
}

/// Split an absolute path into normalized, case-folded segments.
///
/// Returns `None` for empty or relative paths: those never match a root.
pub fn path_segments(path: &Path, case: PathCase) -> Option<Vec<OsString>> {
    if path.as_os_str().is_empty() || !path.is_absolute() {
        return None;
    }

    let normalized = normalize_path_lexically(path);
    let segments = normalized
        .components()
        .map(|component| case.fold(component.as_os_str()))
        .collect::<Vec<_>>();

    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}
