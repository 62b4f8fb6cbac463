//! Request and decision types shared by the protocol handlers.

use std::path::PathBuf;

use serde::Serialize;

/// Which protocol handler received a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    /// The OS-native `file:` scheme.
    NativeFile,
    /// The custom app-resource scheme.
    AppResource,
}

impl Scheme {
    /// Pick the handler for `url`: `file:` URLs go to the native-file
    /// handler, everything else to the app-resource handler (which denies
    /// URLs it cannot translate).
    pub fn classify(url: &str) -> Self {
        let is_file = url
            .split_once(':')
            .is_some_and(|(scheme, _)| scheme.eq_ignore_ascii_case("file"));
        if is_file {
            Scheme::NativeFile
        } else {
            Scheme::AppResource
        }
    }
}

/// A resource load attempt from the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    pub scheme: Scheme,
    /// Raw request URL as received from the host.
    pub url: String,
}

impl IncomingRequest {
    pub fn new(scheme: Scheme, url: impl Into<String>) -> Self {
        Self {
            scheme,
            url: url.into(),
        }
    }

    pub fn file(url: impl Into<String>) -> Self {
        Self::new(Scheme::NativeFile, url)
    }

    pub fn app_resource(url: impl Into<String>) -> Self {
        Self::new(Scheme::AppResource, url)
    }

    /// Build a request, routing by the URL's scheme.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(Scheme::classify(&url), url)
    }
}

/// Numeric error code returned to the host on denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ErrorCode(i32);

impl ErrorCode {
    /// "Operation aborted". Indistinguishable from a cancelled load so a
    /// denial does not reveal whether the file exists.
    pub const ABORTED: ErrorCode = ErrorCode(-3);

    pub fn code(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resource the host may serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServedResource {
    /// Normalized filesystem path.
    pub path: PathBuf,
    /// Extra response headers (cross-origin isolation).
    pub headers: Vec<(&'static str, &'static str)>,
}

/// Outcome of a request. Every request resolves to exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    Serve(ServedResource),
    Deny { code: ErrorCode },
}

impl Decision {
    pub(crate) fn aborted() -> Self {
        Decision::Deny {
            code: ErrorCode::ABORTED,
        }
    }

    pub fn is_served(&self) -> bool {
        matches!(self, Decision::Serve(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Deny { .. })
    }

    /// Served path, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Decision::Serve(resource) => Some(&resource.path),
            Decision::Deny { .. } => None,
        }
    }
}

/// Why a request was denied. Only ever logged; callers always see
/// [`ErrorCode::ABORTED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DenyReason {
    NotAuthorized,
    FileSchemeDisabled,
    MalformedUrl,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::NotAuthorized => write!(f, "not_authorized"),
            DenyReason::FileSchemeDisabled => write!(f, "file_scheme_disabled"),
            DenyReason::MalformedUrl => write!(f, "malformed_url"),
        }
    }
}
