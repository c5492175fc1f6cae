use std::fmt;

/// The uniform failure carrier every component in the node returns instead of
/// a bespoke error type: a `kind` that maps to an HTTP status at the API
/// edge, the `component`/`site` that raised it, and a human message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} in {component}::{site}: {message}")]
pub struct Error {
    pub kind:      ErrorKind,
    pub component: &'static str,
    pub site:      &'static str,
    pub message:   String
}

impl Error {
    pub fn new(
        kind: ErrorKind,
        component: &'static str,
        site: &'static str,
        message: impl Into<String>
    ) -> Self {
        Self { kind, component, site, message: message.into() }
    }
}

/// Result alias used throughout the workspace in place of `std::result::Result`.
pub type MeshResult<T> = Result<T, Error>;

/// The closed list of error kinds. The propagation policy differs per kind:
/// infrastructure errors are retried locally by the scheduler, semantic
/// errors are surfaced immediately to the API caller, and invariant
/// violations are logged/reported but never silently repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationError,
    PayloadTooLarge,
    AuthError,
    TenantClosed,
    TenantUnknown,
    NotFound,
    StoreUnavailable,
    StoreConflict,
    PeerTimeout,
    PeerDisconnected,
    ChainDivergence,
    CorruptHistory,
    QuiesceTimeout,
    UnknownMethod,
    IncompatiblePeer,
    BlockingFailed,
    InternalError
}

impl ErrorKind {
    /// Whether the scheduler should retry the triggering operation on its own,
    /// without surfacing anything to an API caller.
    pub fn is_retryable_infra(self) -> bool {
        matches!(
            self,
            ErrorKind::StoreUnavailable
                | ErrorKind::StoreConflict
                | ErrorKind::PeerTimeout
                | ErrorKind::PeerDisconnected
        )
    }

    /// The HTTP status the API edge maps this kind to.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::ValidationError => 400,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::AuthError => 401,
            ErrorKind::TenantClosed | ErrorKind::TenantUnknown => 503,
            ErrorKind::NotFound => 404,
            ErrorKind::StoreConflict => 409,
            ErrorKind::StoreUnavailable => 503,
            ErrorKind::PeerTimeout
            | ErrorKind::PeerDisconnected
            | ErrorKind::ChainDivergence
            | ErrorKind::CorruptHistory
            | ErrorKind::QuiesceTimeout
            | ErrorKind::UnknownMethod
            | ErrorKind::IncompatiblePeer
            | ErrorKind::BlockingFailed
            | ErrorKind::InternalError => 500
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::AuthError => "AuthError",
            ErrorKind::TenantClosed => "TenantClosed",
            ErrorKind::TenantUnknown => "TenantUnknown",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
            ErrorKind::StoreConflict => "StoreConflict",
            ErrorKind::PeerTimeout => "PeerTimeout",
            ErrorKind::PeerDisconnected => "PeerDisconnected",
            ErrorKind::ChainDivergence => "ChainDivergence",
            ErrorKind::CorruptHistory => "CorruptHistory",
            ErrorKind::QuiesceTimeout => "QuiesceTimeout",
            ErrorKind::UnknownMethod => "UnknownMethod",
            ErrorKind::IncompatiblePeer => "IncompatiblePeer",
            ErrorKind::BlockingFailed => "BlockingFailed",
            ErrorKind::InternalError => "InternalError"
        };
        f.write_str(s)
    }
}

/// Shorthand for constructing an [`Error`] at a call site, analogous to the
/// `bail!`-style macros used elsewhere in the corpus but returning our own
/// envelope instead of `eyre::Report`.
#[macro_export]
macro_rules! mesh_err {
    ($kind:expr, $component:expr, $site:expr, $($arg:tt)*) => {
        $crate::error::Error::new($kind, $component, $site, format!($($arg)*))
    };
}
