// ===============================
// src/error.rs
// ===============================
use thiserror::Error;

/// Max chars of an upstream body kept for diagnostics.
pub const BODY_SNIPPET_LEN: usize = 512;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("credential rejected upstream (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("upstream unavailable (HTTP {status}): {body}")]
    UpstreamUnavailable { status: u16, body: String },

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("render failed: {0}")]
    Render(String),
}

/// The five kinds a caller has to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParameter,
    Unauthorized,
    UpstreamUnavailable,
    Timeout,
    RenderError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RenderError => "render_error",
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::InvalidParameter => 2,
            ErrorKind::Unauthorized => 3,
            ErrorKind::UpstreamUnavailable => 4,
            ErrorKind::Timeout => 5,
            ErrorKind::RenderError => 6,
        }
    }
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            ReportError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ReportError::UpstreamUnavailable { .. } | ReportError::MalformedResponse(_) => {
                ErrorKind::UpstreamUnavailable
            }
            ReportError::Timeout(_) => ErrorKind::Timeout,
            ReportError::Render(_) => ErrorKind::RenderError,
        }
    }

    pub fn upstream(status: u16, body: &str) -> Self {
        ReportError::UpstreamUnavailable { status, body: snippet(body) }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ReportError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ReportError::Render(e.to_string())
    }
}

/// Cut a body down to [`BODY_SNIPPET_LEN`] chars (char boundary safe).
pub fn snippet(body: &str) -> String {
    match body.char_indices().nth(BODY_SNIPPET_LEN) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
