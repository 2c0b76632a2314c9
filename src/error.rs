use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Why an archive could not be inspected.
///
/// Every variant is recoverable: the inspector logs it and either falls back
/// to the generic image heuristic or reports "nothing found".
#[derive(Error, Debug)]
pub enum InspectError {
    /// The file could not be opened as a zip archive.
    #[error("not a zip archive: {0}")]
    NotAnArchive(#[from] zip::result::ZipError),

    /// The file name does not carry a supported archive extension.
    #[error("unsupported extension: {0}")]
    UnsupportedExtension(String),

    /// `META-INF/container.xml` is absent.
    #[error("missing META-INF/container.xml")]
    MissingContainerDescriptor,

    /// The container descriptor has no usable `rootfile/@full-path`.
    #[error("malformed container descriptor: {0}")]
    MalformedContainerDescriptor(String),

    /// The package document named by the container descriptor is absent.
    #[error("missing package document: {0}")]
    MissingPackageDocument(String),

    /// No cover strategy matched a manifest item.
    #[error("no cover declared in package document")]
    CoverNotResolved,

    /// The cover item resolved to a path with no archive entry.
    #[error("cover entry missing from archive: {0}")]
    CoverEntryMissing(String),

    /// An embedded binary could not be decoded.
    #[error("invalid embedded binary: {0}")]
    InvalidBinary(String),

    /// A control document is not well-formed XML.
    #[error("XML parsing error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// A control document is not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    Encoding(String),

    /// Reading the file or an entry failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main error type for the HTTP surface and CLI.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or unsafe request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Target already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        let mut response = (status, self.to_string()).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"OPDShelf\""),
            );
        }
        response
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
