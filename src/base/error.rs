use thiserror::Error;

/// Errors raised synchronously at the point of misuse.
///
/// These surface through `Result` returns when an exchange is built or
/// finalized, or when a whole batch run aborts. Per-exchange network
/// failures are never represented here; they are recorded on the exchange
/// as a [`TransportError`](crate::base::TransportError) and delivered
/// through its outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// A field name did not match `base` or `base[index]` syntax.
    #[error("invalid field name: {name}")]
    InvalidFieldName { name: String },

    /// One or more names were used for both a form field and a file upload.
    #[error("field name(s) set as both form fields and file uploads: {}", .names.join(", "))]
    DuplicateFieldName { names: Vec<String> },

    /// A query string could not be split into `name=value` pairs.
    #[error("malformed query string")]
    MalformedQuery,

    /// An exchange is inconsistent, e.g. a PUT with no payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// A header name or value contained illegal characters.
    #[error("invalid header: {name}")]
    InvalidHeader { name: String },

    /// The response body was released before it was read.
    #[error("response body has been released")]
    BodyReleased,

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// The transport multiplexer itself failed, aborting the whole run.
    #[error("transport fault: {message}")]
    TransportFault { message: String },
}

impl Error {
    pub(crate) fn fault(message: impl Into<String>) -> Self {
        Error::TransportFault {
            message: message.into(),
        }
    }
}
