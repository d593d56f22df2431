//! Error types for MIME operations.
//!
//! The decoder itself never returns these to its caller; they are turned
//! into human-readable warnings on the decoded message. They surface
//! directly only from the lower-level helpers and the message builder.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid MIME header.
    #[error("Invalid MIME header: {0}")]
    InvalidHeader(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Charset label not known to the converter.
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// Bytes could not be decoded with the given charset.
    #[error("Malformed {charset} content")]
    MalformedText {
        /// Charset that was attempted.
        charset: String,
    },

    /// Missing boundary in multipart message.
    #[error("Missing boundary in multipart message")]
    MissingBoundary,

    /// MIME tree nested deeper than the decoder accepts.
    #[error("MIME structure nested deeper than {0} levels")]
    TooDeep(usize),

    /// Missing required header.
    #[error("Missing required header: {0}")]
    MissingHeader(String),
}
