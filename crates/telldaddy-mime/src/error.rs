//! Errors raised when reading MIME structure back.
//!
//! Building a message never fails; only parsing and decoding do.

use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Parsing or decoding failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `Content-Type` value without `type/subtype`.
    #[error("Malformed Content-Type: {0}")]
    InvalidContentType(String),

    /// Quoted-printable or encoded-word syntax error.
    #[error("Malformed transfer encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 body or encoded word.
    #[error("Bad base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Decoded bytes.
    #[error("Decoded text is not UTF-8: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// `multipart/*` without a `boundary` parameter.
    #[error("Multipart Content-Type has no boundary")]
    MissingBoundary,

    /// No part found between the boundary delimiters.
    #[error("Malformed multipart body: {0}")]
    InvalidMultipart(String),

    /// Single-body accessor used on a multipart message.
    #[error("Message is multipart; read its parts instead")]
    NotSinglePart,

    /// No `text/<subtype>` part in the message.
    #[error("No text/{0} part")]
    PartNotFound(String),
}
