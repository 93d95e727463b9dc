//! Centralized error types for mimewalk.

use thiserror::Error;

use crate::model::attachment::AttachmentInfo;
use crate::model::message::DiagnosticKind;

/// All errors produced by the mimewalk library.
///
/// Most of these never reach the caller of [`crate::parse_message`]: outside
/// strict mode they are downgraded to [`crate::model::message::Diagnostic`]
/// records and parsing continues.
#[derive(Error, Debug)]
pub enum MimeError {
    /// The `Content-Transfer-Encoding` value is not one we know how to decode.
    #[error("Unsupported transfer encoding: {0}")]
    UnsupportedEncoding(String),

    /// The charset name is not in the charset table.
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// Input was malformed for the encoding or charset it claims to use.
    #[error("Decoding failed ({context}): {reason}")]
    Decode { context: String, reason: String },

    /// An attachment is larger than the configured ceiling once decoded.
    ///
    /// Carries the attachment metadata with the true decoded size and the
    /// content withheld.
    #[error("Attachment is {size} bytes after decoding, limit is {limit}")]
    SizeExceeded {
        size: u64,
        limit: u64,
        info: Box<AttachmentInfo>,
    },

    /// The attachment's media type or extension is denied by policy.
    #[error("Attachment type not allowed: {content_type} (filename '{filename}')")]
    TypeForbidden {
        content_type: String,
        filename: String,
    },

    /// A `Content-Type` header could not be parsed.
    #[error("Invalid Content-Type '{value}': {reason}")]
    ContentType { value: String, reason: String },

    /// A `multipart/*` container has no usable `boundary` parameter.
    #[error("multipart container has no boundary parameter")]
    MissingBoundary,

    /// The top-level header block cannot be interpreted at all.
    #[error("Unreadable message headers: {0}")]
    UnreadableHeaders(String),

    /// A single MIME part could not be read.
    #[error("Part {part_id} is unreadable: {reason}")]
    PartUnreadable { part_id: String, reason: String },

    /// A multipart container is structurally damaged.
    #[error("Multipart structure error: {0}")]
    Multipart(String),

    /// A resource bound (part count, depth, error budget) was hit.
    #[error("Limit reached: {0}")]
    LimitReached(String),

    /// I/O error while reading part content.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MimeError {
    /// Diagnostic category used when this error is recorded instead of raised.
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::UnsupportedEncoding(_) | Self::UnsupportedCharset(_) | Self::Decode { .. } => {
                DiagnosticKind::Encoding
            }
            Self::SizeExceeded { .. } | Self::TypeForbidden { .. } => DiagnosticKind::Policy,
            Self::ContentType { .. } => DiagnosticKind::ContentType,
            Self::MissingBoundary | Self::UnreadableHeaders(_) | Self::Multipart(_) => {
                DiagnosticKind::Structure
            }
            Self::PartUnreadable { .. } | Self::Io(_) => DiagnosticKind::PartUnreadable,
            Self::LimitReached(_) => DiagnosticKind::Limit,
        }
    }

    /// Build a `Decode` variant.
    pub fn decode(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias for `Result<T, MimeError>`.
pub type Result<T> = std::result::Result<T, MimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            MimeError::UnsupportedEncoding("x-uue".into()).kind(),
            DiagnosticKind::Encoding
        );
        assert_eq!(MimeError::MissingBoundary.kind(), DiagnosticKind::Structure);
        assert_eq!(
            MimeError::TypeForbidden {
                content_type: "application/x-msdownload".into(),
                filename: "setup.exe".into(),
            }
            .kind(),
            DiagnosticKind::Policy
        );
        assert_eq!(
            MimeError::LimitReached("depth".into()).kind(),
            DiagnosticKind::Limit
        );
    }

    #[test]
    fn test_display_messages() {
        let err = MimeError::UnsupportedEncoding("quoted-unprintable".into());
        assert_eq!(
            err.to_string(),
            "Unsupported transfer encoding: quoted-unprintable"
        );
        let err = MimeError::decode("base64", "invalid length");
        assert_eq!(err.to_string(), "Decoding failed (base64): invalid length");
    }
}
