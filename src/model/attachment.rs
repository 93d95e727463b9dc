//! Attachment metadata.
//!
//! Decoded content travels with the metadata only when the caller asked for
//! it and the attachment fits inside the size ceiling.

use std::fmt;

/// How a part wants to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Offered as a downloadable file.
    Attachment,
    /// Displayed within the message, usually referenced by `Content-Id`.
    Inline,
}

impl Disposition {
    /// Lowercase header token for this disposition.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::Inline => "inline",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata (and optionally content) of a classified MIME leaf.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AttachmentInfo {
    /// Dotted path of the part in the MIME tree (e.g. `"1.2"`).
    pub part_id: String,

    /// Filename, encoded-words decoded and sanitized. May be empty.
    pub filename: String,

    /// Lowercase media type (e.g. `"image/png"`).
    pub content_type: String,

    /// `Content-Id` without the surrounding angle brackets.
    pub content_id: Option<String>,

    /// Resolved disposition.
    pub disposition: Disposition,

    /// `Content-Transfer-Encoding` as it appeared in the headers.
    pub transfer_encoding: String,

    /// Decoded size in bytes. Always set, even when `content` is withheld.
    pub size: u64,

    /// Decoded bytes. `None` when content inclusion is disabled or the
    /// attachment exceeded the size ceiling.
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
}

impl AttachmentInfo {
    /// `true` if the decoded bytes are available.
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// `true` for inline parts.
    pub fn is_inline(&self) -> bool {
        self.disposition == Disposition::Inline
    }
}
