//! Parse result types: the decoded message, its part tree, and diagnostics.

use std::fmt;

use crate::error::MimeError;

use super::attachment::AttachmentInfo;

/// Outcome of parsing one raw message.
///
/// Built fresh for every call and owned entirely by the caller.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ParsedMessage {
    /// First `text/plain` leaf, decoded to Unicode. Empty if none was found.
    pub text_body: String,

    /// First `text/html` leaf, decoded to Unicode. Empty if none was found.
    pub html_body: String,

    /// Regular attachments, in discovery order.
    pub attachments: Vec<AttachmentInfo>,

    /// Inline parts (embedded images and the like), in discovery order.
    pub inline_attachments: Vec<AttachmentInfo>,

    /// Non-fatal problems, in the order they were encountered.
    pub errors: Vec<Diagnostic>,

    /// Every part visited, containers included, in document order.
    pub structure: Vec<MimeNode>,
}

impl ParsedMessage {
    /// `true` if no diagnostics were recorded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Look up a visited part by its dotted identifier.
    pub fn node(&self, part_id: &str) -> Option<&MimeNode> {
        self.structure.iter().find(|n| n.part_id == part_id)
    }

    /// Every attachment, regular first, then inline.
    pub fn all_attachments(&self) -> impl Iterator<Item = &AttachmentInfo> {
        self.attachments.iter().chain(self.inline_attachments.iter())
    }
}

/// Which splitter produced a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// The message itself.
    Root,
    /// Strict delimiter-line reader.
    Primary,
    /// Literal boundary split used when the strict reader gave up.
    Fallback,
}

/// One entry of the flat part arena.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MimeNode {
    /// Dotted path. The top-level container has an empty id; a single-part
    /// message body is `"1"`.
    pub part_id: String,
    /// Index of the enclosing container in `structure`.
    pub parent: Option<usize>,
    /// Number of containers above this node.
    pub depth: usize,
    /// Lowercase media type.
    pub content_type: String,
    /// `true` for `multipart/*` nodes.
    pub container: bool,
    /// Splitter that produced the node.
    pub strategy: SplitStrategy,
    /// Length of the part as found in its container, header block
    /// included. For the message itself, the length of its body.
    pub raw_size: usize,
}

/// Category of a recorded problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Broken multipart framing, missing boundary.
    Structure,
    /// A single part could not be read.
    PartUnreadable,
    /// A `Content-Type` header could not be parsed.
    ContentType,
    /// Transfer encoding or charset problems.
    Encoding,
    /// Size or type policy violations.
    Policy,
    /// A resource bound was hit.
    Limit,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::PartUnreadable => "part",
            Self::ContentType => "content-type",
            Self::Encoding => "encoding",
            Self::Policy => "policy",
            Self::Limit => "limit",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal problem recorded during parsing.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    /// Part the problem belongs to. Empty for the message as a whole.
    pub part_id: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    /// Record `err` against `part_id`.
    pub fn from_error(part_id: &str, err: &MimeError) -> Self {
        Self {
            part_id: part_id.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.part_id.is_empty() {
            write!(f, "[{}] {}", self.kind, self.message)
        } else {
            write!(f, "[{}] part {}: {}", self.kind, self.part_id, self.message)
        }
    }
}
