//! Caller-supplied decoding policy.

/// Default attachment ceiling: 25 MiB.
pub const DEFAULT_MAX_ATTACHMENT_SIZE: u64 = 25 * 1024 * 1024;

/// Hard cap on parts read from one multipart container.
pub const DEFAULT_MAX_PARTS: usize = 100;

/// Consecutive unreadable parts after which a container is abandoned.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: usize = 5;

/// Maximum container nesting (to prevent runaway work on adversarial input).
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Options for one [`crate::parse_message`] call.
///
/// Never mutated by the parser; the same value can be shared by any number
/// of concurrent calls.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Attach decoded bytes to each [`crate::AttachmentInfo`].
    pub include_content: bool,

    /// Ceiling on the decoded size of a single attachment (0 = unlimited).
    pub max_attachment_size: u64,

    /// If non-empty, only these media types / extensions are accepted.
    ///
    /// Entries may be a media type (`image/png`), a wildcard (`image/*`) or
    /// an extension with or without the leading dot (`pdf`, `.pdf`).
    pub allowed_types: Vec<String>,

    /// Media types / extensions that are always rejected. Wins over
    /// `allowed_types`.
    pub denied_types: Vec<String>,

    /// Classify inline parts. When `false`, inline parts are skipped.
    pub process_inline: bool,

    /// Turn the first recorded problem into a hard error.
    pub strict: bool,

    /// Stop walking the message after this many diagnostics (0 = unlimited).
    pub max_errors: usize,

    /// Parts read from a single container before the rest is skipped.
    pub max_parts_per_container: usize,

    /// Consecutive unreadable parts before a container is abandoned.
    pub max_consecutive_errors: usize,

    /// Maximum container nesting depth.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            include_content: true,
            max_attachment_size: DEFAULT_MAX_ATTACHMENT_SIZE,
            allowed_types: Vec::new(),
            denied_types: Vec::new(),
            process_inline: true,
            strict: false,
            max_errors: 50,
            max_parts_per_container: DEFAULT_MAX_PARTS,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecodeOptions {
    /// Same options with strict mode switched on.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Metadata only: decoded sizes are still computed, content is dropped.
    pub fn metadata_only() -> Self {
        Self {
            include_content: false,
            ..Self::default()
        }
    }
}
