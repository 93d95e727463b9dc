//! `mimewalk` — MIME decoding and structural parsing for raw email messages.
//!
//! Given the bytes of an RFC 5322 message, [`parse_message`] recovers the
//! plain-text body, the HTML body, and the classified attachments, despite
//! transfer encodings, legacy charsets, nested multipart containers, and
//! broken producers. Problems with individual parts are reported as
//! diagnostics next to the partial result instead of failing the message.
//!
//! ```no_run
//! use mimewalk::{parse_message, DecodeOptions};
//!
//! let raw = std::fs::read("message.eml")?;
//! let msg = parse_message(&raw, &DecodeOptions::default())?;
//! println!("{}", msg.text_body);
//! for att in &msg.attachments {
//!     println!("{} ({} bytes)", att.filename, att.size);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod parser;

pub use error::{MimeError, Result};
pub use model::attachment::{AttachmentInfo, Disposition};
pub use model::message::{Diagnostic, DiagnosticKind, MimeNode, ParsedMessage, SplitStrategy};
pub use model::options::DecodeOptions;
pub use parser::message::parse_message;
