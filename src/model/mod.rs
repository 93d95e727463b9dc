//! Core data model types: parse results, attachments, and decode options.

pub mod attachment;
pub mod message;
pub mod options;
