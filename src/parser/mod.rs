//! MIME decoding: transfer encodings and charsets, header parsing,
//! multipart splitting, attachment classification, and the structural walk.

pub mod charset;
pub mod classify;
pub mod encoding;
pub mod header;
pub mod message;
pub mod multipart;
