//! MIME header handling: header-block splitting, folding, and
//! `Content-Type` / `Content-Disposition` parameter parsing (RFC 2045,
//! RFC 2231 continuations).

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;

use crate::error::{MimeError, Result};
use crate::parser::encoding;

/// An ordered list of `(lowercase_name, unfolded_value)` header pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Get the first value for a header name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
        )
    }
}

/// Split raw part bytes into `(header_block, body)` at the first empty line.
///
/// Accepts both `\r\n` and `\n` line endings. Without an empty line the
/// whole input is the header block and the body is empty.
pub fn split_header_body(data: &[u8]) -> (&[u8], &[u8]) {
    let mut line_start = 0;
    while line_start < data.len() {
        let line_end = data[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| line_start + p + 1);

        let Some(line_end) = line_end else { break };
        let line = &data[line_start..line_end];
        if line == b"\n" || line == b"\r\n" {
            return (&data[..line_start], &data[line_end..]);
        }
        line_start = line_end;
    }
    (data, &[])
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// `true` if the line has the shape `name: value` with a non-empty field
/// name free of whitespace and control characters.
pub fn is_header_line(line: &str) -> bool {
    match line.find(':') {
        Some(colon_pos) if colon_pos > 0 => line[..colon_pos]
            .bytes()
            .all(|b| b.is_ascii_graphic()),
        _ => false,
    }
}

/// Parse a header block strictly: every line must be a header or a
/// continuation of one. Used on parts read by the strict multipart reader.
pub fn parse_headers(raw: &[u8]) -> std::result::Result<Headers, String> {
    unfold_headers(&decode_header_bytes(raw), true)
}

/// Parse a header block permissively: lines that are neither headers nor
/// continuations are skipped.
pub fn parse_headers_lenient(raw: &[u8]) -> Headers {
    // Lenient mode never reports an error.
    unfold_headers(&decode_header_bytes(raw), false).unwrap_or_default()
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
fn unfold_headers(text: &str, strict: bool) -> std::result::Result<Headers, String> {
    let mut result: Vec<(String, String)> = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation line
            match result.last_mut() {
                Some(last) => {
                    last.1.push(' ');
                    last.1.push_str(line.trim());
                }
                None if strict => {
                    return Err(format!(
                        "continuation line {} before any header",
                        lineno + 1
                    ))
                }
                None => {}
            }
        } else if is_header_line(line) {
            let colon_pos = line.find(':').unwrap_or_default();
            let name = line[..colon_pos].trim().to_ascii_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        } else if strict && !line.trim().is_empty() {
            return Err(format!("malformed header line {}: {:?}", lineno + 1, truncate(line, 60)));
        }
    }

    Ok(Headers(result))
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Strip surrounding `<` and `>` (for `Content-Id`).
pub fn strip_angle_brackets(s: &str) -> String {
    let trimmed = s.trim();
    let trimmed = trimmed.strip_prefix('<').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('>').unwrap_or(trimmed);
    trimmed.trim().to_string()
}

// ── Parameters ──────────────────────────────────────────────────

/// Header parameters (`; name=value`), names lowercased, RFC 2231
/// continuations and charsets already resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse the parameter list following the first `;` of a header value.
fn parse_params(input: &str) -> Params {
    let mut raw: Vec<(String, String)> = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        // Skip separators
        while chars.peek().is_some_and(|c| *c == ';' || c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ';' {
                break;
            }
            name.push(c);
            chars.next();
        }
        let name = name.trim().to_ascii_lowercase();

        if chars.peek() != Some(&'=') {
            // Valueless parameter: ignore
            continue;
        }
        chars.next();
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
            // Anything between the closing quote and the next ';' is junk
            while chars.peek().is_some_and(|c| *c != ';') {
                chars.next();
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ';' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        if !name.is_empty() {
            raw.push((name, value));
        }
    }

    Params(combine_rfc2231(raw))
}

/// Merge RFC 2231 sections (`name*0`, `name*1*`, `name*`) into plain
/// parameters. Extended values win over a plain parameter of the same name.
fn combine_rfc2231(raw: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut plain: Vec<(String, String)> = Vec::new();
    let mut sections: BTreeMap<String, Vec<(u32, bool, String)>> = BTreeMap::new();

    for (name, value) in raw {
        let Some((base, rest)) = name.split_once('*') else {
            plain.push((name, value));
            continue;
        };
        let section = if rest.is_empty() {
            Some((0, true))
        } else if let Some(num) = rest.strip_suffix('*') {
            num.parse().ok().map(|n| (n, true))
        } else {
            rest.parse().ok().map(|n| (n, false))
        };
        match section {
            Some((index, extended)) => sections
                .entry(base.to_string())
                .or_default()
                .push((index, extended, value)),
            None => plain.push((name, value)),
        }
    }

    for (base, mut parts) in sections {
        parts.sort_by_key(|(index, _, _)| *index);

        let mut charset_name = String::new();
        let mut bytes = Vec::new();
        for (i, (_, extended, value)) in parts.iter().enumerate() {
            if !extended {
                bytes.extend_from_slice(value.as_bytes());
                continue;
            }
            let mut encoded = value.as_str();
            if i == 0 {
                // charset'language'value
                let mut pieces = value.splitn(3, '\'');
                if let (Some(cs), Some(_lang), Some(rest)) =
                    (pieces.next(), pieces.next(), pieces.next())
                {
                    charset_name = cs.to_string();
                    encoded = rest;
                }
            }
            bytes.extend(percent_decode_str(encoded));
        }

        let value = encoding::convert_charset_lossy(&bytes, &charset_name);
        plain.retain(|(k, _)| *k != base);
        plain.push((base, value));
    }

    plain
}

// ── Content-Type / Content-Disposition ──────────────────────────

/// A parsed `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercase `type/subtype`.
    pub mime_type: String,
    pub params: Params,
}

impl ContentType {
    /// Parse a `Content-Type` value.
    ///
    /// Fails if the media type is not a `type/subtype` pair of tokens.
    pub fn parse(value: &str) -> Result<Self> {
        let (media, rest) = match value.split_once(';') {
            Some((media, rest)) => (media, rest),
            None => (value, ""),
        };
        let mime_type = media.trim().to_ascii_lowercase();

        let invalid = |reason: &str| MimeError::ContentType {
            value: value.trim().to_string(),
            reason: reason.to_string(),
        };

        let (main, sub) = mime_type
            .split_once('/')
            .ok_or_else(|| invalid("missing '/' in media type"))?;
        if main.is_empty() || sub.is_empty() {
            return Err(invalid("empty type or subtype"));
        }
        if !main.bytes().chain(sub.bytes()).all(is_token_byte) {
            return Err(invalid("invalid character in media type"));
        }

        Ok(Self {
            mime_type,
            params: parse_params(rest),
        })
    }

    /// A bare media type with no parameters.
    pub fn new(mime_type: &str) -> Self {
        Self {
            mime_type: mime_type.to_ascii_lowercase(),
            params: Params::default(),
        }
    }

    /// Top-level type (`"text"` for `text/plain`).
    pub fn main_type(&self) -> &str {
        self.mime_type.split('/').next().unwrap_or_default()
    }

    /// Subtype (`"plain"` for `text/plain`).
    pub fn sub_type(&self) -> &str {
        self.mime_type.split_once('/').map(|(_, s)| s).unwrap_or_default()
    }

    pub fn is_multipart(&self) -> bool {
        self.main_type() == "multipart"
    }

    /// The `boundary` parameter, if present and non-empty.
    pub fn boundary(&self) -> Option<&str> {
        self.params.get("boundary").filter(|b| !b.is_empty())
    }

    pub fn charset(&self) -> Option<&str> {
        self.params.get("charset")
    }
}

/// RFC 2045 token characters.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b)
}

/// A parsed `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Lowercase disposition type; empty if the header had none.
    pub kind: String,
    pub params: Params,
}

impl ContentDisposition {
    /// Parse a `Content-Disposition` value. Never fails.
    pub fn parse(value: &str) -> Self {
        let (kind, rest) = match value.split_once(';') {
            Some((kind, rest)) => (kind, rest),
            None => (value, ""),
        };
        // `attachment filename=x` (missing semicolon) still yields `attachment`
        let kind = kind.split_whitespace().next().unwrap_or_default();
        Self {
            kind: kind.to_ascii_lowercase(),
            params: parse_params(rest),
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.kind == "attachment"
    }

    pub fn is_inline(&self) -> bool {
        self.kind == "inline"
    }
}
