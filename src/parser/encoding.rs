//! Content-Transfer-Encoding and charset decoding.
//!
//! Transfer decoding always happens before charset conversion: charset
//! tables are only meaningful on bytes that are already binary-correct.
//! [`decode_with_fallback`] is the only entry point that is safe on headers
//! that may be lying about either.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use tracing::{debug, warn};

use crate::error::{MimeError, Result};
use crate::parser::charset;

/// Base64 engine that accepts missing padding and non-zero trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Which step of the fallback chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    /// Transfer decode and charset conversion both succeeded.
    Full,
    /// Only the transfer decode succeeded; bytes are in the source charset.
    TransferOnly,
    /// Only the charset conversion succeeded; transfer encoding left as is.
    CharsetOnly,
    /// Nothing succeeded; the input is returned unchanged.
    Raw,
}

/// Decode a `Content-Transfer-Encoding`.
///
/// `""`, `7bit`, `8bit` and `binary` pass through. Unknown encodings are an
/// explicit [`MimeError::UnsupportedEncoding`], never a silent pass-through.
pub fn decode_transfer_encoding(data: &[u8], encoding: &str) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    match encoding.trim().to_ascii_lowercase().as_str() {
        "" | "7bit" | "8bit" | "binary" => Ok(data.to_vec()),
        "quoted-printable" => {
            quoted_printable::decode(data, quoted_printable::ParseMode::Robust)
                .map_err(|e| MimeError::decode("quoted-printable", e))
        }
        "base64" => decode_base64(data),
        _ => Err(MimeError::UnsupportedEncoding(encoding.trim().to_string())),
    }
}

/// Decode base64 after dropping everything outside the base64 alphabet.
///
/// Broken producers insert stray whitespace, control bytes and odd line
/// wraps; all of that is discarded before decoding. Padding ends a chunk,
/// so bodies made of several separately padded runs decode run by run.
fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        .collect();

    let mut out = Vec::with_capacity(cleaned.len() / 4 * 3 + 3);
    for chunk in cleaned.split(|&b| b == b'=').filter(|c| !c.is_empty()) {
        LENIENT_BASE64
            .decode_vec(chunk, &mut out)
            .map_err(|e| MimeError::decode("base64", e))?;
    }
    Ok(out)
}

/// Convert bytes in `charset` to UTF-8.
///
/// `""`, `utf-8` and `utf8` are no-ops. Unknown names fail with
/// [`MimeError::UnsupportedCharset`]; byte sequences that are invalid in
/// the named charset fail with [`MimeError::Decode`].
pub fn convert_charset(data: &[u8], charset_name: &str) -> Result<Vec<u8>> {
    if data.is_empty() || charset::is_utf8(charset_name) {
        return Ok(data.to_vec());
    }

    let encoding = charset::lookup(charset_name)
        .ok_or_else(|| MimeError::UnsupportedCharset(charset_name.trim().to_string()))?;

    let (text, had_errors) = encoding.decode_with_bom_removal(data);
    if had_errors {
        return Err(MimeError::decode(
            encoding.name(),
            "malformed byte sequence for charset",
        ));
    }
    Ok(text.into_owned().into_bytes())
}

/// Best-effort charset conversion that always produces a string.
///
/// Malformed sequences become U+FFFD; unknown charsets are read as UTF-8.
pub fn convert_charset_lossy(data: &[u8], charset_name: &str) -> String {
    if charset::is_utf8(charset_name) {
        return String::from_utf8_lossy(data).into_owned();
    }
    match charset::lookup(charset_name) {
        Some(encoding) => {
            let (text, _) = encoding.decode_with_bom_removal(data);
            text.into_owned()
        }
        None => {
            warn!(
                charset = charset_name,
                "Unknown charset, falling back to UTF-8 lossy"
            );
            String::from_utf8_lossy(data).into_owned()
        }
    }
}

/// Transfer decode, then charset convert.
pub fn decode_full(data: &[u8], encoding: &str, charset_name: &str) -> Result<Vec<u8>> {
    let binary = decode_transfer_encoding(data, encoding)?;
    convert_charset(&binary, charset_name)
}

/// Never-failing decode: full → transfer only → charset only → input.
pub fn decode_with_fallback(data: &[u8], encoding: &str, charset_name: &str) -> Vec<u8> {
    decode_with_fallback_step(data, encoding, charset_name).0
}

/// Like [`decode_with_fallback`], also reporting which step succeeded.
pub fn decode_with_fallback_step(
    data: &[u8],
    encoding: &str,
    charset_name: &str,
) -> (Vec<u8>, DecodeStep) {
    let full_err = match decode_full(data, encoding, charset_name) {
        Ok(out) => return (out, DecodeStep::Full),
        Err(e) => e,
    };

    match decode_transfer_encoding(data, encoding) {
        Ok(out) => {
            debug!(encoding, charset = charset_name, error = %full_err, "Charset conversion failed, keeping transfer-decoded bytes");
            (out, DecodeStep::TransferOnly)
        }
        Err(transfer_err) => match convert_charset(data, charset_name) {
            Ok(out) => {
                debug!(encoding, error = %transfer_err, "Transfer decoding failed, converting charset only");
                (out, DecodeStep::CharsetOnly)
            }
            Err(_) => {
                debug!(encoding, charset = charset_name, "All decode steps failed, returning input verbatim");
                (data.to_vec(), DecodeStep::Raw)
            }
        },
    }
}

/// Decode a text part to a `String`.
///
/// Uses the fallback chain; when charset conversion did not succeed the
/// remaining bytes are read lossily in the declared charset, so the output
/// is always valid Unicode.
pub fn decode_text(data: &[u8], encoding: &str, charset_name: &str) -> String {
    let (bytes, step) = decode_with_fallback_step(data, encoding, charset_name);
    match step {
        DecodeStep::Full | DecodeStep::CharsetOnly => match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        },
        DecodeStep::TransferOnly | DecodeStep::Raw => convert_charset_lossy(&bytes, charset_name),
    }
}

// ── RFC 2047 encoded words ──────────────────────────────────────

/// `true` if `input` contains at least one decodable RFC 2047 encoded word.
pub fn is_encoded_word(input: &str) -> bool {
    input
        .match_indices("=?")
        .any(|(at, _)| encoded_word_at(&input[at..]).is_some())
}

/// Replace the RFC 2047 encoded words in a header value with their text.
///
/// `"=?UTF-8?Q?caf=C3=A9?= =?UTF-8?B?IGNyw6htZQ==?="` becomes `"café crème"`.
/// Linear whitespace separating two encoded words disappears; anything
/// that does not decode stays as written.
pub fn decode_encoded_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut after_word = false;

    while let Some(at) = rest.find("=?") {
        let (literal, candidate) = rest.split_at(at);
        match encoded_word_at(candidate) {
            Some((text, span)) => {
                if !(after_word && literal.chars().all(char::is_whitespace)) {
                    out.push_str(literal);
                }
                out.push_str(&text);
                rest = &candidate[span..];
                after_word = true;
            }
            None => {
                out.push_str(literal);
                out.push_str("=?");
                rest = &candidate[2..];
                after_word = false;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Decode the `=?charset?B|Q?payload?=` word that `s` starts with.
/// Returns the text and the byte length of the word.
fn encoded_word_at(s: &str) -> Option<(String, usize)> {
    let inner = s.strip_prefix("=?")?;
    let mut fields = inner.splitn(3, '?');
    let label = fields.next()?;
    let scheme = fields.next()?;
    let tail = fields.next()?;
    let payload = &tail[..tail.find("?=")?];

    if label.is_empty() || label.contains(char::is_whitespace) {
        return None;
    }
    // `charset*language`
    let charset_name = label.split_once('*').map_or(label, |(name, _)| name);

    let bytes = match scheme {
        "B" | "b" => decode_base64(payload.as_bytes()).ok()?,
        "Q" | "q" => decode_q_encoding(payload),
        _ => return None,
    };

    let span = "=?".len() + label.len() + 1 + scheme.len() + 1 + payload.len() + "?=".len();
    Some((convert_charset_lossy(&bytes, charset_name), span))
}

/// RFC 2047 Q payload: `_` is a space and `=XX` a hex-coded byte.
fn decode_q_encoding(payload: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut rest = payload.as_bytes();

    while let Some((&byte, tail)) = rest.split_first() {
        rest = tail;
        match byte {
            b'_' => out.push(b' '),
            b'=' => match tail {
                [hi, lo, after @ ..] => match hex_pair(*hi, *lo) {
                    Some(decoded) => {
                        out.push(decoded);
                        rest = after;
                    }
                    None => out.push(b'='),
                },
                _ => out.push(b'='),
            },
            other => out.push(other),
        }
    }
    out
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}
