//! Multipart body splitting.
//!
//! Two strategies: [`MultipartReader`] recognizes delimiter lines strictly
//! and parses part headers strictly; [`split_fallback`] splits on the
//! literal `--boundary` string wherever it occurs and takes over when the
//! strict reader finds no structure or loses it partway.

use thiserror::Error;

use crate::parser::header::{parse_headers, parse_headers_lenient, split_header_body, Headers};

/// One body part as found in a multipart container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPart<'a> {
    pub headers: Headers,
    pub body: &'a [u8],
    /// Length of the part including its header block.
    pub raw_size: usize,
}

/// Failures of the strict multipart reader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    /// No delimiter line for the boundary exists in the body.
    #[error("no opening delimiter for boundary {0:?}")]
    NoOpeningDelimiter(String),

    /// A part's header block contains a line that is not a header.
    #[error("malformed part headers: {0}")]
    MalformedPartHeaders(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Open,
    Close,
}

/// Strict, line-oriented multipart reader.
///
/// Yields one item per part slot. A part whose header block does not parse
/// is yielded as `Err(SplitError::MalformedPartHeaders)` and reading
/// continues with the next part. Reaching the end of the body before the
/// closing delimiter yields the final part and sets [`is_truncated`].
///
/// [`is_truncated`]: MultipartReader::is_truncated
#[derive(Debug)]
pub struct MultipartReader<'a> {
    data: &'a [u8],
    dash_boundary: Vec<u8>,
    pos: usize,
    done: bool,
    truncated: bool,
}

impl<'a> MultipartReader<'a> {
    /// Position the reader after the first delimiter line.
    pub fn new(body: &'a [u8], boundary: &str) -> Result<Self, SplitError> {
        let dash_boundary = format!("--{boundary}").into_bytes();

        let mut pos = 0;
        while let Some((line, next)) = next_line(body, pos) {
            match delimiter_kind(line, &dash_boundary) {
                Some(kind) => {
                    return Ok(Self {
                        data: body,
                        dash_boundary,
                        pos: next,
                        done: kind == Delimiter::Close,
                        truncated: false,
                    });
                }
                None => pos = next,
            }
        }

        Err(SplitError::NoOpeningDelimiter(boundary.to_string()))
    }

    /// `true` once the body ended without a closing delimiter.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn make_part(&self, content: &'a [u8]) -> Result<RawPart<'a>, SplitError> {
        let (header_block, body) = split_part(content);
        let headers = parse_headers(header_block).map_err(SplitError::MalformedPartHeaders)?;
        Ok(RawPart {
            headers,
            body,
            raw_size: content.len(),
        })
    }
}

impl<'a> Iterator for MultipartReader<'a> {
    type Item = Result<RawPart<'a>, SplitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let data = self.data;
        let start = self.pos;
        let mut pos = start;
        while let Some((line, next)) = next_line(data, pos) {
            if let Some(kind) = delimiter_kind(line, &self.dash_boundary) {
                let content = strip_trailing_newline(&data[start..pos]);
                self.pos = next;
                self.done = kind == Delimiter::Close;
                return Some(self.make_part(content));
            }
            pos = next;
        }

        self.done = true;
        self.truncated = true;
        let content = &data[start..];
        if content.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(self.make_part(content))
    }
}

/// Permissive splitter: cut the body on every literal `--boundary`,
/// discard the preamble and the text after the last occurrence, and parse
/// each remaining segment's headers leniently.
pub fn split_fallback<'a>(body: &'a [u8], boundary: &str) -> FallbackSplit<'a> {
    let needle = format!("--{boundary}").into_bytes();
    let pos = find(body, &needle, 0).map(|p| p + needle.len());
    FallbackSplit {
        data: body,
        needle,
        pos,
    }
}

/// Iterator returned by [`split_fallback`].
#[derive(Debug)]
pub struct FallbackSplit<'a> {
    data: &'a [u8],
    needle: Vec<u8>,
    /// Start of the next segment; `None` when exhausted.
    pos: Option<usize>,
}

impl<'a> Iterator for FallbackSplit<'a> {
    type Item = RawPart<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data;
        let start = self.pos?;
        let Some(end) = find(data, &self.needle, start) else {
            // The last segment is the epilogue (or a closing `--`).
            self.pos = None;
            return None;
        };
        self.pos = Some(end + self.needle.len());

        let segment = trim_segment(&data[start..end]);
        let (header_block, body) = split_part(segment);
        Some(RawPart {
            headers: parse_headers_lenient(header_block),
            body,
            raw_size: segment.len(),
        })
    }
}

/// Split part content into header block and body. A part that begins with a
/// blank line has no headers; a part without any blank line is all headers.
fn split_part(content: &[u8]) -> (&[u8], &[u8]) {
    if let Some(rest) = content.strip_prefix(b"\r\n") {
        return (&[], rest);
    }
    if let Some(rest) = content.strip_prefix(b"\n") {
        return (&[], rest);
    }
    split_header_body(content)
}

/// Returns the line starting at `pos` (terminator excluded) and the offset
/// of the next line.
fn next_line(data: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    if pos >= data.len() {
        return None;
    }
    match data[pos..].iter().position(|&b| b == b'\n') {
        Some(i) => {
            let line = &data[pos..pos + i];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            Some((line, pos + i + 1))
        }
        None => Some((&data[pos..], data.len())),
    }
}

fn delimiter_kind(line: &[u8], dash_boundary: &[u8]) -> Option<Delimiter> {
    let rest = line.strip_prefix(dash_boundary)?;
    let is_blank = |s: &[u8]| s.iter().all(|&b| b == b' ' || b == b'\t');

    match rest.strip_prefix(b"--") {
        Some(tail) if is_blank(tail) => Some(Delimiter::Close),
        _ if is_blank(rest) => Some(Delimiter::Open),
        _ => None,
    }
}

/// The line break before a delimiter belongs to the delimiter.
fn strip_trailing_newline(content: &[u8]) -> &[u8] {
    match content.strip_suffix(b"\n") {
        Some(rest) => rest.strip_suffix(b"\r").unwrap_or(rest),
        None => content,
    }
}

/// Drop the remainder of the delimiter line at the start of a fallback
/// segment and the line break (plus any indentation) before the next one.
fn trim_segment(segment: &[u8]) -> &[u8] {
    let head_len = segment
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .unwrap_or(segment.len());
    let segment = match &segment[head_len..] {
        [b'\r', b'\n', rest @ ..] | [b'\n', rest @ ..] => rest,
        _ => segment,
    };

    let tail_len = segment
        .iter()
        .rev()
        .take_while(|&&b| b == b' ' || b == b'\t')
        .count();
    strip_trailing_newline(&segment[..segment.len() - tail_len])
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<'a>(body: &'a [u8], boundary: &str) -> Vec<Result<RawPart<'a>, SplitError>> {
        MultipartReader::new(body, boundary).unwrap().collect()
    }

    #[test]
    fn test_reads_parts_crlf() {
        let body = b"preamble\r\n--xyz\r\nContent-Type: text/plain\r\n\r\nhello\r\n--xyz\r\n\r\nno headers\r\n--xyz--\r\nepilogue";
        let parts = collect(body, "xyz");
        assert_eq!(parts.len(), 2);

        let first = parts[0].as_ref().unwrap();
        assert_eq!(first.headers.get("content-type"), Some("text/plain"));
        assert_eq!(first.body, b"hello");

        let second = parts[1].as_ref().unwrap();
        assert!(second.headers.is_empty());
        assert_eq!(second.body, b"no headers");
    }

    #[test]
    fn test_reads_parts_lf_and_trailing_whitespace() {
        let body = b"--b  \nContent-Type: text/html\n\n<p>x</p>\n--b-- \n";
        let mut reader = MultipartReader::new(body, "b").unwrap();
        let part = reader.next().unwrap().unwrap();
        assert_eq!(part.body, b"<p>x</p>");
        assert!(reader.next().is_none());
        assert!(!reader.is_truncated());
    }

    #[test]
    fn test_boundary_prefix_is_not_delimiter() {
        let body = b"--b\n\nline --b inside\n--bx\nstill body\n--b--\n";
        let parts = collect(body, "b");
        assert_eq!(parts.len(), 1);
        assert_eq!(
            parts[0].as_ref().unwrap().body,
            b"line --b inside\n--bx\nstill body"
        );
    }

    #[test]
    fn test_no_opening_delimiter() {
        let err = MultipartReader::new(b"just text\n  --b\n", "b").unwrap_err();
        assert_eq!(err, SplitError::NoOpeningDelimiter("b".into()));
    }

    #[test]
    fn test_truncated_final_part() {
        let body = b"--b\nContent-Type: text/plain\n\npart one\n--b\nContent-Type: text/plain\n\ncut off";
        let mut reader = MultipartReader::new(body, "b").unwrap();
        assert_eq!(reader.next().unwrap().unwrap().body, b"part one");
        assert_eq!(reader.next().unwrap().unwrap().body, b"cut off");
        assert!(reader.next().is_none());
        assert!(reader.is_truncated());
    }

    #[test]
    fn test_malformed_headers_are_recoverable() {
        let body = b"--b\nthis is not a header\nContent-Type: text/plain\n\nx\n--b\nContent-Type: text/plain\n\ny\n--b--\n";
        let parts = collect(body, "b");
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[0], Err(SplitError::MalformedPartHeaders(_))));
        assert_eq!(parts[1].as_ref().unwrap().body, b"y");
    }

    #[test]
    fn test_close_as_first_delimiter() {
        let mut reader = MultipartReader::new(b"--b--\n", "b").unwrap();
        assert!(reader.next().is_none());
        assert!(!reader.is_truncated());
    }

    #[test]
    fn test_fallback_drops_first_and_last_segments() {
        let body = b"preamble\n --b\nContent-Type: text/plain\n\nhello\n --b\n\nsecond\n --b--\nepilogue";
        let parts: Vec<_> = split_fallback(body, "b").collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].headers.get("content-type"), Some("text/plain"));
        assert_eq!(parts[0].body, b"hello");
        assert!(parts[1].headers.is_empty());
        assert_eq!(parts[1].body, b"second");
    }

    #[test]
    fn test_fallback_segment_without_blank_line() {
        let body = b"x--bContent-Type: text/plain--b--";
        let parts: Vec<_> = split_fallback(body, "b").collect();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].headers.get("content-type"), Some("text/plain"));
        assert!(parts[0].body.is_empty());
    }

    #[test]
    fn test_fallback_without_boundary() {
        assert_eq!(split_fallback(b"nothing here", "b").count(), 0);
        assert_eq!(split_fallback(b"only --b once", "b").count(), 0);
    }

    #[test]
    fn test_reader_is_lazy_on_many_delimiters() {
        let body = "--b\n\nx\n".repeat(10_000);
        let reader = MultipartReader::new(body.as_bytes(), "b").unwrap();
        assert_eq!(reader.take(100).count(), 100);
    }
}
