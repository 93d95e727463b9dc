//! Structural parser: walks the MIME tree of one message and collects
//! bodies, attachments and diagnostics.
//!
//! The walk uses an explicit work stack. Containers are split with the
//! strict [`MultipartReader`]. When it finds no opening delimiter, or loses
//! the structure partway (no closing delimiter, no readable slot), the
//! literal [`split_fallback`] takes over if it recovers more parts.
//! Children are pushed in reverse so they are visited in document order.

use tracing::{debug, warn};

use crate::error::{MimeError, Result};
use crate::model::attachment::{AttachmentInfo, Disposition};
use crate::model::message::{Diagnostic, MimeNode, ParsedMessage, SplitStrategy};
use crate::model::options::DecodeOptions;
use crate::parser::classify::{classify, sanitize_filename};
use crate::parser::encoding;
use crate::parser::header::{
    is_header_line, parse_headers_lenient, split_header_body, ContentDisposition, ContentType,
    Headers,
};
use crate::parser::multipart::{split_fallback, MultipartReader, RawPart};

/// Parse a raw RFC 5322 message.
///
/// Only an empty or header-less input and a top-level multipart without a
/// boundary are fatal. Everything else is recorded in
/// [`ParsedMessage::errors`] unless `options.strict` is set, in which case
/// the first problem is returned as the error.
pub fn parse_message(raw: &[u8], options: &DecodeOptions) -> Result<ParsedMessage> {
    let data = skip_from_line(raw);
    check_top_level(data)?;

    let (header_block, body) = split_header_body(data);
    let headers = parse_headers_lenient(header_block);

    Walker::new(options).run(headers, body)
}

/// Skip a leading UTF-8 BOM and an mbox `From ` separator line.
pub fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
        return &[];
    }
    data
}

fn check_top_level(data: &[u8]) -> Result<()> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(MimeError::UnreadableHeaders("empty message".into()));
    }

    let first_line = data.split(|&b| b == b'\n').next().unwrap_or_default();
    let first_line = first_line.strip_suffix(b"\r").unwrap_or(first_line);
    if first_line.is_empty() {
        return Ok(());
    }

    let text = String::from_utf8_lossy(first_line);
    if is_header_line(&text) {
        Ok(())
    } else {
        let preview: String = text.chars().take(60).collect();
        Err(MimeError::UnreadableHeaders(format!(
            "first line is not a header: {preview:?}"
        )))
    }
}

/// A part waiting to be visited.
struct Frame<'a> {
    part_id: String,
    /// Arena index of the enclosing container.
    parent: Option<usize>,
    /// Containers above this part.
    depth: usize,
    headers: Headers,
    body: &'a [u8],
    /// Length of the part as found in its container, headers included.
    raw_size: usize,
    strategy: SplitStrategy,
    /// Media type assumed when the part has no `Content-Type`.
    default_type: &'static str,
}

struct Walker<'o> {
    options: &'o DecodeOptions,
    out: ParsedMessage,
    text_found: bool,
    html_found: bool,
    /// Set once the error budget is spent.
    stopped: bool,
}

impl<'o> Walker<'o> {
    fn new(options: &'o DecodeOptions) -> Self {
        Self {
            options,
            out: ParsedMessage::default(),
            text_found: false,
            html_found: false,
            stopped: false,
        }
    }

    fn run(mut self, headers: Headers, body: &[u8]) -> Result<ParsedMessage> {
        let mut stack = vec![Frame {
            part_id: String::new(),
            parent: None,
            depth: 0,
            headers,
            body,
            raw_size: body.len(),
            strategy: SplitStrategy::Root,
            default_type: "text/plain",
        }];

        while let Some(frame) = stack.pop() {
            if self.stopped {
                break;
            }
            let children = self.visit(frame)?;
            stack.extend(children.into_iter().rev());
        }

        Ok(self.out)
    }

    /// Record a problem, or return it in strict mode.
    fn record(&mut self, part_id: &str, err: MimeError) -> Result<()> {
        if self.options.strict {
            return Err(err);
        }
        if self.stopped {
            return Ok(());
        }

        debug!(part_id, error = %err, "Recording diagnostic");
        self.out.errors.push(Diagnostic::from_error(part_id, &err));

        let budget = self.options.max_errors;
        if budget > 0 && self.out.errors.len() >= budget {
            warn!(budget, "Error budget exhausted, stopping");
            let limit = MimeError::LimitReached(format!(
                "{budget} diagnostics recorded, remaining parts skipped"
            ));
            self.out.errors.push(Diagnostic::from_error("", &limit));
            self.stopped = true;
        }
        Ok(())
    }

    fn visit<'a>(&mut self, frame: Frame<'a>) -> Result<Vec<Frame<'a>>> {
        let is_root = frame.strategy == SplitStrategy::Root;

        let content_type = match frame.headers.get("content-type") {
            None => ContentType::new(frame.default_type),
            Some(value) => match ContentType::parse(value) {
                Ok(ct) => ct,
                Err(err) if is_root => {
                    self.record("", err)?;
                    ContentType::new("text/plain")
                }
                Err(err) => {
                    self.record(&frame.part_id, err)?;
                    return Ok(Vec::new());
                }
            },
        };

        let container = content_type.is_multipart();
        let part_id = if is_root && !container {
            "1".to_string()
        } else {
            frame.part_id
        };

        let index = self.out.structure.len();
        self.out.structure.push(MimeNode {
            part_id: part_id.clone(),
            parent: frame.parent,
            depth: frame.depth,
            content_type: content_type.mime_type.clone(),
            container,
            strategy: frame.strategy,
            raw_size: frame.raw_size,
        });

        if !container {
            self.dispatch_leaf(&part_id, &frame.headers, &content_type, frame.body)?;
            return Ok(Vec::new());
        }

        let Some(boundary) = content_type.boundary() else {
            if is_root {
                return Err(MimeError::MissingBoundary);
            }
            self.record(&part_id, MimeError::MissingBoundary)?;
            return Ok(Vec::new());
        };

        let max_depth = self.options.max_depth;
        if max_depth > 0 && frame.depth >= max_depth {
            self.record(
                &part_id,
                MimeError::LimitReached(format!(
                    "container nested deeper than {max_depth} levels skipped"
                )),
            )?;
            return Ok(Vec::new());
        }

        let child_default = if content_type.mime_type == "multipart/digest" {
            "message/rfc822"
        } else {
            "text/plain"
        };
        let container_ref = ContainerRef {
            part_id: &part_id,
            index,
            depth: frame.depth,
            boundary,
            child_default,
        };

        let split = match MultipartReader::new(frame.body, boundary) {
            Ok(reader) => {
                let primary = container_ref.read_primary(reader, self.options);
                if primary.is_degraded() {
                    self.substitute_fallback(&container_ref, primary, frame.body)?
                } else {
                    primary
                }
            }
            Err(err) => {
                debug!(part_id = %part_id, error = %err, "Strict multipart reader failed, using fallback split");
                container_ref.read_fallback(frame.body, self.options)
            }
        };
        self.finish_split(split)
    }

    /// Replace a degraded primary split with the literal split of the same
    /// body when the latter recovers more parts.
    fn substitute_fallback<'a>(
        &mut self,
        container: &ContainerRef<'_>,
        primary: Split<'a>,
        body: &'a [u8],
    ) -> Result<Split<'a>> {
        let fallback = container.read_fallback(body, self.options);
        if fallback.children.len() <= primary.children.len() {
            return Ok(primary);
        }

        warn!(
            part_id = container.part_id,
            primary = primary.children.len(),
            fallback = fallback.children.len(),
            "Strict multipart reader lost structure, using fallback split"
        );
        self.record(
            container.part_id,
            MimeError::Multipart(format!(
                "malformed delimiters for boundary {:?}, {} parts recovered by literal split",
                container.boundary,
                fallback.children.len()
            )),
        )?;
        Ok(fallback)
    }

    /// Record the problems of the chosen split and hand back its children.
    fn finish_split<'a>(&mut self, split: Split<'a>) -> Result<Vec<Frame<'a>>> {
        for (part_id, err) in split.problems {
            if self.stopped {
                break;
            }
            self.record(&part_id, err)?;
        }
        Ok(split.children)
    }

    fn dispatch_leaf(
        &mut self,
        part_id: &str,
        headers: &Headers,
        content_type: &ContentType,
        body: &[u8],
    ) -> Result<()> {
        let is_attachment = headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
            .is_some_and(|cd| cd.is_attachment());

        let found = match content_type.mime_type.as_str() {
            "text/plain" if !is_attachment => Some(self.text_found),
            "text/html" if !is_attachment => Some(self.html_found),
            _ => None,
        };

        match found {
            // A later body of the same type is ignored.
            Some(true) => Ok(()),
            Some(false) => self.fill_body(part_id, headers, content_type, body),
            None => self.classify_leaf(part_id, headers, content_type, body),
        }
    }

    fn fill_body(
        &mut self,
        part_id: &str,
        headers: &Headers,
        content_type: &ContentType,
        body: &[u8],
    ) -> Result<()> {
        let transfer_encoding = headers.get("content-transfer-encoding").unwrap_or_default();
        let charset = content_type.charset().unwrap_or_default();

        let text = match encoding::decode_full(body, transfer_encoding, charset) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            },
            Err(err) => {
                self.record(part_id, err)?;
                encoding::decode_text(body, transfer_encoding, charset)
            }
        };

        if content_type.sub_type() == "html" {
            self.out.html_body = text;
            self.html_found = true;
        } else {
            self.out.text_body = text;
            self.text_found = true;
        }
        Ok(())
    }

    fn classify_leaf(
        &mut self,
        part_id: &str,
        headers: &Headers,
        content_type: &ContentType,
        body: &[u8],
    ) -> Result<()> {
        let typed = headers.contains("content-type");
        let finish = |mut info: AttachmentInfo| {
            if !typed {
                info.content_type = content_type.mime_type.clone();
            }
            if !info.filename.is_empty() {
                info.filename = sanitize_filename(&encoding::decode_encoded_words(&info.filename));
            }
            info
        };

        match classify(headers, body, part_id, self.options) {
            Ok(Some(info)) => self.push_attachment(finish(info)),
            Ok(None) => debug!(part_id, "Inline part skipped"),
            Err(err) => {
                let withheld = match &err {
                    MimeError::SizeExceeded { info, .. } => Some(finish(info.as_ref().clone())),
                    _ => None,
                };
                self.record(part_id, err)?;
                if let Some(info) = withheld {
                    self.push_attachment(info);
                }
            }
        }
        Ok(())
    }

    fn push_attachment(&mut self, info: AttachmentInfo) {
        match info.disposition {
            Disposition::Inline => self.out.inline_attachments.push(info),
            Disposition::Attachment => self.out.attachments.push(info),
        }
    }
}

/// The container whose children are being read.
struct ContainerRef<'c> {
    part_id: &'c str,
    index: usize,
    depth: usize,
    boundary: &'c str,
    child_default: &'static str,
}

impl ContainerRef<'_> {
    fn child_id(&self, n: usize) -> String {
        if self.part_id.is_empty() {
            n.to_string()
        } else {
            format!("{}.{n}", self.part_id)
        }
    }

    fn child<'a>(&self, part_id: String, part: RawPart<'a>, strategy: SplitStrategy) -> Frame<'a> {
        Frame {
            part_id,
            parent: Some(self.index),
            depth: self.depth + 1,
            headers: part.headers,
            body: part.body,
            raw_size: part.raw_size,
            strategy,
            default_type: self.child_default,
        }
    }

    fn read_primary<'a>(&self, mut reader: MultipartReader<'a>, options: &DecodeOptions) -> Split<'a> {
        let max_parts = limit(options.max_parts_per_container);
        let max_consecutive = limit(options.max_consecutive_errors);

        let mut split = Split::default();
        let mut slot = 0;
        let mut consecutive_errors = 0;

        for item in reader.by_ref() {
            if slot == max_parts {
                split.problems.push((self.part_id.to_string(), part_cap(self.part_id, max_parts)));
                break;
            }
            slot += 1;
            let child_id = self.child_id(slot);

            match item {
                Ok(part) => {
                    consecutive_errors = 0;
                    split.children.push(self.child(child_id, part, SplitStrategy::Primary));
                }
                Err(err) => {
                    consecutive_errors += 1;
                    split.unreadable += 1;
                    let reason = err.to_string();
                    split.problems.push((
                        child_id.clone(),
                        MimeError::PartUnreadable {
                            part_id: child_id,
                            reason,
                        },
                    ));
                    if consecutive_errors >= max_consecutive {
                        warn!(part_id = self.part_id, consecutive_errors, "Abandoning multipart container");
                        split.problems.push((
                            self.part_id.to_string(),
                            MimeError::Multipart(format!(
                                "{consecutive_errors} consecutive unreadable parts, rest of container skipped"
                            )),
                        ));
                        return split;
                    }
                }
            }
        }

        if reader.is_truncated() {
            split.truncated = true;
            split.problems.push((
                self.part_id.to_string(),
                MimeError::Multipart(format!(
                    "closing delimiter for boundary {:?} missing, final part truncated",
                    self.boundary
                )),
            ));
        }
        split
    }

    fn read_fallback<'a>(&self, body: &'a [u8], options: &DecodeOptions) -> Split<'a> {
        let max_parts = limit(options.max_parts_per_container);
        let mut split = Split::default();

        for (n, part) in split_fallback(body, self.boundary).enumerate() {
            if n == max_parts {
                split.problems.push((self.part_id.to_string(), part_cap(self.part_id, max_parts)));
                break;
            }
            let child_id = self.child_id(n + 1);
            split.children.push(self.child(child_id, part, SplitStrategy::Fallback));
        }

        debug!(part_id = self.part_id, parts = split.children.len(), "Fallback split finished");
        split
    }
}

/// Children and problems of one container split. Problems are held back
/// until the strategy for the container is settled.
#[derive(Default)]
struct Split<'a> {
    children: Vec<Frame<'a>>,
    problems: Vec<(String, MimeError)>,
    /// Part slots whose headers did not parse.
    unreadable: usize,
    truncated: bool,
}

impl Split<'_> {
    /// The body ended before the closing delimiter, or not a single slot
    /// was readable.
    fn is_degraded(&self) -> bool {
        self.truncated || (self.children.is_empty() && self.unreadable > 0)
    }
}

fn part_cap(part_id: &str, max_parts: usize) -> MimeError {
    warn!(part_id, max_parts, "Part cap reached, rest of container skipped");
    MimeError::LimitReached(format!("more than {max_parts} parts, rest of container skipped"))
}

/// `0` means unlimited.
fn limit(n: usize) -> usize {
    if n == 0 {
        usize::MAX
    } else {
        n
    }
}
