//! Attachment classification: disposition, filename, content id, type and
//! size policy.

use std::io::Read;

use crate::error::{MimeError, Result};
use crate::model::attachment::{AttachmentInfo, Disposition};
use crate::model::options::DecodeOptions;
use crate::parser::encoding;
use crate::parser::header::{strip_angle_brackets, ContentDisposition, ContentType, Headers};

/// Placeholder used by [`sanitize_filename`] for empty names.
pub const PLACEHOLDER_FILENAME: &str = "unnamed";

/// Classify one MIME leaf and decode its content.
///
/// Returns `Ok(None)` when the part is inline and inline processing is
/// disabled. The returned filename is unquoted but otherwise raw: RFC 2047
/// encoded words are left for the caller to decode.
///
/// A [`MimeError::SizeExceeded`] error carries the attachment metadata with
/// its true decoded size so callers can still report it.
pub fn classify<R: Read>(
    headers: &Headers,
    mut reader: R,
    part_id: &str,
    options: &DecodeOptions,
) -> Result<Option<AttachmentInfo>> {
    let content_type = match headers.get("content-type") {
        Some(value) => ContentType::parse(value)?,
        None => ContentType::new("application/octet-stream"),
    };

    let raw_disposition = headers.get("content-disposition");
    let parsed_disposition = raw_disposition.map(ContentDisposition::parse);

    let content_id = headers
        .get("content-id")
        .map(strip_angle_brackets)
        .filter(|id| !id.is_empty());

    let disposition = resolve_disposition(parsed_disposition.as_ref(), content_id.is_some());
    if disposition == Disposition::Inline && !options.process_inline {
        return Ok(None);
    }

    let filename = resolve_filename(parsed_disposition.as_ref(), &content_type, raw_disposition);
    check_type_policy(&content_type.mime_type, &filename, options)?;

    let mut raw = Vec::new();
    reader
        .read_to_end(&mut raw)
        .map_err(|e| MimeError::PartUnreadable {
            part_id: part_id.to_string(),
            reason: e.to_string(),
        })?;

    let transfer_encoding = headers
        .get("content-transfer-encoding")
        .unwrap_or_default()
        .trim()
        .to_string();
    let decoded = encoding::decode_with_fallback(&raw, &transfer_encoding, "");
    let size = decoded.len() as u64;

    let mut info = AttachmentInfo {
        part_id: part_id.to_string(),
        filename,
        content_type: content_type.mime_type,
        content_id,
        disposition,
        transfer_encoding,
        size,
        content: None,
    };

    let limit = options.max_attachment_size;
    if limit > 0 && size > limit {
        return Err(MimeError::SizeExceeded {
            size,
            limit,
            info: Box::new(info),
        });
    }

    if options.include_content {
        info.content = Some(decoded);
    }
    Ok(Some(info))
}

/// Explicit disposition type → `Content-Id` implies inline → attachment.
pub fn resolve_disposition(
    disposition: Option<&ContentDisposition>,
    has_content_id: bool,
) -> Disposition {
    match disposition.map(|d| d.kind.as_str()) {
        Some("inline") => Disposition::Inline,
        Some(kind) if !kind.is_empty() => Disposition::Attachment,
        _ if has_content_id => Disposition::Inline,
        _ => Disposition::Attachment,
    }
}

/// `filename=` → `name=` → manual scan of the raw disposition → empty.
pub fn resolve_filename(
    disposition: Option<&ContentDisposition>,
    content_type: &ContentType,
    raw_disposition: Option<&str>,
) -> String {
    let candidates = [
        disposition.and_then(|d| d.params.get("filename")),
        content_type.params.get("name"),
    ];

    candidates
        .into_iter()
        .flatten()
        .map(strip_quotes)
        .find(|name| !name.is_empty())
        .or_else(|| raw_disposition.and_then(scan_filename))
        .unwrap_or_default()
}

/// Permissive scan for `filename` in a raw `Content-Disposition` value.
///
/// Handles `filename="a b.pdf"`, `filename=a.pdf;`, `filename = a.pdf` and
/// the missing-semicolon form `attachment filename="x.pdf"`.
pub fn scan_filename(raw: &str) -> Option<String> {
    let lower = raw.to_ascii_lowercase();
    let start = lower.find("filename")? + "filename".len();
    let rest = raw[start..].trim_start_matches('*').trim_start();
    let rest = rest.strip_prefix('=')?.trim_start();

    let value = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or_default(),
        None => rest.split(';').next().unwrap_or_default(),
    };

    let value = strip_quotes(value);
    (!value.is_empty()).then_some(value)
}

fn strip_quotes(s: &str) -> String {
    s.trim().trim_matches('"').trim().to_string()
}

/// Apply the allow/deny lists to a media type and filename extension.
///
/// The deny list always wins; an empty allow list allows everything not
/// denied.
pub fn check_type_policy(mime_type: &str, filename: &str, options: &DecodeOptions) -> Result<()> {
    let decoded_name = encoding::decode_encoded_words(filename);
    let extension = decoded_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty());

    let matches = |entry: &String| policy_entry_matches(entry, mime_type, extension.as_deref());

    let denied = options.denied_types.iter().any(matches);
    let allowed = options.allowed_types.is_empty() || options.allowed_types.iter().any(matches);

    if denied || !allowed {
        return Err(MimeError::TypeForbidden {
            content_type: mime_type.to_string(),
            filename: decoded_name,
        });
    }
    Ok(())
}

fn policy_entry_matches(entry: &str, mime_type: &str, extension: Option<&str>) -> bool {
    let entry = entry.trim().to_ascii_lowercase();
    if entry.is_empty() {
        return false;
    }
    if entry.contains('/') {
        return match entry.strip_suffix("/*") {
            Some(main) => mime_type.split('/').next() == Some(main),
            None => entry.eq_ignore_ascii_case(mime_type),
        };
    }
    extension == Some(entry.trim_start_matches('.'))
}

/// Make a filename safe for on-disk storage.
///
/// `..` and each of `/ \ : * ? " < > |` become `_`; a leading `.` gets a
/// `file` prefix; an empty name becomes [`PLACEHOLDER_FILENAME`].
/// Sanitizing an already sanitized name returns it unchanged.
pub fn sanitize_filename(name: &str) -> String {
    if name.is_empty() {
        return PLACEHOLDER_FILENAME.to_string();
    }

    let sanitized: String = name
        .replace("..", "_")
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();

    if sanitized.starts_with('.') {
        format!("file{sanitized}")
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_content_id_implies_inline() {
        let h = headers(&[("Content-Type", "image/png"), ("Content-Id", "<img1>")]);
        let info = classify(&h, &b"png"[..], "1.2", &DecodeOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(info.disposition, Disposition::Inline);
        assert_eq!(info.content_id.as_deref(), Some("img1"));
    }

    #[test]
    fn test_default_is_attachment() {
        let h = headers(&[("Content-Type", "application/pdf")]);
        let info = classify(&h, &b"%PDF"[..], "2", &DecodeOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(info.disposition, Disposition::Attachment);
        assert_eq!(info.content_id, None);
        assert_eq!(info.content_type, "application/pdf");
    }

    #[test]
    fn test_explicit_disposition_beats_content_id() {
        let h = headers(&[
            ("Content-Type", "image/png"),
            ("Content-Id", "<img1>"),
            ("Content-Disposition", "attachment; filename=logo.png"),
        ]);
        let info = classify(&h, &b""[..], "1", &DecodeOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(info.disposition, Disposition::Attachment);
        assert_eq!(info.filename, "logo.png");
    }

    #[test]
    fn test_inline_skipped_when_disabled() {
        let h = headers(&[("Content-Type", "image/gif"), ("Content-Disposition", "inline")]);
        let opts = DecodeOptions {
            process_inline: false,
            ..DecodeOptions::default()
        };
        assert!(classify(&h, &b"GIF89a"[..], "1", &opts).unwrap().is_none());
    }

    #[test]
    fn test_filename_resolution_order() {
        let ct = ContentType::parse("application/pdf; name=\"from-type.pdf\"").unwrap();
        let cd = ContentDisposition::parse("attachment; filename=\"from-disp.pdf\"");
        assert_eq!(resolve_filename(Some(&cd), &ct, None), "from-disp.pdf");

        let cd = ContentDisposition::parse("attachment");
        assert_eq!(resolve_filename(Some(&cd), &ct, None), "from-type.pdf");

        let bare = ContentType::new("application/pdf");
        let raw = "attachment filename=\"scanned.pdf\"";
        let cd = ContentDisposition::parse(raw);
        assert_eq!(resolve_filename(Some(&cd), &bare, Some(raw)), "scanned.pdf");

        assert_eq!(resolve_filename(None, &bare, None), "");
    }

    #[test]
    fn test_scan_filename_forms() {
        assert_eq!(scan_filename("attachment; filename=a.pdf;").as_deref(), Some("a.pdf"));
        assert_eq!(
            scan_filename("attachment; FILENAME = \"a b.pdf\"").as_deref(),
            Some("a b.pdf")
        );
        assert_eq!(scan_filename("attachment; filename=").as_deref(), None);
        assert_eq!(scan_filename("inline").as_deref(), None);
    }

    #[test]
    fn test_encoded_word_filename_left_undecoded() {
        let h = headers(&[
            ("Content-Type", "application/pdf"),
            (
                "Content-Disposition",
                "attachment; filename=\"=?UTF-8?Q?r=C3=A9sum=C3=A9.pdf?=\"",
            ),
        ]);
        let info = classify(&h, &b""[..], "1", &DecodeOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(info.filename, "=?UTF-8?Q?r=C3=A9sum=C3=A9.pdf?=");
        assert!(encoding::is_encoded_word(&info.filename));
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let opts = DecodeOptions {
            allowed_types: vec!["application/*".into()],
            denied_types: vec![".EXE".into()],
            ..DecodeOptions::default()
        };
        let err = check_type_policy("application/octet-stream", "setup.exe", &opts).unwrap_err();
        assert!(matches!(err, MimeError::TypeForbidden { .. }));
        assert!(check_type_policy("application/pdf", "doc.pdf", &opts).is_ok());
    }

    #[test]
    fn test_allow_list_rejects_others() {
        let opts = DecodeOptions {
            allowed_types: vec!["image/png".into(), "pdf".into()],
            ..DecodeOptions::default()
        };
        assert!(check_type_policy("image/png", "", &opts).is_ok());
        assert!(check_type_policy("application/octet-stream", "x.PDF", &opts).is_ok());
        assert!(check_type_policy("image/jpeg", "photo.jpg", &opts).is_err());
    }

    #[test]
    fn test_policy_uses_decoded_extension() {
        let opts = DecodeOptions {
            denied_types: vec!["exe".into()],
            ..DecodeOptions::default()
        };
        // "setup.exe"
        let name = "=?UTF-8?B?c2V0dXAuZXhl?=";
        assert!(check_type_policy("application/octet-stream", name, &opts).is_err());
    }

    #[test]
    fn test_size_exceeded_keeps_true_size() {
        let h = headers(&[
            ("Content-Type", "application/octet-stream"),
            ("Content-Transfer-Encoding", "base64"),
        ]);
        let opts = DecodeOptions {
            max_attachment_size: 4,
            ..DecodeOptions::default()
        };
        // "Hello world" = 11 bytes decoded, 16 encoded
        let err = classify(&h, &b"SGVsbG8gd29ybGQ="[..], "3", &opts).unwrap_err();
        match err {
            MimeError::SizeExceeded { size, limit, info } => {
                assert_eq!(size, 11);
                assert_eq!(limit, 4);
                assert_eq!(info.size, 11);
                assert!(info.content.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_content_omitted_but_size_reported() {
        let h = headers(&[("Content-Type", "text/csv"), ("Content-Transfer-Encoding", "base64")]);
        let info = classify(&h, &b"YSxiLGMK"[..], "1", &DecodeOptions::metadata_only())
            .unwrap()
            .unwrap();
        assert_eq!(info.size, 6);
        assert!(info.content.is_none());
        assert_eq!(info.transfer_encoding, "base64");
    }

    #[test]
    fn test_bad_content_type_is_error() {
        let h = headers(&[("Content-Type", "nonsense")]);
        let err = classify(&h, &b"x"[..], "1", &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, MimeError::ContentType { .. }));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b\\c:d*e"), "a_b_c_d_e");
        assert_eq!(sanitize_filename("../../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_filename(".bashrc"), "file.bashrc");
        assert_eq!(sanitize_filename("what?<is>|this\".txt"), "what__is__this_.txt");
        assert_eq!(sanitize_filename(""), PLACEHOLDER_FILENAME);
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
    }

    #[test]
    fn test_sanitize_filename_idempotent() {
        let samples = [
            "",
            ".",
            "..",
            "...",
            "....hidden",
            "a...b",
            "../x/./y/..",
            ".\\..\\win:file*?.txt",
            "résumé final.pdf",
            "<>|\"",
            "file.",
            "unnamed",
        ];
        for s in samples {
            let once = sanitize_filename(s);
            assert_eq!(sanitize_filename(&once), once, "not idempotent for {s:?}");
        }
    }
}
