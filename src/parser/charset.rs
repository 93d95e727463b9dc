//! Charset name → decoder table.
//!
//! The table is fixed, built once on first use, and never mutated, so any
//! number of parser instances can read it concurrently without locking.

use std::collections::HashMap;
use std::sync::LazyLock;

use encoding_rs::Encoding;

static CHARSETS: LazyLock<HashMap<&'static str, &'static Encoding>> = LazyLock::new(|| {
    use encoding_rs::*;

    let entries: &[(&'static str, &'static Encoding)] = &[
        // Unicode
        ("utf-16", UTF_16LE),
        ("utf-16le", UTF_16LE),
        ("utf-16be", UTF_16BE),
        // ASCII / Latin
        ("us-ascii", WINDOWS_1252),
        ("ascii", WINDOWS_1252),
        ("iso-8859-1", WINDOWS_1252),
        ("iso8859-1", WINDOWS_1252),
        ("iso_8859-1", WINDOWS_1252),
        ("latin1", WINDOWS_1252),
        ("l1", WINDOWS_1252),
        ("cp819", WINDOWS_1252),
        ("iso-8859-2", ISO_8859_2),
        ("iso8859-2", ISO_8859_2),
        ("latin2", ISO_8859_2),
        ("iso-8859-3", ISO_8859_3),
        ("latin3", ISO_8859_3),
        ("iso-8859-4", ISO_8859_4),
        ("latin4", ISO_8859_4),
        ("iso-8859-9", WINDOWS_1254),
        ("latin5", WINDOWS_1254),
        ("iso-8859-10", ISO_8859_10),
        ("latin6", ISO_8859_10),
        ("iso-8859-13", ISO_8859_13),
        ("iso-8859-14", ISO_8859_14),
        ("iso-8859-15", ISO_8859_15),
        ("iso8859-15", ISO_8859_15),
        ("latin9", ISO_8859_15),
        ("latin-9", ISO_8859_15),
        ("iso-8859-16", ISO_8859_16),
        ("macintosh", MACINTOSH),
        ("mac", MACINTOSH),
        // Cyrillic
        ("iso-8859-5", ISO_8859_5),
        ("iso8859-5", ISO_8859_5),
        ("cyrillic", ISO_8859_5),
        ("koi8-r", KOI8_R),
        ("koi8r", KOI8_R),
        ("koi8", KOI8_R),
        ("koi8-u", KOI8_U),
        ("koi8-ru", KOI8_U),
        ("ibm866", IBM866),
        ("cp866", IBM866),
        ("x-mac-cyrillic", X_MAC_CYRILLIC),
        // Greek, Hebrew, Arabic, Thai
        ("iso-8859-7", ISO_8859_7),
        ("greek", ISO_8859_7),
        ("iso-8859-8", ISO_8859_8),
        ("hebrew", ISO_8859_8),
        ("visual", ISO_8859_8),
        ("iso-8859-8-i", ISO_8859_8_I),
        ("logical", ISO_8859_8_I),
        ("iso-8859-6", ISO_8859_6),
        ("arabic", ISO_8859_6),
        ("iso-8859-11", WINDOWS_874),
        ("tis-620", WINDOWS_874),
        // Windows code pages
        ("windows-874", WINDOWS_874),
        ("cp874", WINDOWS_874),
        ("windows-1250", WINDOWS_1250),
        ("cp1250", WINDOWS_1250),
        ("windows-1251", WINDOWS_1251),
        ("cp1251", WINDOWS_1251),
        ("windows-1252", WINDOWS_1252),
        ("cp1252", WINDOWS_1252),
        ("windows-1253", WINDOWS_1253),
        ("cp1253", WINDOWS_1253),
        ("windows-1254", WINDOWS_1254),
        ("cp1254", WINDOWS_1254),
        ("windows-1255", WINDOWS_1255),
        ("cp1255", WINDOWS_1255),
        ("windows-1256", WINDOWS_1256),
        ("cp1256", WINDOWS_1256),
        ("windows-1257", WINDOWS_1257),
        ("cp1257", WINDOWS_1257),
        ("windows-1258", WINDOWS_1258),
        ("cp1258", WINDOWS_1258),
        // Chinese
        ("gb2312", GBK),
        ("gb_2312-80", GBK),
        ("euc-cn", GBK),
        ("gbk", GBK),
        ("x-gbk", GBK),
        ("cp936", GBK),
        ("gb18030", GB18030),
        ("big5", BIG5),
        ("big5-hkscs", BIG5),
        ("cn-big5", BIG5),
        ("x-x-big5", BIG5),
        // Japanese
        ("shift_jis", SHIFT_JIS),
        ("shift-jis", SHIFT_JIS),
        ("sjis", SHIFT_JIS),
        ("x-sjis", SHIFT_JIS),
        ("ms_kanji", SHIFT_JIS),
        ("cp932", SHIFT_JIS),
        ("windows-31j", SHIFT_JIS),
        ("iso-2022-jp", ISO_2022_JP),
        ("csiso2022jp", ISO_2022_JP),
        ("euc-jp", EUC_JP),
        ("x-euc-jp", EUC_JP),
        // Korean
        ("euc-kr", EUC_KR),
        ("cp949", EUC_KR),
        ("windows-949", EUC_KR),
        ("ks_c_5601-1987", EUC_KR),
    ];

    entries.iter().copied().collect()
});

/// Canonical lookup key: trimmed, unquoted, lowercase.
pub fn normalize(name: &str) -> String {
    name.trim().trim_matches('"').trim().to_ascii_lowercase()
}

/// `true` for names that denote UTF-8 (or no charset at all).
pub fn is_utf8(name: &str) -> bool {
    matches!(normalize(name).as_str(), "" | "utf-8" | "utf8")
}

/// Find the decoder for a charset name.
pub fn lookup(name: &str) -> Option<&'static Encoding> {
    CHARSETS.get(normalize(name).as_str()).copied()
}

/// `true` if `name` is UTF-8 or present in the table.
pub fn is_supported(name: &str) -> bool {
    is_utf8(name) || lookup(name).is_some()
}

/// All table labels, sorted.
pub fn labels() -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = CHARSETS.keys().copied().collect();
    labels.sort_unstable();
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_and_whitespace() {
        assert_eq!(lookup(" ISO-8859-2 "), Some(encoding_rs::ISO_8859_2));
        assert_eq!(lookup("\"KOI8-R\""), Some(encoding_rs::KOI8_R));
        assert_eq!(lookup("Shift_JIS"), Some(encoding_rs::SHIFT_JIS));
        assert_eq!(lookup("GB2312"), Some(encoding_rs::GBK));
    }

    #[test]
    fn test_utf8_names() {
        assert!(is_utf8(""));
        assert!(is_utf8("UTF-8"));
        assert!(is_utf8(" utf8 "));
        assert!(!is_utf8("latin1"));
    }

    #[test]
    fn test_unknown_charset() {
        assert!(lookup("x-klingon").is_none());
        assert!(!is_supported("x-klingon"));
        assert!(is_supported("utf-8"));
    }

    #[test]
    fn test_table_covers_families() {
        for name in [
            "iso-8859-5",
            "windows-1256",
            "iso-8859-8",
            "gb18030",
            "big5",
            "iso-2022-jp",
            "euc-jp",
            "euc-kr",
            "koi8-u",
        ] {
            assert!(lookup(name).is_some(), "missing {name}");
        }
        let labels = labels();
        assert!(labels.windows(2).all(|w| w[0] <= w[1]));
    }
}
