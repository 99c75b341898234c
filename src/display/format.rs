//! Cell value formatting.
//!
//! Inline cells are single-line and bounded by `max_width` display columns.
//! The detail view renders a complete [`FullValue`] over as many lines as it
//! needs.

use crate::engine::{CellValue, FullValue};
use crate::utils::data::{format_number, hex_dump};
use crate::utils::text::{ELLIPSIS, escape_control_chars, truncate_text_unicode, truncate_with_marker};

/// Sentinel shown for SQL NULL, distinct from an empty string.
pub const NULL_SENTINEL: &str = "NULL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

/// A cell ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayString {
    pub text: String,
    pub kind: CellKind,
    /// Whether the display hides part of the value.
    pub truncated: bool,
}

impl DisplayString {
    pub fn is_null(&self) -> bool {
        self.kind == CellKind::Null
    }
}

/// Render one cell within `max_width` columns.
pub fn format(value: &CellValue, max_width: usize) -> DisplayString {
    match value {
        CellValue::Null => DisplayString {
            text: NULL_SENTINEL.to_string(),
            kind: CellKind::Null,
            truncated: false,
        },
        CellValue::Integer(i) => bounded(i.to_string(), CellKind::Integer, max_width),
        CellValue::Real(r) => bounded(format_real(*r), CellKind::Real, max_width),
        CellValue::Text(sample, _) => {
            let escaped = escape_control_chars(sample);
            if value.is_sampled() {
                DisplayString {
                    text: truncate_with_marker(&escaped, max_width),
                    kind: CellKind::Text,
                    truncated: true,
                }
            } else {
                bounded(escaped, CellKind::Text, max_width)
            }
        }
        CellValue::Blob(len, prefix) => {
            let mut text = format!("<{} bytes>", len);
            if !prefix.is_empty() {
                text.push(' ');
                text.push_str(&compact_hex(prefix));
                if prefix.len() < *len {
                    text.push_str(ELLIPSIS);
                }
            }
            bounded(text, CellKind::Blob, max_width)
        }
    }
}

fn bounded(text: String, kind: CellKind, max_width: usize) -> DisplayString {
    let shown = truncate_text_unicode(&text, max_width);
    let truncated = shown != text;
    DisplayString {
        text: shown,
        kind,
        truncated,
    }
}

/// Reals always show a fractional part or exponent so they read differently
/// from integers.
fn format_real(value: f64) -> String {
    format!("{:?}", value)
}

fn compact_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Multi-line rendering of a complete value for the detail view.
///
/// JSON objects and arrays stored as text are pretty-printed; blobs become a
/// hex dump under a `BLOB (n bytes)` header.
pub fn render_detail(value: &FullValue) -> Vec<String> {
    match value {
        FullValue::Null => vec![NULL_SENTINEL.to_string()],
        FullValue::Integer(i) => vec![i.to_string()],
        FullValue::Real(r) => vec![format_real(*r)],
        FullValue::Text(text) => match pretty_json(text) {
            Some(pretty) => pretty.lines().map(str::to_string).collect(),
            None => text.lines().map(str::to_string).collect(),
        },
        FullValue::RawText(bytes) => String::from_utf8_lossy(bytes)
            .lines()
            .map(str::to_string)
            .collect(),
        FullValue::Blob(bytes) => {
            let mut lines = vec![format!("BLOB ({} bytes)", format_number(bytes.len() as u64))];
            lines.extend(hex_dump(bytes));
            lines
        }
    }
}

fn pretty_json(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    let parsed: serde_json::Value = serde_json::from_str(text).ok()?;
    serde_json::to_string_pretty(&parsed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_distinct_from_empty_text() {
        let null = format(&CellValue::Null, 10);
        let empty = format(&CellValue::Text(String::new(), 0), 10);
        assert_eq!(null.text, "NULL");
        assert!(null.is_null());
        assert_eq!(empty.text, "");
        assert!(!empty.is_null());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(format(&CellValue::Integer(-42), 10).text, "-42");
        assert_eq!(format(&CellValue::Real(3.0), 10).text, "3.0");
        assert_eq!(format(&CellValue::Real(0.5), 10).text, "0.5");
        let wide = format(&CellValue::Integer(1234567890123), 6);
        assert_eq!(wide.text, "12345…");
        assert!(wide.truncated);
    }

    #[test]
    fn test_text_truncation_for_max_width() {
        let text = "The quick brown fox jumps over the lazy dog".to_string();
        let len = text.len();
        for max_width in [10usize, 20] {
            let shown = format(&CellValue::Text(text.clone(), len), max_width);
            assert!(shown.truncated);
            assert!(shown.text.ends_with('…'));
            assert_eq!(unicode_width::UnicodeWidthStr::width(shown.text.as_str()), max_width);
        }

        let fits = format(&CellValue::Text("short".to_string(), 5), 10);
        assert_eq!(fits.text, "short");
        assert!(!fits.truncated);
    }

    #[test]
    fn test_sampled_text_always_shows_marker() {
        // the cache only holds the first bytes of a longer value
        let shown = format(&CellValue::Text("abc".to_string(), 5000), 40);
        assert_eq!(shown.text, "abc…");
        assert!(shown.truncated);
    }

    #[test]
    fn test_control_characters_stay_on_one_line() {
        let shown = format(&CellValue::Text("a\nb".to_string(), 3), 40);
        assert_eq!(shown.text, "a\\nb");
    }

    #[test]
    fn test_blob_placeholder() {
        let shown = format(&CellValue::Blob(2048, vec![0x89, 0x50, 0x4E, 0x47]), 40);
        assert_eq!(shown.text, "<2048 bytes> 89504E47…");
        assert_eq!(shown.kind, CellKind::Blob);

        let whole = format(&CellValue::Blob(2, vec![0x00, 0xFF]), 40);
        assert_eq!(whole.text, "<2 bytes> 00FF");

        let empty = format(&CellValue::Blob(0, Vec::new()), 40);
        assert_eq!(empty.text, "<0 bytes>");
    }

    #[test]
    fn test_detail_pretty_prints_json() {
        let lines = render_detail(&FullValue::Text("{\"a\":1,\"b\":[true]}".to_string()));
        assert_eq!(lines[0], "{");
        assert!(lines.iter().any(|l| l.trim() == "\"a\": 1,"));

        let raw = render_detail(&FullValue::RawText(vec![0x41, 0xFF, 0x42]));
        assert_eq!(raw, vec!["A\u{FFFD}B".to_string()]);

        let plain = render_detail(&FullValue::Text("{not json".to_string()));
        assert_eq!(plain, vec!["{not json".to_string()]);
    }

    #[test]
    fn test_detail_blob_hex_dump() {
        let bytes: Vec<u8> = (0u8..=32).collect();
        let lines = render_detail(&FullValue::Blob(bytes));
        assert_eq!(lines[0], "BLOB (33 bytes)");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("00000020  20"));
    }
}
