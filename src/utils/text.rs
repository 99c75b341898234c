use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub const ELLIPSIS: &str = "…";

/// Truncate text to a display width, appending an ellipsis when cut.
///
/// # Examples
/// ```
/// use sqv::utils::text::truncate_text_unicode;
/// assert_eq!(truncate_text_unicode("Hello World!", 8), "Hello W…");
/// ```
pub fn truncate_text_unicode(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    truncate_with_marker(text, max_width)
}

/// Cut text so that it plus the ellipsis fits `max_width`, even if the text
/// alone would have fit. Used when the text is already a partial sample.
pub fn truncate_with_marker(text: &str, max_width: usize) -> String {
    let ellipsis_width = ELLIPSIS.width();
    if max_width < ellipsis_width {
        return String::new();
    }

    let target_width = max_width - ellipsis_width;
    let mut result = String::new();
    let mut current_width = 0;

    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if current_width + ch_width > target_width {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }

    result.push_str(ELLIPSIS);
    result
}

/// Replace control characters so a value renders on a single terminal line.
pub fn escape_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out
}
