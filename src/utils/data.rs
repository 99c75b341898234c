//! Number and byte formatting helpers shared by the display layer.

/// Format an integer with thousands separators.
///
/// # Examples
/// ```
/// use sqv::utils::data::format_number;
/// assert_eq!(format_number(1234567), "1,234,567");
/// ```
pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Space-separated uppercase hex of `bytes`.
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Printable ASCII rendering of `bytes`, with `.` for anything else.
pub fn ascii_preview(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (32..127).contains(&b) { b as char } else { '.' })
        .collect()
}

/// Classic 16-bytes-per-line hex dump: `offset  hex  ascii`.
pub fn hex_dump(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "{:08X}  {:<48}  {}",
                i * 16,
                hex_bytes(chunk),
                ascii_preview(chunk)
            )
        })
        .collect()
}

/// Start of the page containing `offset`.
pub fn page_start(offset: u64, page_size: u32) -> u64 {
    let page_size = u64::from(page_size.max(1));
    (offset / page_size) * page_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(12345), "12,345");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_hex_and_ascii() {
        assert_eq!(hex_bytes(&[0x00, 0xAB, 0x10]), "00 AB 10");
        assert_eq!(ascii_preview(b"[a]\x00\xff"), "[a]..");
    }

    #[test]
    fn test_hex_dump_lines() {
        let data: Vec<u8> = (0u8..20).collect();
        let lines = hex_dump(&data);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000  00 01 02"));
        assert!(lines[1].starts_with("00000010  10 11 12 13"));
        assert!(lines[1].ends_with("...."));
    }

    #[test]
    fn test_page_start() {
        assert_eq!(page_start(0, 200), 0);
        assert_eq!(page_start(199, 200), 0);
        assert_eq!(page_start(200, 200), 200);
        assert_eq!(page_start(457, 50), 450);
        assert_eq!(page_start(5, 0), 5);
    }
}
