//! Typed cell values as they travel through the window cache.
//!
//! Rows in a window only ever hold a bounded sample of text and blob
//! content; the complete value is read separately as a [`FullValue`].

use rusqlite::types::ValueRef;

/// A single cell of a fetched row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    /// Sampled text prefix and the byte length of the complete value.
    Text(String, usize),
    /// Byte length of the complete value and a sampled prefix.
    Blob(usize, Vec<u8>),
}

impl CellValue {
    /// Build a cell from an engine value, copying at most the configured
    /// number of bytes for text and blob content.
    pub fn sample(value: ValueRef<'_>, text_sample_bytes: usize, blob_sample_bytes: usize) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(r) => CellValue::Real(r),
            ValueRef::Text(bytes) => {
                CellValue::Text(utf8_prefix(bytes, text_sample_bytes), bytes.len())
            }
            ValueRef::Blob(bytes) => {
                let end = bytes.len().min(blob_sample_bytes);
                CellValue::Blob(bytes.len(), bytes[..end].to_vec())
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Whether the cached sample is shorter than the stored value.
    pub fn is_sampled(&self) -> bool {
        match self {
            CellValue::Text(text, len) => text.len() < *len,
            CellValue::Blob(len, prefix) => prefix.len() < *len,
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Integer(_) => "integer",
            CellValue::Real(_) => "real",
            CellValue::Text(..) => "text",
            CellValue::Blob(..) => "blob",
        }
    }
}

/// A fetched row. `rowid` is present when the browsed object has one.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub rowid: Option<i64>,
    pub cells: Vec<CellValue>,
}

/// Complete cell content, fetched on demand for the detail view.
#[derive(Debug, Clone, PartialEq)]
pub enum FullValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    /// Text whose stored bytes are not valid UTF-8, kept verbatim.
    RawText(Vec<u8>),
    Blob(Vec<u8>),
}

impl FullValue {
    pub fn from_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => FullValue::Null,
            ValueRef::Integer(i) => FullValue::Integer(i),
            ValueRef::Real(r) => FullValue::Real(r),
            ValueRef::Text(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => FullValue::Text(text),
                Err(err) => FullValue::RawText(err.into_bytes()),
            },
            ValueRef::Blob(bytes) => FullValue::Blob(bytes.to_vec()),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.as_bytes().map_or(0, <[u8]>::len)
    }

    /// Stored bytes of text and blob values, exactly as the engine returned them.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FullValue::Text(text) => Some(text.as_bytes()),
            FullValue::RawText(bytes) | FullValue::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Outcome of one ad-hoc SQL statement. Exactly one shape per statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<CellValue>>,
        row_count: u64,
        truncated: bool,
    },
    Status {
        rows_affected: u64,
    },
    Error {
        message: String,
    },
}

impl QueryResult {
    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error { .. })
    }

    pub fn summary(&self) -> String {
        match self {
            QueryResult::Rows {
                row_count,
                truncated: false,
                ..
            } => format!("{} rows returned", row_count),
            QueryResult::Rows { row_count, .. } => {
                format!("first {} rows returned (truncated)", row_count)
            }
            QueryResult::Status { rows_affected } => {
                format!("{} rows affected", rows_affected)
            }
            QueryResult::Error { message } => format!("Error: {}", message),
        }
    }
}

/// Longest valid UTF-8 prefix of `bytes` no longer than `max_bytes`.
fn utf8_prefix(bytes: &[u8], max_bytes: usize) -> String {
    let end = bytes.len().min(max_bytes);
    let slice = &bytes[..end];
    match std::str::from_utf8(slice) {
        Ok(text) => text.to_string(),
        Err(err) if err.error_len().is_none() => {
            // cut in the middle of a multi-byte sequence
            String::from_utf8_lossy(&slice[..err.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(slice).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_scalars() {
        assert_eq!(CellValue::sample(ValueRef::Null, 8, 8), CellValue::Null);
        assert_eq!(
            CellValue::sample(ValueRef::Integer(42), 8, 8),
            CellValue::Integer(42)
        );
        assert_eq!(
            CellValue::sample(ValueRef::Real(1.5), 8, 8),
            CellValue::Real(1.5)
        );
    }

    #[test]
    fn test_sample_text_keeps_full_length() {
        let cell = CellValue::sample(ValueRef::Text(b"hello world"), 5, 8);
        assert_eq!(cell, CellValue::Text("hello".to_string(), 11));
        assert!(cell.is_sampled());

        let cell = CellValue::sample(ValueRef::Text(b"hi"), 5, 8);
        assert!(!cell.is_sampled());
    }

    #[test]
    fn test_sample_text_respects_char_boundary() {
        // "héllo": 'é' is two bytes starting at index 1
        let cell = CellValue::sample(ValueRef::Text("héllo".as_bytes()), 2, 8);
        assert_eq!(cell, CellValue::Text("h".to_string(), 6));
    }

    #[test]
    fn test_sample_blob() {
        let data = [0u8, 1, 2, 3, 4, 5];
        let cell = CellValue::sample(ValueRef::Blob(&data), 8, 4);
        assert_eq!(cell, CellValue::Blob(6, vec![0, 1, 2, 3]));
        assert_eq!(cell.type_name(), "blob");
    }

    #[test]
    fn test_full_value_byte_len() {
        assert_eq!(FullValue::Text("abc".to_string()).byte_len(), 3);
        assert_eq!(FullValue::Blob(vec![1, 2]).byte_len(), 2);
        assert_eq!(FullValue::Null.byte_len(), 0);
    }

    #[test]
    fn test_full_value_keeps_invalid_utf8_text() {
        let value = FullValue::from_ref(ValueRef::Text(&[0x41, 0xFF, 0x42]));
        assert_eq!(value, FullValue::RawText(vec![0x41, 0xFF, 0x42]));
        assert_eq!(value.byte_len(), 3);
        assert_eq!(value.as_bytes(), Some(&[0x41u8, 0xFF, 0x42][..]));

        let value = FullValue::from_ref(ValueRef::Text("héllo".as_bytes()));
        assert_eq!(value, FullValue::Text("héllo".to_string()));
        assert_eq!(value.byte_len(), 6);
    }
}
