//! Input validation and sanitization utilities
//!
//! Checks the database path before a connection is opened and makes sure a
//! user filter is a single predicate that cannot change the shape of the
//! statement it is spliced into.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{CliError, QueryError, StorageError};

const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// Validate that the database path exists, is a readable file, and (when
/// non-empty) starts with the SQLite header.
pub fn validate_database_path(path: &Path) -> crate::Result<()> {
    if !path.exists() {
        return Err(CliError::DatabaseNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    if !path.is_file() {
        return Err(CliError::InvalidArguments(format!(
            "'{}' is not a regular file",
            path.display()
        ))
        .into());
    }

    let mut file = File::open(path).map_err(|source| StorageError::FileIo {
        path: path.display().to_string(),
        source,
    })?;

    // SQLite treats a zero-length file as an empty database
    let mut header = [0u8; 16];
    let mut read = 0;
    while read < header.len() {
        let n = file
            .read(&mut header[read..])
            .map_err(|source| StorageError::FileIo {
                path: path.display().to_string(),
                source,
            })?;
        if n == 0 {
            break;
        }
        read += n;
    }
    if read > 0 && (read < header.len() || &header != SQLITE_HEADER) {
        return Err(CliError::NotADatabaseFile {
            path: path.display().to_string(),
        }
        .into());
    }

    Ok(())
}

/// Validate a WHERE fragment.
///
/// Rejects unterminated quotes or brackets, unbalanced parentheses,
/// statement separators, comments and bound-parameter markers outside of
/// quoted text. Returns the trimmed predicate, or `None` for an empty filter.
pub fn validate_filter(filter: &str) -> Result<Option<String>, QueryError> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let reject = |message: &str| QueryError::FilterSyntax {
        filter: trimmed.to_string(),
        message: message.to_string(),
    };

    let mut depth: usize = 0;
    let mut prev: Option<char> = None;
    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                let closing = c;
                loop {
                    match chars.next() {
                        // doubled quote is an escaped quote
                        Some(ch) if ch == closing && chars.peek() == Some(&closing) => {
                            chars.next();
                        }
                        Some(ch) if ch == closing => break,
                        Some(_) => {}
                        None => return Err(reject("unterminated quote")),
                    }
                }
            }
            '[' => loop {
                match chars.next() {
                    Some(']') => break,
                    Some(_) => {}
                    None => return Err(reject("unterminated bracket identifier")),
                }
            },
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return Err(reject("unbalanced parenthesis"));
                }
                depth -= 1;
            }
            ';' => return Err(reject("statement separators are not allowed")),
            '-' if chars.peek() == Some(&'-') => {
                return Err(reject("comments are not allowed"));
            }
            '/' if chars.peek() == Some(&'*') => {
                return Err(reject("comments are not allowed"));
            }
            // the statement binds its own parameters after the predicate
            '?' | ':' | '@' => return Err(reject("bound parameters are not allowed")),
            '$' if !prev.is_some_and(is_identifier_char) => {
                return Err(reject("bound parameters are not allowed"));
            }
            _ => {}
        }
        prev = Some(c);
    }

    if depth != 0 {
        return Err(reject("unbalanced parenthesis"));
    }

    Ok(Some(trimmed.to_string()))
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_database_path_rejects_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = validate_database_path(&dir.path().join("nope.db")).unwrap_err();
        assert!(matches!(
            err,
            crate::AppError::Cli(CliError::DatabaseNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_database_path_rejects_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(validate_database_path(dir.path()).is_err());
    }

    #[test]
    fn test_validate_database_path_rejects_non_sqlite_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"this is definitely not a database file")
            .expect("write");
        let err = validate_database_path(file.path()).unwrap_err();
        assert!(matches!(
            err,
            crate::AppError::Cli(CliError::NotADatabaseFile { .. })
        ));
    }

    #[test]
    fn test_validate_database_path_accepts_empty_and_sqlite_files() {
        let empty = tempfile::NamedTempFile::new().expect("tempfile");
        assert!(validate_database_path(empty.path()).is_ok());

        let fixture = crate::test_support::sample_db();
        assert!(validate_database_path(fixture.path()).is_ok());
    }

    #[test]
    fn test_validate_filter_accepts_predicates() {
        assert_eq!(validate_filter("").unwrap(), None);
        assert_eq!(validate_filter("   ").unwrap(), None);
        assert_eq!(
            validate_filter(" age > 30 ").unwrap(),
            Some("age > 30".to_string())
        );
        assert!(validate_filter("name = 'O''Brien'").is_ok());
        assert!(validate_filter("(a = 1 OR b = 2) AND [weird col] = 'x;y'").is_ok());
        assert!(validate_filter("note = '-- not a comment'").is_ok());
        assert!(validate_filter("x - -1 > 0").is_ok());
    }

    #[test]
    fn test_validate_filter_rejects_unterminated_quote() {
        let err = validate_filter("name = 'Alice").unwrap_err();
        match err {
            QueryError::FilterSyntax { message, .. } => {
                assert_eq!(message, "unterminated quote")
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(validate_filter("\"name = 1").is_err());
        assert!(validate_filter("[name = 1").is_err());
    }

    #[test]
    fn test_validate_filter_rejects_parameters() {
        for filter in ["id = ?", "id = ?2", "id = :id", "id = @id", "id = $id", "id=$1"] {
            match validate_filter(filter) {
                Err(QueryError::FilterSyntax { message, .. }) => {
                    assert_eq!(message, "bound parameters are not allowed", "{}", filter)
                }
                other => panic!("{} was not rejected: {:?}", filter, other),
            }
        }
        // markers inside quoted text and `$` inside identifiers are fine
        assert!(validate_filter("note = 'why?' AND tag = ':x @y $z'").is_ok());
        assert!(validate_filter("price$usd > 10").is_ok());
    }

    #[test]
    fn test_validate_filter_rejects_shape_changes() {
        assert!(validate_filter("1=1; DROP TABLE users").is_err());
        assert!(validate_filter("1=1 --").is_err());
        assert!(validate_filter("1=1 /* c */").is_err());
        assert!(validate_filter("1=1) OR (1=1").is_err());
        assert!(validate_filter("((1=1)").is_err());
    }
}
