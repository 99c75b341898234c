use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("CliError: {0}")]
    Cli(#[from] CliError),
    #[error("SchemaError: {0}")]
    Schema(#[from] SchemaError),
    #[error("QueryError: {0}")]
    Query(#[from] QueryError),
    #[error("ConfigError: {0}")]
    Config(#[from] ConfigError),
    #[error("StorageError: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Database file not found: {path}")]
    DatabaseNotFound { path: String },
    #[error("Not a database file: {path}")]
    NotADatabaseFile { path: String },
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("File is not a database or is encrypted: {path}")]
    NotADatabase { path: String, message: String },
    #[error("Database disk image is malformed: {path}")]
    Corrupt { path: String, message: String },
    #[error("Failed to load schema: {message}")]
    LoadFailed { message: String },
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unknown table '{table}'")]
    InvalidTable { table: String },
    #[error("Unknown column '{column}' in table '{table}'")]
    InvalidColumn { table: String, column: String },
    #[error("Invalid filter '{filter}': {message}")]
    FilterSyntax { filter: String, message: String },
    #[error("Query failed: {message}")]
    Execution { message: String },
    #[error("Query timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("Query was cancelled")]
    Cancelled,
    #[error("Database connection is closed")]
    ConnectionClosed,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for '{field}': {value}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File I/O error at {path}: {source}")]
    FileIo {
        path: String,
        source: std::io::Error,
    },
    #[error("Configuration parse error: {message}")]
    ConfigParseError { message: String },
    #[error("Configuration directory not found")]
    ConfigDirNotFound,
}

/// Error category handed to the display sink alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Schema,
    InvalidTable,
    InvalidColumn,
    FilterSyntax,
    QueryExecution,
    QueryTimeout,
    Cancelled,
    ConnectionClosed,
    Config,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl ErrorSeverity {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorSeverity::Critical => "fatal",
            ErrorSeverity::High => "error",
            ErrorSeverity::Medium => "warning",
            ErrorSeverity::Low => "info",
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Cli(_) | AppError::Storage(StorageError::FileIo { .. }) => ErrorKind::Input,
            AppError::Schema(_) => ErrorKind::Schema,
            AppError::Query(query_error) => match query_error {
                QueryError::InvalidTable { .. } => ErrorKind::InvalidTable,
                QueryError::InvalidColumn { .. } => ErrorKind::InvalidColumn,
                QueryError::FilterSyntax { .. } => ErrorKind::FilterSyntax,
                QueryError::Execution { .. } => ErrorKind::QueryExecution,
                QueryError::Timeout { .. } => ErrorKind::QueryTimeout,
                QueryError::Cancelled => ErrorKind::Cancelled,
                QueryError::ConnectionClosed => ErrorKind::ConnectionClosed,
            },
            AppError::Config(_) | AppError::Storage(_) => ErrorKind::Config,
        }
    }

    /// Fatal errors end the session; everything else degrades to an inline banner.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Input | ErrorKind::Schema | ErrorKind::ConnectionClosed
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        if self.is_fatal() {
            return ErrorSeverity::Critical;
        }
        match self {
            AppError::Query(QueryError::Cancelled) => ErrorSeverity::Low,
            AppError::Query(QueryError::Timeout { .. }) => ErrorSeverity::Medium,
            AppError::Query(_) => ErrorSeverity::Medium,
            AppError::Config(_) | AppError::Storage(_) => ErrorSeverity::High,
            _ => ErrorSeverity::Medium,
        }
    }

    pub fn display_friendly(&self) -> String {
        match self {
            AppError::Cli(CliError::DatabaseNotFound { path }) => {
                format!("Database file not found: {}", path)
            }
            AppError::Schema(SchemaError::NotADatabase { path, .. }) => {
                format!("Failed to open database: {} is not a database", path)
            }
            AppError::Query(query_error) => query_error.to_string(),
            _ => format!("{}", self),
        }
    }

    pub fn troubleshooting_hint(&self) -> Option<String> {
        match self {
            AppError::Cli(CliError::DatabaseNotFound { .. }) => {
                Some("Check the path and pass an existing SQLite database file".to_string())
            }
            AppError::Schema(SchemaError::NotADatabase { .. }) => {
                Some("Encrypted databases are not supported; open a plain SQLite file".to_string())
            }
            AppError::Query(QueryError::FilterSyntax { .. }) => {
                Some("Filters are WHERE fragments, e.g. age > 30 AND name LIKE 'A%'".to_string())
            }
            AppError::Query(QueryError::Timeout { .. }) => {
                Some("Raise sql_timeout_ms in config.toml or narrow the query".to_string())
            }
            _ => None,
        }
    }
}
