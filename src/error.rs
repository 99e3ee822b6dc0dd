/// Error Module
///
/// Error kinds surfaced by the ETL run. Every variant is fatal to the run
/// unless the driver is told to skip files that fail to parse.
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("failed to connect to database '{database}': {source}")]
    Connection {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("schema statement failed ({statement}): {message}")]
    Schema { statement: String, message: String },

    #[error("failed to parse {location}: {message}")]
    Parse { location: String, message: String },

    #[error("constraint violation on table '{table}': {message}")]
    ConstraintViolation { table: &'static str, message: String },

    #[error("database error ({context}): {source}")]
    Database {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid pipeline state: {0}")]
    InvalidState(String),
}

impl EtlError {
    /// Parse failure for a whole file
    pub fn parse_file(path: &Path, message: impl Into<String>) -> Self {
        Self::Parse { location: path.display().to_string(), message: message.into() }
    }

    /// Parse failure pinned to a 1-based line of a file
    pub fn parse_line(path: &Path, line: usize, message: impl Into<String>) -> Self {
        Self::Parse { location: format!("{}:{}", path.display(), line), message: message.into() }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), source }
    }

    /// Classify a failed insert or lookup against `table`.
    ///
    /// Integrity violations and Postgres data exceptions (SQLSTATE class 22)
    /// are reported as constraint violations, anything else as a plain
    /// database error.
    pub fn from_store(table: &'static str, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let data_exception = db_err.code().map(|code| code.starts_with("22")).unwrap_or(false);
            let integrity = !matches!(db_err.kind(), sqlx::error::ErrorKind::Other);

            if integrity || data_exception {
                return Self::ConstraintViolation { table, message: db_err.message().to_string() };
            }
        }

        Self::Database { context: table, source: err }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
