//! Unified error types for the formulary service.
//!
//! Every fallible operation in the crate returns [`Result`]. Database and
//! filesystem failures are classified on conversion so the API layer can map
//! each variant to exactly one HTTP status through [`Error::status_code`].

use sea_orm::DbErr;
use std::{io, path::Path};
use thiserror::Error;

/// Errors produced by the stores, the search engine and configuration loading.
#[derive(Debug, Error)]
pub enum Error {
    /// The database could not be reached or the pool is closed
    #[error("Database connection error: {0}")]
    Connection(DbErr),

    /// Data read from or written to the database has the wrong shape
    #[error("Invalid data format: {0}")]
    DataFormat(String),

    /// A uniqueness or foreign-key constraint rejected the write
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(DbErr),

    /// The requested record does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier (or identifiers) that were not found
        id: String,
    },

    /// The operation conflicts with existing data
    #[error("{message}")]
    Conflict {
        /// Human-readable reason
        message: String,
    },

    /// The request failed validation
    #[error("{message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// A stored file is missing
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path that was accessed
        path: String,
    },

    /// A stored file could not be accessed
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path that was accessed
        path: String,
    },

    /// Unclassified I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A JSON sub-field could not be parsed
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable reason
        message: String,
    },
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        if let Some(sql_err) = err.sql_err() {
            return Self::Constraint(sql_err.to_string());
        }

        match err {
            err @ (DbErr::Conn(_) | DbErr::ConnectionAcquire(_)) => Self::Connection(err),
            DbErr::Type(message) | DbErr::Json(message) => Self::DataFormat(message),
            DbErr::RecordNotFound(id) => Self::NotFound {
                entity: "Record",
                id,
            },
            other => Self::Database(other),
        }
    }
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Classifies an I/O error raised while touching `path`.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        let path = path.display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io(err),
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Connection(_) => 503,
            Self::DataFormat(_) | Self::Validation { .. } | Self::Json(_) => 400,
            Self::Constraint(_) | Self::Conflict { .. } => 409,
            Self::NotFound { .. } | Self::FileNotFound { .. } => 404,
            Self::PermissionDenied { .. } => 403,
            Self::Database(_) | Self::Io(_) | Self::Config { .. } => 500,
        }
    }

    /// Short machine label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "database_connection",
            Self::DataFormat(_) => "data_format",
            Self::Constraint(_) => "constraint_violation",
            Self::Database(_) => "database",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Validation { .. } => "validation",
            Self::FileNotFound { .. } => "file_not_found",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Config { .. } => "config",
        }
    }

    /// Message safe to return to clients.
    ///
    /// Database and filesystem details stay in the logs; domain errors carry
    /// their own message.
    #[must_use]
    pub fn public_detail(&self) -> String {
        match self {
            Self::Connection(_) => "Database service temporarily unavailable".to_string(),
            Self::DataFormat(_) => "Invalid data format".to_string(),
            Self::Constraint(_) => {
                "Data constraint violation: the record conflicts with existing data".to_string()
            }
            Self::Database(_) | Self::Config { .. } => "An unexpected error occurred".to_string(),
            Self::FileNotFound { .. } => "File not found".to_string(),
            Self::PermissionDenied { .. } => "Permission denied".to_string(),
            Self::Io(_) => "File operation failed".to_string(),
            Self::NotFound { .. }
            | Self::Conflict { .. }
            | Self::Validation { .. }
            | Self::Json(_) => self.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T, E = Error> = std::result::Result<T, E>;
