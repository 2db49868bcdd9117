//! Errors for query execution.

use sqlx::postgres::{PgDatabaseError, PgErrorPosition, PgSeverity};
use thiserror::Error;

/// The diagnostic fields PostgreSQL reports for a failed statement.
///
/// Every field is optional; whatever the backend did not send stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub message: Option<String>,
    /// The SQLSTATE code, e.g. `23505`.
    pub code: Option<String>,
    pub severity: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// 1-based character offset into the statement, as text.
    pub position: Option<String>,
    pub r#where: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    pub data_type: Option<String>,
    pub constraint: Option<String>,
}

impl Diagnostics {
    pub fn from_postgres(error: &PgDatabaseError) -> Diagnostics {
        Diagnostics {
            message: Some(error.message().to_string()),
            code: Some(error.code().to_string()),
            severity: Some(severity_name(error.severity()).to_string()),
            detail: error.detail().map(str::to_string),
            hint: error.hint().map(str::to_string),
            position: error.position().map(|position| match position {
                PgErrorPosition::Original(offset) => offset.to_string(),
                PgErrorPosition::Internal { position, .. } => position.to_string(),
            }),
            r#where: error.r#where().map(str::to_string),
            schema: error.schema().map(str::to_string),
            table: error.table().map(str::to_string),
            column: error.column().map(str::to_string),
            data_type: error.data_type().map(str::to_string),
            constraint: error.constraint().map(str::to_string),
        }
    }
}

fn severity_name(severity: PgSeverity) -> &'static str {
    match severity {
        PgSeverity::Panic => "PANIC",
        PgSeverity::Fatal => "FATAL",
        PgSeverity::Error => "ERROR",
        PgSeverity::Warning => "WARNING",
        PgSeverity::Notice => "NOTICE",
        PgSeverity::Debug => "DEBUG",
        PgSeverity::Info => "INFO",
        PgSeverity::Log => "LOG",
    }
}

/// A failure while running a statement or decoding its results.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", .0.message.as_deref().unwrap_or("database error"))]
    Database(Diagnostics),
    #[error("{message}")]
    Driver { kind: &'static str, message: String },
    #[error("invalid value for parameter ${index}: {message}")]
    InvalidParameter { index: usize, message: String },
    #[error("column \"{column}\" has unsupported type {type_name}")]
    UnsupportedType { column: String, type_name: String },
}

impl Error {
    /// The driver's own classification of the failure. Unlike the SQLSTATE
    /// code this is always present.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) => "database",
            Error::Driver { kind, .. } => kind,
            Error::InvalidParameter { .. } => "invalid_parameter",
            Error::UnsupportedType { .. } => "unsupported_type",
        }
    }

    /// Backend diagnostics, when the failure came from the database itself.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Error::Database(diagnostics) => Some(diagnostics),
            _ => None,
        }
    }

    pub(crate) fn decode(message: impl ToString) -> Error {
        Error::Driver {
            kind: "decode",
            message: message.to_string(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Error {
        match error {
            sqlx::Error::Database(database_error) => {
                match database_error.try_downcast_ref::<PgDatabaseError>() {
                    Some(pg_error) => Error::Database(Diagnostics::from_postgres(pg_error)),
                    None => Error::Database(Diagnostics {
                        message: Some(database_error.message().to_string()),
                        code: database_error.code().map(|code| code.into_owned()),
                        constraint: database_error.constraint().map(str::to_string),
                        ..Diagnostics::default()
                    }),
                }
            }
            other => Error::Driver {
                kind: driver_error_kind(&other),
                message: other.to_string(),
            },
        }
    }
}

fn driver_error_kind(error: &sqlx::Error) -> &'static str {
    match error {
        sqlx::Error::Configuration(_) => "configuration",
        sqlx::Error::Io(_) => "io",
        sqlx::Error::Tls(_) => "tls",
        sqlx::Error::Protocol(_) => "protocol",
        sqlx::Error::RowNotFound => "row_not_found",
        sqlx::Error::TypeNotFound { .. } => "type_not_found",
        sqlx::Error::ColumnIndexOutOfBounds { .. } => "column_index_out_of_bounds",
        sqlx::Error::ColumnNotFound(_) => "column_not_found",
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => "decode",
        sqlx::Error::PoolTimedOut => "pool_timed_out",
        sqlx::Error::PoolClosed => "pool_closed",
        sqlx::Error::WorkerCrashed => "worker_crashed",
        _ => "driver",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_errors_are_classified() {
        let error = Error::from(sqlx::Error::PoolTimedOut);
        assert_eq!(error.kind(), "pool_timed_out");
        assert!(error.diagnostics().is_none());
    }

    #[test]
    fn io_errors_are_classified() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = Error::from(sqlx::Error::Io(io));
        assert_eq!(error.kind(), "io");
        assert_eq!(error.to_string(), "error communicating with database: refused");
    }

    #[test]
    fn database_errors_display_their_message() {
        let error = Error::Database(Diagnostics {
            message: Some("relation \"nope\" does not exist".to_string()),
            code: Some("42P01".to_string()),
            ..Diagnostics::default()
        });
        assert_eq!(error.to_string(), "relation \"nope\" does not exist");
        assert_eq!(error.kind(), "database");
    }
}
