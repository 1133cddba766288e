//! Error types for the marketplace database layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{entity} not found{}", .id.as_ref().map(|id| format!(": {}", id)).unwrap_or_default())]
    NotFound {
        entity: &'static str,
        id: Option<String>,
    },

    #[error("Duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    #[error("Referenced {entity} does not exist or is still referenced")]
    ForeignKeyViolation { entity: String },

    #[error("Check constraint violated: {0}")]
    CheckViolation(String),

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Data encoding error: {0}")]
    Encoding(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl DbError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity, id: None }
    }

    pub fn not_found_with_id(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: Some(id.into()),
        }
    }

    pub fn duplicate(field: &'static str, value: impl Into<String>) -> Self {
        Self::Duplicate {
            field,
            value: value.into(),
        }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// The database could not be reached, as opposed to answering with an error.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Pool(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "record",
                id: None,
            },
            sqlx::Error::Database(db_err) => {
                // 23505 unique_violation, 23503 foreign_key_violation, 23514 check_violation
                match db_err.code().as_deref() {
                    Some("23505") => Self::Duplicate {
                        field: "constraint",
                        value: db_err.constraint().unwrap_or("unknown").to_string(),
                    },
                    Some("23503") => Self::ForeignKeyViolation {
                        entity: db_err
                            .constraint()
                            .unwrap_or("referenced record")
                            .to_string(),
                    },
                    Some("23514") => Self::CheckViolation(
                        db_err.constraint().unwrap_or("unknown").to_string(),
                    ),
                    _ => Self::Database(sqlx::Error::Database(db_err)),
                }
            }
            sqlx::Error::PoolTimedOut => Self::Pool("Connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Pool("Connection pool is closed".to_string()),
            sqlx::Error::Io(io_err) => Self::Connection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => Self::Connection(format!("TLS error: {}", tls_err)),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Encoding(format!("column {index}: {source}"))
            }
            other => Self::Database(other),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
