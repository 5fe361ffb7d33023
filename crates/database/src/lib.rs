//! SAC database connector, interface and connection handling

use diesel::r2d2::ConnectionManager;
use diesel::result::Error;
use diesel::{r2d2, PgConnection};

mod db;
pub mod settings;

pub use db::Db;

/// Pooled connection alias
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Result type using [`DatabaseError`] as a default Error
pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

/// Error types for the database abstraction
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database Error: `{0}`")]
    Custom(String),
    #[error("Diesel Error: `{0}`")]
    DieselError(diesel::result::Error),
    #[error("A requested resource could not be found")]
    NotFound,
    // The R2D2 error mapping is only possible when using r2d2 directly as a dependency, hence the
    // generic R2D2 error handling. See https://github.com/diesel-rs/diesel/issues/2336
    #[error("The connection pool returned an Error: `{0}`")]
    R2D2Error(String),
}

impl DatabaseError {
    /// Returns true if the underlying diesel error is a unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::DieselError(Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ))
        )
    }

    /// Returns true if the underlying diesel error is a foreign key constraint violation
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            Self::DieselError(Error::DatabaseError(
                diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                _,
            ))
        )
    }

    /// Returns true if the underlying diesel error is a check constraint violation
    pub fn is_check_violation(&self) -> bool {
        matches!(
            self,
            Self::DieselError(Error::DatabaseError(
                diesel::result::DatabaseErrorKind::CheckViolation,
                _,
            ))
        )
    }
}

impl From<diesel::result::Error> for DatabaseError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            Error::NotFound => Self::NotFound,
            err => DatabaseError::DieselError(err),
        }
    }
}
