//! Error taxonomy for the store and its services.
//!
//! Business outcomes (caps reached, unknown ids) are not errors; see
//! [`crate::service::Outcome`]. Everything here is an infrastructure failure
//! that the caller cannot resolve by changing its request.

use rusqlite::ErrorCode;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// The durable image could not be read or restored, or the engine failed to start.
    #[error("failed to initialise database: {reason}")]
    Initialization {
        reason: &'static str,
        #[source]
        source: BoxError,
    },

    /// A schema step failed and was rolled back. Steps below `version` stay applied.
    #[error("migration {version} ({name}) failed")]
    Migration {
        version: u32,
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database schema v{found} is newer than the supported v{supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    /// Uniqueness, not-null, check or foreign key violation not covered by a business rule.
    #[error("constraint violation: {0}")]
    Constraint(#[source] rusqlite::Error),

    #[error("database error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("invalid food catalog: {0}")]
    Catalog(String),

    #[error("invalid limits: {0}")]
    InvalidLimits(String),

    #[error("database is not initialised")]
    NotInitialised,
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            Error::Constraint(err)
        } else {
            Error::Sqlite(err)
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Catalog(err.to_string())
    }
}

impl Error {
    pub(crate) fn initialization(
        reason: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Initialization {
            reason,
            source: source.into(),
        }
    }

    /// True for failures the user can only clear with a manual retry or reset.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Initialization { .. } | Error::Migration { .. } | Error::UnsupportedSchema { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
