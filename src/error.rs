//! Error taxonomy for user reconciliation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Declared state is unusable; raised before any statement is sent
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unable to connect to database: {0}")]
    Connection(String),

    /// Attribute change requested for a user that does not exist
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("unable to remove user {user}: {reason}")]
    DeletionFailed { user: String, reason: String },

    #[error("database error: {0}")]
    Query(#[from] postgres::Error),

    /// A statement refused by a non-postgres session
    #[error("statement rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, Error>;
