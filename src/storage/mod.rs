pub mod models;
pub mod queries;
pub mod sqlite;

pub use sqlite::Database;

use models::Category;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached at all. Aborts the whole import.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store answered but refused the operation.
    #[error("Store rejected operation: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt => StoreError::Unavailable(err.to_string()),
                _ => StoreError::Rejected(err.to_string()),
            },
            _ => StoreError::Rejected(err.to_string()),
        }
    }
}

/// Persisted category storage as seen by the resolver.
pub trait CategoryStore {
    /// Categories named `name` directly under `parent` (0 for the top level).
    fn find_by_name_and_parent(&self, name: &str, parent: i64) -> Result<Vec<Category>, StoreError>;
    fn find_by_idnumber(&self, idnumber: &str) -> Result<Option<i64>, StoreError>;
    fn find_by_id(&self, id: i64) -> Result<Option<Category>, StoreError>;
    fn create(&self, name: &str, parent: i64) -> Result<Category, StoreError>;
}
