//! Course rows: parsing, naming helpers and row-level errors.

pub mod fields;
pub mod naming;
pub mod row;

pub use row::{CourseRow, RawRow};

use crate::category::ResolutionError;
use thiserror::Error;

/// Reasons a single row fails. The run continues with the next row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("Missing value for required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error(transparent)]
    Category(#[from] ResolutionError),

    #[error("A category is required to create a course")]
    CategoryRequired,

    #[error("A course with shortname '{0}' already exists")]
    CourseExists(String),

    #[error("Course '{0}' does not exist")]
    CourseNotFound(String),

    #[error("Course deletion is not allowed")]
    DeleteNotAllowed,

    #[error("The idnumber '{0}' is already used by another course")]
    IdNumberInUse(String),

    #[error("Invalid roles: {0}")]
    InvalidRoles(String),

    #[error("Could not save course: {0}")]
    Store(String),
}
