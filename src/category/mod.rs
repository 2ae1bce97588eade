//! Category placement for imported courses.
//!
//! A course names its category by numeric id, by idnumber, or by a
//! slash-delimited path of names. Paths are walked root to leaf against the
//! store; missing levels are created in commit mode or simulated with virtual
//! identifiers in preview mode.

pub mod cache;
pub mod events;
pub mod ident;
pub mod path;
pub mod resolver;
pub mod virtual_table;

pub use cache::{CacheEntry, CacheKey, PathCache};
pub use events::{EventLog, ResolutionEvent, ResolutionSink, SilentSink};
pub use ident::{CategoryId, VIRTUAL_BASE};
pub use path::{CategoryPath, PATH_SEPARATOR};
pub use resolver::{CategoryResolver, ResolutionContext};
pub use virtual_table::VirtualCategoryTable;

use thiserror::Error;

/// Longest idnumber the store accepts.
pub const IDNUMBER_MAX_LENGTH: usize = 100;

/// Whether missing categories are really created or only simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    Commit,
    Preview,
}

/// Row-scoped reasons a category could not be resolved. None of these abort
/// the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Could not create category '{path}': {reason}")]
    CreationFailed { path: String, reason: String },

    #[error("Category '{path}' does not exist and automatic creation is not permitted")]
    AutoCreateDenied { path: String },

    #[error("Category name is ambiguous, {matches} categories match '{path}'")]
    Ambiguous { path: String, matches: usize },

    #[error("Category not found: {0}")]
    NotFound(String),

    #[error("Invalid category reference: {0}")]
    InvalidInput(String),
}

/// Where a resolved segment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Persisted,
    Virtual,
    Denied,
}

/// One segment of a path walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub parent: CategoryId,
    pub name: String,
    pub origin: Origin,
    /// Flattened partial path this record was resolved for.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionResult {
    Resolved(CategoryId),
    /// The walk stopped after this call had already created or simulated
    /// categories. Those stay in place; `segments` runs up to and including
    /// the failing one.
    PartiallyResolved {
        segments: Vec<CategoryRecord>,
        reason: ResolutionError,
    },
    Denied(ResolutionError),
}

impl ResolutionResult {
    pub fn id(&self) -> Option<CategoryId> {
        match self {
            ResolutionResult::Resolved(id) => Some(*id),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ResolutionError> {
        match self {
            ResolutionResult::Resolved(_) => None,
            ResolutionResult::PartiallyResolved { reason, .. } => Some(reason),
            ResolutionResult::Denied(reason) => Some(reason),
        }
    }
}

/// The ways a row may point at its category. Precedence is id, then
/// idnumber, then path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryReference {
    pub id: Option<i64>,
    pub idnumber: Option<String>,
    pub path: Option<CategoryPath>,
}

impl CategoryReference {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.idnumber.is_none() && self.path.is_none()
    }
}

/// Outcome of resolving a [`CategoryReference`]. `failures` holds the
/// errors of references that were tried and fell through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryLookup {
    pub id: Option<CategoryId>,
    pub failures: Vec<ResolutionError>,
}
