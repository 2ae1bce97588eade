pub mod capability;
pub mod category;
pub mod config;
pub mod course;
pub mod error;
pub mod importer;
pub mod progress;
pub mod storage;
pub mod tracker;

pub use error::Error;
pub use importer::{ImportMode, ImportOptions, Importer};
pub use progress::{ProgressReporter, SilentProgress};
