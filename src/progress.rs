/// Trait for reporting import progress.
///
/// The CLI implements it with an indicatif spinner. All methods have default
/// no-op implementations.
pub trait ProgressReporter {
    fn on_import_start(&self) {}
    fn on_row_processed(&self, _line: usize, _success: bool) {}
    fn on_import_complete(&self, _rows: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {}
