/// What the current run is allowed to do, consulted once per resolution.
pub trait Capabilities {
    fn can_auto_create_categories(&self) -> bool;
    fn is_preview_mode(&self) -> bool;
}

/// Fixed capabilities, mostly useful in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCapabilities {
    pub auto_create: bool,
    pub preview: bool,
}

impl Capabilities for StaticCapabilities {
    fn can_auto_create_categories(&self) -> bool {
        self.auto_create
    }

    fn is_preview_mode(&self) -> bool {
        self.preview
    }
}
