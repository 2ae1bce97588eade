use super::{CategoryRecord, ResolutionError};
use std::fmt;

/// Receives per-segment status from the resolver.
///
/// All methods have default no-op implementations.
pub trait ResolutionSink {
    fn category_created(&mut self, _segment: &CategoryRecord) {}
    fn category_will_be_created(&mut self, _segment: &CategoryRecord) {}
    fn category_resolution_denied(&mut self, _segment: &CategoryRecord, _reason: &ResolutionError) {}
}

/// No-op sink.
pub struct SilentSink;

impl ResolutionSink for SilentSink {}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionEvent {
    Created(CategoryRecord),
    WillBeCreated(CategoryRecord),
    Denied(CategoryRecord, ResolutionError),
}

impl fmt::Display for ResolutionEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolutionEvent::Created(segment) => {
                write!(f, "Category created: {}", segment.path)
            }
            ResolutionEvent::WillBeCreated(segment) => {
                write!(
                    f,
                    "Category does not exist, it will be created: {}",
                    segment.path
                )
            }
            ResolutionEvent::Denied(_, reason) => write!(f, "{}", reason),
        }
    }
}

/// Sink that keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<ResolutionEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ResolutionEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<ResolutionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of categories created or scheduled for creation.
    pub fn creations(&self) -> usize {
        self.events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    ResolutionEvent::Created(_) | ResolutionEvent::WillBeCreated(_)
                )
            })
            .count()
    }
}

impl ResolutionSink for EventLog {
    fn category_created(&mut self, segment: &CategoryRecord) {
        self.events.push(ResolutionEvent::Created(segment.clone()));
    }

    fn category_will_be_created(&mut self, segment: &CategoryRecord) {
        self.events
            .push(ResolutionEvent::WillBeCreated(segment.clone()));
    }

    fn category_resolution_denied(&mut self, segment: &CategoryRecord, reason: &ResolutionError) {
        self.events
            .push(ResolutionEvent::Denied(segment.clone(), reason.clone()));
    }
}
