use super::ResolutionError;
use std::fmt;
use std::str::FromStr;

/// Separator between segments in the flattened form of a path.
pub const PATH_SEPARATOR: &str = " / ";

/// An ordered, non-empty sequence of category names, root first.
///
/// Segments are whitespace-trimmed on construction and compared
/// case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryPath {
    segments: Vec<String>,
}

impl CategoryPath {
    pub fn new<I, S>(segments: I) -> Result<Self, ResolutionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trimmed = Vec::new();
        for (index, segment) in segments.into_iter().enumerate() {
            let segment = segment.as_ref().trim();
            if segment.is_empty() {
                return Err(ResolutionError::InvalidInput(format!(
                    "category path segment {} is empty",
                    index + 1
                )));
            }
            trimmed.push(segment.to_string());
        }

        if trimmed.is_empty() {
            return Err(ResolutionError::InvalidInput(
                "category path is empty".to_string(),
            ));
        }

        Ok(Self { segments: trimmed })
    }

    /// Parse a flattened path such as `"Science / Physics"`.
    pub fn parse(flattened: &str) -> Result<Self, ResolutionError> {
        if flattened.trim().is_empty() {
            return Err(ResolutionError::InvalidInput(
                "category path is empty".to_string(),
            ));
        }
        Self::new(flattened.split(PATH_SEPARATOR))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Canonical string form, also used as the cache key.
    pub fn flattened(&self) -> String {
        self.segments.join(PATH_SEPARATOR)
    }

    /// Flattened form of the first `depth` segments.
    pub fn flattened_prefix(&self, depth: usize) -> String {
        let depth = depth.min(self.segments.len());
        self.segments[..depth].join(PATH_SEPARATOR)
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.flattened())
    }
}

impl FromStr for CategoryPath {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
