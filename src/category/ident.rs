use std::fmt;

/// Virtual identifiers start above this value so they can never collide with
/// a row id from the persisted store.
pub const VIRTUAL_BASE: i64 = 9_000_000_000;

/// Identifier of a category, either backed by the store or simulated for the
/// duration of a preview run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryId {
    Persisted(i64),
    Virtual(i64),
}

impl CategoryId {
    /// The implicit top level. Only ever used as a parent.
    pub const ROOT: CategoryId = CategoryId::Persisted(0);

    /// Build the n-th virtual identifier of a run (n starts at 1).
    pub fn virtual_from_counter(counter: i64) -> Self {
        CategoryId::Virtual(VIRTUAL_BASE + counter)
    }

    pub fn value(&self) -> i64 {
        match self {
            CategoryId::Persisted(id) | CategoryId::Virtual(id) => *id,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, CategoryId::Virtual(_))
    }

    /// The store id, if this identifier may be written to the store.
    pub fn persisted(&self) -> Option<i64> {
        match self {
            CategoryId::Persisted(id) => Some(*id),
            CategoryId::Virtual(_) => None,
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_ids_sit_above_base() {
        let id = CategoryId::virtual_from_counter(2);
        assert_eq!(id, CategoryId::Virtual(9_000_000_002));
        assert!(id.is_virtual());
        assert_eq!(id.persisted(), None);
    }

    #[test]
    fn test_root_is_persisted_zero() {
        assert_eq!(CategoryId::ROOT.persisted(), Some(0));
        assert_eq!(CategoryId::ROOT.to_string(), "0");
    }
}
