use super::{CategoryId, CategoryRecord, Origin};
use ahash::AHashMap;
use tracing::debug;

/// Categories simulated during a preview run, keyed by flattened partial path.
///
/// The same partial path always maps to the same virtual identifier within a
/// run, so rows sharing a prefix see one simulated category rather than one
/// per row.
#[derive(Debug, Default)]
pub struct VirtualCategoryTable {
    records: AHashMap<String, CategoryRecord>,
    counter: i64,
}

impl VirtualCategoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the record for `flattened_path`, minting a new virtual
    /// identifier if the path has not been simulated yet. The flag is true
    /// when a new identifier was minted by this call.
    pub fn get_or_create(
        &mut self,
        flattened_path: &str,
        name: &str,
        parent: CategoryId,
    ) -> (CategoryRecord, bool) {
        if let Some(record) = self.records.get(flattened_path) {
            return (record.clone(), false);
        }

        self.counter += 1;
        let record = CategoryRecord {
            id: CategoryId::virtual_from_counter(self.counter),
            parent,
            name: name.to_string(),
            origin: Origin::Virtual,
            path: flattened_path.to_string(),
        };
        debug!(
            "Minted virtual category {} for '{}' under {}",
            record.id, flattened_path, parent
        );
        self.records
            .insert(flattened_path.to_string(), record.clone());
        (record, true)
    }

    pub fn get(&self, flattened_path: &str) -> Option<&CategoryRecord> {
        self.records.get(flattened_path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.counter = 0;
    }

    /// Simulated records ordered by identifier, i.e. in minting order.
    pub fn records(&self) -> Vec<&CategoryRecord> {
        let mut records: Vec<&CategoryRecord> = self.records.values().collect();
        records.sort_by_key(|r| r.id.value());
        records
    }
}
