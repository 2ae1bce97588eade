use super::*;
use crate::capability::Capabilities;
use crate::storage::models::Category;
use crate::storage::{CategoryStore, StoreError};
use tracing::{debug, info, warn};

/// Run-scoped resolution state: the path cache and the virtual category
/// table. One context is created per import run and passed to every call.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    cache: PathCache,
    virtual_table: VirtualCategoryTable,
    mode: Option<ResolutionMode>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.cache.clear();
        self.virtual_table.clear();
        self.mode = None;
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    pub fn virtual_table(&self) -> &VirtualCategoryTable {
        &self.virtual_table
    }

    /// Cached entries may hold virtual identifiers, which a commit-mode
    /// caller must never see, so switching modes starts from a clean state.
    fn enter_mode(&mut self, mode: ResolutionMode) {
        if let Some(previous) = self.mode {
            if previous != mode {
                debug!("Resolution mode changed from {:?} to {:?}, resetting context", previous, mode);
                self.reset();
            }
        }
        self.mode = Some(mode);
    }
}

impl CategoryRecord {
    fn persisted(category: &Category, path: String) -> Self {
        Self {
            id: CategoryId::Persisted(category.id),
            parent: CategoryId::Persisted(category.parent),
            name: category.name.clone(),
            origin: Origin::Persisted,
            path,
        }
    }

    fn denied(name: &str, parent: CategoryId, path: String) -> Self {
        Self {
            id: parent,
            parent,
            name: name.to_string(),
            origin: Origin::Denied,
            path,
        }
    }
}

/// Resolves category references against a store.
pub struct CategoryResolver<'s, S: CategoryStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: CategoryStore + ?Sized> CategoryResolver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Resolve `path` to the identifier of its leaf category.
    ///
    /// Walks the path root to leaf. Missing levels are created when
    /// `may_create` is set (really in commit mode, as virtual entries in
    /// preview mode). Outcomes are cached under the full path, failures
    /// included, so a repeated path is answered without touching the store.
    /// The exception is an `AutoCreateDenied` entry, which is walked again
    /// when the caller may create.
    ///
    /// Store failures are returned as `Err` and left to the caller to classify.
    pub fn resolve(
        &self,
        ctx: &mut ResolutionContext,
        path: &CategoryPath,
        mode: ResolutionMode,
        may_create: bool,
        sink: &mut dyn ResolutionSink,
    ) -> Result<ResolutionResult, StoreError> {
        ctx.enter_mode(mode);

        let key = CacheKey::Path(path.flattened());
        match ctx.cache.get(&key).cloned() {
            Some(CacheEntry::Resolved(id)) => return Ok(ResolutionResult::Resolved(id)),
            Some(CacheEntry::Unresolved(ResolutionError::AutoCreateDenied { .. })) if may_create => {
                debug!("Retrying '{}' with creation allowed", key);
            }
            Some(CacheEntry::Unresolved(reason)) => return Ok(ResolutionResult::Denied(reason)),
            None => {}
        }

        let result = self.walk(ctx, path, mode, may_create, sink)?;
        let entry = match &result {
            ResolutionResult::Resolved(id) => CacheEntry::Resolved(*id),
            ResolutionResult::PartiallyResolved { reason, .. }
            | ResolutionResult::Denied(reason) => CacheEntry::Unresolved(reason.clone()),
        };
        ctx.cache.set(key, entry);
        Ok(result)
    }

    fn walk(
        &self,
        ctx: &mut ResolutionContext,
        path: &CategoryPath,
        mode: ResolutionMode,
        may_create: bool,
        sink: &mut dyn ResolutionSink,
    ) -> Result<ResolutionResult, StoreError> {
        let mut parent = CategoryId::ROOT;
        let mut segments: Vec<CategoryRecord> = Vec::with_capacity(path.len());
        let mut changed = false;

        for (depth, name) in path.segments().iter().enumerate() {
            let partial = path.flattened_prefix(depth + 1);

            // A virtual parent has no persisted children.
            let matches = match parent {
                CategoryId::Persisted(parent_id) => {
                    self.store.find_by_name_and_parent(name, parent_id)?
                }
                CategoryId::Virtual(_) => Vec::new(),
            };

            let record = match matches.len() {
                1 => {
                    debug!("Category '{}' exists as {}", partial, matches[0].id);
                    CategoryRecord::persisted(&matches[0], partial)
                }
                0 if !may_create => {
                    let reason = ResolutionError::AutoCreateDenied {
                        path: partial.clone(),
                    };
                    return Ok(self.abort(segments, name, parent, partial, reason, changed, sink));
                }
                0 => match mode {
                    ResolutionMode::Commit => {
                        let created = match parent.persisted() {
                            Some(parent_id) => self.store.create(name, parent_id),
                            None => Err(StoreError::Rejected(format!(
                                "parent {} is not a persisted category",
                                parent
                            ))),
                        };
                        match created {
                            Ok(category) => {
                                info!("Created category {} '{}'", category.id, partial);
                                let record = CategoryRecord::persisted(&category, partial);
                                sink.category_created(&record);
                                changed = true;
                                record
                            }
                            Err(StoreError::Rejected(message)) => {
                                let reason = ResolutionError::CreationFailed {
                                    path: partial.clone(),
                                    reason: message,
                                };
                                return Ok(self.abort(segments, name, parent, partial, reason, changed, sink));
                            }
                            Err(err) => return Err(err),
                        }
                    }
                    ResolutionMode::Preview => {
                        let (record, minted) =
                            ctx.virtual_table.get_or_create(&partial, name, parent);
                        if minted {
                            sink.category_will_be_created(&record);
                            changed = true;
                        }
                        record
                    }
                },
                count => {
                    let reason = ResolutionError::Ambiguous {
                        path: partial.clone(),
                        matches: count,
                    };
                    return Ok(self.abort(segments, name, parent, partial, reason, changed, sink));
                }
            };

            parent = record.id;
            segments.push(record);
        }

        Ok(ResolutionResult::Resolved(parent))
    }

    #[allow(clippy::too_many_arguments)]
    fn abort(
        &self,
        mut segments: Vec<CategoryRecord>,
        name: &str,
        parent: CategoryId,
        partial: String,
        reason: ResolutionError,
        changed: bool,
        sink: &mut dyn ResolutionSink,
    ) -> ResolutionResult {
        warn!("{}", reason);
        let record = CategoryRecord::denied(name, parent, partial);
        sink.category_resolution_denied(&record, &reason);
        segments.push(record);

        if changed {
            ResolutionResult::PartiallyResolved { segments, reason }
        } else {
            ResolutionResult::Denied(reason)
        }
    }

    /// Check that a category with this id exists. Never creates, never caches.
    pub fn resolve_by_id(&self, id: i64) -> Result<ResolutionResult, StoreError> {
        if id <= 0 {
            return Ok(ResolutionResult::Denied(ResolutionError::InvalidInput(format!(
                "category id must be positive, got {}",
                id
            ))));
        }

        match self.store.find_by_id(id)? {
            Some(category) => Ok(ResolutionResult::Resolved(CategoryId::Persisted(category.id))),
            None => Ok(ResolutionResult::Denied(ResolutionError::NotFound(format!(
                "id {}",
                id
            )))),
        }
    }

    /// Look up a category by its unique idnumber, caching the outcome.
    pub fn resolve_by_idnumber(
        &self,
        ctx: &mut ResolutionContext,
        idnumber: &str,
    ) -> Result<ResolutionResult, StoreError> {
        let idnumber = idnumber.trim();
        if idnumber.is_empty() || idnumber.chars().count() > IDNUMBER_MAX_LENGTH {
            return Ok(ResolutionResult::Denied(ResolutionError::InvalidInput(format!(
                "idnumber must be 1 to {} characters",
                IDNUMBER_MAX_LENGTH
            ))));
        }

        let key = CacheKey::IdNumber(idnumber.to_string());
        match ctx.cache.get(&key).cloned() {
            Some(CacheEntry::Resolved(id)) => return Ok(ResolutionResult::Resolved(id)),
            Some(CacheEntry::Unresolved(reason)) => return Ok(ResolutionResult::Denied(reason)),
            None => {}
        }

        let (entry, result) = match self.store.find_by_idnumber(idnumber)? {
            Some(id) => {
                let id = CategoryId::Persisted(id);
                (CacheEntry::Resolved(id), ResolutionResult::Resolved(id))
            }
            None => {
                let reason = ResolutionError::NotFound(format!("idnumber '{}'", idnumber));
                (
                    CacheEntry::Unresolved(reason.clone()),
                    ResolutionResult::Denied(reason),
                )
            }
        };
        ctx.cache.set(key, entry);
        Ok(result)
    }

    /// Resolve a row's category reference: an explicit id wins over an
    /// idnumber, which wins over a path. A reference that fails falls
    /// through to the next one supplied.
    pub fn resolve_reference(
        &self,
        ctx: &mut ResolutionContext,
        reference: &CategoryReference,
        capabilities: &dyn Capabilities,
        sink: &mut dyn ResolutionSink,
    ) -> Result<CategoryLookup, StoreError> {
        let mut lookup = CategoryLookup::default();

        if let Some(id) = reference.id {
            match self.resolve_by_id(id)? {
                ResolutionResult::Resolved(found) => {
                    lookup.id = Some(found);
                    return Ok(lookup);
                }
                other => lookup.failures.extend(other.error().cloned()),
            }
        }

        if let Some(idnumber) = &reference.idnumber {
            match self.resolve_by_idnumber(ctx, idnumber)? {
                ResolutionResult::Resolved(found) => {
                    lookup.id = Some(found);
                    return Ok(lookup);
                }
                other => lookup.failures.extend(other.error().cloned()),
            }
        }

        if let Some(path) = &reference.path {
            let mode = if capabilities.is_preview_mode() {
                ResolutionMode::Preview
            } else {
                ResolutionMode::Commit
            };
            let may_create = capabilities.can_auto_create_categories();
            match self.resolve(ctx, path, mode, may_create, sink)? {
                ResolutionResult::Resolved(found) => lookup.id = Some(found),
                other => lookup.failures.extend(other.error().cloned()),
            }
        }

        Ok(lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::StaticCapabilities;
    use crate::storage::Database;

    fn path(s: &str) -> CategoryPath {
        CategoryPath::parse(s).unwrap()
    }

    #[test]
    fn test_commit_creates_each_level() {
        let db = Database::open_in_memory().unwrap();
        let resolver = CategoryResolver::new(&db);
        let mut ctx = ResolutionContext::new();
        let mut log = EventLog::new();

        let result = resolver
            .resolve(&mut ctx, &path("Science / Physics"), ResolutionMode::Commit, true, &mut log)
            .unwrap();

        let science = db.get_categories_by_name("Science", 0).unwrap();
        assert_eq!(science.len(), 1);
        let physics = db.get_categories_by_name("Physics", science[0].id).unwrap();
        assert_eq!(physics.len(), 1);
        assert_eq!(result, ResolutionResult::Resolved(CategoryId::Persisted(physics[0].id)));

        let events = log.events();
        assert_eq!(events.len(), 2);
        match (&events[0], &events[1]) {
            (ResolutionEvent::Created(a), ResolutionEvent::Created(b)) => {
                assert_eq!(a.name, "Science");
                assert_eq!(a.parent, CategoryId::ROOT);
                assert_eq!(b.name, "Physics");
                assert_eq!(b.parent, CategoryId::Persisted(science[0].id));
                assert_eq!(b.path, "Science / Physics");
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_preview_scenario_mints_two_virtual_ids() {
        let db = Database::open_in_memory().unwrap();
        let resolver = CategoryResolver::new(&db);
        let mut ctx = ResolutionContext::new();
        let mut log = EventLog::new();

        let result = resolver
            .resolve(&mut ctx, &path("Science / Physics"), ResolutionMode::Preview, true, &mut log)
            .unwrap();

        assert_eq!(result, ResolutionResult::Resolved(CategoryId::Virtual(VIRTUAL_BASE + 2)));
        assert_eq!(ctx.virtual_table().len(), 2);
        assert!(log
            .events()
            .iter()
            .all(|e| matches!(e, ResolutionEvent::WillBeCreated(_))));
        assert_eq!(log.events().len(), 2);
        assert!(db.list_category_paths().unwrap().is_empty());
    }

    #[test]
    fn test_existing_levels_are_reused_in_preview() {
        let db = Database::open_in_memory().unwrap();
        let science = db.insert_category("Science", 0, None).unwrap();
        let resolver = CategoryResolver::new(&db);
        let mut ctx = ResolutionContext::new();
        let mut log = EventLog::new();

        let result = resolver
            .resolve(&mut ctx, &path("Science / Physics"), ResolutionMode::Preview, true, &mut log)
            .unwrap();

        assert_eq!(result, ResolutionResult::Resolved(CategoryId::Virtual(VIRTUAL_BASE + 1)));
        let physics = ctx.virtual_table().get("Science / Physics").unwrap();
        assert_eq!(physics.parent, CategoryId::Persisted(science.id));
        assert_eq!(log.events().len(), 1);
    }

    #[test]
    fn test_auto_create_denied() {
        let db = Database::open_in_memory().unwrap();
        db.insert_category("Science", 0, None).unwrap();
        let resolver = CategoryResolver::new(&db);
        let mut ctx = ResolutionContext::new();
        let mut log = EventLog::new();

        let result = resolver
            .resolve(&mut ctx, &path("Science / Physics"), ResolutionMode::Commit, false, &mut log)
            .unwrap();

        assert_eq!(
            result,
            ResolutionResult::Denied(ResolutionError::AutoCreateDenied {
                path: "Science / Physics".to_string()
            })
        );
        match &log.events()[0] {
            ResolutionEvent::Denied(record, _) => assert_eq!(record.origin, Origin::Denied),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_failure_is_cached_as_sentinel() {
        let db = Database::open_in_memory().unwrap();
        let resolver = CategoryResolver::new(&db);
        let mut ctx = ResolutionContext::new();

        let first = resolver
            .resolve(&mut ctx, &path("Nowhere"), ResolutionMode::Commit, false, &mut SilentSink)
            .unwrap();
        let second = resolver
            .resolve(&mut ctx, &path("Nowhere"), ResolutionMode::Commit, false, &mut SilentSink)
            .unwrap();

        assert_eq!(first, second);
        assert!(matches!(
            ctx.cache().peek(&CacheKey::Path("Nowhere".into())),
            Some(CacheEntry::Unresolved(_))
        ));
    }

    #[test]
    fn test_mode_switch_resets_context() {
        let db = Database::open_in_memory().unwrap();
        let resolver = CategoryResolver::new(&db);
        let mut ctx = ResolutionContext::new();

        let preview = resolver
            .resolve(&mut ctx, &path("Arts"), ResolutionMode::Preview, true, &mut SilentSink)
            .unwrap();
        assert!(preview.id().unwrap().is_virtual());

        let commit = resolver
            .resolve(&mut ctx, &path("Arts"), ResolutionMode::Commit, true, &mut SilentSink)
            .unwrap();
        assert!(!commit.id().unwrap().is_virtual());
        assert!(ctx.virtual_table().is_empty());
    }

    #[test]
    fn test_idnumber_lookup_and_sentinel() {
        let db = Database::open_in_memory().unwrap();
        let cat = db.insert_category("Maths", 0, Some("MATHS")).unwrap();
        let resolver = CategoryResolver::new(&db);
        let mut ctx = ResolutionContext::new();

        let found = resolver.resolve_by_idnumber(&mut ctx, " MATHS ").unwrap();
        assert_eq!(found, ResolutionResult::Resolved(CategoryId::Persisted(cat.id)));

        let missing = resolver.resolve_by_idnumber(&mut ctx, "NOPE").unwrap();
        assert!(matches!(missing, ResolutionResult::Denied(ResolutionError::NotFound(_))));
        assert_eq!(ctx.cache().len(), 2);

        let invalid = resolver.resolve_by_idnumber(&mut ctx, "   ").unwrap();
        assert!(matches!(invalid, ResolutionResult::Denied(ResolutionError::InvalidInput(_))));
        let too_long = "x".repeat(IDNUMBER_MAX_LENGTH + 1);
        let invalid = resolver.resolve_by_idnumber(&mut ctx, &too_long).unwrap();
        assert!(matches!(invalid, ResolutionResult::Denied(ResolutionError::InvalidInput(_))));
    }

    #[test]
    fn test_reference_falls_through_to_path() {
        let db = Database::open_in_memory().unwrap();
        let resolver = CategoryResolver::new(&db);
        let mut ctx = ResolutionContext::new();
        let caps = StaticCapabilities {
            auto_create: true,
            preview: false,
        };
        let reference = CategoryReference {
            id: Some(404),
            idnumber: Some("MISSING".to_string()),
            path: Some(path("Fallback")),
        };

        let lookup = resolver
            .resolve_reference(&mut ctx, &reference, &caps, &mut SilentSink)
            .unwrap();

        assert!(lookup.id.is_some());
        assert_eq!(lookup.failures.len(), 2);
        assert!(matches!(lookup.failures[0], ResolutionError::NotFound(_)));
    }
}
