//! The course import pipeline.
//!
//! Rows are processed strictly in input order. Every row produces a
//! [`RowOutcome`]; a failing row is reported and the run moves on. Only an
//! unreachable store or an unreadable CSV stream ends the run early.

use crate::capability::Capabilities;
use crate::category::{
    CategoryId, CategoryResolver, EventLog, ResolutionContext, ResolutionError, ResolutionEvent,
};
use crate::course::fields::{enrolment_data, role_names};
use crate::course::naming::{generate_shortname, increment_idnumber, increment_shortname};
use crate::course::{CourseRow, RawRow, RowError};
use crate::error::Result;
use crate::progress::ProgressReporter;
use crate::storage::models::{Course, CourseData, Role};
use crate::storage::{Database, StoreError};
use crate::tracker::{ImportReporter, RowOutcome, RunTotals};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What to do with rows whose shortname already exists (or does not).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Create new courses only; existing shortnames are errors.
    #[default]
    CreateNew,
    /// Create every row, renaming shortnames that are taken.
    CreateAll,
    CreateOrUpdate,
    /// Update existing courses only.
    UpdateOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub mode: ImportMode,
    pub preview: bool,
    pub allow_category_creation: bool,
    pub allow_deletes: bool,
    pub shortname_template: Option<String>,
    pub enrol_plugins: Vec<String>,
    pub delimiter: u8,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            mode: ImportMode::default(),
            preview: false,
            allow_category_creation: true,
            allow_deletes: false,
            shortname_template: None,
            enrol_plugins: ["manual", "self", "guest", "cohort"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            delimiter: b',',
        }
    }
}

impl Capabilities for ImportOptions {
    fn can_auto_create_categories(&self) -> bool {
        self.allow_category_creation
    }

    fn is_preview_mode(&self) -> bool {
        self.preview
    }
}

enum RowFailure {
    Row(RowError),
    Fatal(StoreError),
}

impl From<RowError> for RowFailure {
    fn from(err: RowError) -> Self {
        RowFailure::Row(err)
    }
}

impl From<ResolutionError> for RowFailure {
    fn from(err: ResolutionError) -> Self {
        RowFailure::Row(RowError::Category(err))
    }
}

impl From<StoreError> for RowFailure {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => RowFailure::Fatal(err),
            StoreError::Rejected(message) => RowFailure::Row(RowError::Store(message)),
        }
    }
}

impl From<rusqlite::Error> for RowFailure {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::from(err).into()
    }
}

type RowResult<T> = std::result::Result<T, RowFailure>;

pub struct Importer<'db> {
    db: &'db Database,
    options: ImportOptions,
    ctx: ResolutionContext,
    roles: Vec<Role>,
    totals: RunTotals,
}

impl<'db> Importer<'db> {
    pub fn new(db: &'db Database, options: ImportOptions) -> Result<Self> {
        let roles = db.get_roles()?;
        let totals = RunTotals {
            preview: options.preview,
            ..Default::default()
        };
        Ok(Self {
            db,
            options,
            ctx: ResolutionContext::new(),
            roles,
            totals,
        })
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.ctx
    }

    pub fn totals(&self) -> RunTotals {
        self.totals
    }

    /// Import every record of a CSV stream.
    pub fn run<R: Read>(
        &mut self,
        input: R,
        reporter: &mut dyn ImportReporter,
        progress: &dyn ProgressReporter,
    ) -> Result<RunTotals> {
        let started = Instant::now();
        self.ctx.reset();
        self.totals = RunTotals {
            preview: self.options.preview,
            ..Default::default()
        };
        info!(
            "Importing courses (mode {:?}, preview {})",
            self.options.mode, self.options.preview
        );

        progress.on_import_start();
        reporter.start()?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .trim(csv::Trim::All)
            .from_reader(input);
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(index + 2);
            let fields: BTreeMap<String, String> = headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();

            let outcome = match self.process_row(&RawRow::new(line, fields)) {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!("Aborting import at line {}: {}", line, err);
                    return Err(err.into());
                }
            };
            progress.on_row_processed(outcome.line, outcome.success);
            reporter.row(&outcome)?;
        }

        let cache = self.ctx.cache();
        debug!(
            "Category cache: {} entries, {} hits, {} misses",
            cache.len(),
            cache.hits(),
            cache.misses()
        );
        for record in self.ctx.virtual_table().records() {
            debug!(
                "Simulated category {} (parent {}): {}",
                record.id, record.parent, record.path
            );
        }

        reporter.results(&self.totals)?;
        reporter.finish()?;
        progress.on_import_complete(self.totals.total, started.elapsed().as_secs_f64());
        info!("Import finished: {}", self.totals);

        Ok(self.totals)
    }

    /// Process one row. Row-level failures are folded into the outcome; only
    /// an unavailable store is returned as `Err`.
    pub fn process_row(&mut self, raw: &RawRow) -> std::result::Result<RowOutcome, StoreError> {
        self.totals.total += 1;

        let mut outcome = RowOutcome {
            line: raw.line,
            shortname: raw.value("shortname").unwrap_or_default().to_string(),
            fullname: raw.value("fullname").unwrap_or_default().to_string(),
            category_path: raw.value("category_path").unwrap_or_default().to_string(),
            idnumber: raw.value("idnumber").unwrap_or_default().to_string(),
            ..Default::default()
        };

        match self.apply(raw, &mut outcome) {
            Ok(()) => {
                outcome.success = true;
                debug!("Line {} processed", raw.line);
            }
            Err(RowFailure::Row(err)) => {
                warn!("Line {}: {}", raw.line, err);
                outcome.status.push(err.to_string());
                self.totals.errors += 1;
            }
            Err(RowFailure::Fatal(err)) => return Err(err),
        }

        Ok(outcome)
    }

    fn apply(&mut self, raw: &RawRow, outcome: &mut RowOutcome) -> RowResult<()> {
        let row = CourseRow::parse(raw)?;
        if let Some(path) = &row.category.path {
            outcome.category_path = path.flattened();
        }

        let shortname = self.shortname_for(&row)?;
        outcome.shortname = shortname.clone();
        let existing = self.db.get_course_by_shortname(&shortname)?;

        if row.delete {
            return self.delete(existing, shortname, outcome);
        }

        let (existing, shortname) = match (self.options.mode, existing) {
            (ImportMode::CreateNew, Some(_)) => {
                return Err(RowError::CourseExists(shortname).into());
            }
            (ImportMode::CreateAll, Some(_)) => {
                let db = self.db;
                let renamed = increment_shortname(&shortname, |s| db.course_shortname_exists(s))?;
                outcome.status.push(format!(
                    "Shortname incremented from {} to {}",
                    shortname, renamed
                ));
                (None, renamed)
            }
            (ImportMode::UpdateOnly, None) => {
                return Err(RowError::CourseNotFound(shortname).into());
            }
            (ImportMode::CreateNew | ImportMode::CreateAll, None) => (None, shortname),
            (ImportMode::CreateOrUpdate | ImportMode::UpdateOnly, existing) => (existing, shortname),
        };
        outcome.shortname = shortname.clone();

        let category = self.resolve_category(&row, outcome)?;

        match existing {
            Some(course) => self.update(course, &row, category, outcome),
            None => self.create(&row, shortname, category, outcome),
        }
    }

    fn shortname_for(&self, row: &CourseRow) -> RowResult<String> {
        if let Some(shortname) = &row.shortname {
            return Ok(shortname.clone());
        }
        self.options
            .shortname_template
            .as_deref()
            .and_then(|template| {
                generate_shortname(
                    template,
                    row.fullname.as_deref().unwrap_or_default(),
                    row.idnumber.as_deref().unwrap_or_default(),
                )
            })
            .ok_or_else(|| RowError::MissingField("shortname").into())
    }

    fn resolve_category(
        &mut self,
        row: &CourseRow,
        outcome: &mut RowOutcome,
    ) -> RowResult<Option<CategoryId>> {
        if row.category.is_empty() {
            return Ok(None);
        }

        let resolver = CategoryResolver::new(self.db);
        let mut events = EventLog::new();
        let mut lookup =
            resolver.resolve_reference(&mut self.ctx, &row.category, &self.options, &mut events)?;

        self.totals.categories_created += events.creations();
        outcome.status.extend(
            events
                .take()
                .iter()
                .filter(|e| !matches!(e, ResolutionEvent::Denied(..)))
                .map(ToString::to_string),
        );

        match lookup.id {
            Some(id) => {
                for failure in &lookup.failures {
                    outcome
                        .status
                        .push(format!("Category reference ignored: {}", failure));
                }
                Ok(Some(id))
            }
            None => {
                let reason = lookup.failures.pop().unwrap_or_else(|| {
                    ResolutionError::NotFound("no category reference resolved".to_string())
                });
                for failure in &lookup.failures {
                    outcome
                        .status
                        .push(format!("Category reference ignored: {}", failure));
                }
                Err(reason.into())
            }
        }
    }

    fn delete(
        &mut self,
        existing: Option<Course>,
        shortname: String,
        outcome: &mut RowOutcome,
    ) -> RowResult<()> {
        if !self.options.allow_deletes {
            return Err(RowError::DeleteNotAllowed.into());
        }
        let course = existing.ok_or(RowError::CourseNotFound(shortname))?;
        outcome.id = Some(course.id);

        if self.options.preview {
            outcome.status.push("Course will be deleted".to_string());
        } else {
            self.db.delete_course(course.id)?;
            info!("Deleted course {} '{}'", course.id, course.shortname);
            outcome.status.push("Course deleted".to_string());
        }
        self.totals.deleted += 1;
        Ok(())
    }

    fn create(
        &mut self,
        row: &CourseRow,
        shortname: String,
        category: Option<CategoryId>,
        outcome: &mut RowOutcome,
    ) -> RowResult<()> {
        let category = category.ok_or(RowError::CategoryRequired)?;
        let fullname = row
            .fullname
            .clone()
            .ok_or(RowError::MissingField("fullname"))?;

        let db = self.db;
        let mut idnumber = row.idnumber.clone();
        if let Some(current) = &row.idnumber {
            if db.course_idnumber_exists(current)? {
                if self.options.mode != ImportMode::CreateAll {
                    return Err(RowError::IdNumberInUse(current.clone()).into());
                }
                let renamed = increment_idnumber(current, |v| db.course_idnumber_exists(v))?;
                outcome.status.push(format!(
                    "ID number incremented from {} to {}",
                    current, renamed
                ));
                idnumber = Some(renamed);
            }
        }

        let data = CourseData {
            category: category.value(),
            shortname,
            fullname,
            idnumber,
            summary: row.summary.clone(),
        };
        outcome.fullname = data.fullname.clone();
        outcome.idnumber = data.idnumber.clone().unwrap_or_default();

        let enrolments = self.enrolments(row, outcome);
        let roles = self.role_names(row)?;

        if self.options.preview {
            outcome.status.push("Course will be created".to_string());
        } else {
            let id = self.db.insert_course(&data)?;
            self.db.upsert_enrolments(id, &enrolments)?;
            self.db.upsert_role_names(id, &roles)?;
            info!("Created course {} '{}'", id, data.shortname);
            outcome.id = Some(id);
            outcome.status.push("Course created".to_string());
        }
        self.totals.created += 1;
        Ok(())
    }

    fn update(
        &mut self,
        course: Course,
        row: &CourseRow,
        category: Option<CategoryId>,
        outcome: &mut RowOutcome,
    ) -> RowResult<()> {
        let idnumber = match &row.idnumber {
            Some(idnumber) => {
                if self
                    .db
                    .course_idnumber_owner(idnumber, Some(course.id))?
                    .is_some()
                {
                    return Err(RowError::IdNumberInUse(idnumber.clone()).into());
                }
                Some(idnumber.clone())
            }
            None => course.idnumber.clone(),
        };

        let data = CourseData {
            category: category.map(|c| c.value()).unwrap_or(course.category),
            shortname: course.shortname.clone(),
            fullname: row.fullname.clone().unwrap_or_else(|| course.fullname.clone()),
            idnumber,
            summary: row.summary.clone().or_else(|| course.summary.clone()),
        };
        outcome.id = Some(course.id);
        outcome.fullname = data.fullname.clone();
        outcome.idnumber = data.idnumber.clone().unwrap_or_default();

        let enrolments = self.enrolments(row, outcome);
        let roles = self.role_names(row)?;

        if self.options.preview {
            outcome.status.push("Course will be updated".to_string());
        } else {
            self.db.update_course(course.id, &data)?;
            self.db.upsert_enrolments(course.id, &enrolments)?;
            self.db.upsert_role_names(course.id, &roles)?;
            info!("Updated course {} '{}'", course.id, data.shortname);
            outcome.status.push("Course updated".to_string());
        }
        self.totals.updated += 1;
        Ok(())
    }

    fn enrolments(
        &self,
        row: &CourseRow,
        outcome: &mut RowOutcome,
    ) -> BTreeMap<String, BTreeMap<String, String>> {
        let data = enrolment_data(row.enrolments.clone(), &self.options.enrol_plugins);
        for method in &data.unknown {
            outcome
                .status
                .push(format!("Unknown enrolment method ignored: {}", method));
        }
        data.methods
    }

    fn role_names(&self, row: &CourseRow) -> RowResult<BTreeMap<i64, String>> {
        let names = role_names(&row.role_names, &self.roles);
        if !names.invalid.is_empty() {
            return Err(RowError::InvalidRoles(names.invalid.join(", ")).into());
        }
        Ok(names.names)
    }
}
