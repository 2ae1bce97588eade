use super::models::*;
use super::sqlite::Database;
use super::{CategoryStore, StoreError};
use crate::category::PATH_SEPARATOR;
use rusqlite::types::Type;
use rusqlite::{params, Error, OptionalExtension, Result, Row};
use std::collections::BTreeMap;
use tracing::debug;

const CATEGORY_COLUMNS: &str = "id, parent, name, idnumber, depth, path";
const COURSE_COLUMNS: &str = "id, category, shortname, fullname, idnumber, summary";

fn category_from_row(row: &Row) -> Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        parent: row.get(1)?,
        name: row.get(2)?,
        idnumber: row.get(3)?,
        depth: row.get(4)?,
        path: row.get(5)?,
    })
}

fn course_from_row(row: &Row) -> Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        category: row.get(1)?,
        shortname: row.get(2)?,
        fullname: row.get(3)?,
        idnumber: row.get(4)?,
        summary: row.get(5)?,
    })
}

impl Database {
    // ── Categories ───────────────────────────────────────────────

    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM course_category WHERE id = ?1", CATEGORY_COLUMNS),
                params![id],
                category_from_row,
            )
            .optional()
    }

    pub fn get_categories_by_name(&self, name: &str, parent: i64) -> Result<Vec<Category>> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {} FROM course_category WHERE name = ?1 AND parent = ?2 ORDER BY id",
            CATEGORY_COLUMNS
        ))?;
        let categories = stmt
            .query_map(params![name, parent], category_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(categories)
    }

    pub fn get_category_id_by_idnumber(&self, idnumber: &str) -> Result<Option<i64>> {
        self.connection()
            .query_row(
                "SELECT id FROM course_category WHERE idnumber = ?1",
                params![idnumber],
                |row| row.get(0),
            )
            .optional()
    }

    /// Insert a category under `parent` (0 for the top level), deriving its
    /// depth and id path from the parent row.
    pub fn insert_category(
        &self,
        name: &str,
        parent: i64,
        idnumber: Option<&str>,
    ) -> Result<Category> {
        let (depth, parent_path) = if parent == 0 {
            (1, String::new())
        } else {
            match self.get_category(parent)? {
                Some(p) => (p.depth + 1, p.path),
                None => return Err(rusqlite::Error::QueryReturnedNoRows),
            }
        };

        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.connection().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO course_category (parent, name, idnumber, depth, time_created) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![parent, name, idnumber, depth, now],
        )?;
        let id = tx.last_insert_rowid();
        let path = format!("{}/{}", parent_path, id);
        tx.execute(
            "UPDATE course_category SET path = ?1 WHERE id = ?2",
            params![path, id],
        )?;
        tx.commit()?;

        debug!("Inserted category {} '{}' under {}", id, name, parent);
        Ok(Category {
            id,
            parent,
            name: name.to_string(),
            idnumber: idnumber.map(str::to_string),
            depth,
            path,
        })
    }

    /// All categories with their flattened name paths, ordered by path.
    pub fn list_category_paths(&self) -> Result<Vec<(Category, String)>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM course_category ORDER BY depth, id",
            CATEGORY_COLUMNS
        ))?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<Result<Vec<_>>>()?;

        let mut names: BTreeMap<i64, String> = BTreeMap::new();
        let mut result = Vec::with_capacity(categories.len());
        for category in categories {
            let flattened = match names.get(&category.parent) {
                Some(parent) => format!("{}{}{}", parent, PATH_SEPARATOR, category.name),
                None => category.name.clone(),
            };
            names.insert(category.id, flattened.clone());
            result.push((category, flattened));
        }
        result.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(result)
    }

    // ── Courses ──────────────────────────────────────────────────

    pub fn get_course_by_shortname(&self, shortname: &str) -> Result<Option<Course>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM course WHERE shortname = ?1", COURSE_COLUMNS),
                params![shortname],
                course_from_row,
            )
            .optional()
    }

    pub fn course_shortname_exists(&self, shortname: &str) -> Result<bool> {
        self.connection().query_row(
            "SELECT EXISTS (SELECT 1 FROM course WHERE shortname = ?1)",
            params![shortname],
            |row| row.get(0),
        )
    }

    pub fn course_idnumber_exists(&self, idnumber: &str) -> Result<bool> {
        self.connection().query_row(
            "SELECT EXISTS (SELECT 1 FROM course WHERE idnumber = ?1)",
            params![idnumber],
            |row| row.get(0),
        )
    }

    /// Id of a course other than `exclude` that already uses `idnumber`.
    pub fn course_idnumber_owner(&self, idnumber: &str, exclude: Option<i64>) -> Result<Option<i64>> {
        self.connection()
            .query_row(
                "SELECT id FROM course WHERE idnumber = ?1 AND id <> ?2 LIMIT 1",
                params![idnumber, exclude.unwrap_or(0)],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn insert_course(&self, data: &CourseData) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO course \
             (category, shortname, fullname, idnumber, summary, time_created, time_modified) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                data.category,
                data.shortname,
                data.fullname,
                data.idnumber,
                data.summary,
                now
            ],
        )?;
        let id = self.connection().last_insert_rowid();
        debug!("Inserted course {} '{}'", id, data.shortname);
        Ok(id)
    }

    pub fn update_course(&self, id: i64, data: &CourseData) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "UPDATE course SET category = ?1, shortname = ?2, fullname = ?3, idnumber = ?4, \
             summary = ?5, time_modified = ?6 WHERE id = ?7",
            params![
                data.category,
                data.shortname,
                data.fullname,
                data.idnumber,
                data.summary,
                now,
                id
            ],
        )?;
        debug!("Updated course {}", id);
        Ok(())
    }

    pub fn delete_course(&self, id: i64) -> Result<()> {
        self.connection()
            .execute("DELETE FROM course WHERE id = ?1", params![id])?;
        debug!("Deleted course {}", id);
        Ok(())
    }

    pub fn count_courses(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM course", [], |row| row.get(0))
    }

    // ── Enrolment & Roles ────────────────────────────────────────

    /// Replace the options of each given enrolment method on a course.
    pub fn upsert_enrolments(
        &self,
        course: i64,
        methods: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO course_enrolment (course, method, options) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(course, method) DO UPDATE SET options = excluded.options",
            )?;
            for (method, options) in methods {
                let options_json = serde_json::to_string(options)
                    .map_err(|e| Error::ToSqlConversionFailure(Box::new(e)))?;
                count += stmt.execute(params![course, method, options_json])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn get_enrolments(&self, course: i64) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT method, options FROM course_enrolment WHERE course = ?1")?;
        let rows = stmt
            .query_map(params![course], |row| {
                let method: String = row.get(0)?;
                let options: String = row.get(1)?;
                let options = serde_json::from_str(&options)
                    .map_err(|e| Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
                Ok((method, options))
            })?
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(rows)
    }

    pub fn get_roles(&self) -> Result<Vec<Role>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT id, shortname, name FROM role ORDER BY id")?;
        let roles = stmt
            .query_map([], |row| {
                Ok(Role {
                    id: row.get(0)?,
                    shortname: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(roles)
    }

    pub fn upsert_role_names(&self, course: i64, names: &BTreeMap<i64, String>) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO course_role_name (course, role_id, name) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(course, role_id) DO UPDATE SET name = excluded.name",
            )?;
            for (role_id, name) in names {
                count += stmt.execute(params![course, role_id, name])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn get_role_names(&self, course: i64) -> Result<BTreeMap<i64, String>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT role_id, name FROM course_role_name WHERE course = ?1")?;
        let rows = stmt
            .query_map(params![course], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(rows)
    }
}

impl CategoryStore for Database {
    fn find_by_name_and_parent(&self, name: &str, parent: i64) -> Result<Vec<Category>, StoreError> {
        Ok(self.get_categories_by_name(name, parent)?)
    }

    fn find_by_idnumber(&self, idnumber: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.get_category_id_by_idnumber(idnumber)?)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<Category>, StoreError> {
        Ok(self.get_category(id)?)
    }

    fn create(&self, name: &str, parent: i64) -> Result<Category, StoreError> {
        Ok(self.insert_category(name, parent, None)?)
    }
}
