use rusqlite::{Connection, Result};
use tracing::{debug, info, warn};

pub const SCHEMA_VERSION: i64 = 1;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        debug!("Opened course database at {}", path);
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, foreign keys on)");
        Ok(())
    }

    /// Create the tables and seed the standard roles on a fresh database.
    /// A database already at `SCHEMA_VERSION` is left untouched.
    fn migrate_schema(&self) -> Result<()> {
        let version = self.schema_version()?;
        if version >= SCHEMA_VERSION {
            if version > SCHEMA_VERSION {
                warn!(
                    "Database schema version {} is newer than {}",
                    version, SCHEMA_VERSION
                );
            }
            debug!("SQLite schema is current (version {})", version);
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(include_str!("schema.sql"))?;
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tx.commit()?;
        info!(
            "SQLite schema migrated from version {} to {}",
            version, SCHEMA_VERSION
        );
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i64> {
        self.conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Remove all courses and categories. Roles are kept.
    pub fn truncate_all(&self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM course_role_name;
             DELETE FROM course_enrolment;
             DELETE FROM course;
             DELETE FROM course_category;",
        )?;
        debug!("All tables truncated");
        Ok(())
    }
}
