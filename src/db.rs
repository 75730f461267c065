use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::TrackerError;
use crate::models::{Application, ApplicationDraft};
use crate::query::{Direction, SortKey};
use crate::store::ApplicationStore;

const SELECT_COLUMNS: &str = "SELECT id, company, position, status, date_applied, follow_up_date,
            url, cv_url, cover_letter_url, notes, created_at, updated_at
     FROM applications";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened database");
        Ok(Self { conn, path: path.to_path_buf() })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn, path: PathBuf::from(":memory:") };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("SUIVI_DB") {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "suivi") {
            Ok(proj_dirs.data_dir().join("suivi.db"))
        } else {
            Ok(PathBuf::from("suivi.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company TEXT NOT NULL CHECK (length(trim(company)) > 0),
                position TEXT NOT NULL CHECK (length(trim(position)) > 0),
                status TEXT NOT NULL DEFAULT 'applied' CHECK (status IN ('applied', 'interview', 'offer', 'rejected')),
                date_applied TEXT NOT NULL DEFAULT (date('now')),
                follow_up_date TEXT,
                url TEXT,
                cv_url TEXT,
                cover_letter_url TEXT,
                notes TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
            CREATE INDEX IF NOT EXISTS idx_applications_date_applied ON applications(date_applied);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'suivi init' first."));
        }
        Ok(())
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
        Ok(Application {
            id: row.get(0)?,
            company: row.get(1)?,
            position: row.get(2)?,
            status: row.get(3)?,
            date_applied: row.get(4)?,
            follow_up_date: row.get(5)?,
            url: row.get(6)?,
            cv_url: row.get(7)?,
            cover_letter_url: row.get(8)?,
            notes: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl ApplicationStore for Database {
    fn list(&self, order_by: SortKey, direction: Direction) -> Result<Vec<Application>, TrackerError> {
        // Column and direction come from closed enums, never from user text.
        let sql = format!(
            "{} ORDER BY {} {}, id {}",
            SELECT_COLUMNS,
            order_by.column(),
            direction.sql(),
            direction.sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_application)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get(&self, id: i64) -> Result<Application, TrackerError> {
        self.conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                [id],
                Self::row_to_application,
            )
            .optional()?
            .ok_or(TrackerError::NotFound(id))
    }

    fn create(&self, draft: &ApplicationDraft) -> Result<Application, TrackerError> {
        draft.validate()?;
        self.conn.execute(
            "INSERT INTO applications (company, position, status, date_applied, follow_up_date,
                                       url, cv_url, cover_letter_url, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                draft.company,
                draft.position,
                draft.status,
                draft.date_applied,
                draft.follow_up_date,
                draft.url,
                draft.cv_url,
                draft.cover_letter_url,
                draft.notes,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, company = %draft.company, "inserted application");
        self.get(id)
    }

    fn update(&self, id: i64, draft: &ApplicationDraft) -> Result<Application, TrackerError> {
        draft.validate()?;
        let changed = self.conn.execute(
            "UPDATE applications
             SET company = ?1, position = ?2, status = ?3, date_applied = ?4, follow_up_date = ?5,
                 url = ?6, cv_url = ?7, cover_letter_url = ?8, notes = ?9,
                 updated_at = datetime('now')
             WHERE id = ?10",
            params![
                draft.company,
                draft.position,
                draft.status,
                draft.date_applied,
                draft.follow_up_date,
                draft.url,
                draft.cv_url,
                draft.cover_letter_url,
                draft.notes,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::NotFound(id));
        }
        self.get(id)
    }

    fn delete(&self, id: i64) -> Result<(), TrackerError> {
        let changed = self.conn.execute("DELETE FROM applications WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(TrackerError::NotFound(id));
        }
        Ok(())
    }
}
