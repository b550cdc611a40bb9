//! SQLite-backed session and category storage.
//!
//! Stores completed study sessions and the user's category list, and
//! answers the statistics queries behind the stats commands. Time is kept
//! as RFC 3339 UTC text, so date bucketing can lean on string prefixes.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::StoreError;
use crate::session::{SessionRecord, SessionStore};

/// A stored session, as listed back out of the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: i64,
    pub duration_secs: u64,
    pub category: Option<String>,
    pub user: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_secs: u64,
    pub today_sessions: u64,
    pub today_secs: u64,
}

/// One calendar day's accumulated study time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub sessions: u64,
    pub total_secs: u64,
}

/// SQLite database for sessions and categories.
///
/// The connection sits behind a mutex so the database can be shared with
/// the blocking persistence task.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data_dir>/benkyo.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("benkyo.db");
        let conn = Connection::open(&path)
            .map_err(|source| StoreError::OpenFailed { path, source })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Locked)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                duration_secs INTEGER NOT NULL,
                category      TEXT,
                user          TEXT NOT NULL,
                completed_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS categories (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                name       TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_category ON sessions(category);",
        )?;
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Insert one completed session, returning its row id.
    pub fn record_session(&self, record: &SessionRecord) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (duration_secs, category, user, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.duration_secs,
                record.category,
                record.user.as_str(),
                record.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn stats_today(&self) -> Result<Stats, StoreError> {
        let conn = self.conn()?;
        let (today_sessions, today_secs) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM sessions
             WHERE completed_at >= ?1",
            params![today_start()],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        Ok(Stats {
            total_sessions: today_sessions,
            total_secs: today_secs,
            today_sessions,
            today_secs,
        })
    }

    pub fn stats_all(&self) -> Result<Stats, StoreError> {
        let conn = self.conn()?;
        let (total_sessions, total_secs) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_secs), 0) FROM sessions",
            [],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        let (today_sessions, today_secs) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM sessions
             WHERE completed_at >= ?1",
            params![today_start()],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        Ok(Stats {
            total_sessions,
            total_secs,
            today_sessions,
            today_secs,
        })
    }

    /// Per-day totals for the last `days` days, oldest first. Days without
    /// sessions are absent from the result.
    pub fn daily_totals(&self, days: u32) -> Result<Vec<DayTotal>, StoreError> {
        let cutoff = (Utc::now() - chrono::Duration::days(i64::from(days))).to_rfc3339();
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT substr(completed_at, 1, 10) AS day,
                    COUNT(*),
                    COALESCE(SUM(duration_secs), 0)
             FROM sessions
             WHERE completed_at >= ?1
             GROUP BY day
             ORDER BY day",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut totals = Vec::new();
        for row in rows {
            let (day, sessions, total_secs) = row?;
            let date = day
                .parse::<NaiveDate>()
                .map_err(|e| StoreError::QueryFailed(format!("bad stored date '{day}': {e}")))?;
            totals.push(DayTotal {
                date,
                sessions,
                total_secs,
            });
        }
        Ok(totals)
    }

    /// Most recent sessions, newest first.
    pub fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionRow>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, duration_secs, category, user, completed_at
             FROM sessions
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, duration_secs, category, user, completed_at) = row?;
            let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                .map_err(|e| {
                    StoreError::QueryFailed(format!("bad stored timestamp '{completed_at}': {e}"))
                })?
                .with_timezone(&Utc);
            sessions.push(SessionRow {
                id,
                duration_secs,
                category,
                user,
                completed_at,
            });
        }
        Ok(sessions)
    }

    // ── Categories ───────────────────────────────────────────────────

    /// Add a category. Names are unique; duplicates are rejected by the
    /// schema.
    pub fn add_category(&self, name: &str) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }

    /// Remove a category by name. Returns whether anything was deleted.
    /// Sessions recorded under the name keep their label.
    pub fn remove_category(&self, name: &str) -> Result<bool, StoreError> {
        let n = self
            .conn()?
            .execute("DELETE FROM categories WHERE name = ?1", params![name])?;
        Ok(n > 0)
    }
}

impl SessionStore for Database {
    fn persist_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.record_session(record).map(|_| ())
    }
}

fn today_start() -> String {
    format!("{}T00:00:00+00:00", Utc::now().format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UserHandle;

    fn record(
        duration_secs: u64,
        category: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> SessionRecord {
        SessionRecord {
            duration_secs,
            category: category.map(str::to_string),
            user: UserHandle::new("mio"),
            completed_at,
        }
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        db.record_session(&record(1500, Some("math"), Utc::now()))
            .unwrap();
        let stats = db.stats_all().unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.total_secs, 1500);
        assert_eq!(stats.today_sessions, 1);
    }

    #[test]
    fn stats_today_excludes_older_sessions() {
        let db = Database::open_memory().unwrap();
        db.record_session(&record(600, None, Utc::now())).unwrap();
        db.record_session(&record(900, None, Utc::now() - chrono::Duration::days(3)))
            .unwrap();

        let today = db.stats_today().unwrap();
        assert_eq!(today.today_sessions, 1);
        assert_eq!(today.today_secs, 600);

        let all = db.stats_all().unwrap();
        assert_eq!(all.total_sessions, 2);
        assert_eq!(all.total_secs, 1500);
    }

    #[test]
    fn daily_totals_group_by_day_oldest_first() {
        let db = Database::open_memory().unwrap();
        let yesterday = Utc::now() - chrono::Duration::days(1);
        db.record_session(&record(60, None, yesterday)).unwrap();
        db.record_session(&record(120, None, Utc::now())).unwrap();
        db.record_session(&record(180, None, Utc::now())).unwrap();

        let totals = db.daily_totals(7).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].total_secs, 60);
        assert_eq!(totals[0].sessions, 1);
        assert_eq!(totals[1].total_secs, 300);
        assert_eq!(totals[1].sessions, 2);
        assert!(totals[0].date < totals[1].date);
    }

    #[test]
    fn recent_sessions_newest_first() {
        let db = Database::open_memory().unwrap();
        let earlier = Utc::now() - chrono::Duration::minutes(90);
        db.record_session(&record(100, Some("math"), earlier))
            .unwrap();
        db.record_session(&record(200, None, Utc::now())).unwrap();

        let sessions = db.recent_sessions(10).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].duration_secs, 200);
        assert_eq!(sessions[1].duration_secs, 100);
        assert_eq!(sessions[1].category.as_deref(), Some("math"));

        let limited = db.recent_sessions(1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].duration_secs, 200);
    }

    #[test]
    fn categories_are_unique() {
        let db = Database::open_memory().unwrap();
        db.add_category("math").unwrap();
        db.add_category("english").unwrap();
        assert!(db.add_category("math").is_err());

        let names: Vec<_> = db
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["english", "math"]);
    }

    #[test]
    fn remove_category_reports_whether_it_existed() {
        let db = Database::open_memory().unwrap();
        db.add_category("math").unwrap();
        assert!(db.remove_category("math").unwrap());
        assert!(!db.remove_category("math").unwrap());
        assert!(db.list_categories().unwrap().is_empty());
    }

    #[test]
    fn persists_sessions_through_the_store_trait() {
        let db = Database::open_memory().unwrap();
        let store: &dyn SessionStore = &db;
        store
            .persist_session(&record(42, Some("math"), Utc::now()))
            .unwrap();
        assert_eq!(db.stats_all().unwrap().total_sessions, 1);
    }
}
