use chrono::Local;
use directories::ProjectDirs;
use rand::seq::SliceRandom;
use rusqlite::{params, Connection, OptionalExtension};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::passages::{self, Difficulty};
use crate::session::{ReferenceText, ResultRecord};

/// Backend-agnostic error carried across the store boundary. Callers see a
/// message, never the underlying driver error.
#[derive(Debug)]
pub enum StoreError {
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(msg) => write!(f, "store backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
}

/// Fields of a user row that may change after creation. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub id: i64,
    pub user_id: i64,
    pub text_id: i64,
    pub wpm: f64,
    pub accuracy: f64,
    pub mistakes: i64,
    pub duration: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub username: String,
    pub wpm: f64,
    pub accuracy: f64,
}

/// The persistence capabilities the rest of the crate depends on. Any
/// relational or key-value backend can satisfy this.
pub trait Store {
    fn create_user(
        &self,
        username: &str,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<UserRecord, StoreError>;
    fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
    fn list_users(&self) -> Result<Vec<UserRecord>, StoreError>;
    fn update_user(&self, id: i64, update: &UserUpdate) -> Result<Option<UserRecord>, StoreError>;
    fn delete_user(&self, id: i64) -> Result<bool, StoreError>;

    fn add_text(&self, content: &str, difficulty: Difficulty) -> Result<ReferenceText, StoreError>;
    fn random_text(&self, difficulty: Difficulty) -> Result<Option<ReferenceText>, StoreError>;

    fn insert_result(&self, record: &ResultRecord) -> Result<StoredResult, StoreError>;
    fn results_for_user(&self, user_id: i64) -> Result<Vec<StoredResult>, StoreError>;
    fn best_result_for_user(&self, user_id: i64) -> Result<Option<StoredResult>, StoreError>;
    fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

/// SQLite-backed store.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store at `path` and seed the passage table if
    /// it is empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("failed to create store directory: {e}")))?;
        }
        let conn = Connection::open(path)?;
        let store = SqliteStore { conn };
        store.init_schema()?;
        store.seed_default_passages()?;
        Ok(store)
    }

    /// In-memory store for tests and throwaway sessions. Not seeded; call
    /// [`SqliteStore::seed_default_passages`] when passages are wanted.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Database file path under $HOME/.local/state/typemaster
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("typemaster");
            Some(state_dir.join("store.db"))
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", "typemaster") {
            Some(proj_dirs.data_local_dir().join("store.db"))
        } else {
            None
        }
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                full_name TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS texts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                text_id INTEGER NOT NULL,
                wpm REAL NOT NULL,
                accuracy REAL NOT NULL,
                mistakes INTEGER NOT NULL,
                duration REAL NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_texts_difficulty ON texts(difficulty)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_results_user ON results(user_id)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_results_wpm ON results(wpm)",
            [],
        )?;

        Ok(())
    }

    /// Insert the embedded passage sets if the texts table is empty.
    /// Returns the number of rows inserted.
    pub fn seed_default_passages(&self) -> Result<usize, StoreError> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM texts", [], |row| row.get(0))?;
        if existing > 0 {
            return Ok(0);
        }

        let mut inserted = 0;
        for (difficulty, content) in passages::seed_passages() {
            self.conn.execute(
                "INSERT INTO texts (content, difficulty, created_at) VALUES (?1, ?2, ?3)",
                params![content, difficulty.to_string(), Local::now().to_rfc3339()],
            )?;
            inserted += 1;
        }
        Ok(inserted)
    }

    fn user_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, email, full_name FROM users WHERE id = ?1",
                [id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn text_by_id(&self, id: i64) -> Result<Option<ReferenceText>, StoreError> {
        let text = self
            .conn
            .query_row(
                "SELECT id, content, difficulty FROM texts WHERE id = ?1",
                [id],
                row_to_text,
            )
            .optional()?;
        Ok(text)
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
    })
}

fn row_to_text(row: &rusqlite::Row) -> rusqlite::Result<ReferenceText> {
    let raw: String = row.get(2)?;
    let difficulty = Difficulty::parse(&raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, "difficulty".to_string(), rusqlite::types::Type::Text)
    })?;
    Ok(ReferenceText {
        id: row.get(0)?,
        content: row.get(1)?,
        difficulty,
    })
}

fn row_to_result(row: &rusqlite::Row) -> rusqlite::Result<StoredResult> {
    Ok(StoredResult {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text_id: row.get(2)?,
        wpm: row.get(3)?,
        accuracy: row.get(4)?,
        mistakes: row.get(5)?,
        duration: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Store for SqliteStore {
    fn create_user(
        &self,
        username: &str,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<UserRecord, StoreError> {
        self.conn.execute(
            "INSERT INTO users (username, email, full_name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username, email, full_name, Local::now().to_rfc3339()],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(UserRecord {
            id,
            username: username.to_string(),
            email: email.to_string(),
            full_name: full_name.map(str::to_string),
        })
    }

    fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, email, full_name FROM users WHERE username = ?1",
                [username],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, email, full_name FROM users ORDER BY username")?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    fn update_user(&self, id: i64, update: &UserUpdate) -> Result<Option<UserRecord>, StoreError> {
        let affected = self.conn.execute(
            r#"
            UPDATE users
            SET email = COALESCE(?1, email),
                full_name = COALESCE(?2, full_name)
            WHERE id = ?3
            "#,
            params![update.email, update.full_name, id],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        self.user_by_id(id)
    }

    fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let affected = self.conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    fn add_text(&self, content: &str, difficulty: Difficulty) -> Result<ReferenceText, StoreError> {
        self.conn.execute(
            "INSERT INTO texts (content, difficulty, created_at) VALUES (?1, ?2, ?3)",
            params![content, difficulty.to_string(), Local::now().to_rfc3339()],
        )?;
        Ok(ReferenceText {
            id: self.conn.last_insert_rowid(),
            content: content.to_string(),
            difficulty,
        })
    }

    fn random_text(&self, difficulty: Difficulty) -> Result<Option<ReferenceText>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM texts WHERE difficulty = ?1")?;
        let ids = stmt
            .query_map([difficulty.to_string()], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        match ids.choose(&mut rand::thread_rng()) {
            Some(&id) => self.text_by_id(id),
            None => Ok(None),
        }
    }

    fn insert_result(&self, record: &ResultRecord) -> Result<StoredResult, StoreError> {
        let created_at = Local::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO results (user_id, text_id, wpm, accuracy, mistakes, duration, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.user_id,
                record.text_id,
                record.wpm,
                record.accuracy,
                record.mistakes as i64,
                record.duration,
                created_at,
            ],
        )?;
        Ok(StoredResult {
            id: self.conn.last_insert_rowid(),
            user_id: record.user_id,
            text_id: record.text_id,
            wpm: record.wpm,
            accuracy: record.accuracy,
            mistakes: record.mistakes as i64,
            duration: record.duration,
            created_at,
        })
    }

    fn results_for_user(&self, user_id: i64) -> Result<Vec<StoredResult>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, text_id, wpm, accuracy, mistakes, duration, created_at
            FROM results
            WHERE user_id = ?1
            ORDER BY created_at DESC
            "#,
        )?;
        let results = stmt
            .query_map([user_id], row_to_result)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    fn best_result_for_user(&self, user_id: i64) -> Result<Option<StoredResult>, StoreError> {
        let best = self
            .conn
            .query_row(
                r#"
                SELECT id, user_id, text_id, wpm, accuracy, mistakes, duration, created_at
                FROM results
                WHERE user_id = ?1
                ORDER BY wpm DESC
                LIMIT 1
                "#,
                [user_id],
                row_to_result,
            )
            .optional()?;
        Ok(best)
    }

    fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT u.username, r.wpm, r.accuracy
            FROM results r
            JOIN users u ON u.id = r.user_id
            ORDER BY r.wpm DESC
            LIMIT ?1
            "#,
        )?;
        let entries = stmt
            .query_map([limit as i64], |row| {
                Ok(LeaderboardEntry {
                    username: row.get(0)?,
                    wpm: row.get(1)?,
                    accuracy: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

/// Write a result history as CSV.
pub fn write_results_csv<W: std::io::Write>(
    results: &[StoredResult],
    writer: W,
) -> Result<usize, StoreError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["date", "wpm", "accuracy", "mistakes", "duration_secs"])?;
    for result in results {
        csv_writer.write_record([
            result.created_at.clone(),
            format!("{:.2}", result.wpm),
            format!("{:.2}", result.accuracy),
            result.mistakes.to_string(),
            format!("{:.2}", result.duration),
        ])?;
    }
    csv_writer
        .flush()
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok(results.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: i64, text_id: i64, wpm: f64) -> ResultRecord {
        ResultRecord {
            user_id,
            text_id,
            wpm,
            accuracy: 95.0,
            mistakes: 2,
            duration: 30.0,
        }
    }

    #[test]
    fn test_create_and_find_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store
            .create_user("ada", "ada@example.com", Some("Ada Lovelace"))
            .unwrap();
        assert!(user.id > 0);

        let found = store.find_user("ada").unwrap().unwrap();
        assert_eq!(found, user);
        assert!(store.find_user("nobody").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_is_a_backend_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_user("ada", "a@example.com", None).unwrap();
        let err = store.create_user("ada", "b@example.com", None);
        assert!(err.is_err());
    }

    #[test]
    fn test_list_users_ordered_by_username() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_user("zed", "z@example.com", None).unwrap();
        store.create_user("ada", "a@example.com", None).unwrap();

        let users = store.list_users().unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["ada", "zed"]);
    }

    #[test]
    fn test_update_user_partial_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store
            .create_user("ada", "old@example.com", Some("Ada"))
            .unwrap();

        let updated = store
            .update_user(
                user.id,
                &UserUpdate {
                    email: Some("new@example.com".into()),
                    full_name: None,
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.full_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_update_missing_user_returns_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        let outcome = store.update_user(999, &UserUpdate::default()).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_delete_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.create_user("ada", "a@example.com", None).unwrap();
        assert!(store.delete_user(user.id).unwrap());
        assert!(!store.delete_user(user.id).unwrap());
    }

    #[test]
    fn test_add_and_fetch_random_text() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_text("only passage", Difficulty::Medium).unwrap();

        let text = store.random_text(Difficulty::Medium).unwrap().unwrap();
        assert_eq!(text.content, "only passage");
        assert_eq!(text.difficulty, Difficulty::Medium);

        assert!(store.random_text(Difficulty::Hard).unwrap().is_none());
    }

    #[test]
    fn test_random_text_respects_difficulty() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_text("an easy one", Difficulty::Easy).unwrap();
        store.add_text("a hard one", Difficulty::Hard).unwrap();

        for _ in 0..10 {
            let text = store.random_text(Difficulty::Easy).unwrap().unwrap();
            assert_eq!(text.difficulty, Difficulty::Easy);
        }
    }

    #[test]
    fn test_seed_default_passages_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.seed_default_passages().unwrap();
        assert!(first > 0);
        // a second seed is a no-op
        assert_eq!(store.seed_default_passages().unwrap(), 0);

        for d in Difficulty::ALL {
            assert!(store.random_text(d).unwrap().is_some());
        }
    }

    #[test]
    fn test_insert_and_list_results() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.create_user("ada", "a@example.com", None).unwrap();
        let text = store.add_text("passage", Difficulty::Easy).unwrap();

        let stored = store.insert_result(&record(user.id, text.id, 61.5)).unwrap();
        assert!(stored.id > 0);
        assert_eq!(stored.wpm, 61.5);

        let history = store.results_for_user(user.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].mistakes, 2);
    }

    #[test]
    fn test_best_result_for_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.create_user("ada", "a@example.com", None).unwrap();
        let text = store.add_text("passage", Difficulty::Easy).unwrap();

        assert!(store.best_result_for_user(user.id).unwrap().is_none());

        store.insert_result(&record(user.id, text.id, 40.0)).unwrap();
        store.insert_result(&record(user.id, text.id, 72.0)).unwrap();
        store.insert_result(&record(user.id, text.id, 55.0)).unwrap();

        let best = store.best_result_for_user(user.id).unwrap().unwrap();
        assert_eq!(best.wpm, 72.0);
    }

    #[test]
    fn test_leaderboard_ordering_and_limit() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = store.add_text("passage", Difficulty::Easy).unwrap();

        for (name, wpm) in [("ada", 80.0), ("zed", 95.0), ("kim", 60.0)] {
            let user = store
                .create_user(name, &format!("{name}@example.com"), None)
                .unwrap();
            store.insert_result(&record(user.id, text.id, wpm)).unwrap();
        }

        let board = store.leaderboard(2).unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].username, "zed");
        assert_eq!(board[1].username, "ada");
    }

    #[test]
    fn test_csv_export() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.create_user("ada", "a@example.com", None).unwrap();
        let text = store.add_text("passage", Difficulty::Easy).unwrap();
        store.insert_result(&record(user.id, text.id, 50.0)).unwrap();

        let mut out = Vec::new();
        let count = write_results_csv(&store.results_for_user(user.id).unwrap(), &mut out).unwrap();
        assert_eq!(count, 1);

        let csv = String::from_utf8(out).unwrap();
        assert!(csv.starts_with("date,wpm,accuracy,mistakes,duration_secs"));
        assert!(csv.contains("50.00"));
    }
}
