use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use super::LedgerStore;
use crate::source::{MediaType, Source};

/// A single `(source, media_type, id)` membership set backed by SQLite.
/// `rusqlite`'s `Connection` is `!Sync`, so access is serialized behind
/// a `Mutex` — writes are small and infrequent (spec.md §5: "writes are
/// small and serialized through the backing store's own transaction
/// discipline").
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                source TEXT NOT NULL,
                media_type TEXT NOT NULL,
                id TEXT NOT NULL,
                UNIQUE(source, media_type, id)
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl LedgerStore for SqliteStore {
    fn contains(&self, source: Source, media_type: MediaType, id: &str) -> bool {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT 1 FROM items WHERE source = ?1 AND media_type = ?2 AND id = ?3",
            rusqlite::params![source.as_str(), media_type.as_str(), id],
            |_| Ok(()),
        )
        .is_ok()
    }

    fn mark(&self, source: Source, media_type: MediaType, id: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO items (source, media_type, id) VALUES (?1, ?2, ?3)",
            rusqlite::params![source.as_str(), media_type.as_str(), id],
        )
        .ok();
    }
}
