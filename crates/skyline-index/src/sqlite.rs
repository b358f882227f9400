use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{IndexError, IndexResult};
use crate::row::{FeedCursor, InsertOutcome, PostRow};
use crate::traits::PostIndex;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    uri         TEXT PRIMARY KEY,
    cid         TEXT NOT NULL,
    replyParent TEXT,
    replyRoot   TEXT,
    indexedAt   TEXT NOT NULL,
    text        TEXT NOT NULL,
    createdAt   TEXT
);
CREATE INDEX IF NOT EXISTS posts_created_at ON posts (createdAt);
CREATE INDEX IF NOT EXISTS posts_indexed_at ON posts (indexedAt);
"#;

const COLUMNS: &str = "uri, cid, replyParent, replyRoot, indexedAt, text, createdAt";

/// SQLite-backed post index.
///
/// One connection shared behind a mutex: the index worker writes through it
/// and HTTP handlers read through it.
pub struct SqlitePostIndex {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqlitePostIndex {
    /// Open or create the database at `path`.
    pub fn open(path: &Path, busy_timeout: Duration) -> IndexResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        // WAL lets feed reads proceed while the index worker writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(busy_timeout)?;
        info!(path = %path.display(), "opened post index");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> IndexResult<Self> {
        debug!("opening in-memory post index");
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| IndexError::Poisoned)
    }
}

impl std::fmt::Debug for SqlitePostIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePostIndex")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn insert(conn: &Connection, row: &PostRow) -> rusqlite::Result<InsertOutcome> {
    let changed = conn
        .prepare_cached(
            "INSERT INTO posts (uri, cid, replyParent, replyRoot, indexedAt, text, createdAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(uri) DO NOTHING",
        )?
        .execute(params![
            row.uri,
            row.cid,
            row.reply_parent,
            row.reply_root,
            row.indexed_at,
            row.text,
            row.created_at,
        ])?;
    Ok(if changed == 0 {
        InsertOutcome::AlreadyIndexed
    } else {
        InsertOutcome::Inserted
    })
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        uri: row.get(0)?,
        cid: row.get(1)?,
        reply_parent: row.get(2)?,
        reply_root: row.get(3)?,
        indexed_at: row.get(4)?,
        text: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl PostIndex for SqlitePostIndex {
    fn migrate(&self) -> IndexResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        debug!("post index schema ready");
        Ok(())
    }

    fn insert_if_absent(&self, row: &PostRow) -> IndexResult<InsertOutcome> {
        let conn = self.conn()?;
        Ok(insert(&conn, row)?)
    }

    fn insert_batch(&self, rows: &[PostRow]) -> IndexResult<Vec<InsertOutcome>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let outcomes = rows
            .iter()
            .map(|row| insert(&tx, row))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(outcomes)
    }

    fn get(&self, uri: &str) -> IndexResult<Option<PostRow>> {
        let conn = self.conn()?;
        let row = conn
            .prepare_cached(&format!("SELECT {COLUMNS} FROM posts WHERE uri = ?1"))?
            .query_row([uri], read_row)
            .optional()?;
        Ok(row)
    }

    fn latest(&self, limit: usize, before: Option<&FeedCursor>) -> IndexResult<Vec<PostRow>> {
        let conn = self.conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match before {
            Some(cursor) => conn
                .prepare_cached(&format!(
                    "SELECT {COLUMNS} FROM posts
                     WHERE indexedAt < ?1 OR (indexedAt = ?1 AND uri < ?2)
                     ORDER BY indexedAt DESC, uri DESC
                     LIMIT ?3"
                ))?
                .query_map(params![cursor.indexed_at, cursor.uri, limit], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => conn
                .prepare_cached(&format!(
                    "SELECT {COLUMNS} FROM posts
                     ORDER BY indexedAt DESC, uri DESC
                     LIMIT ?1"
                ))?
                .query_map([limit], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }

    fn count(&self) -> IndexResult<u64> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}
