use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::{debug, warn};

/// Separator between the storage JSON and the cookie string in export files.
pub(crate) const EXPORT_DELIMITER: &str = "\n\n|\n\n";

#[derive(Error, Debug)]
pub(crate) enum StorageError {
    #[error("storage db: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage dir: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) fn storage_db_path(workspace: &Path) -> PathBuf {
    workspace.join("storage.sqlite")
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ImportReport {
    pub(crate) keys: usize,
    pub(crate) cookies: usize,
    /// Set when the storage section could not be parsed; cookies still apply.
    pub(crate) storage_error: Option<String>,
}

/// Persisted local state: a key/value store plus a cookie jar.
pub(crate) struct StateStore {
    conn: Connection,
}

impl StateStore {
    pub(crate) fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS cookies (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    pub(crate) fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM local_storage WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn items(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM local_storage ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = BTreeMap::new();
        for row in rows {
            let (key, value): (String, String) = row?;
            out.insert(key, value);
        }
        Ok(out)
    }

    /// Same semantics as assigning one `name=value` piece to a document cookie.
    pub(crate) fn assign_cookie(&self, piece: &str) -> Result<(), StorageError> {
        let piece = piece.trim();
        if piece.is_empty() {
            return Ok(());
        }
        let (name, value) = piece.split_once('=').unwrap_or(("", piece));
        self.conn.execute(
            "INSERT INTO cookies (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![name.trim(), value],
        )?;
        Ok(())
    }

    /// Cookies in assignment order, formatted like a cookie header.
    pub(crate) fn cookie_string(&self) -> Result<String, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM cookies ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok(if name.is_empty() {
                value
            } else {
                format!("{name}={value}")
            })
        })?;
        let mut pieces = Vec::new();
        for row in rows {
            pieces.push(row?);
        }
        Ok(pieces.join("; "))
    }

    pub(crate) fn export_blob(&self) -> Result<String, StorageError> {
        let storage = serde_json::to_string(&self.items()?)?;
        Ok(format!("{storage}{EXPORT_DELIMITER}{}", self.cookie_string()?))
    }

    /// Replay an export. A malformed storage section is logged and skipped.
    pub(crate) fn import_blob(&self, content: &str) -> Result<ImportReport, StorageError> {
        let mut parts = content.split(EXPORT_DELIMITER);
        let storage_part = parts.next().unwrap_or_default();
        let cookie_part = parts.next().unwrap_or_default();
        let mut report = ImportReport::default();

        match serde_json::from_str::<serde_json::Value>(storage_part) {
            Ok(serde_json::Value::Object(map)) => {
                for (key, value) in map {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    self.set_item(&key, &value)?;
                    report.keys += 1;
                }
            }
            Ok(other) => {
                debug!(kind = %json_kind(&other), "[storage] import section is not an object");
            }
            Err(err) => {
                warn!("[storage] import: unreadable storage section: {err}");
                report.storage_error = Some(err.to_string());
            }
        }

        if !cookie_part.is_empty() {
            for piece in cookie_part.split("; ") {
                self.assign_cookie(piece)?;
                report.cookies += 1;
            }
        }
        Ok(report)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> StateStore {
        let store = StateStore::open_in_memory().unwrap();
        store.set_item("highscore", "1200").unwrap();
        store.set_item("player", "{\"name\":\"ann\"}").unwrap();
        store.assign_cookie("session=abc").unwrap();
        store.assign_cookie("theme=dark").unwrap();
        store
    }

    #[test]
    fn export_format_is_json_then_cookies() {
        let blob = seeded().export_blob().unwrap();
        assert_eq!(
            blob,
            "{\"highscore\":\"1200\",\"player\":\"{\\\"name\\\":\\\"ann\\\"}\"}\n\n|\n\nsession=abc; theme=dark"
        );
    }

    #[test]
    fn export_then_import_round_trips() {
        let source = seeded();
        let blob = source.export_blob().unwrap();

        let target = StateStore::open_in_memory().unwrap();
        let report = target.import_blob(&blob).unwrap();
        assert_eq!(report.keys, 2);
        assert_eq!(report.cookies, 2);
        assert!(report.storage_error.is_none());
        assert_eq!(target.items().unwrap(), source.items().unwrap());
        assert_eq!(target.cookie_string().unwrap(), source.cookie_string().unwrap());
    }

    #[test]
    fn import_overwrites_existing_keys() {
        let store = seeded();
        store
            .import_blob("{\"highscore\":\"3000\",\"level\":4}\n\n|\n\nsession=xyz")
            .unwrap();
        assert_eq!(store.get_item("highscore").unwrap().as_deref(), Some("3000"));
        assert_eq!(store.get_item("level").unwrap().as_deref(), Some("4"));
        assert_eq!(store.cookie_string().unwrap(), "session=xyz; theme=dark");
    }

    #[test]
    fn malformed_storage_still_applies_cookies() {
        let store = StateStore::open_in_memory().unwrap();
        let report = store.import_blob("{broken\n\n|\n\na=1; b=2").unwrap();
        assert!(report.storage_error.is_some());
        assert_eq!(report.keys, 0);
        assert_eq!(report.cookies, 2);
        assert_eq!(store.cookie_string().unwrap(), "a=1; b=2");
    }

    #[test]
    fn missing_cookie_section_is_fine() {
        let store = StateStore::open_in_memory().unwrap();
        let report = store.import_blob("{\"k\":\"v\"}").unwrap();
        assert_eq!(report.keys, 1);
        assert_eq!(report.cookies, 0);
        assert_eq!(store.cookie_string().unwrap(), "");
    }

    #[test]
    fn empty_store_exports_empty_sections() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.export_blob().unwrap(), "{}\n\n|\n\n");
        let report = store.import_blob("{}\n\n|\n\n").unwrap();
        assert_eq!(report, ImportReport::default());
    }

    #[test]
    fn nameless_cookie_keeps_value() {
        let store = StateStore::open_in_memory().unwrap();
        store.assign_cookie("standalone").unwrap();
        store.assign_cookie("k=v=w").unwrap();
        assert_eq!(store.cookie_string().unwrap(), "standalone; k=v=w");
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = storage_db_path(dir.path());
        {
            let store = StateStore::open(&path).unwrap();
            store.set_item("a", "1").unwrap();
        }
        let store = StateStore::open(&path).unwrap();
        assert_eq!(store.get_item("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn unusable_workspace_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let err = StateStore::open(&storage_db_path(&blocker)).err().unwrap();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
