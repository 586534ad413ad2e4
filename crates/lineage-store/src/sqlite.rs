//! SQLite-backed [`MetadataSource`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use lineage_core::{MetadataError, Result};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use tracing::debug;

use crate::source::{Bind, MetadataSource, RecordSet};

impl ToSql for Bind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            Self::Int(v) => v.to_sql(),
            Self::Double(v) => v.to_sql(),
            Self::Text(v) => v.to_sql(),
        }
    }
}

/// A [`MetadataSource`] over a shared `rusqlite` connection.
///
/// The connection is wrapped in `Arc<Mutex<..>>` so clones of the source
/// observe the same database and the same transaction state; tests use a
/// clone to inspect or corrupt the store out-of-band.
#[derive(Debug, Clone)]
pub struct SqliteMetadataSource {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataSource {
    /// Opens an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Internal`] if SQLite fails to initialize.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MetadataError::Internal(format!("failed to open in-memory db: {e}")))?;
        Ok(Self::from_connection(conn))
    }

    /// Opens (or creates) a database file.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Internal`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            MetadataError::Internal(format!("failed to open '{}': {e}", path.display()))
        })?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an existing connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MetadataError::Internal("connection lock poisoned".to_string()))
    }
}

/// Maps a driver error onto the store taxonomy. Uniqueness violations
/// become `AlreadyExists`; everything else is `Internal`.
fn map_engine_error(err: &rusqlite::Error) -> MetadataError {
    if let rusqlite::Error::SqliteFailure(failure, _) = err {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return MetadataError::AlreadyExists(format!("uniqueness violation: {err}"));
        }
    }
    MetadataError::Internal(format!("sqlite error: {err}"))
}

fn encode_cell(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

impl MetadataSource for SqliteMetadataSource {
    fn execute_query(&self, query: &str, bindings: &[Bind]) -> Result<RecordSet> {
        let conn = self.lock()?;
        debug!(query, "executing");
        let mut stmt = conn.prepare(query).map_err(|e| map_engine_error(&e))?;
        let column_names: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
        let column_count = column_names.len();

        let mut rows = stmt
            .query(params_from_iter(bindings))
            .map_err(|e| map_engine_error(&e))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(|e| map_engine_error(&e))? {
            let mut record = Vec::with_capacity(column_count);
            for col in 0..column_count {
                let cell = row
                    .get_ref(col)
                    .map_err(|e| map_engine_error(&e))
                    .map(encode_cell)?;
                record.push(cell);
            }
            records.push(record);
        }

        Ok(RecordSet {
            column_names,
            records,
        })
    }

    fn last_insert_id(&self) -> Result<i64> {
        Ok(self.lock()?.last_insert_rowid())
    }

    fn begin(&self) -> Result<()> {
        self.lock()?
            .execute_batch("BEGIN;")
            .map_err(|e| map_engine_error(&e))
    }

    fn commit(&self) -> Result<()> {
        self.lock()?
            .execute_batch("COMMIT;")
            .map_err(|e| map_engine_error(&e))
    }

    fn rollback(&self) -> Result<()> {
        self.lock()?
            .execute_batch("ROLLBACK;")
            .map_err(|e| map_engine_error(&e))
    }

    fn in_transaction(&self) -> bool {
        self.lock().is_ok_and(|conn| !conn.is_autocommit())
    }
}

#[cfg(test)]
mod tests {
    use lineage_core::ErrorKind;

    use super::*;

    #[test]
    fn executes_parameterized_queries() {
        let source = SqliteMetadataSource::new_in_memory().unwrap();
        source
            .execute_query("CREATE TABLE t (a INT, b TEXT);", &[])
            .unwrap();
        source
            .execute_query(
                "INSERT INTO t (a, b) VALUES (?1, ?2);",
                &[Bind::Int(3), Bind::Text("three".into())],
            )
            .unwrap();
        assert_eq!(source.last_insert_id().unwrap(), 1);

        let rs = source
            .execute_query("SELECT a, b FROM t;", &[])
            .unwrap();
        assert_eq!(rs.column_names, vec!["a", "b"]);
        assert_eq!(
            rs.records,
            vec![vec![Some("3".to_string()), Some("three".to_string())]]
        );
    }

    #[test]
    fn null_columns_decode_as_none() {
        let source = SqliteMetadataSource::new_in_memory().unwrap();
        source
            .execute_query("CREATE TABLE t (a TEXT);", &[])
            .unwrap();
        source
            .execute_query("INSERT INTO t (a) VALUES (?1);", &[Bind::Null])
            .unwrap();
        let rs = source.execute_query("SELECT a FROM t;", &[]).unwrap();
        assert_eq!(rs.records, vec![vec![None]]);
    }

    #[test]
    fn unique_violation_maps_to_already_exists() {
        let source = SqliteMetadataSource::new_in_memory().unwrap();
        source
            .execute_query("CREATE TABLE t (a INT);", &[])
            .unwrap();
        source
            .execute_query("CREATE UNIQUE INDEX idx_a ON t (a);", &[])
            .unwrap();
        source
            .execute_query("INSERT INTO t (a) VALUES (1);", &[])
            .unwrap();
        let err = source
            .execute_query("INSERT INTO t (a) VALUES (1);", &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn transaction_state_is_visible() {
        let source = SqliteMetadataSource::new_in_memory().unwrap();
        assert!(!source.in_transaction());
        source.begin().unwrap();
        assert!(source.in_transaction());
        source.rollback().unwrap();
        assert!(!source.in_transaction());
    }
}
