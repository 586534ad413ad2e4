//! Query-executor seam between the access object and the SQL engine.
//!
//! The access object never talks to a database driver directly: it issues
//! parameterized query text through [`MetadataSource`] and reads back
//! [`RecordSet`]s of string-encoded columns. Hosts plug in their own engine
//! by implementing the trait; the crate ships a SQLite implementation.

use lineage_core::Result;

/// A value bound to a `?N` placeholder in a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Double(f64),
    /// UTF-8 text.
    Text(String),
}

impl From<i64> for Bind {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Bind {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Bind {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Bind {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T> From<Option<T>> for Bind
where
    T: Into<Bind>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Rows returned by [`MetadataSource::execute_query`].
///
/// Each row is an ordered sequence of string-encoded columns; `None` marks
/// SQL NULL. Numeric columns round-trip through their canonical decimal
/// rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    /// Column names in result order. Empty for statements without results.
    pub column_names: Vec<String>,
    /// Result rows in engine order.
    pub records: Vec<Vec<Option<String>>>,
}

impl RecordSet {
    /// Returns the single cell of a single-row, single-column result, or
    /// `None` when the shape differs.
    #[must_use]
    pub fn single_cell(&self) -> Option<&Option<String>> {
        match self.records.as_slice() {
            [row] => match row.as_slice() {
                [cell] => Some(cell),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Abstraction over the SQL engine backing the store.
///
/// Implementations must let a failed statement surface its error to the
/// caller without retrying, and must report uniqueness-constraint failures
/// as [`lineage_core::MetadataError::AlreadyExists`] so the access object
/// can rely on engine-enforced uniqueness instead of check-then-insert.
pub trait MetadataSource {
    /// Executes one parameterized statement and returns its rows.
    fn execute_query(&self, query: &str, bindings: &[Bind]) -> Result<RecordSet>;

    /// Identifier assigned by the most recent successful insert on this
    /// connection.
    fn last_insert_id(&self) -> Result<i64>;

    /// Opens a transaction.
    fn begin(&self) -> Result<()>;

    /// Commits the open transaction.
    fn commit(&self) -> Result<()>;

    /// Rolls back the open transaction.
    fn rollback(&self) -> Result<()>;

    /// Whether a transaction is currently open on this connection.
    fn in_transaction(&self) -> bool;
}
