use sqlx::sqlite::SqliteRow;

use super::query::{ColumnDefinition, ForeignKeyRef, SqlValue};
use crate::error::MicrolightError;

/// A record type stored in one table.
///
/// The repository is generic over this trait; anything specific to a table
/// (its columns, how a stored value is turned back into a field) lives in
/// the implementation.
pub trait Entity: Sized + Send + Unpin {
    const TABLE: &'static str;

    fn columns() -> Vec<ColumnDefinition>;

    fn foreign_keys() -> Vec<ForeignKeyRef> {
        Vec::new()
    }

    fn from_row(row: &SqliteRow) -> Result<Self, MicrolightError>;

    /// Column values written on insert. The primary key is left to SQLite.
    fn to_values(&self) -> Vec<(&'static str, SqlValue)>;
}
