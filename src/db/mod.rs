//! Database module: query building, records and storage.
//!
//! Layout:
//! - `query.rs`: predicate and DDL to SQL, identifier whitelist
//! - `traits.rs`: the `Entity` trait the repository is generic over
//! - `models.rs`: Rust structs mirroring DB rows and their conversions
//! - `schema.rs`: DDL for initializing the database (SQLite)
//! - `sqlite.rs`: pool, per-request session and repository

pub mod models;
pub mod query;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use models::{Identity, Post, PostKind, RelMe};
pub use query::{
    ColumnDefinition, ColumnType, ForeignKeyRef, Limit, Predicate, SqlEscape, SqlOp, SqlValue,
    Statement,
};
pub use schema::schema_statements;
pub use sqlite::{Database, Repository, Session, SqlitePool};
pub use traits::Entity;
