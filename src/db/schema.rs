//! DDL for initializing the blog storage. Tables are generated from each
//! entity's column definitions so the DDL and the row mapping cannot drift.

use super::models::{Identity, Post, RelMe};
use super::query::create_table;
use super::traits::Entity;
use crate::error::MicrolightError;

/// Slugs address posts, so they are unique per table.
pub const POST_SLUG_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_post_slug ON post(slug)";

fn create_for<E: Entity>() -> Result<String, MicrolightError> {
    create_table(E::TABLE, &E::columns(), &E::foreign_keys())
}

/// Every statement needed for a fresh database, in dependency order. All of
/// them are idempotent.
pub fn schema_statements() -> Result<Vec<String>, MicrolightError> {
    Ok(vec![
        create_for::<Identity>()?,
        create_for::<RelMe>()?,
        create_for::<Post>()?,
        POST_SLUG_INDEX.to_string(),
    ])
}
