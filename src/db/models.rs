use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::fmt;
use std::str::FromStr;

use super::query::{ColumnDefinition, ForeignKeyRef, SqlValue};
use super::traits::Entity;
use crate::error::MicrolightError;

pub const TAG_DELIMITER: char = ',';

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub note: Option<String>,
}

impl Entity for Identity {
    const TABLE: &'static str = "identity";

    fn columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::primary_key("id"),
            ColumnDefinition::required_text("name"),
            ColumnDefinition::text("email"),
            ColumnDefinition::text("note"),
        ]
    }

    fn from_row(row: &SqliteRow) -> Result<Self, MicrolightError> {
        Ok(Identity {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            note: row.try_get("note")?,
        })
    }

    fn to_values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("name", self.name.clone().into()),
            ("email", self.email.clone().into()),
            ("note", self.note.clone().into()),
        ]
    }
}

/// A `rel="me"` profile link belonging to an identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelMe {
    pub id: i64,
    pub name: Option<String>,
    pub url: String,
    pub identity_id: Option<i64>,
}

impl Entity for RelMe {
    const TABLE: &'static str = "relme";

    fn columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::primary_key("id"),
            ColumnDefinition::text("name"),
            ColumnDefinition::required_text("url"),
            ColumnDefinition::integer("identity_id"),
        ]
    }

    fn foreign_keys() -> Vec<ForeignKeyRef> {
        vec![ForeignKeyRef::new("identity_id", Identity::TABLE, "id")]
    }

    fn from_row(row: &SqliteRow) -> Result<Self, MicrolightError> {
        Ok(RelMe {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            identity_id: row.try_get("identity_id")?,
        })
    }

    fn to_values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("name", self.name.clone().into()),
            ("url", self.url.clone().into()),
            ("identity_id", self.identity_id.into()),
        ]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Note,
    Article,
}

impl PostKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PostKind::Note => "note",
            PostKind::Article => "article",
        }
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostKind {
    type Err = MicrolightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "note" => Ok(PostKind::Note),
            "article" => Ok(PostKind::Article),
            other => Err(MicrolightError::DataCorruption(format!("unknown post type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub name: Option<String>,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub slug: String,
    pub published: DateTime<Utc>,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub identity_id: Option<i64>,
}

impl Entity for Post {
    const TABLE: &'static str = "post";

    fn columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::primary_key("id"),
            ColumnDefinition::text("name"),
            // Markdown
            ColumnDefinition::required_text("content"),
            ColumnDefinition::required_text("type"),
            ColumnDefinition::required_text("slug"),
            // RFC 3339
            ColumnDefinition::required_text("published"),
            ColumnDefinition::text("tags"),
            // "lat,long" or an address
            ColumnDefinition::text("location"),
            ColumnDefinition::text("url"),
            ColumnDefinition::integer("identity_id"),
        ]
    }

    fn foreign_keys() -> Vec<ForeignKeyRef> {
        vec![ForeignKeyRef::new("identity_id", Identity::TABLE, "id")]
    }

    fn from_row(row: &SqliteRow) -> Result<Self, MicrolightError> {
        let kind: String = row.try_get("type")?;
        let published: String = row.try_get("published")?;
        let published = DateTime::parse_from_rfc3339(&published)
            .map_err(|e| {
                MicrolightError::DataCorruption(format!("post.published {published:?}: {e}"))
            })?
            .with_timezone(&Utc);
        let tags: Option<String> = row.try_get("tags")?;

        Ok(Post {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            content: row.try_get("content")?,
            kind: kind.parse()?,
            slug: row.try_get("slug")?,
            published,
            tags: parse_tags(tags.as_deref()),
            location: row.try_get("location")?,
            url: row.try_get("url")?,
            identity_id: row.try_get("identity_id")?,
        })
    }

    fn to_values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("name", self.name.clone().into()),
            ("content", self.content.clone().into()),
            ("type", self.kind.as_str().into()),
            ("slug", self.slug.clone().into()),
            (
                "published",
                self.published
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
                    .into(),
            ),
            ("tags", join_tags(&self.tags).into()),
            ("location", self.location.clone().into()),
            ("url", self.url.clone().into()),
            ("identity_id", self.identity_id.into()),
        ]
    }
}

/// Split the stored comma-joined tag string, keeping order.
pub fn parse_tags(stored: Option<&str>) -> Vec<String> {
    stored
        .map(|s| {
            s.split(TAG_DELIMITER)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Join tags for storage; `None` when there are none. Commas inside a tag
/// would split it on read, so they are dropped.
pub fn join_tags(tags: &[String]) -> Option<String> {
    let cleaned: Vec<String> = tags
        .iter()
        .map(|t| t.replace(TAG_DELIMITER, "").trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    (!cleaned.is_empty()).then(|| cleaned.join(","))
}
