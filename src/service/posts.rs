use chrono::{DateTime, SubsecRound, Utc};
use tracing::info;

use crate::db::query::slugify;
use crate::db::{Database, Identity, Limit, Post, PostKind, Predicate, SqlEscape, SqlOp};
use crate::error::MicrolightError;

/// Slugs built from post content keep this many words.
const SLUG_WORDS: usize = 8;

/// Fields of a post being created, before it has an id or slug.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    pub name: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Post operations used by the Micropub endpoint and the public listing.
#[derive(Clone)]
pub struct PostService {
    db: Database,
}

impl PostService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn find_posts(
        &self,
        predicates: &[Predicate],
        limit: impl Into<Limit>,
        offset: u64,
    ) -> Result<Vec<Post>, MicrolightError> {
        let mut session = self.db.session().await?;
        session.repo::<Post>().find(predicates, limit, offset).await
    }

    pub async fn count_posts(&self, predicates: &[Predicate]) -> Result<u64, MicrolightError> {
        let mut session = self.db.session().await?;
        session.repo::<Post>().count(predicates).await
    }

    pub async fn find_post(&self, slug: &str) -> Result<Option<Post>, MicrolightError> {
        let mut session = self.db.session().await?;
        session.repo::<Post>().find_one(&[slug_predicate(slug)], 0).await
    }

    /// Physically remove the post with this slug.
    pub async fn delete_post(&self, slug: &str) -> Result<(), MicrolightError> {
        let filter = [slug_predicate(slug)];
        let mut session = self.db.session().await?;
        let mut posts = session.repo::<Post>();

        if posts.count(&filter).await? == 0 {
            return Err(MicrolightError::NotFound(format!("post {slug:?}")));
        }
        posts.delete(&filter).await?;
        info!(slug = %slug, "post deleted");
        Ok(())
    }

    pub async fn create_post(&self, draft: PostDraft) -> Result<Post, MicrolightError> {
        if draft.content.trim().is_empty() {
            return Err(MicrolightError::InvalidRequest("content is required".to_string()));
        }
        // Stored at whole-second precision.
        let published = draft.published.unwrap_or_else(Utc::now).trunc_subsecs(0);
        let mut session = self.db.session().await?;

        let identity_id = session
            .repo::<Identity>()
            .find_one(&[], 0)
            .await?
            .map(|identity| identity.id);

        let base = base_slug(&draft, published);
        let mut posts = session.repo::<Post>();
        let mut slug = base.clone();
        let mut n = 1;
        while posts.count(&[Predicate::eq("slug", slug.as_str())]).await? > 0 {
            n += 1;
            slug = format!("{base}-{n}");
        }

        let kind = if draft.name.is_some() {
            PostKind::Article
        } else {
            PostKind::Note
        };
        let mut post = Post {
            id: 0,
            name: draft.name,
            content: draft.content,
            kind,
            slug,
            published,
            tags: draft.tags,
            location: draft.location,
            url: draft.url,
            identity_id,
        };
        post.id = posts.insert(&post).await?;
        info!(slug = %post.slug, kind = %post.kind, "post created");
        Ok(post)
    }
}

fn slug_predicate(slug: &str) -> Predicate {
    Predicate::new("slug", slug, SqlOp::Equal, SqlEscape::Slug)
}

fn base_slug(draft: &PostDraft, published: DateTime<Utc>) -> String {
    let source = match draft.name.as_deref() {
        Some(name) => name.to_string(),
        None => draft
            .content
            .split_whitespace()
            .take(SLUG_WORDS)
            .collect::<Vec<_>>()
            .join(" "),
    };
    let slug = slugify(&source);
    if slug.is_empty() {
        published.format("%Y%m%d%H%M%S").to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn slug_prefers_name_then_leading_words() {
        let published = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let titled = PostDraft {
            name: Some("Hello, World!".to_string()),
            content: "body".to_string(),
            ..Default::default()
        };
        assert_eq!(base_slug(&titled, published), "hello-world");

        let note = PostDraft {
            content: "one two three four five six seven eight nine ten".to_string(),
            ..Default::default()
        };
        assert_eq!(
            base_slug(&note, published),
            "one-two-three-four-five-six-seven-eight"
        );

        let symbols = PostDraft {
            content: "!!!".to_string(),
            ..Default::default()
        };
        assert_eq!(base_slug(&symbols, published), "20240501120000");
    }
}
