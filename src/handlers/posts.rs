use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::db::{Limit, Post};
use crate::error::MicrolightError;
use crate::router::MicrolightState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub page: u64,
    pub total: u64,
}

/// GET /posts?page=N -> one page of posts, 1-based.
pub async fn list_posts_handler(
    State(state): State<MicrolightState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostPage>, MicrolightError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = u64::from(state.posts_per_page);
    let offset = (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| MicrolightError::InvalidRequest(format!("page {page} is out of range")))?;
    let posts = state
        .posts
        .find_posts(&[], Limit::Rows(per_page), offset)
        .await?;
    let total = state.posts.count_posts(&[]).await?;
    Ok(Json(PostPage { posts, page, total }))
}

/// GET /posts/{slug}
pub async fn get_post_handler(
    State(state): State<MicrolightState>,
    Path(slug): Path<String>,
) -> Result<Json<Post>, MicrolightError> {
    state
        .posts
        .find_post(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| MicrolightError::NotFound(format!("post {slug:?}")))
}
