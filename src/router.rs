use axum::{
    Router,
    routing::get,
};

use crate::handlers::micropub::{micropub_handler, micropub_query_handler};
use crate::handlers::posts::{get_post_handler, list_posts_handler};
use crate::indieauth::TokenVerifier;
use crate::service::PostService;

#[derive(Clone)]
pub struct MicrolightState {
    pub posts: PostService,
    pub verifier: TokenVerifier,
    pub posts_per_page: u32,
}

impl MicrolightState {
    pub fn new(posts: PostService, verifier: TokenVerifier, posts_per_page: u32) -> Self {
        Self {
            posts,
            verifier,
            posts_per_page: posts_per_page.max(1),
        }
    }

    /// Public permalink of a post, served by `GET /posts/{slug}`.
    pub fn post_url(&self, slug: &str) -> String {
        let base = self.verifier.base_url();
        if base.ends_with('/') {
            format!("{base}posts/{slug}")
        } else {
            format!("{base}/posts/{slug}")
        }
    }
}

pub fn microlight_router(state: MicrolightState) -> Router {
    Router::new()
        .route("/micropub", get(micropub_query_handler).post(micropub_handler))
        .route("/posts", get(list_posts_handler))
        .route("/posts/{slug}", get(get_post_handler))
        .with_state(state)
}
