use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;
use url::Url;

use crate::db::Post;
use crate::error::MicrolightError;
use crate::middleware::micropub_request::{MicropubRequest, RequestBody, first_str, string_list};
use crate::router::MicrolightState;
use crate::service::PostDraft;

/// POST /micropub -> create a post, or delete one with `action=delete`.
/// Every request here is verified against the token endpoint first.
pub async fn micropub_handler(
    State(state): State<MicrolightState>,
    req: MicropubRequest,
) -> Result<Response, MicrolightError> {
    let identity = state.verifier.verify_request(&req).await?.into_authorized()?;

    match req.body.get_str("action") {
        Some("delete") => {
            let slug = target_slug(&req.body)?;
            state.posts.delete_post(&slug).await?;
            info!(me = %identity.me, slug = %slug, "micropub delete");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Some(other) => Err(MicrolightError::InvalidRequest(format!(
            "unsupported action {other:?}"
        ))),
        None => {
            let draft = draft_from_body(&req.body)?;
            let post = state.posts.create_post(draft).await?;
            info!(me = %identity.me, slug = %post.slug, "micropub create");
            let location = state.post_url(&post.slug);
            Ok((StatusCode::CREATED, [(LOCATION, location)]).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MicropubQuery {
    pub q: Option<String>,
    pub url: Option<String>,
}

/// GET /micropub -> `q=config` or `q=source`. Read-only, so no token check.
pub async fn micropub_query_handler(
    State(state): State<MicrolightState>,
    Query(query): Query<MicropubQuery>,
) -> Result<Json<Value>, MicrolightError> {
    match query.q.as_deref() {
        Some("config") => Ok(Json(json!({}))),
        Some("source") => {
            let url = query
                .url
                .as_deref()
                .ok_or_else(|| MicrolightError::InvalidRequest("q=source requires url".to_string()))?;
            let slug = slug_from_url(url)
                .ok_or_else(|| MicrolightError::InvalidRequest(format!("no post slug in {url:?}")))?;
            let post = state
                .posts
                .find_post(&slug)
                .await?
                .ok_or_else(|| MicrolightError::NotFound(format!("post {slug:?}")))?;
            Ok(Json(post_source(&post, &state.post_url(&post.slug))))
        }
        Some(other) => Err(MicrolightError::InvalidRequest(format!(
            "unsupported query {other:?}"
        ))),
        None => Err(MicrolightError::InvalidRequest("missing q parameter".to_string())),
    }
}

/// Microformats2 JSON for a stored post.
fn post_source(post: &Post, permalink: &str) -> Value {
    let mut props = Map::new();
    if let Some(name) = &post.name {
        props.insert("name".into(), json!([name]));
    }
    props.insert("content".into(), json!([post.content]));
    props.insert("published".into(), json!([post.published.to_rfc3339()]));
    if !post.tags.is_empty() {
        props.insert("category".into(), json!(post.tags));
    }
    if let Some(location) = &post.location {
        props.insert("location".into(), json!([location]));
    }
    if let Some(url) = &post.url {
        props.insert("bookmark-of".into(), json!([url]));
    }
    props.insert("url".into(), json!([permalink]));
    json!({ "type": ["h-entry"], "properties": props })
}

/// Slug of the post a delete targets: `slug`, or the last path segment of
/// `url`.
fn target_slug(body: &RequestBody) -> Result<String, MicrolightError> {
    if let Some(slug) = body.get_str("slug") {
        return Ok(slug.to_string());
    }
    let url = body
        .get_str("url")
        .ok_or_else(|| MicrolightError::InvalidRequest("delete requires url or slug".to_string()))?;
    slug_from_url(url).ok_or_else(|| MicrolightError::InvalidRequest(format!("no post slug in {url:?}")))
}

fn slug_from_url(raw: &str) -> Option<String> {
    let path = Url::parse(raw)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| raw.to_string());
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Properties of a create request: the JSON `properties` object, or the
/// flat form fields.
enum Properties<'a> {
    Json(&'a Map<String, Value>),
    Form(&'a RequestBody),
}

impl Properties<'_> {
    fn text(&self, key: &str) -> Option<String> {
        let value = match self {
            Properties::Json(map) => map.get(key).and_then(first_str),
            Properties::Form(body) => body.get_str(key),
        };
        value.map(str::to_string)
    }

    fn list(&self, key: &str) -> Vec<String> {
        match self {
            Properties::Json(map) => string_list(map.get(key)),
            Properties::Form(body) => body.get_list(key),
        }
    }
}

fn draft_from_body(body: &RequestBody) -> Result<PostDraft, MicrolightError> {
    let props = match body.get("properties") {
        Some(Value::Object(map)) => {
            if let Some(kind) = body.get_str("type")
                && kind != "h-entry"
            {
                return Err(MicrolightError::InvalidRequest(format!("unsupported type {kind:?}")));
            }
            Properties::Json(map)
        }
        _ => {
            if let Some(h) = body.get_str("h")
                && h != "entry"
            {
                return Err(MicrolightError::InvalidRequest(format!("unsupported h={h}")));
            }
            Properties::Form(body)
        }
    };

    let content = props
        .text("content")
        .ok_or_else(|| MicrolightError::InvalidRequest("content is required".to_string()))?;
    let published = props
        .text("published")
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| MicrolightError::InvalidRequest(format!("invalid published {raw:?}: {e}")))
        })
        .transpose()?;

    Ok(PostDraft {
        name: props.text("name"),
        content,
        tags: props.list("category"),
        location: props.text("location"),
        url: props.text("bookmark-of"),
        published,
    })
}
