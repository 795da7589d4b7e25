mod support;

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::get,
};
use microlight::client::{DEFAULT_TIMEOUT, HttpClient};
use microlight::indieauth::{AuthDecision, RejectReason};
use microlight::middleware::{MicropubRequest, RequestBody};
use microlight::router::{MicrolightState, microlight_router};
use microlight::service::{PostDraft, PostService};
use microlight::{MicrolightError, TokenVerifier};
use serde_json::{Value, json};
use support::{TempDb, spawn_server};
use tower::ServiceExt;

const SITE: &str = "https://example.com/";

async fn token_endpoint(headers: HeaderMap) -> Response {
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some("Bearer good") => Json(json!({"me": SITE, "scope": "create delete"})).into_response(),
        Some("Bearer stranger") => Json(json!({"me": "https://someone-else.example/"})).into_response(),
        Some("Bearer anonymous") => Json(json!({"scope": "create"})).into_response(),
        Some("Bearer form") => (
            [("content-type", "application/x-www-form-urlencoded")],
            "me=https%3A%2F%2Fexample.com%2F&scope=delete",
        )
            .into_response(),
        Some("Bearer garbled") => (
            StatusCode::UNAUTHORIZED,
            [("content-type", "application/json")],
            "Unauthorized",
        )
            .into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_token"}))).into_response(),
    }
}

async fn verifier() -> TokenVerifier {
    let base = spawn_server(Router::new().route("/token", get(token_endpoint))).await;
    let client = HttpClient::new(DEFAULT_TIMEOUT, None).expect("client builds");
    TokenVerifier::new(client, format!("{base}/token"), SITE)
}

async fn app(tmp: &TempDb) -> Router {
    let state = MicrolightState::new(PostService::new(tmp.db.clone()), verifier().await, 2);
    microlight_router(state)
}

async fn seed(tmp: &TempDb, name: &str) {
    PostService::new(tmp.db.clone())
        .create_post(PostDraft {
            name: Some(name.to_string()),
            content: format!("{name} body"),
            tags: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            ..Default::default()
        })
        .await
        .expect("seed post");
}

fn form_post(body: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/micropub")
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}

async fn json_body(resp: Response) -> Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&body).expect("response body was not JSON")
}

fn request_with(auth: Option<&'static str>, body: RequestBody) -> MicropubRequest {
    let mut headers = HeaderMap::new();
    if let Some(auth) = auth {
        headers.insert(AUTHORIZATION, auth.parse().expect("header value"));
    }
    MicropubRequest {
        method: Method::POST,
        headers,
        body,
    }
}

#[tokio::test]
async fn verifier_outcomes() {
    let verifier = verifier().await;
    let decide = |auth| {
        let verifier = verifier.clone();
        async move {
            verifier
                .verify_request(&request_with(Some(auth), RequestBody::default()))
                .await
                .expect("token endpoint reachable")
        }
    };

    assert!(matches!(decide("Bearer good").await, AuthDecision::Authorized(ref id) if id.me == SITE));
    assert!(matches!(decide("Bearer form").await, AuthDecision::Authorized(_)));
    assert_eq!(
        decide("Bearer stranger").await,
        AuthDecision::Rejected(RejectReason::IdentityMismatch)
    );
    assert_eq!(
        decide("Bearer anonymous").await,
        AuthDecision::Rejected(RejectReason::MissingIdentity)
    );
    assert_eq!(
        decide("Bearer nope").await,
        AuthDecision::Rejected(RejectReason::EndpointStatus(401))
    );
    assert_eq!(
        decide("Bearer garbled").await,
        AuthDecision::Rejected(RejectReason::EndpointStatus(401))
    );
    // No "Bearer" prefix: the whole header value is the token.
    assert!(matches!(decide("good").await, AuthDecision::Authorized(_)));
    assert_eq!(
        decide("Bearer good extra").await,
        AuthDecision::Rejected(RejectReason::EndpointStatus(401))
    );
}

#[tokio::test]
async fn missing_token_is_rejected_without_calling_the_endpoint() {
    // Nothing listens on the discard port; any network call would fail.
    let client = HttpClient::new(DEFAULT_TIMEOUT, None).expect("client builds");
    let verifier = TokenVerifier::new(client, "http://127.0.0.1:9/token", SITE);

    let decision = verifier
        .verify_request(&request_with(None, RequestBody::from_form("h=entry")))
        .await
        .expect("no I/O happens");
    assert_eq!(decision, AuthDecision::Rejected(RejectReason::MissingToken));
}

#[tokio::test]
async fn unreachable_token_endpoint_rejects_the_token() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = HttpClient::new(DEFAULT_TIMEOUT, None).expect("client builds");
    let verifier = TokenVerifier::new(client, format!("http://{addr}/token"), SITE);
    let decision = verifier
        .verify_request(&request_with(Some("Bearer good"), RequestBody::default()))
        .await
        .expect("endpoint faults are rejections");
    assert_eq!(decision, AuthDecision::Rejected(RejectReason::EndpointUnavailable));
    assert_eq!(
        MicrolightError::Rejected(RejectReason::EndpointUnavailable).status().code(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn multipart_body_carries_the_token_and_fields() {
    let tmp = TempDb::new("route-multipart").await;
    let app = app(&tmp).await;

    let boundary = "microlight-boundary";
    let body = [
        ("h", "entry"),
        ("content", "Sent as multipart"),
        ("category[]", "one"),
        ("category[]", "two"),
        ("access_token", "good"),
    ]
    .iter()
    .map(|(name, value)| {
        format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
    })
    .collect::<String>()
        + &format!("--{boundary}--\r\n");

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/micropub")
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app.oneshot(get_req("/posts/sent-as-multipart")).await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["tags"], json!(["one", "two"]));
}

#[tokio::test]
async fn create_then_read_back() {
    let tmp = TempDb::new("route-create").await;
    let app = app(&tmp).await;

    let resp = app
        .clone()
        .oneshot(form_post(
            "h=entry&name=Hello+World&content=First+post&category[]=a&category[]=b&category[]=c",
            Some("Bearer good"),
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let location = resp
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string();
    assert_eq!(location, "https://example.com/posts/hello-world");

    // The permalink is served by this router.
    let path = location.strip_prefix("https://example.com").expect("site prefix");
    let resp = app.clone().oneshot(get_req(path)).await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let post = json_body(resp).await;
    assert_eq!(post["name"], "Hello World");
    assert_eq!(post["type"], "article");
    assert_eq!(post["tags"], json!(["a", "b", "c"]));
}

#[tokio::test]
async fn json_create_and_source_query() {
    let tmp = TempDb::new("route-json").await;
    let app = app(&tmp).await;

    let payload = json!({
        "type": ["h-entry"],
        "properties": {
            "content": ["Just a note"],
            "category": ["rust"],
            "published": ["2024-06-01T10:00:00Z"]
        }
    });
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/micropub")
                .header("content-type", "application/json")
                .header("authorization", "Bearer good")
                .body(Body::from(payload.to_string()))
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .clone()
        .oneshot(get_req("/micropub?q=source&url=https%3A%2F%2Fexample.com%2Fposts%2Fjust-a-note"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let source = json_body(resp).await;
    assert_eq!(source["type"], json!(["h-entry"]));
    assert_eq!(source["properties"]["content"], json!(["Just a note"]));
    assert_eq!(source["properties"]["category"], json!(["rust"]));
    assert_eq!(
        source["properties"]["url"],
        json!(["https://example.com/posts/just-a-note"])
    );

    let resp = app.clone().oneshot(get_req("/micropub?q=config")).await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({}));
}

#[tokio::test]
async fn delete_requires_a_token() {
    let tmp = TempDb::new("route-no-token").await;
    seed(&tmp, "Keep Me").await;
    let app = app(&tmp).await;

    let resp = app
        .clone()
        .oneshot(form_post("action=delete&url=https%3A%2F%2Fexample.com%2Fposts%2Fkeep-me", None))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "unauthorized");

    let resp = app
        .clone()
        .oneshot(form_post("action=delete&slug=keep-me", Some("Bearer stranger")))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(resp).await["error"], "forbidden");

    let resp = app.clone().oneshot(get_req("/posts/keep-me")).await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn delete_with_body_token_removes_the_post() {
    let tmp = TempDb::new("route-delete").await;
    seed(&tmp, "Gone Soon").await;
    let app = app(&tmp).await;

    let resp = app
        .clone()
        .oneshot(form_post(
            "action=delete&url=https%3A%2F%2Fexample.com%2Fposts%2Fgone-soon&access_token=good",
            None,
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.clone().oneshot(get_req("/posts/gone-soon")).await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .clone()
        .oneshot(form_post("action=delete&slug=gone-soon", Some("Bearer good")))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["error"], "not_found");
}

#[tokio::test]
async fn unknown_action_is_an_invalid_request() {
    let tmp = TempDb::new("route-action").await;
    let app = app(&tmp).await;

    let resp = app
        .oneshot(form_post("action=undelete&slug=x", Some("Bearer good")))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "invalid_request");
}

#[tokio::test]
async fn posts_are_paginated() {
    let tmp = TempDb::new("route-pages").await;
    for name in ["First", "Second", "Third"] {
        seed(&tmp, name).await;
    }
    let app = app(&tmp).await;

    let resp = app.clone().oneshot(get_req("/posts")).await.expect("request failed");
    let page = json_body(resp).await;
    assert_eq!(page["page"], 1);
    assert_eq!(page["total"], 3);
    assert_eq!(page["posts"].as_array().map(Vec::len), Some(2));

    let resp = app.clone().oneshot(get_req("/posts?page=2")).await.expect("request failed");
    let page = json_body(resp).await;
    assert_eq!(page["posts"].as_array().map(Vec::len), Some(1));
    assert_eq!(page["posts"][0]["slug"], "third");
}

#[tokio::test]
async fn huge_page_numbers_are_invalid_requests() {
    let tmp = TempDb::new("route-huge-page").await;
    seed(&tmp, "Only").await;
    let app = app(&tmp).await;

    for page in [u64::MAX, 5_000_000_000_000_000_000] {
        let resp = app
            .clone()
            .oneshot(get_req(&format!("/posts?page={page}")))
            .await
            .expect("request failed");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "page={page}");
        assert_eq!(json_body(resp).await["error"], "invalid_request");
    }
}

#[test]
fn rejection_maps_to_micropub_statuses() {
    assert_eq!(
        MicrolightError::Rejected(RejectReason::MissingToken).status().code(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        MicrolightError::Rejected(RejectReason::IdentityMismatch).status().code(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        MicrolightError::UnsafeBulkOperation("delete").status().code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
