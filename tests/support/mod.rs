#![allow(dead_code)]

use axum::Router;
use microlight::db::Database;
use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

/// A database in a fresh temp file; the file is removed on drop.
pub struct TempDb {
    pub db: Database,
    path: PathBuf,
}

impl TempDb {
    pub async fn new(tag: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();

        let mut path = std::env::temp_dir();
        path.push(format!(
            "microlight-{}-{}-{}.sqlite",
            tag,
            std::process::id(),
            nanos
        ));

        let database_url = format!("sqlite:{}", path.display());
        let db = Database::connect(&database_url)
            .await
            .expect("failed to open temp database");
        db.init_schema().await.expect("failed to create schema");
        Self { db, path }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Bind to port 0, serve `app` in the background and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server failed");
    });
    format!("http://{addr}")
}
