use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use microlight::client::HttpClient;
use microlight::db::Database;
use microlight::router::{MicrolightState, microlight_router};
use microlight::{PostService, TokenVerifier};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &microlight::config::CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        base_url = %cfg.base_url,
        token_endpoint = %cfg.token_endpoint,
        proxy = %cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.loglevel
    );

    let db = Database::connect(&cfg.database_url).await?;
    db.init_schema().await?;

    let client = HttpClient::from_config(cfg)?;
    let verifier = TokenVerifier::new(client, cfg.token_endpoint.as_str(), cfg.base_url.as_str());
    let state = MicrolightState::new(PostService::new(db), verifier, cfg.posts_per_page);
    let app = microlight_router(state);

    let listener = TcpListener::bind(cfg.listen_addr.as_str()).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutting down");
        })
        .await?;
    Ok(())
}
