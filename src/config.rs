use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Environment prefix for every configuration key, e.g. `MICROLIGHT_BASE_URL`.
pub const ENV_PREFIX: &str = "MICROLIGHT_";

/// Process-wide configuration, read once at startup and never mutated.
pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().expect("FATAL: invalid microlight configuration"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite connection string, e.g. `sqlite:microlight.db`.
    pub database_url: String,
    pub loglevel: String,
    pub listen_addr: String,
    /// Canonical URL of this site. A token is only accepted when the token
    /// endpoint reports exactly this value as `me`.
    pub base_url: String,
    /// IndieAuth token endpoint used to verify bearer tokens.
    pub token_endpoint: String,
    pub posts_per_page: u32,
    pub proxy: Option<Url>,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:microlight.db".to_string(),
            loglevel: "info".to_string(),
            listen_addr: "0.0.0.0:8000".to_string(),
            base_url: "http://localhost:8000/".to_string(),
            token_endpoint: "https://tokens.indieauth.com/token".to_string(),
            posts_per_page: 20,
            proxy: None,
            http_timeout_secs: 5,
        }
    }
}

impl Config {
    /// Defaults overridden by `MICROLIGHT_*` environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}
