pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod indieauth;
pub mod middleware;
pub mod router;
pub mod service;

pub use error::MicrolightError;
pub use indieauth::TokenVerifier;
pub use service::PostService;
