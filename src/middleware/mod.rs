pub mod auth;
pub mod micropub_request;

pub use auth::{BearerToken, extract_bearer};
pub use micropub_request::{MicropubRequest, RequestBody};
