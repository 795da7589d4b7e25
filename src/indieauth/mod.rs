//! IndieAuth token verification against a third-party token endpoint.

mod endpoints;
pub mod service;

pub use service::{AuthDecision, AuthorizedIdentity, RejectReason, TokenVerifier};
