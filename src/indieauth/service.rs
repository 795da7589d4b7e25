use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::endpoints::IndieAuthEndpoints;
use crate::client::{HttpClient, HttpResponse};
use crate::error::MicrolightError;
use crate::middleware::auth::{BearerToken, extract_bearer};
use crate::middleware::micropub_request::MicropubRequest;

/// Why a request was not allowed to mutate anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingToken,
    EndpointStatus(u16),
    MissingIdentity,
    IdentityMismatch,
    /// The token endpoint could not be reached or answered unreadably.
    EndpointUnavailable,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingToken => f.write_str("no access token was provided"),
            RejectReason::EndpointStatus(code) => {
                write!(f, "token endpoint refused the token with status {code}")
            }
            RejectReason::MissingIdentity => f.write_str("token endpoint did not report an identity"),
            RejectReason::IdentityMismatch => f.write_str("token belongs to a different site"),
            RejectReason::EndpointUnavailable => f.write_str("token endpoint could not verify the token"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedIdentity {
    pub me: String,
}

/// Terminal outcome of verifying a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Authorized(AuthorizedIdentity),
    Rejected(RejectReason),
}

impl AuthDecision {
    pub fn into_authorized(self) -> Result<AuthorizedIdentity, MicrolightError> {
        match self {
            AuthDecision::Authorized(identity) => Ok(identity),
            AuthDecision::Rejected(reason) => Err(MicrolightError::Rejected(reason)),
        }
    }
}

/// Gate in front of every mutating Micropub request.
#[derive(Clone)]
pub struct TokenVerifier {
    client: HttpClient,
    token_endpoint: Arc<str>,
    base_url: Arc<str>,
}

impl TokenVerifier {
    pub fn new(client: HttpClient, token_endpoint: impl Into<Arc<str>>, base_url: impl Into<Arc<str>>) -> Self {
        Self {
            client,
            token_endpoint: token_endpoint.into(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Extract the token from the request and verify it. A request without
    /// any token is rejected without contacting the token endpoint.
    pub async fn verify_request(&self, req: &MicropubRequest) -> Result<AuthDecision, MicrolightError> {
        let Some(token) = extract_bearer(&req.headers, &req.body) else {
            warn!(reason = %RejectReason::MissingToken, "micropub request rejected");
            return Ok(AuthDecision::Rejected(RejectReason::MissingToken));
        };
        self.verify_token(&token).await
    }

    /// Verify a token. An endpoint that cannot be reached, times out or
    /// answers with an unreadable body counts as a refusal.
    pub async fn verify_token(&self, token: &BearerToken) -> Result<AuthDecision, MicrolightError> {
        let decision = match IndieAuthEndpoints::verify_token(&self.client, &self.token_endpoint, token).await {
            Ok(resp) => self.decide(&resp),
            Err(
                e @ (MicrolightError::TransportError(_)
                | MicrolightError::RequestTimeout(_)
                | MicrolightError::InvalidResponse(_)),
            ) => {
                warn!(error = %e, "token endpoint call failed");
                AuthDecision::Rejected(RejectReason::EndpointUnavailable)
            }
            Err(e) => return Err(e),
        };
        match &decision {
            AuthDecision::Authorized(identity) => {
                info!(me = %identity.me, "micropub request authorized")
            }
            AuthDecision::Rejected(reason) => warn!(reason = %reason, "micropub request rejected"),
        }
        Ok(decision)
    }

    fn decide(&self, resp: &HttpResponse) -> AuthDecision {
        if !resp.is_success() {
            return AuthDecision::Rejected(RejectReason::EndpointStatus(resp.status));
        }
        match resp.body.field("me") {
            None | Some("") => AuthDecision::Rejected(RejectReason::MissingIdentity),
            Some(me) if me == self.base_url.as_ref() => AuthDecision::Authorized(AuthorizedIdentity {
                me: me.to_string(),
            }),
            Some(_) => AuthDecision::Rejected(RejectReason::IdentityMismatch),
        }
    }
}
