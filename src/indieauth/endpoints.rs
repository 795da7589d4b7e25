use crate::client::{HttpClient, HttpRequest, HttpResponse};
use crate::error::MicrolightError;
use crate::middleware::auth::BearerToken;
use tracing::debug;

/// Stateless IndieAuth endpoint calls.
pub(super) struct IndieAuthEndpoints;

impl IndieAuthEndpoints {
    /// Ask the token endpoint which identity a bearer token belongs to.
    pub(super) async fn verify_token(
        client: &HttpClient,
        token_endpoint: &str,
        token: &BearerToken,
    ) -> Result<HttpResponse, MicrolightError> {
        let request = HttpRequest::get(token_endpoint)
            .header("Authorization", format!("Bearer {}", token.secret()))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        let resp = client.send(request).await?;
        debug!(status = resp.status, "token endpoint answered");
        Ok(resp)
    }
}
