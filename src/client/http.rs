use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::request::{HttpMethod, HttpRequest};
use super::response::{ContentType, FORM_DATA, HttpResponse, ResponseBody, fold_header_lines};
use crate::config::Config;
use crate::error::MicrolightError;

pub const MAX_REDIRECTS: usize = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Headers that are not resent once a redirect leaves the original origin.
const SENSITIVE_HEADERS: [&str; 3] = ["authorization", "cookie", "proxy-authorization"];

fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Outbound HTTP client.
///
/// Redirects are followed here rather than by reqwest so that 301/302 keep
/// the original method and body, the way a `308` would. Only `303 See Other`
/// switches to a bodiless GET. The timeout covers every hop of one call.
/// Credentials are dropped from the first cross-origin hop onward.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration, proxy: Option<&Url>) -> Result<Self, MicrolightError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("microlight/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(timeout)
            .timeout(timeout);
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url.as_str())
                .map_err(|e| MicrolightError::InvalidRequest(format!("invalid proxy url: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let inner = builder
            .build()
            .map_err(|e| MicrolightError::TransportError(e.to_string()))?;
        Ok(Self { inner, timeout })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, MicrolightError> {
        Self::new(cfg.http_timeout(), cfg.proxy.as_ref())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform one request, following up to [`MAX_REDIRECTS`] redirects.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, MicrolightError> {
        let url = request.validate()?;
        match tokio::time::timeout(self.timeout, self.follow(&request, url)).await {
            Ok(result) => result,
            Err(_) => Err(MicrolightError::RequestTimeout(self.timeout)),
        }
    }

    async fn follow(&self, request: &HttpRequest, mut url: Url) -> Result<HttpResponse, MicrolightError> {
        let mut method = request.method;
        let mut body = request.encoded_body();
        let has_content_type = request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
        let mut hops = 0;
        let mut same_origin = true;

        loop {
            debug!(method = %method, url = %url, hop = hops, "sending outbound request");
            let mut builder = self.inner.request(method.to_reqwest(), url.clone());
            for (name, value) in &request.headers {
                if !same_origin && is_sensitive(name) {
                    continue;
                }
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &body {
                if !has_content_type {
                    builder = builder.header(CONTENT_TYPE, FORM_DATA);
                }
                builder = builder.body(body.clone());
            }

            let resp = builder.send().await.map_err(|e| self.map_reqwest(e))?;
            let status = resp.status();

            if status.is_redirection()
                && let Some(location) = resp.headers().get(LOCATION)
            {
                if hops == MAX_REDIRECTS {
                    return Err(MicrolightError::TransportError(format!(
                        "too many redirects: maximum of {MAX_REDIRECTS} followed"
                    )));
                }
                hops += 1;
                let location = location.to_str().map_err(|_| {
                    MicrolightError::InvalidResponse("redirect location is not valid UTF-8".to_string())
                })?;
                let next = url.join(location)?;
                if status == StatusCode::SEE_OTHER && method != HttpMethod::Head {
                    method = HttpMethod::Get;
                    body = None;
                }
                if next.origin() != url.origin() {
                    same_origin = false;
                }
                debug!(status = status.as_u16(), location = %next, "following redirect");
                url = next;
                continue;
            }

            return self.finish(method, resp).await;
        }
    }

    async fn finish(&self, method: HttpMethod, resp: reqwest::Response) -> Result<HttpResponse, MicrolightError> {
        let status = resp.status().as_u16();
        let lines: Vec<String> = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| format!("{}: {}", name.as_str(), value))
            })
            .collect();
        let headers = fold_header_lines(lines.iter().map(String::as_str));

        let body = if method == HttpMethod::Head {
            ResponseBody::Text(String::new())
        } else {
            let raw = resp.text().await.map_err(|e| self.map_reqwest(e))?;
            let content_type = ContentType::from_header(headers.get("content-type").map(String::as_str));
            if (200..300).contains(&status) {
                ResponseBody::decode(content_type, raw)?
            } else {
                // Error pages often claim JSON; the status is what callers need.
                ResponseBody::decode(content_type, raw.clone()).unwrap_or(ResponseBody::Text(raw))
            }
        };

        debug!(status, "outbound request completed");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn map_reqwest(&self, e: reqwest::Error) -> MicrolightError {
        if e.is_timeout() {
            MicrolightError::RequestTimeout(self.timeout)
        } else if e.is_builder() {
            MicrolightError::InvalidRequest(e.to_string())
        } else {
            MicrolightError::TransportError(e.to_string())
        }
    }
}
