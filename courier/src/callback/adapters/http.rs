//! HTTP delivery.
//!
//! The client is built with automatic redirects disabled; redirects are
//! followed explicitly so the same body, headers, and method are re-sent to
//! each hop and the chain depth stays bounded. The body is encoded exactly
//! once before the first request, so every hop receives identical bytes.

use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Client, Method, StatusCode, Url, redirect::Policy};
use serde_json::Value;
use tracing::{debug, warn};

use crate::callback::destination::HttpDestination;
use crate::{Error, Result};

/// Tuning for HTTP deliveries.
#[derive(Debug, Clone)]
pub struct HttpDeliveryConfig {
    /// Maximum redirects followed after the initial request.
    pub max_redirects: u32,
    /// Timeout applied to each individual request.
    pub attempt_timeout: Duration,
    /// Deadline covering the whole redirect chain.
    pub overall_deadline: Duration,
}

impl Default for HttpDeliveryConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            attempt_timeout: Duration::from_secs(30),
            overall_deadline: Duration::from_secs(120),
        }
    }
}

/// Delivers envelopes over HTTP with bounded manual redirect handling.
pub struct HttpAdapter {
    client: Client,
    config: HttpDeliveryConfig,
}

impl HttpAdapter {
    pub fn new(config: HttpDeliveryConfig) -> Self {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(config.attempt_timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Deliver the already-serialized envelope to an HTTP destination.
    pub async fn deliver(&self, destination: &HttpDestination, envelope: &Value) -> Result<()> {
        let request = PreparedRequest::build(destination, envelope)?;

        tokio::time::timeout(self.config.overall_deadline, self.follow_chain(request))
            .await
            .map_err(|_| {
                Error::transport(format!(
                    "HTTP delivery to {} exceeded the overall deadline",
                    destination.url
                ))
            })?
    }

    async fn follow_chain(&self, request: PreparedRequest) -> Result<()> {
        let mut url = request.url;
        let mut redirects = 0u32;

        loop {
            let mut attempt = self.client.request(request.method.clone(), url.clone());
            if let Some(body) = &request.body {
                attempt = attempt
                    .header(CONTENT_TYPE, body.content_type.as_str())
                    .header(CONTENT_LENGTH, body.bytes.len())
                    .body(body.bytes.clone());
            }

            let response = attempt.send().await?;
            let status = response.status();

            if status.is_success() || accepted_terminal(status) {
                debug!(%url, %status, "HTTP callback delivered");
                return Ok(());
            }

            if matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND) {
                if redirects >= self.config.max_redirects {
                    return Err(Error::RedirectLimitExceeded {
                        limit: self.config.max_redirects,
                    });
                }
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| Error::transport("redirect response without Location"))?;
                let next = url
                    .join(location)
                    .map_err(|e| Error::transport(format!("invalid redirect target: {e}")))?;
                warn!(from = %url, to = %next, "Following HTTP redirect");
                url = next;
                redirects += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteRejection {
                status: status.as_u16(),
                body,
            });
        }
    }
}

/// Endpoints that are gone are treated as done: retrying a 404 or 410
/// forever would just burn the error budget of the whole pipeline run.
fn accepted_terminal(status: StatusCode) -> bool {
    matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE)
}

#[derive(Debug)]
struct PreparedBody {
    content_type: String,
    bytes: String,
}

#[derive(Debug)]
struct PreparedRequest {
    method: Method,
    url: Url,
    body: Option<PreparedBody>,
}

impl PreparedRequest {
    fn build(destination: &HttpDestination, envelope: &Value) -> Result<Self> {
        let method = Method::from_bytes(destination.method.to_uppercase().as_bytes())
            .map_err(|_| Error::config(format!("invalid HTTP method: {}", destination.method)))?;
        let mut url = Url::parse(&destination.url)
            .map_err(|e| Error::config(format!("invalid destination URL: {e}")))?;

        let body = match destination.content_type.as_deref() {
            Some("application/json") => Some(PreparedBody {
                content_type: "application/json".to_string(),
                bytes: serde_json::to_string(envelope)?,
            }),
            Some("application/x-www-form-urlencoded") => Some(PreparedBody {
                content_type: "application/x-www-form-urlencoded".to_string(),
                bytes: form_encode(envelope)?,
            }),
            Some(other) => return Err(Error::UnsupportedContentType(other.to_string())),
            None if method == Method::GET => {
                let name = destination.name.as_deref().ok_or_else(|| {
                    Error::config("GET destinations without a Content-Type require a Name")
                })?;
                let form = form_encode(envelope)?;
                url.set_query(Some(&format!("{name}={}", urlencoding::encode(&form))));
                None
            }
            None => {
                return Err(Error::UnsupportedContentType(format!(
                    "none (method {method})"
                )));
            }
        };

        Ok(Self { method, url, body })
    }
}

/// Flatten a JSON object into form pairs. Strings pass through verbatim,
/// nulls become empty, and everything else keeps its JSON rendering.
fn form_encode(envelope: &Value) -> Result<String> {
    let object = envelope
        .as_object()
        .ok_or_else(|| Error::UnsupportedPayload("form encoding requires an object".to_string()))?;

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in object {
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        serializer.append_pair(key, &rendered);
    }
    Ok(serializer.finish())
}
