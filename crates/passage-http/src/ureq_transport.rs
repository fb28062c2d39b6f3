//! Blocking transport backed by a `ureq` agent.

use std::time::Duration;

use tracing::debug;
use ureq::Agent;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

/// HTTP transport using a shared `ureq` agent.
///
/// Status codes are never turned into errors; the agent returns every
/// response so OAuth code can inspect platform error bodies.
pub struct UreqTransport {
    agent: Agent,
    user_agent: String,
}

impl UreqTransport {
    /// Create a transport with a global per-request timeout.
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            user_agent: user_agent.into(),
        }
    }

    fn apply_headers<B>(
        &self,
        mut builder: ureq::RequestBuilder<B>,
        headers: &[(String, String)],
    ) -> ureq::RequestBuilder<B> {
        builder = builder.header("User-Agent", &self.user_agent);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        builder
    }
}

impl HttpTransport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "Sending request");

        let body = request.body.encode()?;
        let response = match request.method {
            Method::Get | Method::Delete => {
                if body.is_some() {
                    return Err(TransportError::InvalidRequest(format!(
                        "{} request cannot carry a body",
                        request.method
                    )));
                }
                let builder = if request.method == Method::Get {
                    self.agent.get(&request.url)
                } else {
                    self.agent.delete(&request.url)
                };
                self.apply_headers(builder, &request.headers).call()?
            }
            Method::Post | Method::Put => {
                let builder = if request.method == Method::Post {
                    self.agent.post(&request.url)
                } else {
                    self.agent.put(&request.url)
                };
                let builder = self.apply_headers(builder, &request.headers);
                match body {
                    Some((content_type, bytes)) => builder
                        .header("Content-Type", &content_type)
                        .send(&bytes[..])?,
                    None => builder.send(&[] as &[u8])?,
                }
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        let body = response.into_body().read_to_string()?;

        debug!(status, "Received response");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn supports_gzip(&self) -> bool {
        true
    }
}
