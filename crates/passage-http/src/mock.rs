//! Mock transport implementation for testing.
//!
//! Provides [`MockTransport`] for unit testing provider flows without network
//! access.

use std::collections::VecDeque;
use std::sync::RwLock;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Mock transport for testing.
///
/// Responses are returned in the order they were queued. Every executed
/// request is recorded so tests can assert on URLs, headers and bodies.
///
/// # Example
///
/// ```ignore
/// use passage_http::{HttpResponse, MockTransport};
///
/// let transport = MockTransport::new()
///     .with_response(HttpResponse::new(200, "oauth_token=t&oauth_token_secret=s"));
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: RwLock<VecDeque<HttpResponse>>,
    requests: RwLock<Vec<HttpRequest>>,
    gzip: bool,
}

impl MockTransport {
    /// Create a mock with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_response(self, response: HttpResponse) -> Self {
        self.push_response(response);
        self
    }

    /// Report gzip support from [`HttpTransport::supports_gzip`].
    #[must_use]
    pub fn with_gzip(mut self) -> Self {
        self.gzip = true;
        self
    }

    /// Queue a response on a shared mock.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn push_response(&self, response: HttpResponse) {
        self.responses.write().unwrap().push_back(response);
    }

    /// Requests executed so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.read().unwrap().clone()
    }

    /// The most recent request, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.read().unwrap().last().cloned()
    }
}

impl HttpTransport for MockTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.write().unwrap().push(request.clone());
        self.responses
            .write()
            .unwrap()
            .pop_front()
            .ok_or_else(|| {
                TransportError::Unavailable(format!("no mock response queued for {}", request.url))
            })
    }

    fn supports_gzip(&self) -> bool {
        self.gzip
    }
}
