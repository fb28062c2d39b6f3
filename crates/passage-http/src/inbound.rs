//! Model of the request the host application is handling.
//!
//! OAuth callbacks and 2-legged signature checks read the inbound method,
//! URL, query, form and headers. The host builds an [`InboundRequest`] from
//! whatever web framework it runs and passes it explicitly.

use url::form_urlencoded;

use crate::device::ClientDevice;
use crate::transport::Method;

/// Inbound HTTP request data.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    path_params: Vec<(String, String)>,
}

impl InboundRequest {
    /// Create a request from a method and an absolute URL.
    ///
    /// The query string is split off and decoded into query parameters; any
    /// fragment is dropped.
    pub fn new(method: Method, url: &str) -> Self {
        let url = url.split('#').next().unwrap_or_default();
        let (base, query) = match url.split_once('?') {
            Some((base, query)) => (base, parse_pairs(query)),
            None => (url, Vec::new()),
        };
        Self {
            method,
            url: base.to_owned(),
            query,
            ..Self::default()
        }
    }

    /// GET request for `url`.
    pub fn get(url: &str) -> Self {
        Self::new(Method::Get, url)
    }

    /// POST request for `url`.
    pub fn post(url: &str) -> Self {
        Self::new(Method::Post, url)
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add a form (POST body) parameter.
    #[must_use]
    pub fn with_form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    /// Replace form parameters with a decoded `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn with_form_body(mut self, body: &str) -> Self {
        self.form = parse_pairs(body);
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a routed path parameter.
    #[must_use]
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// URL without query string.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// URL including the query string.
    #[must_use]
    pub fn full_url(&self) -> String {
        crate::transport::append_query(&self.url, &self.query)
    }

    /// Query parameters in received order.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Form parameters in received order.
    #[must_use]
    pub fn form_pairs(&self) -> &[(String, String)] {
        &self.form
    }

    /// First query parameter named `name`.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        find(&self.query, name)
    }

    /// First form parameter named `name`.
    #[must_use]
    pub fn form(&self, name: &str) -> Option<&str> {
        find(&self.form, name)
    }

    /// Header value (case-insensitive name).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parameter from the path, then the query, then the form.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        find(&self.path_params, name)
            .or_else(|| self.query(name))
            .or_else(|| self.form(name))
    }

    /// Query parameters overlaid with form parameters (form wins on conflicts).
    #[must_use]
    pub fn merged_parameters(&self) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = Vec::new();
        for (name, value) in self.query.iter().chain(&self.form) {
            match merged.iter_mut().find(|(k, _)| k == name) {
                Some(existing) => existing.1.clone_from(value),
                None => merged.push((name.clone(), value.clone())),
            }
        }
        merged
    }

    /// `User-Agent` header, or an empty string.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        self.header("User-Agent").unwrap_or_default()
    }

    /// Device class derived from the `User-Agent` header.
    #[must_use]
    pub fn device(&self) -> ClientDevice {
        ClientDevice::from_user_agent(self.user_agent())
    }
}

fn parse_pairs(encoded: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(encoded.as_bytes())
        .into_owned()
        .collect()
}

fn find<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_splits_query_and_drops_fragment() {
        let request = InboundRequest::get("https://example.com/cb?state=twitter&code=a%20b#top");

        assert_eq!(request.url(), "https://example.com/cb");
        assert_eq!(request.query("state"), Some("twitter"));
        assert_eq!(request.query("code"), Some("a b"));
        assert_eq!(request.method(), Method::Get);
    }

    #[test]
    fn test_parameter_lookup_order() {
        let request = InboundRequest::post("https://example.com/cb?id=query")
            .with_form("id", "form")
            .with_form("only_form", "f")
            .with_path_param("id", "path");

        assert_eq!(request.parameter("id"), Some("path"));
        assert_eq!(request.parameter("only_form"), Some("f"));
        assert_eq!(request.parameter("missing"), None);
    }

    #[test]
    fn test_merged_parameters_form_wins() {
        let request = InboundRequest::post("https://example.com/app?a=1&b=2")
            .with_form("b", "3")
            .with_form("c", "4");

        assert_eq!(
            request.merged_parameters(),
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "3".to_owned()),
                ("c".to_owned(), "4".to_owned()),
            ]
        );
    }

    #[test]
    fn test_header_is_case_insensitive() {
        let request = InboundRequest::get("https://example.com/")
            .with_header("authorization", "OAuth realm=\"\"");
        assert_eq!(request.header("Authorization"), Some("OAuth realm=\"\""));
        assert_eq!(request.user_agent(), "");
    }

    #[test]
    fn test_with_form_body() {
        let request =
            InboundRequest::post("https://example.com/").with_form_body("x=1&y=hello+world");
        assert_eq!(request.form("y"), Some("hello world"));
    }

    #[test]
    fn test_full_url_reencodes_query() {
        let request = InboundRequest::get("https://example.com/p?q=a+b");
        assert_eq!(request.full_url(), "https://example.com/p?q=a+b");
    }
}
