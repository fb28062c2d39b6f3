//! OpenID 2.0 relying party protocol.

use std::sync::Arc;

use tracing::debug;

use passage_http::{Body, HttpRequest, HttpTransport, InboundRequest, Method, append_query};

use crate::attributes::{AX_NAMESPACE, AX_SCHEMA, AttributeExchange};
use crate::discovery::discover;
use crate::error::OpenIdError;

const OPENID_NAMESPACE: &str = "http://specs.openid.net/auth/2.0";
const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";

/// OpenID relying party capability used by [`OpenIdSession`](crate::OpenIdSession).
pub trait OpenIdClient: Send + Sync {
    /// Authentication URL for `identifier`, returning to `return_url` and
    /// requesting the `required` AX attributes.
    fn auth_url(
        &self,
        identifier: &str,
        return_url: &str,
        required: &[String],
    ) -> Result<String, OpenIdError>;

    /// Verify a positive assertion with the provider.
    ///
    /// Returns `false` for assertions that do not check out; only failures to
    /// reach the provider are errors.
    fn validate(&self, request: &InboundRequest) -> Result<bool, OpenIdError>;

    /// AX attributes carried by the response.
    fn attributes(&self, request: &InboundRequest) -> AttributeExchange {
        AttributeExchange::from_response(request)
    }
}

/// [`OpenIdClient`] talking to providers over an [`HttpTransport`].
pub struct HttpOpenIdClient {
    transport: Arc<dyn HttpTransport>,
    realm: Option<String>,
}

impl HttpOpenIdClient {
    /// `realm` defaults to each request's return URL.
    pub fn new(transport: Arc<dyn HttpTransport>, realm: Option<String>) -> Self {
        Self { transport, realm }
    }
}

impl OpenIdClient for HttpOpenIdClient {
    fn auth_url(
        &self,
        identifier: &str,
        return_url: &str,
        required: &[String],
    ) -> Result<String, OpenIdError> {
        let endpoint = discover(self.transport.as_ref(), identifier)?;
        let (claimed_id, identity) = if endpoint.identifier_select {
            (IDENTIFIER_SELECT, IDENTIFIER_SELECT)
        } else {
            (
                identifier,
                endpoint.local_id.as_deref().unwrap_or(identifier),
            )
        };

        let mut params = vec![
            ("openid.ns".to_owned(), OPENID_NAMESPACE.to_owned()),
            ("openid.mode".to_owned(), "checkid_setup".to_owned()),
            ("openid.return_to".to_owned(), return_url.to_owned()),
            (
                "openid.realm".to_owned(),
                self.realm.as_deref().unwrap_or(return_url).to_owned(),
            ),
            ("openid.claimed_id".to_owned(), claimed_id.to_owned()),
            ("openid.identity".to_owned(), identity.to_owned()),
        ];
        if !required.is_empty() {
            params.push(("openid.ns.ax".to_owned(), AX_NAMESPACE.to_owned()));
            params.push(("openid.ax.mode".to_owned(), "fetch_request".to_owned()));
            let mut aliases = Vec::with_capacity(required.len());
            for name in required {
                let alias = ax_alias(name);
                params.push((format!("openid.ax.type.{alias}"), format!("{AX_SCHEMA}{name}")));
                aliases.push(alias);
            }
            params.push(("openid.ax.required".to_owned(), aliases.join(",")));
        }

        Ok(append_query(&endpoint.server, &params))
    }

    fn validate(&self, request: &InboundRequest) -> Result<bool, OpenIdError> {
        let param = |name: &str| request.parameter(&format!("openid.{name}"));

        let Some(return_to) = param("return_to") else {
            return Ok(false);
        };
        if !return_to_matches(return_to, request) {
            debug!(return_to, url = request.url(), "OpenID return_to does not match");
            return Ok(false);
        }
        let Some(claimed_id) = param("claimed_id").or_else(|| param("identity")) else {
            return Ok(false);
        };
        let (Some(signed), Some(sig)) = (param("signed"), param("sig")) else {
            return Ok(false);
        };

        let server = match discover(self.transport.as_ref(), claimed_id) {
            Ok(endpoint) => endpoint.server,
            Err(e @ OpenIdError::Transport(_)) => return Err(e),
            Err(e) => {
                debug!(error = %e, "Claimed identifier cannot be discovered");
                return Ok(false);
            }
        };
        if param("op_endpoint").is_some_and(|op| op != server) {
            debug!(server, "Assertion came from another OP endpoint");
            return Ok(false);
        }

        let mut form = vec![
            ("openid.mode".to_owned(), "check_authentication".to_owned()),
            ("openid.signed".to_owned(), signed.to_owned()),
            ("openid.sig".to_owned(), sig.to_owned()),
        ];
        for name in ["ns", "assoc_handle"] {
            if let Some(value) = param(name) {
                form.push((format!("openid.{name}"), value.to_owned()));
            }
        }
        for field in signed.split(',').filter(|f| !matches!(*f, "mode" | "ns" | "assoc_handle")) {
            if let Some(value) = param(field) {
                form.push((format!("openid.{field}"), value.to_owned()));
            }
        }

        let check = HttpRequest::new(Method::Post, server).body(Body::Form(form));
        let response = self.transport.execute(&check)?;
        Ok(response.is_ok() && is_valid(&response.body))
    }
}

/// Alias for an AX attribute type in the fetch request.
fn ax_alias(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// The assertion was issued for this URL: same origin and path, and every
/// query parameter of `openid.return_to` present on the request.
fn return_to_matches(return_to: &str, request: &InboundRequest) -> bool {
    let (Ok(expected), Ok(actual)) = (url::Url::parse(return_to), url::Url::parse(request.url()))
    else {
        return false;
    };
    if expected.scheme() != actual.scheme()
        || expected.host_str() != actual.host_str()
        || expected.port_or_known_default() != actual.port_or_known_default()
        || expected.path() != actual.path()
    {
        return false;
    }
    expected.query_pairs().all(|(k, v)| {
        request
            .query_pairs()
            .iter()
            .any(|(name, value)| *name == k && *value == v)
    })
}

/// `is_valid:true` in a key-value form response.
fn is_valid(body: &str) -> bool {
    body.lines().any(|line| {
        line.split_once(':')
            .is_some_and(|(key, value)| key.trim() == "is_valid" && value.trim() == "true")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use passage_http::{HttpResponse, MockTransport};

    const OP_XRDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xrds:XRDS xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)"><XRD>
  <Service><Type>http://specs.openid.net/auth/2.0/server</Type>
  <URI>https://op.example/auth</URI></Service>
</XRD></xrds:XRDS>"#;

    const USER_XRDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xrds:XRDS xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)"><XRD>
  <Service><Type>http://specs.openid.net/auth/2.0/signon</Type>
  <URI>https://op.example/auth</URI></Service>
</XRD></xrds:XRDS>"#;

    fn xrds(body: &str) -> HttpResponse {
        HttpResponse::new(200, body).with_header("Content-Type", "application/xrds+xml")
    }

    fn client(transport: &Arc<MockTransport>) -> HttpOpenIdClient {
        HttpOpenIdClient::new(Arc::clone(transport) as Arc<dyn HttpTransport>, None)
    }

    fn assertion() -> InboundRequest {
        InboundRequest::get("https://app.example/login?openid_provider=google")
            .with_query("openid.ns", OPENID_NAMESPACE)
            .with_query("openid.mode", "id_res")
            .with_query("openid.op_endpoint", "https://op.example/auth")
            .with_query("openid.claimed_id", "https://op.example/id/42")
            .with_query("openid.identity", "https://op.example/id/42")
            .with_query(
                "openid.return_to",
                "https://app.example/login?openid_provider=google",
            )
            .with_query("openid.response_nonce", "2011-01-01T00:00:00Zabc")
            .with_query("openid.assoc_handle", "h1")
            .with_query(
                "openid.signed",
                "op_endpoint,claimed_id,identity,return_to,response_nonce,assoc_handle",
            )
            .with_query("openid.sig", "c2lnbmF0dXJl")
    }

    #[test]
    fn test_auth_url_for_op_identifier_with_ax() {
        let transport = Arc::new(MockTransport::new().with_response(xrds(OP_XRDS)));

        let url = client(&transport)
            .auth_url(
                "https://op.example/id",
                "https://app.example/login?openid_provider=google",
                &["contact/email".to_owned()],
            )
            .unwrap();

        let parsed = url::Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/auth");
        let params: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("openid.mode"), Some("checkid_setup"));
        assert_eq!(get("openid.claimed_id"), Some(IDENTIFIER_SELECT));
        assert_eq!(get("openid.identity"), Some(IDENTIFIER_SELECT));
        assert_eq!(
            get("openid.realm"),
            Some("https://app.example/login?openid_provider=google")
        );
        assert_eq!(get("openid.ns.ax"), Some(AX_NAMESPACE));
        assert_eq!(
            get("openid.ax.type.contact_email"),
            Some("http://axschema.org/contact/email")
        );
        assert_eq!(get("openid.ax.required"), Some("contact_email"));
    }

    #[test]
    fn test_auth_url_uses_configured_realm_and_claimed_identifier() {
        let transport = Arc::new(MockTransport::new().with_response(xrds(USER_XRDS)));
        let client = HttpOpenIdClient::new(
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            Some("https://app.example/".to_owned()),
        );

        let url = client
            .auth_url("https://user.example/", "https://app.example/cb", &[])
            .unwrap();

        assert!(url.starts_with("https://op.example/auth?"));
        assert!(url.contains("openid.realm=https%3A%2F%2Fapp.example%2F&"));
        assert!(url.contains("openid.claimed_id=https%3A%2F%2Fuser.example%2F"));
        assert!(!url.contains("openid.ns.ax"));
    }

    #[test]
    fn test_validate_positive_assertion() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(xrds(USER_XRDS))
                .with_response(HttpResponse::new(
                    200,
                    "ns:http://specs.openid.net/auth/2.0\nis_valid:true\n",
                )),
        );

        assert!(client(&transport).validate(&assertion()).unwrap());

        let check = transport.last_request().unwrap();
        assert_eq!(check.url, "https://op.example/auth");
        match check.body {
            Body::Form(fields) => {
                assert!(fields.contains(&(
                    "openid.mode".to_owned(),
                    "check_authentication".to_owned()
                )));
                assert!(fields.contains(&("openid.assoc_handle".to_owned(), "h1".to_owned())));
                assert!(fields.contains(&(
                    "openid.response_nonce".to_owned(),
                    "2011-01-01T00:00:00Zabc".to_owned()
                )));
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejected_by_provider() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(xrds(USER_XRDS))
                .with_response(HttpResponse::new(200, "is_valid:false\n")),
        );
        assert!(!client(&transport).validate(&assertion()).unwrap());
    }

    #[test]
    fn test_validate_return_to_mismatch_skips_network() {
        let transport = Arc::new(MockTransport::new());
        let request = InboundRequest::get("https://evil.example/login?openid_provider=google")
            .with_query("openid.mode", "id_res")
            .with_query(
                "openid.return_to",
                "https://app.example/login?openid_provider=google",
            );

        assert!(!client(&transport).validate(&request).unwrap());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_validate_other_op_endpoint() {
        let elsewhere = USER_XRDS.replace("https://op.example/auth", "https://other.example/auth");
        let transport = Arc::new(MockTransport::new().with_response(xrds(&elsewhere)));
        assert!(!client(&transport).validate(&assertion()).unwrap());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_validate_transport_error_propagates() {
        let transport = Arc::new(MockTransport::new());
        let err = client(&transport).validate(&assertion()).unwrap_err();
        assert!(matches!(err, OpenIdError::Transport(_)));
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid("is_valid:true"));
        assert!(is_valid("ns:x\nis_valid : true\n"));
        assert!(!is_valid("is_valid:false"));
        assert!(!is_valid(""));
    }
}
