//! OpenID 2.0 endpoint discovery: Yadis/XRDS with an HTML fallback.

use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;
use tracing::debug;

use passage_http::{HttpRequest, HttpResponse, HttpTransport, Method};

use crate::error::OpenIdError;

const SERVER_TYPE: &str = "http://specs.openid.net/auth/2.0/server";
const SIGNON_TYPE: &str = "http://specs.openid.net/auth/2.0/signon";

/// Yadis redirects followed before giving up.
const MAX_XRDS_LOCATIONS: usize = 3;

static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<link\s[^>]*>").unwrap());
static REL_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\brel\s*=\s*["']([^"']+)["']"#).unwrap());
static HREF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).unwrap());

/// Where and how to send an authentication request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// OP endpoint URL.
    pub server: String,
    /// OP-local identifier to assert, when the claimed identifier has one.
    pub local_id: Option<String>,
    /// The identifier names the provider, not a user; the provider picks
    /// the identity.
    pub identifier_select: bool,
}

/// Discover the OP endpoint for a claimed or provider identifier.
pub fn discover(transport: &dyn HttpTransport, identifier: &str) -> Result<Endpoint, OpenIdError> {
    let mut url = identifier.to_owned();
    for _ in 0..MAX_XRDS_LOCATIONS {
        let request = HttpRequest::new(Method::Get, &url)
            .header("Accept", "application/xrds+xml, text/html;q=0.9");
        let response = transport.execute(&request)?;
        if !response.is_ok() {
            return Err(OpenIdError::discovery(
                identifier,
                format!("{url} returned {}", response.status),
            ));
        }

        if let Some(location) = response.header("X-XRDS-Location")
            && location != url
        {
            debug!(identifier, location, "Following X-XRDS-Location");
            url = location.to_owned();
            continue;
        }

        if is_xrds(&response) {
            return parse_xrds(&response.body)?
                .ok_or_else(|| OpenIdError::discovery(identifier, "no OpenID 2.0 service"));
        }
        return parse_html(&response.body)
            .ok_or_else(|| OpenIdError::discovery(identifier, "no openid2.provider link"));
    }
    Err(OpenIdError::discovery(identifier, "too many XRDS redirects"))
}

fn is_xrds(response: &HttpResponse) -> bool {
    response
        .content_type()
        .to_ascii_lowercase()
        .contains("application/xrds+xml")
        || response.body.contains("<xrds:XRDS")
        || response.body.contains("<XRDS")
}

#[derive(Default)]
struct Service {
    types: Vec<String>,
    uri: Option<String>,
    local_id: Option<String>,
}

/// Pick the OpenID 2.0 service from an XRDS document.
///
/// An OP identifier service wins over a claimed identifier service.
pub(crate) fn parse_xrds(xml: &str) -> Result<Option<Endpoint>, OpenIdError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut services: Vec<Service> = Vec::new();
    let mut current: Option<Service> = None;
    let mut element = String::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = reader.decoder().decode(e.local_name().as_ref())?.into_owned();
                if name == "Service" {
                    current = Some(Service::default());
                }
                element = name;
                text.clear();
            }
            Event::Text(e) => {
                text.push_str(&reader.decoder().decode(&e)?);
            }
            Event::GeneralRef(e) => {
                let entity = reader.decoder().decode(&e)?.into_owned();
                text.push_str(decode_entity(&entity));
            }
            Event::End(e) => {
                let name = reader.decoder().decode(e.local_name().as_ref())?.into_owned();
                if name == "Service" {
                    services.extend(current.take());
                } else if let Some(service) = current.as_mut() {
                    let value = text.trim().to_owned();
                    match element.as_str() {
                        "Type" => service.types.push(value),
                        "URI" if service.uri.is_none() => service.uri = Some(value),
                        "LocalID" => service.local_id = Some(value),
                        _ => {}
                    }
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let endpoint = |service: &Service, identifier_select: bool| {
        service.uri.clone().map(|server| Endpoint {
            server,
            local_id: if identifier_select {
                None
            } else {
                service.local_id.clone()
            },
            identifier_select,
        })
    };
    let has_type = |service: &Service, ty: &str| service.types.iter().any(|t| t == ty);

    Ok(services
        .iter()
        .filter(|s| has_type(s, SERVER_TYPE))
        .find_map(|s| endpoint(s, true))
        .or_else(|| {
            services
                .iter()
                .filter(|s| has_type(s, SIGNON_TYPE))
                .find_map(|s| endpoint(s, false))
        }))
}

fn decode_entity(entity: &str) -> &str {
    match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => "",
    }
}

/// `<link rel="openid2.provider">` discovery.
pub(crate) fn parse_html(html: &str) -> Option<Endpoint> {
    let mut server = None;
    let mut local_id = None;
    for tag in LINK_TAG.find_iter(html) {
        let tag = tag.as_str();
        let (Some(rel), Some(href)) = (REL_ATTR.captures(tag), HREF_ATTR.captures(tag)) else {
            continue;
        };
        let href = href[1].replace("&amp;", "&");
        for rel in rel[1].split_whitespace() {
            match rel {
                "openid2.provider" => server = Some(href.clone()),
                "openid2.local_id" => local_id = Some(href.clone()),
                _ => {}
            }
        }
    }
    server.map(|server| Endpoint {
        server,
        local_id,
        identifier_select: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use passage_http::MockTransport;

    const OP_XRDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xrds:XRDS xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)">
  <XRD>
    <Service priority="0">
      <Type>http://specs.openid.net/auth/2.0/server</Type>
      <Type>http://openid.net/srv/ax/1.0</Type>
      <URI>https://op.example/openid?source=x&amp;v=2</URI>
    </Service>
  </XRD>
</xrds:XRDS>"#;

    const SIGNON_XRDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xrds:XRDS xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)">
  <XRD>
    <Service priority="10">
      <Type>http://specs.openid.net/auth/2.0/signon</Type>
      <URI>https://op.example/server</URI>
      <LocalID>https://op.example/user/42</LocalID>
    </Service>
  </XRD>
</xrds:XRDS>"#;

    #[test]
    fn test_parse_xrds_op_identifier() {
        let endpoint = parse_xrds(OP_XRDS).unwrap().unwrap();
        assert_eq!(
            endpoint,
            Endpoint {
                server: "https://op.example/openid?source=x&v=2".to_owned(),
                local_id: None,
                identifier_select: true,
            }
        );
    }

    #[test]
    fn test_parse_xrds_claimed_identifier() {
        let endpoint = parse_xrds(SIGNON_XRDS).unwrap().unwrap();
        assert_eq!(endpoint.server, "https://op.example/server");
        assert_eq!(endpoint.local_id.as_deref(), Some("https://op.example/user/42"));
        assert!(!endpoint.identifier_select);
    }

    #[test]
    fn test_parse_xrds_without_openid_service() {
        let xml = r#"<xrds:XRDS xmlns:xrds="xri://$xrds"><XRD><Service>
            <Type>http://example.com/other</Type><URI>https://x.example/</URI>
        </Service></XRD></xrds:XRDS>"#;
        assert_eq!(parse_xrds(xml).unwrap(), None);
    }

    #[test]
    fn test_parse_html_links() {
        let html = r#"<html><head>
            <link href="https://op.example/auth" rel="openid2.provider openid.server">
            <link rel='openid2.local_id' href='https://op.example/id/7' />
        </head></html>"#;
        let endpoint = parse_html(html).unwrap();
        assert_eq!(endpoint.server, "https://op.example/auth");
        assert_eq!(endpoint.local_id.as_deref(), Some("https://op.example/id/7"));
        assert_eq!(parse_html("<html></html>"), None);
    }

    #[test]
    fn test_discover_follows_xrds_location() {
        let transport = MockTransport::new()
            .with_response(
                HttpResponse::new(200, "<html></html>")
                    .with_header("X-XRDS-Location", "https://op.example/xrds"),
            )
            .with_response(
                HttpResponse::new(200, OP_XRDS).with_header("Content-Type", "application/xrds+xml"),
            );

        let endpoint = discover(&transport, "https://op.example/").unwrap();

        assert!(endpoint.identifier_select);
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url, "https://op.example/xrds");
    }

    #[test]
    fn test_discover_html_fallback_and_failure() {
        let transport = MockTransport::new()
            .with_response(HttpResponse::new(
                200,
                r#"<link rel="openid2.provider" href="https://op.example/auth">"#,
            ))
            .with_response(HttpResponse::new(200, "<html></html>"))
            .with_response(HttpResponse::new(404, "missing"));

        assert_eq!(
            discover(&transport, "https://user.example/").unwrap().server,
            "https://op.example/auth"
        );
        assert!(matches!(
            discover(&transport, "https://user.example/"),
            Err(OpenIdError::Discovery { .. })
        ));
        assert!(matches!(
            discover(&transport, "https://user.example/"),
            Err(OpenIdError::Discovery { .. })
        ));
    }
}
