//! Attribute Exchange (AX 1.0) requests and responses.

use std::collections::BTreeMap;

use passage_http::InboundRequest;

/// Namespace URI identifying the AX extension.
pub(crate) const AX_NAMESPACE: &str = "http://openid.net/srv/ax/1.0";

/// Prefix of the attribute type URIs; attribute names are stored without it.
pub(crate) const AX_SCHEMA: &str = "http://axschema.org/";

/// Attributes requested from, and returned by, the OpenID provider.
///
/// Names are axschema.org types without the `http://axschema.org/` prefix,
/// e.g. `contact/email` or `namePerson/friendly`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeExchange {
    required: Vec<String>,
    values: BTreeMap<String, String>,
}

impl AttributeExchange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an attribute.
    pub fn add_attribute(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
    }

    /// Builder form of [`add_attribute`](Self::add_attribute).
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>) -> Self {
        self.add_attribute(name);
        self
    }

    /// Requested attribute names.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Value returned for an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// All returned attribute values.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Attributes returned in a positive assertion.
    #[must_use]
    pub fn from_response(request: &InboundRequest) -> Self {
        Self {
            required: Vec::new(),
            values: response_values(request),
        }
    }
}

/// AX values carried by an `id_res` response.
///
/// The extension alias is whatever the provider declared with
/// `openid.ns.<alias>`; only axschema.org types are kept.
fn response_values(request: &InboundRequest) -> BTreeMap<String, String> {
    let params = request.merged_parameters();
    let Some(alias) = params.iter().find_map(|(k, v)| {
        (v == AX_NAMESPACE)
            .then(|| k.strip_prefix("openid.ns."))
            .flatten()
    }) else {
        return BTreeMap::new();
    };

    let type_prefix = format!("openid.{alias}.type.");
    let value_prefix = format!("openid.{alias}.value.");
    let value = |key: &str| {
        let single = format!("{value_prefix}{key}");
        let first = format!("{single}.1");
        params
            .iter()
            .find(|(k, _)| *k == single || *k == first)
            .map(|(_, v)| v.clone())
    };

    params
        .iter()
        .filter_map(|(k, type_uri)| {
            let key = k.strip_prefix(&type_prefix)?;
            let name = type_uri.strip_prefix(AX_SCHEMA)?;
            Some((name.to_owned(), value(key)?))
        })
        .collect()
}
