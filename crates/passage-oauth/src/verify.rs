//! Verification of OAuth 1.0 signed inbound requests.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use sha1::Sha1;
use tracing::debug;

use crate::error::OAuthError;
use crate::oauth1;

/// Method, URL and parameters whose signature is being checked.
#[derive(Debug, Clone)]
pub struct SignatureContext {
    /// HTTP method as received.
    pub http_method: String,
    /// Request URL; any query string is ignored, pass query values in
    /// `parameters`.
    pub uri: String,
    /// Signed parameters. `oauth_signature` is excluded automatically.
    pub parameters: Vec<(String, String)>,
}

impl SignatureContext {
    pub fn new(
        http_method: impl Into<String>,
        uri: impl Into<String>,
        parameters: Vec<(String, String)>,
    ) -> Self {
        Self {
            http_method: http_method.into(),
            uri: uri.into(),
            parameters,
        }
    }

    /// First parameter named `name`.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Signature base string per RFC 5849 Section 3.4.1.
    pub fn base_string(&self) -> Result<String, url::ParseError> {
        let normalized = oauth1::normalize_url(&self.uri)?;
        Ok(oauth1::signature_base_string(
            &self.http_method,
            &normalized.base,
            &self.parameters,
        ))
    }
}

/// Signature algorithm and key material.
#[derive(Debug, Clone)]
pub enum SignatureVerifier {
    /// HMAC-SHA1 keyed with `consumer_secret&token_secret`.
    HmacSha1 {
        consumer_secret: String,
        token_secret: String,
    },
    /// RSA-SHA1 (PKCS#1 v1.5) against a public key.
    RsaSha1(RsaPublicKey),
}

impl SignatureVerifier {
    /// Check a base64 signature against the context.
    ///
    /// Undecodable signatures and unparsable URLs are reported as mismatches.
    #[must_use]
    pub fn verify(&self, context: &SignatureContext, signature: &str) -> bool {
        let Ok(bytes) = BASE64_STANDARD.decode(signature.trim()) else {
            debug!("Signature is not valid base64");
            return false;
        };
        let base = match context.base_string() {
            Ok(base) => base,
            Err(e) => {
                debug!(uri = %context.uri, error = %e, "Cannot normalize request URL");
                return false;
            }
        };

        match self {
            Self::HmacSha1 {
                consumer_secret,
                token_secret,
            } => oauth1::hmac_sha1_matches(&base, consumer_secret, token_secret, &bytes),
            Self::RsaSha1(public_key) => {
                let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
                    return false;
                };
                VerifyingKey::<Sha1>::new(public_key.clone())
                    .verify(base.as_bytes(), &signature)
                    .is_ok()
            }
        }
    }
}

/// Signed request variants sent by mixi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureType {
    /// HMAC-SHA1 in the `Authorization` header (mobile apps).
    Hmac,
    /// RSA-SHA1 from PC apps.
    RsaPc,
    /// RSA-SHA1 from touch apps.
    RsaTouch,
    /// RSA-SHA1 photo upload callback.
    RsaPhotoUpload,
    /// RSA-SHA1 lifecycle event notification.
    RsaLifecycleEvent,
}

impl SignatureType {
    pub const ALL: [Self; 5] = [
        Self::Hmac,
        Self::RsaPc,
        Self::RsaTouch,
        Self::RsaPhotoUpload,
        Self::RsaLifecycleEvent,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hmac => "hmac",
            Self::RsaPc => "rsa-pc",
            Self::RsaTouch => "rsa-touch",
            Self::RsaPhotoUpload => "rsa-photo-upload",
            Self::RsaLifecycleEvent => "rsa-lifecycle-event",
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureType {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                OAuthError::configuration(format!("Signature format is not supported. [{s}]"))
            })
    }
}

/// Outcome of verifying an inbound signed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Authorized,
    NotAuthorized(Rejection),
}

impl Authorization {
    #[must_use]
    pub fn is_authorized(self) -> bool {
        self == Self::Authorized
    }
}

/// Why a signed request was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No signature was sent.
    MissingSignature,
    /// Signature or header could not be decoded.
    Malformed,
    /// Signature does not match the request.
    Mismatch,
    /// Verification certificate is past its `notAfter`.
    CertificateExpired,
    /// Lifecycle event carried an OpenSocial owner or viewer ID.
    OpenSocialIdPresent,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MissingSignature => "signature missing",
            Self::Malformed => "malformed signature",
            Self::Mismatch => "signature mismatch",
            Self::CertificateExpired => "certificate expired",
            Self::OpenSocialIdPresent => "OpenSocial ID present on lifecycle event",
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rsa::RsaPrivateKey;
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::signature::{SignatureEncoding, Signer};

    use crate::certs::PublicCertificate;
    use crate::certs::tests::SIGNER_CERT;

    pub(crate) const SIGNER_KEY: &str = include_str!("../testdata/signer_key.pem");
    pub(crate) const OTHER_KEY: &str = include_str!("../testdata/other_key.pem");

    /// RSA-SHA1 signature of the context's base string.
    pub(crate) fn rsa_sign(key_pem: &str, context: &SignatureContext) -> String {
        let key = RsaPrivateKey::from_pkcs8_pem(key_pem).unwrap();
        let signature = SigningKey::<Sha1>::new(key).sign(context.base_string().unwrap().as_bytes());
        BASE64_STANDARD.encode(signature.to_bytes())
    }

    fn context() -> SignatureContext {
        SignatureContext::new(
            "GET",
            "http://example.com/mixi/app",
            vec![
                ("opensocial_app_id".to_owned(), "1234".to_owned()),
                ("oauth_nonce".to_owned(), "n".to_owned()),
            ],
        )
    }

    fn verifier() -> SignatureVerifier {
        let certificate = PublicCertificate::from_pem(SIGNER_CERT).unwrap();
        SignatureVerifier::RsaSha1(certificate.public_key().clone())
    }

    #[test]
    fn test_rsa_signature_with_matching_key() {
        let signature = rsa_sign(SIGNER_KEY, &context());
        assert!(verifier().verify(&context(), &signature));
    }

    #[test]
    fn test_rsa_signature_with_other_key() {
        let signature = rsa_sign(OTHER_KEY, &context());
        assert!(!verifier().verify(&context(), &signature));
    }

    #[test]
    fn test_rsa_signature_over_changed_parameters() {
        let signature = rsa_sign(SIGNER_KEY, &context());
        let mut changed = context();
        changed.parameters[0].1 = "9999".to_owned();
        assert!(!verifier().verify(&changed, &signature));
    }

    #[test]
    fn test_oauth_signature_parameter_is_not_signed() {
        let signature = rsa_sign(SIGNER_KEY, &context());
        let mut with_signature = context();
        with_signature
            .parameters
            .push(("oauth_signature".to_owned(), signature.clone()));
        assert!(verifier().verify(&with_signature, &signature));
    }

    #[test]
    fn test_hmac_verifier() {
        let base = context().base_string().unwrap();
        let signature = oauth1::hmac_sha1(&base, "secret", "").unwrap();
        let verifier = SignatureVerifier::HmacSha1 {
            consumer_secret: "secret".to_owned(),
            token_secret: String::new(),
        };
        assert!(verifier.verify(&context(), &signature));
        assert!(!verifier.verify(&context(), "not base64!"));
    }

    #[test]
    fn test_signature_type_names() {
        for signature_type in SignatureType::ALL {
            assert_eq!(
                signature_type.as_str().parse::<SignatureType>().unwrap(),
                signature_type
            );
        }
        let err = "rsa-mobile".parse::<SignatureType>().unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Signature format is not supported. [rsa-mobile]");
    }
}
