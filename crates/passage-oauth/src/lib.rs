//! OAuth consumer providers for Twitter, Facebook and mixi.
//!
//! The crate covers both directions of an OAuth integration:
//!
//! - **3-legged flows** (Twitter OAuth 1.0a, Facebook and mixi Graph OAuth 2):
//!   build the authorization URI, complete the callback, persist the access
//!   token in a [`TokenStore`] and call the platform API
//! - **2-legged mixi applications**: verify the HMAC-SHA1 or RSA-SHA1
//!   signature mixi puts on inbound requests, and sign calls back into the
//!   OpenSocial API
//!
//! # Architecture
//!
//! - [`OAuthFactory`] builds a [`Provider`] from configured credentials
//! - [`OAuthProvider`] and [`ThreeLeggedProvider`] are the provider
//!   capabilities
//! - [`oauth1`] holds the RFC 5849 primitives; [`SignatureVerifier`] checks
//!   signatures against a [`SignatureContext`]
//! - [`CertificateSet`] carries the RSA certificates mixi signs with
//!
//! All outbound traffic goes through [`passage_http::HttpTransport`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use passage_oauth::{AuthorizeOptions, MemoryTokenStore, OAuthFactory};
//!
//! let factory = OAuthFactory::new(&config, Arc::new(transport));
//! let mut provider = factory.create("twitter", &request)?;
//! let uri = provider
//!     .three_legged_mut()
//!     .expect("twitter has a callback step")
//!     .authorize_uri(&AuthorizeOptions::new().callback(callback), &mut store)?;
//! ```

mod certs;
mod error;
mod factory;
pub mod oauth1;
mod providers;
mod store;
mod token;
mod verify;

pub use certs::{CertificateSet, PinnedCertificate, PublicCertificate};
pub use error::{CertificateError, OAuthError, RequestError};
pub use factory::OAuthFactory;
pub use providers::{
    ApiRequest, AuthorizeOptions, FacebookProvider, MixiAppProvider, MixiGraphProvider,
    OAuthProvider, Provider, ProviderId, ThreeLeggedProvider, TwitterProvider,
};
pub use store::{MemoryTokenStore, TokenStore};
pub use token::{AccessToken, ConsumerCredentials, RequestToken};
pub use verify::{Authorization, Rejection, SignatureContext, SignatureType, SignatureVerifier};
