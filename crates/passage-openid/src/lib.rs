//! OpenID 2.0 login for passage.
//!
//! An [`OpenIdSession`] drives one handshake: build the URL that sends the
//! user to the provider, then read and verify the provider's response.
//! Protocol work (Yadis discovery, `checkid_setup`, `check_authentication`)
//! sits behind the [`OpenIdClient`] trait, implemented over
//! [`passage_http::HttpTransport`] by [`HttpOpenIdClient`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use passage_openid::{AttributeExchange, HttpOpenIdClient, OpenIdFactory};
//!
//! let factory = OpenIdFactory::new(Arc::new(HttpOpenIdClient::new(transport, None)));
//! let mut session = factory.create("google")?;
//! session.set_attribute_exchange(AttributeExchange::new().with_attribute("contact/email"));
//! let uri = session.authenticate_uri("https://example.com/login")?;
//!
//! // on the callback request
//! if let Some(session) = factory.create_from_request(&request)? {
//!     println!("{:?}", session.identity());
//! }
//! ```

mod attributes;
mod client;
mod discovery;
mod error;
mod factory;
mod session;

pub use attributes::AttributeExchange;
pub use client::{HttpOpenIdClient, OpenIdClient};
pub use discovery::{Endpoint, discover};
pub use error::OpenIdError;
pub use factory::{OpenIdFactory, OpenIdProvider};
pub use session::{OpenIdSession, PROVIDER_PARAMETER};
