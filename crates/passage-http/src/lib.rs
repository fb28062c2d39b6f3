//! HTTP plumbing for passage.
//!
//! This crate provides the [`HttpTransport`] trait that OAuth and OpenID code
//! uses for every outbound platform call, plus an explicit model of the
//! inbound request being handled. This enables:
//!
//! - **Unit testing** provider flows without network access
//! - **Explicit request data** instead of framework-global request objects
//!
//! # Architecture
//!
//! The crate provides:
//! - [`HttpTransport`] trait with a single `execute()` method
//! - [`UreqTransport`] implementation backed by a blocking `ureq` agent
//! - [`InboundRequest`] describing the request the host application received
//! - [`ClientDevice`] classification of the requesting browser
//! - [`MockTransport`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use passage_http::{HttpRequest, HttpTransport, Method, UreqTransport};
//!
//! let transport = UreqTransport::new(Duration::from_secs(30), "passage");
//! let response = transport.execute(&HttpRequest::new(Method::Get, "https://example.com/"))?;
//! assert_eq!(response.status, 200);
//! ```

mod device;
mod inbound;
#[cfg(feature = "mock")]
mod mock;
mod multipart;
mod transport;
mod ureq_transport;

pub use device::{Carrier, ClientDevice};
pub use inbound::InboundRequest;
#[cfg(feature = "mock")]
pub use mock::MockTransport;
pub use multipart::{FilePart, Multipart};
pub use transport::{
    Body, HttpRequest, HttpResponse, HttpTransport, Method, TransportError, UnsupportedMethod,
    append_query,
};
pub use ureq_transport::UreqTransport;
