//! # cartsync-client
//!
//! Outbound calls to the inventory service.
//!
//! [`AuthenticatedClient`] injects the stored bearer credential and owns the
//! 401 policy: one retry after a fixed backoff, then the credential is
//! cleared. Everything below it goes through the [`HttpTransport`] seam.

pub mod auth;
pub mod transport;

pub use auth::{ApiRequest, AuthPolicy, AuthenticatedClient, VALIDATION_PROBE_PATH};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
