//! Credential injection and 401 handling for the inventory service.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use cartsync_core::{CredentialStore, CredentialValidity, SyncError};

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

/// Lightweight authenticated endpoint used to check a credential.
pub const VALIDATION_PROBE_PATH: &str = "/user";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicy {
    /// Pause before the single retry of a request that got a 401.
    pub retry_delay: Duration,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Request relative to the inventory service base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

pub struct AuthenticatedClient {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialStore>,
    base_url: String,
    policy: AuthPolicy,
}

impl AuthenticatedClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialStore>,
        base_url: impl Into<String>,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            transport,
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Send `request` with the stored bearer credential.
    ///
    /// A 401 is retried exactly once after [`AuthPolicy::retry_delay`] with the
    /// same credential; a second 401 clears the credential and yields
    /// [`SyncError::SessionExpired`]. Every other status is returned as-is.
    pub async fn request(&self, request: ApiRequest) -> Result<HttpResponse, SyncError> {
        let token = self.credentials.get()?.ok_or(SyncError::NotAuthenticated)?;
        let http = self.resolve(request, &token);

        let response = self.transport.send(http.clone()).await?;
        if response.status != 401 {
            return Ok(response);
        }

        tracing::info!(
            url = %http.url,
            delay_ms = self.policy.retry_delay.as_millis() as u64,
            "inventory service answered 401, retrying once",
        );
        tokio::time::sleep(self.policy.retry_delay).await;

        let retry = self.transport.send(http).await?;
        if retry.status != 401 {
            return Ok(retry);
        }

        tracing::warn!("second consecutive 401, clearing stored credential");
        self.credentials.clear()?;
        Err(SyncError::SessionExpired)
    }

    /// Probe the service with the stored credential.
    ///
    /// Network failures are indeterminate and leave the credential alone.
    pub async fn validate_credential(&self) -> CredentialValidity {
        if !self.credentials.is_present() {
            return CredentialValidity::invalid();
        }
        match self.request(ApiRequest::get(VALIDATION_PROBE_PATH)).await {
            Ok(response) => CredentialValidity {
                valid: response.is_success(),
                network_error: false,
            },
            Err(err) if err.is_network() => {
                tracing::debug!(error = %err, "credential probe could not reach the service");
                CredentialValidity::indeterminate()
            }
            Err(err) => {
                tracing::debug!(error = %err, "credential probe failed");
                CredentialValidity::invalid()
            }
        }
    }

    fn resolve(&self, request: ApiRequest, token: &str) -> HttpRequest {
        let mut headers: Vec<(String, String)> = request
            .headers
            .into_iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("authorization"))
            .collect();
        headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        if request.body.is_some()
            && !headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        let path = request.path.trim_start_matches('/');
        HttpRequest {
            method: request.method,
            url: format!("{}/{path}", self.base_url),
            headers,
            body: request.body,
        }
    }
}
