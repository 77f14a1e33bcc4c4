//! JSON-over-HTTP plumbing shared by the backend adapters.

use ghost_core::{GhostError, Result};
use serde::de::DeserializeOwned;

/// Use `configured` when set, otherwise the vendor's environment variable
pub fn resolve_api_key(configured: &str, env_var: &str) -> String {
    if configured.is_empty() {
        std::env::var(env_var).unwrap_or_default()
    } else {
        configured.to_string()
    }
}

/// Base URL with any trailing slash removed
pub fn resolve_base_url(host: &str, default: &str) -> String {
    let base = if host.is_empty() { default } else { host };
    base.trim_end_matches('/').to_string()
}

/// Send a prepared request and decode the JSON reply
pub async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
    let response = request.send().await.map_err(map_transport_error)?;

    let status = response.status();
    let body = response.text().await.map_err(map_transport_error)?;
    if !status.is_success() {
        return Err(GhostError::Provider(format!("{status}: {body}")));
    }

    tracing::trace!(%status, "Backend reply: {}", body);
    serde_json::from_str(&body)
        .map_err(|e| GhostError::Parse(format!("unexpected backend reply: {e}")))
}

fn map_transport_error(err: reqwest::Error) -> GhostError {
    if err.is_connect() || err.is_timeout() {
        GhostError::ProviderUnavailable(err.to_string())
    } else {
        GhostError::Provider(err.to_string())
    }
}
