// ABOUTME: Provider module aggregating the HTTP adapters for model backends.
// ABOUTME: Shares HTTP status handling so every adapter reports failures the same way.

pub mod anthropic;
pub mod openai;

use crate::runtime::BackendError;

/// Map a non-success HTTP status onto a BackendError. Returns the response
/// untouched when it succeeded.
pub(crate) async fn check_status(
    response: reqwest::Response,
    credential_hint: &str,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(BackendError::RateLimited);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(BackendError::Unauthorized(format!(
            "{}: check {}",
            status, credential_hint
        )));
    }

    if status.is_server_error() {
        return Err(BackendError::ProviderError(format!(
            "Server error: {}",
            status
        )));
    }

    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(BackendError::ProviderError(format!(
            "API error {}: {}",
            status, error_body
        )));
    }

    Ok(response)
}

/// Map a reqwest transport failure, distinguishing timeouts.
pub(crate) fn transport_error(err: reqwest::Error, timeout: std::time::Duration) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(timeout)
    } else {
        BackendError::ProviderError(format!("HTTP request failed: {}", err))
    }
}
