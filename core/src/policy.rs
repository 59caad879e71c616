//! The two failure policies, named at every call site.
//!
//! Reporting reads use `degrade_with`: the caller never sees an error, only
//! the fallback. State-changing and identity calls use `wrap_and_throw`: the
//! error reaches the caller with a message fit to show a user.

use std::future::Future;

use crate::error::ApiError;

/// Run `operation`; on failure log it and return `fallback()` instead.
pub async fn degrade_with<T, F, Fut>(label: &str, fallback: F, operation: Fut) -> T
where
    F: FnOnce() -> T,
    Fut: Future<Output = Result<T, ApiError>>,
{
    match operation.await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(operation = label, error = %e, "request failed, using fallback");
            fallback()
        }
    }
}

/// Run `operation`; on failure log it and rewrap it as `ApiError::Request`,
/// preferring the server's `message` over `generic_message`.
pub async fn wrap_and_throw<T, Fut>(
    label: &str,
    generic_message: &str,
    operation: Fut,
) -> Result<T, ApiError>
where
    Fut: Future<Output = Result<T, ApiError>>,
{
    operation.await.map_err(|e| {
        tracing::error!(operation = label, error = %e, "request failed");
        ApiError::Request {
            message: e
                .server_message()
                .unwrap_or_else(|| generic_message.to_string()),
            source: Box::new(e),
        }
    })
}
