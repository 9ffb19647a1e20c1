//! Retry-with-recovery around volatile API calls.
//!
//! Unlike transport retries, the result of an attempt here is a *response*:
//! the caller's classifier decides whether it signals a dead session (or any
//! other condition worth another go), and an optional [`Recover`] hook runs
//! between attempts, typically re-authenticating the session.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::{ApiRequest, ApiResponse, ApiSession};
use crate::error::Result;

/// Whether a call site retries at all, and how many times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Retries after the first attempt. The operation runs at most
    /// `1 + max_attempts` times.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 1,
        }
    }
}

impl RetryPolicy {
    pub const fn enabled(max_attempts: u32) -> Self {
        Self {
            enabled: true,
            max_attempts,
        }
    }

    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            max_attempts: 0,
        }
    }
}

/// Anything exposing an HTTP-like status code.
pub trait HasStatus {
    fn status(&self) -> u16;
}

impl HasStatus for ApiResponse {
    fn status(&self) -> u16 {
        self.status
    }
}

/// Status codes a single call site treats as "try again".
///
/// The platform signals an expired session with different codes depending on
/// the endpoint (401, 403, 999 have all been seen), so each call site owns
/// its own set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryStatuses(Vec<u16>);

impl RetryStatuses {
    pub fn new(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self(statuses.into_iter().collect())
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn contains(&self, status: u16) -> bool {
        self.0.contains(&status)
    }

    pub fn matches<T: HasStatus + ?Sized>(&self, value: &T) -> bool {
        self.contains(value.status())
    }
}

/// Action run between two attempts.
#[async_trait]
pub trait Recover: Send + Sync {
    async fn recover(&self) -> Result<()>;
}

/// Policy plus the statuses it reacts to, as configured for one call site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrySettings {
    pub policy: RetryPolicy,
    pub retry_on: RetryStatuses,
}

impl RetrySettings {
    pub fn new(policy: RetryPolicy, retry_on: RetryStatuses) -> Self {
        Self { policy, retry_on }
    }
}

/// Run `operation` until `retryable` rejects its result or the policy is spent.
///
/// Errors from `operation` and from `recover` propagate immediately; only
/// `Ok` values are classified. The last result is returned as-is even if it
/// is still retryable.
pub async fn with_retry<T, C, F, Fut>(
    policy: &RetryPolicy,
    retryable: C,
    recover: Option<&dyn Recover>,
    mut operation: F,
) -> Result<T>
where
    C: Fn(&T) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        let result = operation().await?;

        if !retryable(&result) || !policy.enabled || attempt >= policy.max_attempts {
            return Ok(result);
        }

        attempt += 1;
        warn!(
            attempt,
            max = policy.max_attempts,
            "Retryable result, retrying"
        );

        if let Some(recover) = recover {
            debug!("Running recovery before retry");
            recover.recover().await?;
        }
    }
}

/// GET `request` through `session`, retrying on the configured statuses.
pub async fn get_with_retry<S>(
    session: &S,
    request: &ApiRequest,
    settings: &RetrySettings,
    recover: Option<&dyn Recover>,
) -> Result<ApiResponse>
where
    S: ApiSession + ?Sized,
{
    with_retry(
        &settings.policy,
        |response: &ApiResponse| settings.retry_on.matches(response),
        recover,
        || session.get(request.clone()),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkedinError;
    use crate::test_support::CountingRecover;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_not_retryable_runs_once() {
        let calls = AtomicU32::new(0);
        let recover = CountingRecover::default();

        let result = with_retry(
            &RetryPolicy::enabled(5),
            |status: &u16| *status == 401,
            Some(&recover),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(200u16) }
            },
        )
        .await
        .unwrap();

        assert_eq!(result, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(recover.calls(), 0);
    }

    #[tokio::test]
    async fn test_always_retryable_is_bounded() {
        let calls = AtomicU32::new(0);
        let recover = CountingRecover::default();

        let result = with_retry(
            &RetryPolicy::enabled(3),
            |status: &u16| *status == 401,
            Some(&recover),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(401u16) }
            },
        )
        .await
        .unwrap();

        assert_eq!(result, 401);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Never recovers after the final attempt.
        assert_eq!(recover.calls(), 3);
    }

    #[tokio::test]
    async fn test_disabled_policy_never_retries() {
        let calls = AtomicU32::new(0);

        let result = with_retry(
            &RetryPolicy::default(),
            |status: &u16| *status == 401,
            None,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(401u16) }
            },
        )
        .await
        .unwrap();

        assert_eq!(result, 401);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_once() {
        let calls = AtomicU32::new(0);
        let recover = CountingRecover::default();

        with_retry(
            &RetryPolicy::enabled(0),
            |_: &u16| true,
            Some(&recover),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(999u16) }
            },
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(recover.calls(), 0);
    }

    #[tokio::test]
    async fn test_succeeds_after_recovery() {
        let calls = AtomicU32::new(0);
        let recover = CountingRecover::default();

        let result = with_retry(
            &RetryPolicy::enabled(2),
            |status: &u16| *status == 403,
            Some(&recover),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(if n == 0 { 403u16 } else { 200 }) }
            },
        )
        .await
        .unwrap();

        assert_eq!(result, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(recover.calls(), 1);
    }

    #[tokio::test]
    async fn test_operation_error_propagates() {
        let calls = AtomicU32::new(0);

        let result: Result<u16> = with_retry(
            &RetryPolicy::enabled(3),
            |_: &u16| true,
            None,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LinkedinError::Timeout) }
            },
        )
        .await;

        assert!(matches!(result, Err(LinkedinError::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recover_error_propagates() {
        let calls = AtomicU32::new(0);
        let recover = CountingRecover::failing();

        let result = with_retry(
            &RetryPolicy::enabled(3),
            |_: &u16| true,
            Some(&recover),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(401u16) }
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(LinkedinError::AuthenticationChallenge(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(recover.calls(), 1);
    }

    #[test]
    fn test_retry_statuses() {
        let statuses = RetryStatuses::new([401, 403, 999]);
        assert!(statuses.matches(&ApiResponse::new(999, "")));
        assert!(!statuses.matches(&ApiResponse::new(200, "")));
        assert!(!RetryStatuses::none().contains(401));
    }

    #[test]
    fn test_policy_deserializes_partially() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"enabled": true}"#).unwrap();
        assert_eq!(policy, RetryPolicy::enabled(1));
    }
}
