//! In-memory doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{ApiRequest, ApiResponse, ApiSession};
use crate::cookies::CookieSet;
use crate::error::{LinkedinError, Result};
use crate::retry::Recover;

#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Scripted [`ApiSession`].
///
/// Responses are routed by the longest matching path prefix. Each route
/// plays its responses in order and then keeps repeating the last one;
/// unrouted paths answer 404.
#[derive(Default)]
pub struct FakeSession {
    routes: Mutex<Vec<(String, VecDeque<ApiResponse>)>>,
    requests: Mutex<Vec<ApiRequest>>,
    cookies: CookieSet,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, prefix: &str, responses: impl IntoIterator<Item = ApiResponse>) {
        self.routes
            .lock()
            .push((prefix.to_string(), responses.into_iter().collect()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path.starts_with(prefix))
            .count()
    }

    fn answer(&self, request: ApiRequest) -> ApiResponse {
        let mut routes = self.routes.lock();
        let response = routes
            .iter_mut()
            .filter(|(prefix, _)| request.path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .and_then(|(_, queue)| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
            .unwrap_or_else(|| ApiResponse::new(404, ""));
        self.requests.lock().push(request);
        response
    }
}

#[async_trait]
impl ApiSession for FakeSession {
    async fn get(&self, request: ApiRequest) -> Result<ApiResponse> {
        Ok(self.answer(request))
    }

    async fn post(&self, request: ApiRequest) -> Result<ApiResponse> {
        Ok(self.answer(request))
    }

    fn cookies(&self) -> CookieSet {
        self.cookies.clone()
    }
}

/// [`Recover`] that counts its invocations and optionally fails.
#[derive(Default)]
pub struct CountingRecover {
    calls: AtomicU32,
    fail: bool,
}

impl CountingRecover {
    pub fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recover for CountingRecover {
    async fn recover(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LinkedinError::AuthenticationChallenge("CHALLENGE".into()));
        }
        Ok(())
    }
}
