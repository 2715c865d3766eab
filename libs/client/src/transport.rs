//! Rate-limited, retrying HTTP transport.
//!
//! Every upstream call goes through [`RateLimitedTransport::send`]. The
//! transport enforces a rolling one-second admission window shared by all
//! concurrent callers, races each attempt against a per-attempt timeout and
//! the caller's cancellation token, and retries transient failures with
//! jittered exponential backoff. Retries re-enter admission, so they count
//! against the same rate budget as first attempts.

use crate::config::RetryPolicy;
use crate::error::{AbortReason, ClientError};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Width of the rolling admission window.
const RATE_WINDOW: Duration = Duration::from_millis(1000);

/// Upstream statuses worth retrying.
const RETRYABLE_STATUS: [u16; 4] = [429, 502, 503, 504];

/// Seam over the underlying HTTP machinery.
///
/// Production uses `reqwest::Client`; tests substitute a scripted sender so
/// admission, retry, and abort behavior can be verified without a network.
#[async_trait]
pub trait HttpSend: Send + Sync {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error>;
}

#[async_trait]
impl HttpSend for reqwest::Client {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        self.execute(request).await
    }
}

/// HTTP transport with a sliding-window rate limiter and bounded retries.
///
/// One transport instance (and therefore one rate window) is shared per
/// upstream target; see [`crate::HorreumClient`].
pub struct RateLimitedTransport<S = reqwest::Client> {
    sender: S,
    policy: RetryPolicy,
    /// Admission timestamps within the trailing second, oldest first.
    window: Mutex<VecDeque<Instant>>,
}

impl<S: HttpSend> RateLimitedTransport<S> {
    pub fn new(sender: S, policy: RetryPolicy) -> Result<Self, ClientError> {
        policy.validate()?;
        Ok(Self {
            sender,
            policy,
            window: Mutex::new(VecDeque::new()),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[cfg(test)]
    pub(crate) fn sender(&self) -> &S {
        &self.sender
    }

    /// Send a request, respecting rate limit, timeout, and retry policy.
    ///
    /// Returns the final response even when its status is non-2xx; callers
    /// interpret statuses. Fails with [`ClientError::Aborted`] when the
    /// caller's token or the per-attempt timeout fires (never retried), or
    /// with [`ClientError::Network`] when transport-level errors outlast the
    /// retry budget.
    pub async fn send(
        &self,
        request: reqwest::Request,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ClientError> {
        let mut attempt: u32 = 0;
        loop {
            // A caller that is already gone gets an immediate abort without
            // consuming a rate-limit slot.
            if cancel.is_cancelled() {
                return Err(ClientError::Aborted(AbortReason::Cancelled));
            }

            let attempt_request = request
                .try_clone()
                .ok_or(ClientError::UnreplayableRequest)?;

            self.admit(cancel).await?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ClientError::Aborted(AbortReason::Cancelled));
                }
                outcome = timeout(self.policy.timeout, self.sender.send(attempt_request)) => outcome,
            };

            attempt += 1;
            match outcome {
                // Per-attempt timeout is an abort, not a retryable failure.
                Err(_) => return Err(ClientError::Aborted(AbortReason::Timeout)),
                Ok(Ok(response)) => {
                    let status = response.status().as_u16();
                    if !RETRYABLE_STATUS.contains(&status) || attempt > self.policy.max_retries {
                        return Ok(response);
                    }
                    tracing::warn!(status, attempt, "retryable upstream status, backing off");
                }
                Ok(Err(err)) => {
                    if attempt > self.policy.max_retries {
                        return Err(ClientError::Network(err));
                    }
                    tracing::warn!(error = %err, attempt, "transport error, backing off");
                }
            }

            let delay = self.policy.backoff_delay(attempt);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ClientError::Aborted(AbortReason::Cancelled));
                }
                _ = sleep(delay) => {}
            }
        }
    }

    /// Block until a slot opens in the rolling window, then claim it.
    ///
    /// The prune-check-insert sequence runs under one lock acquisition so
    /// concurrent callers cannot collectively exceed the configured rate.
    async fn admit(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                while window
                    .front()
                    .map_or(false, |t| now.duration_since(*t) >= RATE_WINDOW)
                {
                    window.pop_front();
                }
                if (window.len() as u32) < self.policy.requests_per_second {
                    window.push_back(now);
                    return Ok(());
                }
                // Wait for the oldest entry to age out of the window.
                RATE_WINDOW - now.duration_since(window[0])
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ClientError::Aborted(AbortReason::Cancelled));
                }
                _ = sleep(wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedSender;
    use reqwest::{Method, Request, Url};
    use std::sync::Arc;

    fn request() -> Request {
        Request::new(Method::GET, Url::parse("http://upstream.test/api/run/list/1").unwrap())
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_initial: Duration::from_millis(100),
            backoff_max: Duration::from_secs(1),
            jitter_ratio: 0.0,
            timeout: Duration::from_secs(5),
            requests_per_second: 100,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_through() {
        let transport = RateLimitedTransport::new(ScriptedSender::ok(), fast_policy()).unwrap();
        let response = transport
            .send(request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(transport.sender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_status_then_succeeds() {
        let transport =
            RateLimitedTransport::new(ScriptedSender::statuses(&[503, 429, 200]), fast_policy())
                .unwrap();
        let response = transport
            .send(request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(transport.sender.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_surfaces_last_response() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..fast_policy()
        };
        let transport = RateLimitedTransport::new(ScriptedSender::statuses(&[503]), policy).unwrap();
        let response = transport
            .send(request(), &CancellationToken::new())
            .await
            .unwrap();
        // 1 initial attempt + 2 retries, last response handed back as-is.
        assert_eq!(response.status().as_u16(), 503);
        assert_eq!(transport.sender.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let transport =
            RateLimitedTransport::new(ScriptedSender::statuses(&[400]), fast_policy()).unwrap();
        let response = transport
            .send(request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        assert_eq!(transport.sender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_caller_never_dispatches() {
        let transport = RateLimitedTransport::new(ScriptedSender::ok(), fast_policy()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = transport.send(request(), &cancel).await.unwrap_err();
        assert!(matches!(err, ClientError::Aborted(AbortReason::Cancelled)));
        assert_eq!(transport.sender.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_suppresses_retry() {
        let policy = RetryPolicy {
            backoff_initial: Duration::from_secs(2),
            backoff_max: Duration::from_secs(2),
            ..fast_policy()
        };
        let transport = Arc::new(
            RateLimitedTransport::new(ScriptedSender::statuses(&[503]), policy).unwrap(),
        );
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let err = transport.send(request(), &cancel).await.unwrap_err();
        assert!(matches!(err, ClientError::Aborted(AbortReason::Cancelled)));
        // The first attempt ran; the cancel landed inside the backoff sleep.
        assert_eq!(transport.sender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_internal_timeout_aborts_without_retry() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(1),
            ..fast_policy()
        };
        let sender = ScriptedSender::ok().with_delay(Duration::from_secs(10));
        let transport = RateLimitedTransport::new(sender, policy).unwrap();

        let err = transport
            .send(request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Aborted(AbortReason::Timeout)));
        assert_eq!(transport.sender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_beats_internal_timeout() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(5),
            ..fast_policy()
        };
        let sender = ScriptedSender::ok().with_delay(Duration::from_secs(10));
        let transport = Arc::new(RateLimitedTransport::new(sender, policy).unwrap());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = transport.send(request(), &cancel).await.unwrap_err();
        assert!(matches!(err, ClientError::Aborted(AbortReason::Cancelled)));
        assert_eq!(transport.sender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rolling_window_bounds_concurrent_rate() {
        let policy = RetryPolicy {
            requests_per_second: 3,
            ..fast_policy()
        };
        let transport = Arc::new(RateLimitedTransport::new(ScriptedSender::ok(), policy).unwrap());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let transport = Arc::clone(&transport);
            handles.push(tokio::spawn(async move {
                transport
                    .send(request(), &CancellationToken::new())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let dispatched = transport.sender.dispatched_at();
        assert_eq!(dispatched.len(), 10);
        // No trailing one-second window may contain more than 3 dispatches:
        // entry i+3 must be at least a full window after entry i.
        for pair in dispatched.windows(4) {
            assert!(
                pair[3].duration_since(pair[0]) >= RATE_WINDOW,
                "4 dispatches within one rolling second"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_consume_rate_budget() {
        let policy = RetryPolicy {
            requests_per_second: 2,
            backoff_initial: Duration::from_millis(1),
            backoff_max: Duration::from_millis(1),
            ..fast_policy()
        };
        let transport =
            RateLimitedTransport::new(ScriptedSender::statuses(&[503, 503, 200]), policy).unwrap();

        transport
            .send(request(), &CancellationToken::new())
            .await
            .unwrap();

        let dispatched = transport.sender.dispatched_at();
        assert_eq!(dispatched.len(), 3);
        // With a budget of 2/s and near-zero backoff, the third attempt must
        // have waited for the admission window, not just the backoff.
        assert!(dispatched[2].duration_since(dispatched[0]) >= RATE_WINDOW);
    }
}
