//! Scripted [`HttpSend`] implementation for tests.
//!
//! Builds real `reqwest::Response` values from `http::Response`, so the
//! transport, client, and aggregator can be exercised without a network.

use crate::transport::HttpSend;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// One scripted upstream reply.
pub(crate) struct Reply {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(&'static str, String)>,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: "{}".to_string(),
            headers: Vec::new(),
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

type Handler = Box<dyn Fn(&reqwest::Request, usize) -> Reply + Send + Sync>;

/// Fake sender driven by a closure over (request, zero-based call index).
pub(crate) struct ScriptedSender {
    handler: Handler,
    delay: Option<Duration>,
    calls: AtomicUsize,
    dispatched_at: Mutex<Vec<Instant>>,
}

impl ScriptedSender {
    pub fn new(handler: impl Fn(&reqwest::Request, usize) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            delay: None,
            calls: AtomicUsize::new(0),
            dispatched_at: Mutex::new(Vec::new()),
        }
    }

    /// Replies with the given statuses in order; the last one repeats.
    pub fn statuses(statuses: &[u16]) -> Self {
        let script: Vec<u16> = statuses.to_vec();
        Self::new(move |_, call| {
            let status = script.get(call).copied().unwrap_or(*script.last().unwrap());
            Reply::status(status)
        })
    }

    /// Always replies 200 with an empty JSON object.
    pub fn ok() -> Self {
        Self::statuses(&[200])
    }

    /// Delay every reply, for exercising the timeout path.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Instants at which requests reached the (fake) wire, oldest first.
    pub fn dispatched_at(&self) -> Vec<Instant> {
        let mut at = self.dispatched_at.lock().unwrap().clone();
        at.sort();
        at
    }
}

#[async_trait]
impl HttpSend for ScriptedSender {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.dispatched_at.lock().unwrap().push(Instant::now());
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }
        let reply = (self.handler)(&request, call);
        let mut builder = http::Response::builder().status(reply.status);
        for (name, value) in &reply.headers {
            builder = builder.header(*name, value);
        }
        let response = builder.body(reqwest::Body::from(reply.body)).unwrap();
        Ok(reqwest::Response::from(response))
    }
}

/// Extract a query parameter from a request URL.
pub(crate) fn query_param(request: &reqwest::Request, name: &str) -> Option<String> {
    request
        .url()
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}
