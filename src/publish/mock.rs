//! Scripted transport for exercising the sender, dispatcher and orchestrator
//! without a network.

use super::transport::{PublishRequest, PublishTransport, TransportError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What the mock does for one attempt.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with this body.
    Body(String),
    /// Fail as if the server dropped the connection.
    Disconnect,
    /// Fail with a non-retryable timeout.
    Timeout,
}

impl MockReply {
    pub fn body(body: &str) -> Self {
        MockReply::Body(body.to_string())
    }
}

/// Record of one call made to the mock.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub url: String,
    pub token: String,
}

#[derive(Default)]
struct MockState {
    scripted: Mutex<HashMap<String, VecDeque<MockReply>>>,
    default_reply: Mutex<Option<MockReply>>,
    calls: Mutex<Vec<MockCall>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    pools_opened: AtomicUsize,
}

/// Transport that replays scripted replies per URL.
///
/// Replies queued with [`MockTransport::push`] are consumed in FIFO order;
/// once a URL's queue is empty the default reply (`{}` unless overridden)
/// is used. Clones and [`PublishTransport::fresh`] handles share state, so
/// a test can inspect every call made during a run.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the reply used once a URL has no scripted replies left.
    pub fn with_default(self, reply: MockReply) -> Self {
        *lock(&self.state.default_reply) = Some(reply);
        self
    }

    /// Queues a reply for the next attempt at `url`.
    pub fn push(&self, url: &str, reply: MockReply) {
        lock(&self.state.scripted)
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.state.calls).clone()
    }

    /// Number of attempts made for `url` so far.
    pub fn attempts_for(&self, url: &str) -> usize {
        lock(&self.state.calls)
            .iter()
            .filter(|c| c.url == url)
            .count()
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }

    /// How many times [`PublishTransport::fresh`] was called.
    pub fn pools_opened(&self) -> usize {
        self.state.pools_opened.load(Ordering::SeqCst)
    }

    fn next_reply(&self, url: &str) -> MockReply {
        if let Some(reply) = lock(&self.state.scripted)
            .get_mut(url)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        lock(&self.state.default_reply)
            .clone()
            .unwrap_or_else(|| MockReply::body("{}"))
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PublishTransport for MockTransport {
    async fn publish(
        &self,
        token: &SecretString,
        request: &PublishRequest,
    ) -> Result<String, TransportError> {
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.state.in_flight);

        lock(&self.state.calls).push(MockCall {
            url: request.url().to_string(),
            token: token.expose_secret().to_string(),
        });

        // Let sibling submissions start before this one resolves.
        tokio::task::yield_now().await;

        match self.next_reply(request.url()) {
            MockReply::Body(body) => Ok(body),
            MockReply::Disconnect => Err(TransportError::Disconnected(
                "server disconnected".to_string(),
            )),
            MockReply::Timeout => Err(TransportError::Timeout),
        }
    }

    fn fresh(&self) -> Result<Self, TransportError> {
        self.state.pools_opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.clone())
    }
}
