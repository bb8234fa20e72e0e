//! URL submission to the indexing publish endpoint.
//!
//! - [`outcome`] - response classification and per-pool counts
//! - [`transport`] - the HTTP seam and its reqwest implementation
//! - [`sender`] - one URL, retried on dropped connections
//! - [`dispatcher`] - one quota pool, fully concurrent
//! - [`mock`] - scripted transport for tests

pub mod dispatcher;
pub mod mock;
pub mod outcome;
pub mod sender;
pub mod transport;

pub use dispatcher::dispatch_pool;
pub use outcome::{
    classify, classify_or_fail, BatchResult, ClassifyError, Failure, Outcome,
    RATE_LIMITED_CODE, RETRIES_EXHAUSTED_CODE,
};
pub use sender::{send_with_retry, RetryPolicy, Submission};
pub use transport::{
    NotificationKind, PublishRequest, PublishTransport, ReqwestTransport, TransportError,
};
