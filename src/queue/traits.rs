//! The external queue interface ("Queue"): C2 enqueues
//! `InferenceJob`s, C4 pulls them and publishes `InferenceCompletion`s back.
//! Abstracted behind a trait so the in-memory implementation here can later
//! be swapped for a real broker without touching C2/C4.

use crate::error::QueueError;
use crate::inference::job::{InferenceCompletion, InferenceJob};
use async_trait::async_trait;

/// A named job queue plus its completion channel. Enqueue fails fast when
/// the queue is full or unreachable ("Failure semantics": "Queue
/// unavailable -> retry with jitter up to a deadline") rather than blocking
/// indefinitely ("Backpressure": "C2 does not block on a full queue
/// indefinitely; it fails fast with a retryable error").
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue_job(&self, job: InferenceJob) -> Result<(), QueueError>;

    /// Pull the next job, or `None` if the queue is empty right now.
    async fn dequeue_job(&self) -> Result<Option<InferenceJob>, QueueError>;

    async fn publish_completion(&self, completion: InferenceCompletion) -> Result<(), QueueError>;

    /// Pull the next completion, or `None` if none is ready yet.
    async fn dequeue_completion(&self) -> Result<Option<InferenceCompletion>, QueueError>;
}
