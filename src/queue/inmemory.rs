//! `tokio::sync::mpsc`-backed `JobQueue` ("Queue"). Bounded channels
//! give the natural backpressure asks for: `try_send` fails
//! immediately on a full queue rather than blocking the caller.

use crate::error::QueueError;
use crate::inference::job::{InferenceCompletion, InferenceJob};
use crate::queue::traits::JobQueue;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{Receiver, Sender, channel};

pub struct InMemoryQueue {
    job_tx: Sender<InferenceJob>,
    job_rx: Mutex<Receiver<InferenceJob>>,
    completion_tx: Sender<InferenceCompletion>,
    completion_rx: Mutex<Receiver<InferenceCompletion>>,
}

impl InMemoryQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (job_tx, job_rx) = channel(capacity.max(1));
        let (completion_tx, completion_rx) = channel(capacity.max(1));
        Self {
            job_tx,
            job_rx: Mutex::new(job_rx),
            completion_tx,
            completion_rx: Mutex::new(completion_rx),
        }
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue_job(&self, job: InferenceJob) -> Result<(), QueueError> {
        self.job_tx
            .try_send(job)
            .map_err(|_| QueueError::Unavailable("job queue full".to_string()))
    }

    async fn dequeue_job(&self) -> Result<Option<InferenceJob>, QueueError> {
        Ok(self.job_rx.lock().await.try_recv().ok())
    }

    async fn publish_completion(&self, completion: InferenceCompletion) -> Result<(), QueueError> {
        self.completion_tx
            .try_send(completion)
            .map_err(|_| QueueError::Unavailable("completion queue full".to_string()))
    }

    async fn dequeue_completion(&self) -> Result<Option<InferenceCompletion>, QueueError> {
        Ok(self.completion_rx.lock().await.try_recv().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::job::JobType;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_job() -> InferenceJob {
        InferenceJob {
            request_id: Uuid::new_v4(),
            job_type: JobType::Generate,
            resolved_config: json!({ "model": "gpt-5" }),
            messages: vec![],
            personality_id: Uuid::new_v4(),
            persona_id: Uuid::new_v4(),
            show_thinking: false,
        }
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_round_trips() {
        let queue = InMemoryQueue::new(4);
        let job = sample_job();
        let request_id = job.request_id;

        queue.enqueue_job(job).await.unwrap();
        let dequeued = queue.dequeue_job().await.unwrap().unwrap();
        assert_eq!(dequeued.request_id, request_id);
    }

    #[tokio::test]
    async fn dequeue_on_empty_queue_returns_none() {
        let queue = InMemoryQueue::new(4);
        assert!(queue.dequeue_job().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enqueue_beyond_capacity_fails_fast() {
        let queue = InMemoryQueue::new(1);
        queue.enqueue_job(sample_job()).await.unwrap();
        let result = queue.enqueue_job(sample_job()).await;
        assert!(matches!(result, Err(QueueError::Unavailable(_))));
    }

    #[tokio::test]
    async fn completion_round_trips() {
        let queue = InMemoryQueue::new(4);
        let completion = InferenceCompletion {
            request_id: Uuid::new_v4(),
            content: "hi".to_string(),
            thinking_content: None,
            prompt_tokens: None,
            completion_tokens: None,
            duration_ms: 10,
            error: None,
        };
        let id = completion.request_id;
        queue.publish_completion(completion).await.unwrap();
        let received = queue.dequeue_completion().await.unwrap().unwrap();
        assert_eq!(received.request_id, id);
    }
}
