use crate::context::compose::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A job carried on the queue ("Queue"): `{requestId, jobType,
/// resolvedConfig, messages, personality metadata}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceJob {
    pub request_id: Uuid,
    pub job_type: JobType,
    pub resolved_config: Value,
    pub messages: Vec<Message>,
    pub personality_id: Uuid,
    pub persona_id: Uuid,
    pub show_thinking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Generate,
    Stream,
}

/// Completion carried back to C2 ("Completion carries {requestId,
/// content, thinkingContent?, tokenCounts, durationMs}").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceCompletion {
    pub request_id: Uuid,
    pub content: String,
    pub thinking_content: Option<String>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl InferenceCompletion {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_round_trips_through_json() {
        let job = InferenceJob {
            request_id: Uuid::new_v4(),
            job_type: JobType::Generate,
            resolved_config: serde_json::json!({ "model": "gpt-5" }),
            messages: vec![],
            personality_id: Uuid::new_v4(),
            persona_id: Uuid::new_v4(),
            show_thinking: true,
        };

        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: InferenceJob = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.request_id, job.request_id);
        assert_eq!(decoded.job_type, JobType::Generate);
    }

    #[test]
    fn completion_without_error_is_success() {
        let completion = InferenceCompletion {
            request_id: Uuid::new_v4(),
            content: "hi".to_string(),
            thinking_content: None,
            prompt_tokens: Some(10),
            completion_tokens: Some(5),
            duration_ms: 120,
            error: None,
        };
        assert!(completion.is_success());
    }
}
