//! C4 job processing: pulls an `InferenceJob`, invokes the provider with
//! retry/backoff, and writes an `LlmDiagnosticLog` for every request
//! regardless of outcome ("Consumption" and "Diagnostics").
//!
//! Idempotency: jobs are keyed by request id. Callers hold a `seen` set (or
//! a dedup table) keyed the same way C1 keys fingerprints; this module does
//! not itself track duplicates, it only guarantees that processing the same
//! job twice produces the same completion.

use crate::db::repository::diagnostics::DiagnosticRepository;
use crate::error::{FailureEnvelope, FailureKind, InferenceError};
use crate::inference::job::{InferenceCompletion, InferenceJob};
use crate::inference::provider::{InferenceProvider, InvokeError};
use crate::inference::retry::{with_backoff, BackoffPolicy};
use serde_json::json;
use std::time::Instant;

/// Run one inference job end to end: invoke with retries and persist a
/// diagnostic log no matter how it turns out. The reply is handed back
/// whole; splitting it into a platform-sized delivery plan is C2's job when
/// it builds the chunks it hands to C1 ("Chunking").
///
/// Returns `Ok(InferenceCompletion)` on success (including a provider
/// rejection, which is still a completion — `error` carries the message)
/// and `Err(FailureEnvelope)` only when the diagnostic log itself could not
/// be written, since that's the one outcome C2 has no other way to learn
/// about.
pub async fn process_job(
    diagnostics: &DiagnosticRepository<'_>,
    provider: &InferenceProvider,
    policy: BackoffPolicy,
    provider_name: &str,
    job: InferenceJob,
) -> Result<InferenceCompletion, FailureEnvelope> {
    let started = Instant::now();
    let model = job
        .resolved_config
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let mut last_attempt = 0u32;
    let outcome = with_backoff(
        policy,
        InvokeError::is_retriable,
        |attempt| {
            last_attempt = attempt;
            provider.invoke(&job.resolved_config, &job.messages)
        },
    )
    .await;

    let duration_ms = started.elapsed().as_millis() as i64;

    let (completion, error_for_log) = match outcome {
        Ok(result) => {
            (
                InferenceCompletion {
                    request_id: job.request_id,
                    content: result.extracted.cleaned_content.clone(),
                    thinking_content: if job.show_thinking {
                        result.extracted.thinking_content.clone()
                    } else {
                        None
                    },
                    prompt_tokens: result.prompt_tokens,
                    completion_tokens: result.completion_tokens,
                    duration_ms: duration_ms.max(0) as u64,
                    error: None,
                },
                None,
            )
        }
        Err(invoke_err) => {
            let inference_err = match &invoke_err {
                InvokeError::Retriable(_) => InferenceError::Retriable {
                    provider: provider_name.to_string(),
                    attempt: last_attempt + 1,
                    max_attempts: policy.max_attempts,
                },
                InvokeError::Rejected(msg) => InferenceError::Rejected {
                    provider: provider_name.to_string(),
                    message: msg.clone(),
                },
                InvokeError::Other(msg) => InferenceError::Request {
                    provider: provider_name.to_string(),
                    message: msg.clone(),
                },
            };

            (
                InferenceCompletion {
                    request_id: job.request_id,
                    content: String::new(),
                    thinking_content: None,
                    prompt_tokens: None,
                    completion_tokens: None,
                    duration_ms: duration_ms.max(0) as u64,
                    error: Some(inference_err.to_string()),
                },
                Some(inference_err.to_string()),
            )
        }
    };

    let payload = json!({
        "resolvedConfig": job.resolved_config,
        "promptSummary": summarize_messages(&job.messages),
        "responseSummary": if completion.content.is_empty() {
            None
        } else {
            Some(summarize_text(&completion.content))
        },
        "errorIfAny": error_for_log,
    });

    diagnostics
        .insert(job.request_id, None, &model, provider_name, duration_ms, payload)
        .await
        .map_err(|e| FailureEnvelope::new(FailureKind::FatalInternal, e.to_string()))?;

    Ok(completion)
}

fn summarize_text(text: &str) -> String {
    const MAX: usize = 500;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        text.chars().take(MAX).collect::<String>() + "..."
    }
}

fn summarize_messages(messages: &[crate::context::compose::Message]) -> String {
    messages
        .last()
        .map(|m| summarize_text(&m.content))
        .unwrap_or_default()
}

/// Maps a terminal `InvokeError` to the `FailureKind` C2 uses to decide
/// whether the job's failure is user-visible.
#[must_use]
pub fn classify_for_c2(err: &InvokeError) -> FailureKind {
    match err {
        InvokeError::Retriable(_) => FailureKind::InferenceRetriable,
        InvokeError::Rejected(_) | InvokeError::Other(_) => FailureKind::InferenceRejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::compose::{Message, Role};

    #[test]
    fn summarize_text_truncates_long_content() {
        let text = "a".repeat(600);
        let summary = summarize_text(&text);
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), 503);
    }

    #[test]
    fn summarize_text_passes_through_short_content() {
        assert_eq!(summarize_text("hello"), "hello");
    }

    #[test]
    fn summarize_messages_uses_last_message() {
        let messages = vec![
            Message {
                role: Role::User,
                content: "first".to_string(),
            },
            Message {
                role: Role::User,
                content: "latest turn".to_string(),
            },
        ];
        assert_eq!(summarize_messages(&messages), "latest turn");
    }

    #[test]
    fn classify_retriable_vs_rejected() {
        assert_eq!(
            classify_for_c2(&InvokeError::Retriable("x".into())),
            FailureKind::InferenceRetriable
        );
        assert_eq!(
            classify_for_c2(&InvokeError::Rejected("x".into())),
            FailureKind::InferenceRejected
        );
        assert_eq!(
            classify_for_c2(&InvokeError::Other("x".into())),
            FailureKind::InferenceRejected
        );
    }
}
