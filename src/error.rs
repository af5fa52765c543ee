use thiserror::Error;

/// Structured error hierarchy for the Tzurot inference core.
///
/// Each subsystem defines its own error variant. Callers that need to decide
/// a recovery strategy match on these; code inside a subsystem continues to
/// use `anyhow::Result` for ad-hoc context chains and converts at the
/// boundary with `#[from]`.
#[derive(Debug, Error)]
pub enum TzurotError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("cascade: {0}")]
    Cascade(#[from] CascadeError),

    #[error("context: {0}")]
    Context(#[from] ContextError),

    #[error("inference: {0}")]
    Inference(#[from] InferenceError),

    #[error("memory write: {0}")]
    MemoryWrite(#[from] MemoryWriteError),

    #[error("delivery: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    #[error("db: {0}")]
    Db(#[from] DbError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("missing required env var: {0}")]
    MissingVar(String),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("no default llm config configured")]
    NoDefaultLlmConfig,

    #[error("advanced_parameters leaf {field} out of range: {message}")]
    OutOfRange { field: String, message: String },

    #[error("reasoning.max_tokens ({reasoning_max}) must be less than max_tokens ({max_tokens})")]
    ReasoningBudgetExceedsTotal {
        reasoning_max: u32,
        max_tokens: u32,
    },
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("prompt exceeds context window after trimming ({tokens} > {budget})")]
    Overflow { tokens: u32, budget: u32 },

    #[error("history query failed: {0}")]
    HistoryQuery(String),

    #[error("memory query failed: {0}")]
    MemoryQuery(String),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("provider {provider} rate-limited or 5xx, retry {attempt}/{max_attempts}")]
    Retriable {
        provider: String,
        attempt: u32,
        max_attempts: u32,
    },

    #[error("provider {provider} rejected request: {message}")]
    Rejected { provider: String, message: String },

    #[error("job {request_id} exceeded its deadline")]
    Timeout { request_id: String },
}

#[derive(Debug, Error)]
pub enum MemoryWriteError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("persist failed: {0}")]
    Persist(String),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook resolution failed for channel {channel_id}: {message}")]
    WebhookResolution { channel_id: String, message: String },

    #[error("first chunk delivery failed: {0}")]
    FirstChunkFailed(String),

    #[error("chunk {index} delivery failed, partial delivery: {message}")]
    PartialDelivery { index: usize, message: String },
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("enqueue deadline exceeded after {attempts} attempts")]
    EnqueueDeadlineExceeded { attempts: u32 },
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => Self::NotFound(e.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Constraint(db_err.message().to_string())
            }
            _ => Self::Query(e.to_string()),
        }
    }
}

/// Structured failure signal passed from C3/C4/C5 back to C2.
///
/// C3, C4, and C5 never surface errors directly; they return one of
/// these envelopes and C2 decides whether to retry, degrade silently, or
/// surface a user-visible message. Only C1 and C2 ever render text to a
/// requester.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    DedupRejection,
    DenylistRejection,
    ConfigInvalid,
    ContextOverflow,
    EmbeddingFailed,
    InferenceRetriable,
    InferenceRejected,
    DeliveryPartial,
    DeliveryFailed,
    MemoryWriteDeferred,
    FatalInternal,
}

impl FailureKind {
    /// Whether this kind should ever reach the requester as visible text.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid
                | Self::ContextOverflow
                | Self::InferenceRejected
                | Self::DeliveryFailed
                | Self::FatalInternal
        )
    }
}

#[derive(Debug, Clone)]
pub struct FailureEnvelope {
    pub kind: FailureKind,
    pub detail: String,
}

impl FailureEnvelope {
    #[must_use]
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for FailureEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_visible_kinds() {
        assert!(FailureKind::ConfigInvalid.is_user_visible());
        assert!(FailureKind::ContextOverflow.is_user_visible());
        assert!(FailureKind::InferenceRejected.is_user_visible());
        assert!(FailureKind::DeliveryFailed.is_user_visible());
        assert!(FailureKind::FatalInternal.is_user_visible());
    }

    #[test]
    fn silent_kinds() {
        assert!(!FailureKind::DedupRejection.is_user_visible());
        assert!(!FailureKind::DenylistRejection.is_user_visible());
        assert!(!FailureKind::EmbeddingFailed.is_user_visible());
        assert!(!FailureKind::InferenceRetriable.is_user_visible());
        assert!(!FailureKind::DeliveryPartial.is_user_visible());
        assert!(!FailureKind::MemoryWriteDeferred.is_user_visible());
    }

    #[test]
    fn db_error_from_row_not_found() {
        let e: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(e, DbError::NotFound(_)));
    }
}
