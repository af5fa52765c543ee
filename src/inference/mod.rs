//! C4: the inference worker. Consumes `InferenceJob`s, invokes the model
//! provider with retry/backoff, and records a diagnostic log for every
//! attempt. Splitting the reply into a platform-sized delivery
//! plan is C2's job, using [`chunker::build_delivery_plan`].

pub mod chunker;
pub mod job;
pub mod provider;
pub mod reasoning;
pub mod retry;
pub mod wire;
pub mod worker;

pub use chunker::{build_delivery_plan, chunk_message};
pub use job::{InferenceCompletion, InferenceJob, JobType};
pub use provider::{InferenceProvider, InferenceResult, InvokeError};
pub use worker::process_job;
