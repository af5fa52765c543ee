//! C1: the edge receiver. Classifies inbound chat-platform events, rejects
//! duplicates and denylisted sources, and publishes outbound delivery
//! plans under the right personality identity.

pub mod classify;
pub mod dedup_send;
pub mod fingerprint;
pub mod gateway_client;
pub mod webhook;

pub use classify::{
    extract_leading_mention_token, resolve_personality, should_forward, Classification, ClassificationSignals,
};
pub use fingerprint::{compute_fingerprint, FingerprintCache};
pub use gateway_client::{GatewayClient, InboundAttachment, InboundEvent};
pub use webhook::{sanitize_username, ChunkOutcome, WebhookPublisher};
