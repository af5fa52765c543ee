//! C2: the request gateway. Resolves the config cascade, calls C3 to
//! assemble context, dispatches to C4 over the job queue, persists the
//! turn, and triggers C5.

pub mod envelope;
pub mod handle_turn;

pub use envelope::{Attachment, DeliveryPlan, RequestEnvelope};
pub use handle_turn::{handle_turn, GatewayDefaults, HandleTurnContext};
