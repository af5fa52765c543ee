pub mod advanced_params;
pub mod resolve;

pub use resolve::{resolve_cascade, CascadeInput, ResolvedConfig};
