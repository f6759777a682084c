//! Model capacity profiles.

pub mod capabilities;
pub mod registry;

pub use capabilities::ModelCapabilities;
pub use registry::{ModelProfile, ModelRegistry, DEFAULT_FALLBACK_CONTEXT_LENGTH};
