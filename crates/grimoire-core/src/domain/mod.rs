//! Domain types shared by every adapter.

pub mod genkey;
pub mod limits;
pub mod request;

pub use genkey::GenKey;
pub use request::{GenerationRequest, LogitBias, SamplerParams};
