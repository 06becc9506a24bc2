//! Inbound wire-dialect contracts and translators.
//!
//! Pure, side-effect-free mapping between each supported inbound shape and
//! the canonical [`crate::domain::GenerationRequest`]. Response envelopes
//! live with the HTTP adapter; only request translation is shared here
//! because the Horde worker also consumes the kobold shape.

pub mod basic;
pub mod interrogate;
pub mod kobold;
pub mod openai;
pub mod txt2img;

pub use basic::BasicGenerationRequest;
pub use interrogate::InterrogateRequest;
pub use kobold::KoboldGenerationRequest;
pub use openai::{ChatCompletionRequest, CompletionRequest};
pub use txt2img::Txt2ImgRequest;
