//! Ports: interfaces to external collaborators.

pub mod image_engine;
pub mod text_engine;

pub use image_engine::{ImageEngine, ImageGenerationInputs, ImageGenerationOutputs};
pub use text_engine::{EngineTelemetry, GenerationInputs, GenerationOutputs, TextEngine};
