//! Core domain, ports, and the admission/streaming coordinator.
//!
//! Everything here is transport-agnostic: the HTTP adapter
//! (`grimoire-axum`) and the embedded Horde worker (`grimoire-horde`) are
//! both thin clients of this crate.

#![deny(unsafe_code)]

pub mod coordinator;
pub mod dialect;
pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use coordinator::{
    AbortGuard, AbortOutcome, Admission, CancelTracker, Coordinator, CoordinatorError, EngineGate,
    GatePermit, token_stream,
};
pub use domain::{GenKey, GenerationRequest, LogitBias, SamplerParams};
pub use ports::{
    EngineTelemetry, GenerationInputs, GenerationOutputs, ImageEngine, ImageGenerationInputs,
    ImageGenerationOutputs, TextEngine,
};
