//! Engine boundary bounds.
//!
//! The engine consumes fixed-layout records with bounded arrays; these
//! constants define those bounds. Inputs that exceed a bound are silently
//! truncated, never rejected.

/// Maximum number of stop sequences passed to the engine.
pub const STOP_SEQUENCE_MAX: usize = 16;

/// Maximum number of per-token logit biases passed to the engine.
pub const LOGIT_BIAS_MAX: usize = 16;

/// Maximum number of image payloads attached to one request.
pub const IMAGES_MAX: usize = 4;

/// Maximum length of an explicit sampler ordering.
pub const SAMPLER_ORDER_MAX: usize = 7;

/// Logit bias values outside this range are clamped to the nearest bound.
pub const BIAS_MIN_VALUE: f32 = -100.0;
pub const BIAS_MAX_VALUE: f32 = 100.0;

/// Sampler ordering used when a request does not supply one.
pub const DEFAULT_SAMPLER_ORDER: [u8; SAMPLER_ORDER_MAX] = [6, 0, 1, 3, 4, 2, 5];
