//! Image engine port.
//!
//! Text-to-image generation shares the exclusive engine gate with text
//! requests, so the image backend is modeled the same way: a blocking call
//! over a fixed-layout record. Parameter cleaning (resolution snapping,
//! clamping) happens in [`ImageGenerationInputs::cleaned`] so every caller
//! gets the same invariants.

/// Fixed-layout image generation record.
#[derive(Debug, Clone)]
pub struct ImageGenerationInputs {
    pub prompt: String,
    pub negative_prompt: String,
    pub cfg_scale: f32,
    pub sample_steps: u32,
    pub width: u32,
    pub height: u32,
    pub seed: i64,
    pub sample_method: String,
    pub quiet: bool,
}

impl ImageGenerationInputs {
    /// Build a cleaned record from raw request parameters.
    ///
    /// Width and height snap down to multiples of 64 (minimum 64), cfg scale
    /// clamps to [1, 25], step count to [1, 80], and resolutions beyond
    /// `res_limit` are downscaled preserving aspect ratio.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn cleaned(
        prompt: String,
        negative_prompt: String,
        cfg_scale: f32,
        sample_steps: u32,
        width: u32,
        height: u32,
        seed: i64,
        sample_method: String,
        quiet: bool,
        res_limit: u32,
    ) -> Self {
        let snap = |v: u32| (v.max(64) / 64) * 64;
        let mut width = snap(width);
        let mut height = snap(height);

        let biggest = width.max(height);
        if biggest > res_limit {
            let scale = f64::from(biggest) / f64::from(res_limit);
            width = snap((f64::from(width) / scale) as u32);
            height = snap((f64::from(height) / scale) as u32);
        }

        Self {
            prompt,
            negative_prompt,
            cfg_scale: cfg_scale.clamp(1.0, 25.0),
            sample_steps: sample_steps.clamp(1, 80),
            width,
            height,
            seed,
            sample_method: sample_method.to_lowercase(),
            quiet,
        }
    }
}

/// Result of a blocking image generation call.
#[derive(Debug, Clone, Default)]
pub struct ImageGenerationOutputs {
    /// False means no usable image; callers surface an empty payload.
    pub ok: bool,
    /// Base64-encoded PNG.
    pub data: String,
}

/// The single-flight image generation engine.
pub trait ImageEngine: Send + Sync {
    /// Run one image generation to completion. Blocking.
    fn generate(&self, inputs: &ImageGenerationInputs) -> ImageGenerationOutputs;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaned(width: u32, height: u32, limit: u32) -> ImageGenerationInputs {
        ImageGenerationInputs::cleaned(
            "p".into(),
            String::new(),
            5.0,
            20,
            width,
            height,
            -1,
            "k_euler_a".into(),
            true,
            limit,
        )
    }

    #[test]
    fn resolution_snaps_down_to_multiple_of_64() {
        let inputs = cleaned(700, 130, 1024);
        assert_eq!(inputs.width, 640);
        assert_eq!(inputs.height, 128);
    }

    #[test]
    fn tiny_resolutions_floor_at_64() {
        let inputs = cleaned(1, 0, 1024);
        assert_eq!(inputs.width, 64);
        assert_eq!(inputs.height, 64);
    }

    #[test]
    fn oversized_resolutions_downscale_preserving_aspect() {
        let inputs = cleaned(2048, 1024, 512);
        assert_eq!(inputs.width, 512);
        assert_eq!(inputs.height, 256);
    }

    #[test]
    fn cfg_and_steps_clamp() {
        let inputs = ImageGenerationInputs::cleaned(
            "p".into(),
            String::new(),
            99.0,
            500,
            512,
            512,
            -1,
            "K_Euler".into(),
            false,
            1024,
        );
        assert_eq!(inputs.cfg_scale, 25.0);
        assert_eq!(inputs.sample_steps, 80);
        assert_eq!(inputs.sample_method, "k_euler");
    }
}
