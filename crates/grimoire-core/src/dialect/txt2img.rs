//! Text-to-image dialect (`/sdapi/v1/txt2img`).

use serde::Deserialize;

use crate::ports::ImageGenerationInputs;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Txt2ImgRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub cfg_scale: f32,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    pub seed: i64,
    pub sampler_name: String,
}

impl Default for Txt2ImgRequest {
    fn default() -> Self {
        Self {
            prompt: "high quality".into(),
            negative_prompt: String::new(),
            cfg_scale: 5.0,
            steps: 20,
            width: 512,
            height: 512,
            seed: -1,
            sampler_name: "k_euler_a".into(),
        }
    }
}

/// Translate into a cleaned engine record.
#[must_use]
pub fn translate(request: Txt2ImgRequest, res_limit: u32, quiet: bool) -> ImageGenerationInputs {
    ImageGenerationInputs::cleaned(
        request.prompt,
        request.negative_prompt,
        request.cfg_scale,
        request.steps,
        request.width,
        request.height,
        request.seed,
        request.sampler_name,
        quiet,
        res_limit,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_uses_documented_defaults() {
        let request: Txt2ImgRequest = serde_json::from_str("{}").unwrap();
        let inputs = translate(request, 1024, false);
        assert_eq!(inputs.prompt, "high quality");
        assert_eq!(inputs.width, 512);
        assert_eq!(inputs.height, 512);
        assert_eq!(inputs.sample_steps, 20);
    }

    #[test]
    fn parameters_are_cleaned_on_translate() {
        let request: Txt2ImgRequest =
            serde_json::from_str(r#"{"cfg_scale":0.1,"steps":200,"width":1000}"#).unwrap();
        let inputs = translate(request, 1024, false);
        assert_eq!(inputs.cfg_scale, 1.0);
        assert_eq!(inputs.sample_steps, 80);
        assert_eq!(inputs.width, 960);
    }
}
