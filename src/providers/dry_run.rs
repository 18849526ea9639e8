//! Offline generator
//!
//! Produces a solid-colour PNG whose colour is derived from the inputs, so
//! the whole workflow can be exercised without a backend API key. The same
//! inputs always yield the same image.

use std::io::Cursor;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::image::PNG_MIME;
use crate::domain::ImageData;
use crate::providers::traits::{GenerationError, GenerationResult, GenerationService};

const DRY_RUN_SIZE: u32 = 256;

pub struct DryRunGenerator {
    size: u32,
}

impl DryRunGenerator {
    pub fn new() -> Self {
        DryRunGenerator { size: DRY_RUN_SIZE }
    }

    fn color_for(inputs: &[&str]) -> Rgb<u8> {
        let mut hasher = Sha256::new();
        for input in inputs {
            hasher.update(input.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        Rgb([digest[0], digest[1], digest[2]])
    }

    fn render(&self, color: Rgb<u8>) -> GenerationResult<ImageData> {
        let image = RgbImage::from_pixel(self.size, self.size, color);
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| GenerationError::Internal(format!("PNG encode failed: {}", e)))?;

        Ok(ImageData::encode(&out.into_inner(), PNG_MIME))
    }
}

impl Default for DryRunGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationService for DryRunGenerator {
    fn code(&self) -> &'static str {
        "dry_run"
    }

    async fn generate(&self, logo: &ImageData, prompt: &str) -> GenerationResult<ImageData> {
        debug!(prompt = %prompt, "Dry-run generate");
        self.render(Self::color_for(&[logo.base64_payload(), prompt]))
    }

    async fn edit(
        &self,
        base_image: &ImageData,
        instruction: &str,
        reference_logo: Option<&ImageData>,
    ) -> GenerationResult<ImageData> {
        debug!(instruction = %instruction, has_logo = reference_logo.is_some(), "Dry-run edit");
        let logo = reference_logo.map(|l| l.base64_payload()).unwrap_or_default();
        self.render(Self::color_for(&[base_image.base64_payload(), instruction, logo]))
    }
}
