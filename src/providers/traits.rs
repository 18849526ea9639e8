//! Generation backend trait definitions
//!
//! This module defines the contract every image generation backend must
//! follow. The session core only ever talks to `dyn GenerationService`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::GenerationSettings;
use crate::domain::ImageData;
use crate::providers::dry_run::DryRunGenerator;
use crate::providers::gemini::GeminiGenerator;

// ============================================================================
// Error Types
// ============================================================================

/// Generation failure kinds
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No image returned by the generator{}", .0.as_deref().map(|t| format!(": {}", t)).unwrap_or_default())]
    EmptyResponse(Option<String>),

    #[error("Generator not configured: {0}")]
    NotConfigured(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for generation operations
pub type GenerationResult<T> = Result<T, GenerationError>;

// ============================================================================
// Generation Trait
// ============================================================================

/// External image synthesis capability
///
/// Both calls are single-shot: implementations must not retry internally,
/// and each invocation resolves or fails exactly once.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Backend code (e.g., "gemini", "dry_run")
    fn code(&self) -> &'static str;

    /// Produce a new mockup by placing `logo` into the scene described by `prompt`
    async fn generate(&self, logo: &ImageData, prompt: &str) -> GenerationResult<ImageData>;

    /// Produce a revised mockup from `base_image` following `instruction`
    ///
    /// # Arguments
    /// * `base_image` - The mockup being edited
    /// * `instruction` - Free-text edit instruction
    /// * `reference_logo` - Original logo, when available, to keep it faithful
    async fn edit(
        &self,
        base_image: &ImageData,
        instruction: &str,
        reference_logo: Option<&ImageData>,
    ) -> GenerationResult<ImageData>;
}

// ============================================================================
// Factory
// ============================================================================

/// Creates generation backends from configuration
pub struct GeneratorFactory;

impl GeneratorFactory {
    /// Create the configured backend
    ///
    /// A "gemini" backend without an API key degrades to the dry-run
    /// generator so the service stays usable in development.
    pub fn create(settings: &GenerationSettings) -> GenerationResult<Arc<dyn GenerationService>> {
        let has_key = settings.api_key.as_deref().map_or(false, |k| !k.is_empty());

        let generator: Arc<dyn GenerationService> = match settings.provider.as_str() {
            "gemini" if !has_key => {
                warn!("No Gemini API key configured, falling back to dry-run generator");
                Arc::new(DryRunGenerator::new())
            }
            "gemini" => Arc::new(GeminiGenerator::new(settings)?),
            "dry_run" => Arc::new(DryRunGenerator::new()),
            other => {
                return Err(GenerationError::NotConfigured(format!(
                    "unknown generation provider '{}'",
                    other
                )))
            }
        };

        info!(provider = generator.code(), model = %settings.model, "Generation backend ready");
        Ok(generator)
    }
}
