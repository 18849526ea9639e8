//! Gemini Image Generation Client
//!
//! Implements `GenerationService` on top of the Gemini `generateContent`
//! endpoint with image output enabled.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::GenerationSettings;
use crate::domain::ImageData;
use crate::providers::http_client::RateLimitedClient;
use crate::providers::traits::{GenerationError, GenerationResult, GenerationService};
use super::models::*;

/// Role description sent as the system instruction with every request
pub const SYSTEM_INSTRUCTIONS: &str = "You are an expert product photographer and mockup specialist. \
Your goal is to take a provided logo and realistically place it on a specific product. \
Ensure the logo follows the contours, fabric texture, and lighting of the product perfectly. \
Do not distort the logo unless it is necessary for perspective. \
The resulting image should look like a professional brand marketing photo.";

/// Gemini API client
pub struct GeminiGenerator {
    client: RateLimitedClient,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiGenerator {
    /// Create a new Gemini generator from settings
    pub fn new(settings: &GenerationSettings) -> GenerationResult<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenerationError::NotConfigured("Gemini API key is not set".to_string()))?;

        let client = RateLimitedClient::new(
            settings.rate_limit_per_minute,
            Duration::from_secs(settings.timeout_secs),
        )?;
        debug!(
            model = %settings.model,
            rate_limit_per_minute = client.rate_limit_per_minute(),
            "Gemini client configured"
        );

        Ok(GeminiGenerator {
            client,
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Parts for an initial mockup: logo first, then the scene description
    pub fn generate_parts(logo: &ImageData, prompt: &str) -> Vec<Part> {
        vec![
            Part::image(logo.mime_type(), logo.base64_payload()),
            Part::text(format!(
                "{} Place the provided logo naturally on the product so it looks printed on it.",
                prompt.trim()
            )),
        ]
    }

    /// Parts for an edit: current mockup, optional original logo, then the instruction
    pub fn edit_parts(base_image: &ImageData, instruction: &str, reference_logo: Option<&ImageData>) -> Vec<Part> {
        let mut parts = vec![Part::image(base_image.mime_type(), base_image.base64_payload())];

        let text = match reference_logo {
            Some(logo) => {
                parts.push(Part::image(logo.mime_type(), logo.base64_payload()));
                format!(
                    "Edit the first image (the product mockup) as follows: {}. \
                     The second image is the original logo; keep it accurate and undistorted.",
                    instruction.trim()
                )
            }
            None => format!("Edit this product mockup as follows: {}.", instruction.trim()),
        };
        parts.push(Part::text(text));
        parts
    }

    fn build_request(parts: Vec<Part>) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(SYSTEM_INSTRUCTIONS)],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig::default(),
        }
    }

    /// Pull the first inline image out of a response
    pub fn extract_image(response: GenerateContentResponse) -> GenerationResult<ImageData> {
        let mut texts = Vec::new();

        for candidate in response.candidates {
            let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
            for part in parts {
                if let Some(inline) = part.inline_data {
                    if inline.data.is_empty() {
                        continue;
                    }
                    let uri = format!("data:{};base64,{}", inline.mime_type, inline.data);
                    return ImageData::parse(&uri)
                        .map_err(|e| GenerationError::ParseError(format!("Bad inline image: {}", e)));
                }
                if let Some(text) = part.text.filter(|t| !t.trim().is_empty()) {
                    texts.push(text);
                }
            }
            if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
                texts.push(format!("finish reason {}", reason));
            }
        }

        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            texts.push(format!("prompt blocked ({})", reason));
        }

        Err(GenerationError::EmptyResponse(
            (!texts.is_empty()).then(|| texts.join(" ")),
        ))
    }

    async fn call(&self, parts: Vec<Part>) -> GenerationResult<ImageData> {
        let url = self.endpoint();
        debug!(
            url = %url,
            parts = parts.len(),
            requests_sent = self.client.requests_sent(),
            "Gemini API request"
        );

        let request = Self::build_request(parts);
        let response = self
            .client
            .post_json(&url, &[("x-goog-api-key", self.api_key.as_str())], &request)
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| match e.error.status {
                    Some(s) => format!("{} ({})", e.error.message, s),
                    None => e.error.message,
                })
                .unwrap_or_else(|_| text.chars().take(500).collect());

            warn!(status = status.as_u16(), message = %message, "Gemini API error");
            return Err(GenerationError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            GenerationError::ParseError(format!(
                "JSON parse error: {} - Body: {}",
                e,
                text.chars().take(500).collect::<String>()
            ))
        })?;

        Self::extract_image(parsed)
    }
}

#[async_trait]
impl GenerationService for GeminiGenerator {
    fn code(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, logo: &ImageData, prompt: &str) -> GenerationResult<ImageData> {
        let image = self.call(Self::generate_parts(logo, prompt)).await?;
        info!(model = %self.model, bytes = image.len(), "Gemini mockup generated");
        Ok(image)
    }

    async fn edit(
        &self,
        base_image: &ImageData,
        instruction: &str,
        reference_logo: Option<&ImageData>,
    ) -> GenerationResult<ImageData> {
        let image = self
            .call(Self::edit_parts(base_image, instruction, reference_logo))
            .await?;
        info!(model = %self.model, bytes = image.len(), "Gemini mockup edited");
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn settings_with_key() -> GenerationSettings {
        let mut settings = Settings::default().generation;
        settings.api_key = Some("test-key".to_string());
        settings.base_url = "https://example.invalid/".to_string();
        settings
    }

    #[test]
    fn test_requires_api_key() {
        let settings = Settings::default().generation;
        assert!(matches!(
            GeminiGenerator::new(&settings),
            Err(GenerationError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_endpoint() {
        let generator = GeminiGenerator::new(&settings_with_key()).unwrap();
        assert_eq!(
            generator.endpoint(),
            "https://example.invalid/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        assert_eq!(generator.code(), "gemini");
    }

    #[test]
    fn test_request_wire_format() {
        let logo = ImageData::encode(b"logo", "image/png");
        let request = GeminiGenerator::build_request(GeminiGenerator::generate_parts(&logo, "A mug."));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["data"], "bG9nbw==");
        assert!(json["contents"][0]["parts"][1]["text"].as_str().unwrap().starts_with("A mug."));
        assert_eq!(json["generationConfig"]["responseModalities"][0], "IMAGE");
        assert!(json["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn test_edit_parts_with_and_without_logo() {
        let base = ImageData::encode(b"base", "image/png");
        let logo = ImageData::encode(b"logo", "image/jpeg");

        let with_logo = GeminiGenerator::edit_parts(&base, "make it blue", Some(&logo));
        assert_eq!(with_logo.len(), 3);
        assert_eq!(with_logo[1].inline_data.as_ref().unwrap().mime_type, "image/jpeg");
        assert!(with_logo[2].text.as_ref().unwrap().contains("make it blue"));

        let without_logo = GeminiGenerator::edit_parts(&base, "make it blue", None);
        assert_eq!(without_logo.len(), 2);
    }

    #[test]
    fn test_extract_image_picks_first_inline_part() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here is your mockup"},
                    {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
                ]},
                "finishReason": "STOP"
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        let image = GeminiGenerator::extract_image(response).unwrap();
        assert_eq!(image.as_displayable(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_extract_image_accepts_snake_case() {
        let body = r#"{"candidates": [{"content": {"parts": [
            {"inline_data": {"mime_type": "image/jpeg", "data": "aGVsbG8="}}
        ]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        let image = GeminiGenerator::extract_image(response).unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_extract_image_without_image_is_empty_response() {
        let body = r#"{
            "candidates": [{"content": {"parts": [{"text": "I cannot do that"}]}, "finishReason": "SAFETY"}]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        match GeminiGenerator::extract_image(response) {
            Err(GenerationError::EmptyResponse(Some(text))) => {
                assert!(text.contains("I cannot do that"));
                assert!(text.contains("SAFETY"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_extract_image_no_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "OTHER"}}"#).unwrap();
        let err = GeminiGenerator::extract_image(response).unwrap_err();
        assert!(err.to_string().contains("prompt blocked (OTHER)"));
    }
}
