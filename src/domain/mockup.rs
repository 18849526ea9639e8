//! Logo and mockup version records

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::catalog::Product;
use super::image::ImageData;

/// The user-supplied source image, replaced wholesale on re-upload
#[derive(Debug, Clone, PartialEq)]
pub struct LogoAsset {
    pub image: ImageData,
    pub uploaded_at: DateTime<Utc>,
}

impl LogoAsset {
    pub fn new(bytes: &[u8], mime_type: &str) -> Self {
        LogoAsset {
            image: ImageData::encode(bytes, mime_type),
            uploaded_at: Utc::now(),
        }
    }
}

/// Immutable record of one successful generation or edit
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MockupVersion {
    /// Time-ordered unique identifier (UUID v7)
    pub id: Uuid,
    /// Data URI of the generated image
    #[schema(value_type = String)]
    pub image: ImageData,
    pub created_at: DateTime<Utc>,
    /// How this version came to be: an initial-mockup label or the edit text
    pub instruction: String,
}

impl MockupVersion {
    pub fn new(image: ImageData, instruction: impl Into<String>) -> Self {
        MockupVersion {
            id: Uuid::now_v7(),
            image,
            created_at: Utc::now(),
            instruction: instruction.into(),
        }
    }

    /// Label used for the first mockup of a product
    pub fn initial_label(product: &Product) -> String {
        format!("Initial {} mockup", product.name)
    }
}
