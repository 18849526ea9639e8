//! Product Catalog
//!
//! The fixed set of products a logo can be placed on. The catalog is loaded
//! once at startup (built-in entries, or a JSON file that replaces them) and
//! is read-only afterwards.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate product id: {0}")]
    DuplicateId(String),
    #[error("Invalid product '{id}': {reason}")]
    InvalidProduct { id: String, reason: String },
    #[error("Catalog contains no products")]
    Empty,
}

// ============================================================================
// Product
// ============================================================================

/// A selectable product and the scene the generator should render it in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    /// Stable unique key (e.g., "tshirt")
    pub id: String,
    /// Display name
    pub name: String,
    pub description: String,
    /// Reference image for the selection UI
    pub thumbnail: String,
    /// Scene/composition template handed to the generation backend
    pub prompt: String,
}

impl Product {
    fn new(id: &str, name: &str, description: &str, thumbnail: &str, prompt: &str) -> Self {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            thumbnail: thumbnail.to_string(),
            prompt: prompt.to_string(),
        }
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidProduct {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.prompt.trim().is_empty() {
            return Err(invalid("prompt must not be empty"));
        }
        Ok(())
    }
}

static BUILTIN_PRODUCTS: Lazy<Vec<Product>> = Lazy::new(|| {
    vec![
        Product::new(
            "tshirt",
            "Classic T-Shirt",
            "High-quality cotton t-shirt on a studio mannequin.",
            "https://picsum.photos/seed/tshirt/300/300",
            "A professional studio product shot of a high-quality cotton t-shirt on a clean mannequin, white background.",
        ),
        Product::new(
            "hoodie",
            "Streetwear Hoodie",
            "Heavyweight fleece hoodie with a modern fit.",
            "https://picsum.photos/seed/hoodie/300/300",
            "A cinematic streetwear product shot of a premium fleece hoodie worn by a faceless model in an urban alleyway.",
        ),
        Product::new(
            "mug",
            "Ceramic Mug",
            "Standard 11oz white ceramic coffee mug.",
            "https://picsum.photos/seed/mug/300/300",
            "A cozy morning lifestyle shot of a white ceramic coffee mug sitting on a wooden desk next to a laptop.",
        ),
        Product::new(
            "totebag",
            "Eco Tote Bag",
            "Organic canvas tote bag for sustainable shopping.",
            "https://picsum.photos/seed/tote/300/300",
            "A flat-lay shot of an organic canvas tote bag on a minimalist background with aesthetic foliage.",
        ),
        Product::new(
            "cap",
            "Dad Hat",
            "Unstructured 6-panel cotton twill cap.",
            "https://picsum.photos/seed/cap/300/300",
            "A clean product photo of a cotton twill baseball cap on a plain pedestal.",
        ),
    ]
});

/// Canned edit instructions offered next to the free-text edit box
pub const EDIT_SUGGESTIONS: [&str; 4] = [
    "Make the background a modern cafe",
    "Change the product color to forest green",
    "Add a vintage film grain effect",
    "Change lighting to sunset golden hour",
];

// ============================================================================
// Catalog
// ============================================================================

/// Ordered, immutable product list
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    products: Vec<Product>,
}

impl ProductCatalog {
    /// The catalog shipped with the service
    pub fn builtin() -> Self {
        ProductCatalog {
            products: BUILTIN_PRODUCTS.clone(),
        }
    }

    /// Build a catalog, rejecting empty lists, blank fields and duplicate ids
    pub fn from_products(products: Vec<Product>) -> Result<Self, CatalogError> {
        if products.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for product in &products {
            product.validate()?;
            if !seen.insert(product.id.as_str()) {
                return Err(CatalogError::DuplicateId(product.id.clone()));
            }
        }

        Ok(ProductCatalog { products })
    }

    /// Load a catalog from a JSON array of products
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        let products: Vec<Product> = serde_json::from_str(&content)?;
        let catalog = Self::from_products(products)?;

        info!(
            path = %path.display(),
            products = catalog.len(),
            "Loaded product catalog"
        );

        Ok(catalog)
    }

    pub fn list(&self) -> &[Product] {
        &self.products
    }

    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
