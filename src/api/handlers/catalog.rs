//! Product catalog endpoints

use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::AppState;
use crate::domain::{Product, EDIT_SUGGESTIONS};
use super::{error_response, ErrorResponse};

/// Response for listing products
#[derive(Serialize, ToSchema)]
pub struct ProductsListResponse {
    pub success: bool,
    pub data: Vec<Product>,
    pub count: usize,
}

/// Response for a single product
#[derive(Serialize, ToSchema)]
pub struct ProductResponse {
    pub success: bool,
    pub data: Product,
}

/// Canned edit instructions
#[derive(Serialize, ToSchema)]
pub struct SuggestionsResponse {
    pub success: bool,
    pub data: Vec<String>,
}

/// GET /api/v1/products - List selectable products in display order
#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "catalog",
    responses(
        (status = 200, description = "All products", body = ProductsListResponse)
    )
)]
pub async fn list_products(state: web::Data<AppState>) -> HttpResponse {
    let data = state.catalog.list().to_vec();
    let count = data.len();

    HttpResponse::Ok().json(ProductsListResponse {
        success: true,
        data,
        count,
    })
}

/// GET /api/v1/products/{product_id} - Get a product by id
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}",
    tag = "catalog",
    params(
        ("product_id" = String, Path, description = "Product identifier (e.g., 'tshirt')")
    ),
    responses(
        (status = 200, description = "Product details", body = ProductResponse),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
pub async fn get_product(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let product_id = path.into_inner();

    match state.catalog.find(&product_id) {
        Some(product) => HttpResponse::Ok().json(ProductResponse {
            success: true,
            data: product.clone(),
        }),
        None => {
            debug!(product_id = %product_id, "Product not found");
            error_response(
                StatusCode::NOT_FOUND,
                "PRODUCT_NOT_FOUND",
                format!("Product '{}' does not exist", product_id),
            )
        }
    }
}

/// GET /api/v1/edits/suggestions - Suggested edit instructions
#[utoipa::path(
    get,
    path = "/api/v1/edits/suggestions",
    tag = "catalog",
    responses(
        (status = 200, description = "Suggested edit instructions", body = SuggestionsResponse)
    )
)]
pub async fn list_edit_suggestions() -> HttpResponse {
    HttpResponse::Ok().json(SuggestionsResponse {
        success: true,
        data: EDIT_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
    })
}
