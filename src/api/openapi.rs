//! OpenAPI 3.0 specification definition

use utoipa::OpenApi;

use crate::api::handlers::{
    ApiError, ErrorResponse,
    health::HealthResponse,
    catalog::{ProductsListResponse, ProductResponse, SuggestionsResponse},
    sessions::{SessionResponse, SelectProductRequest, EditRequest, SelectVersionRequest},
};
use crate::domain::{MockupVersion, Product};
use crate::session::{HistoryEntry, Phase, SelectedProduct, SessionSnapshot};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mockup-Forge API",
        version = "1.0.0",
        description = "Logo-to-product mockup generation with conversational edits and version history",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "catalog", description = "Product catalog and edit suggestions"),
        (name = "sessions", description = "Mockup sessions: logo, generation, edits, history and export")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::catalog::list_products,
        crate::api::handlers::catalog::get_product,
        crate::api::handlers::catalog::list_edit_suggestions,
        crate::api::handlers::sessions::create_session,
        crate::api::handlers::sessions::get_session,
        crate::api::handlers::sessions::delete_session,
        crate::api::handlers::sessions::upload_logo,
        crate::api::handlers::sessions::select_product,
        crate::api::handlers::sessions::submit_edit,
        crate::api::handlers::sessions::select_version,
        crate::api::handlers::sessions::export_mockup,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            ApiError,
            // Catalog schemas
            Product,
            ProductsListResponse,
            ProductResponse,
            SuggestionsResponse,
            // Session schemas
            SessionResponse,
            SelectProductRequest,
            EditRequest,
            SelectVersionRequest,
            SessionSnapshot,
            SelectedProduct,
            HistoryEntry,
            Phase,
            MockupVersion,
        )
    )
)]
pub struct ApiDoc;
