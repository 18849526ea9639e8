//! API module - HTTP routes and handlers

pub mod handlers;
pub mod openapi;

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/products")
                    .route("", web::get().to(handlers::catalog::list_products))
                    .route("/{product_id}", web::get().to(handlers::catalog::get_product))
            )
            .route("/edits/suggestions", web::get().to(handlers::catalog::list_edit_suggestions))
            .service(
                web::scope("/sessions")
                    .route("", web::post().to(handlers::sessions::create_session))
                    .route("/{session_id}", web::get().to(handlers::sessions::get_session))
                    .route("/{session_id}", web::delete().to(handlers::sessions::delete_session))
                    .route("/{session_id}/logo", web::put().to(handlers::sessions::upload_logo))
                    .route("/{session_id}/product", web::post().to(handlers::sessions::select_product))
                    .route("/{session_id}/edits", web::post().to(handlers::sessions::submit_edit))
                    .route("/{session_id}/current", web::put().to(handlers::sessions::select_version))
                    .route("/{session_id}/export", web::get().to(handlers::sessions::export_mockup))
            )
    )
    .route("/health", web::get().to(handlers::health::health_check))
    // Swagger UI and OpenAPI spec
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}")
            .url("/api-docs/openapi.json", ApiDoc::openapi())
    );
}
