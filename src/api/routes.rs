//! Route table and the layers wrapped around it.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, warn};

use super::handlers::{bulk, formulas, health, ingredients, invoices, search};
use super::middleware::{self, REQUEST_ID};
use super::AppState;

/// Prefix every resource route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!(origin = %origin, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            REQUEST_ID.clone(),
        ])
        .expose_headers([REQUEST_ID.clone()])
        .allow_credentials(true)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/ingredients",
            get(ingredients::list_ingredients).post(ingredients::create_ingredient),
        )
        .route(
            "/ingredients/:id",
            get(ingredients::get_ingredient)
                .patch(ingredients::update_ingredient)
                .delete(ingredients::delete_ingredient),
        )
        .route(
            "/formulas",
            get(formulas::list_formulas).post(formulas::create_formula),
        )
        .route(
            "/formulas/:id",
            get(formulas::get_formula)
                .patch(formulas::update_formula)
                .delete(formulas::delete_formula),
        )
        .route(
            "/formulas/by-ingredient/:ingredient_id",
            get(formulas::formulas_by_ingredient),
        )
        .route(
            "/bulk/ingredients",
            post(bulk::create_ingredients)
                .patch(bulk::update_ingredients)
                .delete(bulk::delete_ingredients),
        )
        .route(
            "/bulk/formulas",
            post(bulk::create_formulas)
                .patch(bulk::update_formulas)
                .delete(bulk::delete_formulas),
        )
        .route("/search/ingredients", get(search::search_ingredients))
        .route("/search/formulas", get(search::search_formulas))
        .route(
            "/invoices",
            get(invoices::list_invoices).post(invoices::create_invoice),
        )
        .route(
            "/invoices/:id",
            get(invoices::get_invoice)
                .patch(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .route("/invoices/:id/pdf", get(invoices::download_invoice_pdf))
        .route("/health", get(health::health_check))
}

/// Builds the axum router with all routes, middleware, and shared state.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.server.max_body_bytes();
    let cors = cors_layer(&state.settings.server.cors_origins);

    Router::new()
        .nest(API_PREFIX, api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(axum::middleware::from_fn(middleware::request_id))
        .with_state(state)
}
