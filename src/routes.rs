use axum::{middleware, Router};

use crate::auth::accounts;
use crate::auth::middleware::JwtSecret;
use crate::presence;
use crate::products::crud as product_crud;
use crate::seed;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Account routes (no auth required)
    let auth_routes = Router::new()
        .route("/api/auth/register", axum::routing::post(accounts::register))
        .route("/api/auth/login", axum::routing::post(accounts::login));

    // Catalog routes. Reads are public; writes require a valid JWT
    // (enforced by the Claims extractor on the handlers).
    let product_routes = Router::new()
        .route("/api/products", axum::routing::get(product_crud::list_products))
        .route("/api/products", axum::routing::post(product_crud::create_product))
        .route("/api/products/{term}", axum::routing::get(product_crud::get_product))
        .route("/api/products/{term}", axum::routing::put(product_crud::update_product))
        .route("/api/products/{term}", axum::routing::delete(product_crud::delete_product));

    // Demo-data reset
    let seed_routes = Router::new().route("/api/seed", axum::routing::post(seed::run_seed));

    // Presence query surface (JWT required)
    let presence_routes =
        Router::new().route("/api/presence", axum::routing::get(presence::get_presence));

    // WebSocket endpoint (auth via query param, not JWT header)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(product_routes)
        .merge(seed_routes)
        .merge(presence_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
