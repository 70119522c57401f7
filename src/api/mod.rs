use crate::state::AppState;
use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use std::sync::{Arc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

pub mod handlers;
pub mod responses;

pub fn router(state: Arc<RwLock<AppState>>, cors_origin: &str) -> Router {
    Router::new()
        .route("/api/predict", get(handlers::get_predict))
        .route("/api/health", get(handlers::get_health))
        .route("/api/stations", get(handlers::get_stations))
        .route(
            "/api/stations/{id}/ridership",
            get(handlers::get_station_ridership),
        )
        .route("/api/users", get(handlers::get_users))
        .route(
            "/api/users/{id}",
            get(handlers::get_user)
                .put(handlers::put_user)
                .delete(handlers::delete_user),
        )
        .route("/api/users/register", post(handlers::post_register))
        .route("/api/users/login", post(handlers::post_login))
        .route("/api/users/verify", post(handlers::post_verify))
        .route(
            "/api/users/resend-verification",
            post(handlers::post_resend_verification),
        )
        .route(
            "/api/users/forgot-password",
            post(handlers::post_forgot_password),
        )
        .route(
            "/api/users/reset-password",
            post(handlers::post_reset_password),
        )
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);
    match origin.parse::<HeaderValue>() {
        Ok(value) if origin != "*" => layer.allow_origin(value),
        Ok(_) => layer.allow_origin(Any),
        Err(e) => {
            warn!(origin, error = %e, "Invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        }
    }
}
