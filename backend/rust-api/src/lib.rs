use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        .nest("/api/v1/catalog", catalog_routes())
        // Protected endpoints (require JWT)
        .nest(
            "/api/v1",
            user_routes().route_layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(middlewares::metrics::metrics_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(middlewares::trace::request_id_middleware))
}

fn auth_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/provider", post(handlers::auth::provider_login));

    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::get_current_user))
        .route("/logout", post(handlers::auth::logout))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}

fn catalog_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/islands", get(handlers::catalog::list_islands))
        .route("/islands/{id}", get(handlers::catalog::get_island))
        .route(
            "/islands/{id}/modules",
            get(handlers::catalog::list_island_modules),
        )
        .route("/modules/{id}", get(handlers::catalog::get_module))
        .route("/challenges", get(handlers::catalog::list_challenges))
        .route("/challenges/{id}", get(handlers::catalog::get_challenge))
        .route("/exercises", get(handlers::catalog::list_exercises))
        .route("/exercises/{id}", get(handlers::catalog::get_exercise))
        .route("/items", get(handlers::catalog::list_items))
}

fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/progress",
            get(handlers::progress::get_progress).delete(handlers::progress::reset_progress),
        )
        .route(
            "/progress/modules/{id}/complete",
            post(handlers::progress::complete_module),
        )
        .route(
            "/progress/modules/{id}/responses",
            put(handlers::progress::save_module_responses),
        )
        .route(
            "/progress/challenges/{id}/complete",
            post(handlers::progress::complete_challenge),
        )
        .route(
            "/progress/exercises/{id}/complete",
            post(handlers::progress::complete_exercise),
        )
        .route(
            "/recommendations",
            get(handlers::progress::get_recommendations),
        )
        .route(
            "/settings",
            get(handlers::settings::get_settings).put(handlers::settings::save_settings),
        )
}
