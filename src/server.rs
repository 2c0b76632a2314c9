//! HTTP server and routes.

mod handlers;
mod state;
mod views;

pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.config.server.upload_limit_mb.saturating_mul(1024 * 1024);

    let book_routes = Router::new()
        .route("/info/{*filename}", get(handlers::book_info))
        .route("/cover/{*filename}", get(handlers::book_cover))
        .route("/download/{*filename}", get(handlers::book_download))
        .route("/delete/{*filename}", post(handlers::book_delete))
        .route("/rename", post(handlers::book_rename))
        .route(
            "/upload",
            post(handlers::book_upload).layer(DefaultBodyLimit::max(upload_limit)),
        );

    let user_routes = Router::new()
        .route("/login", get(handlers::login_page).post(handlers::login_submit))
        .route("/logout", post(handlers::logout));

    Router::new()
        .route("/", get(handlers::catalog))
        .route("/admin", get(handlers::admin))
        .nest("/book", book_routes)
        .nest("/user", user_routes)
        .nest_service("/static", ServeDir::new(&state.config.server.static_dir))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::auth_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
