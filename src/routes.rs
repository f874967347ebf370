// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, exams, import, simulations},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * `/api/auth` is public; everything else needs a bearer token.
/// * `/api/admin` additionally needs the admin role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let simulation_routes = Router::new()
        .route(
            "/",
            get(simulations::list_simulations).post(simulations::create_simulation),
        )
        .route("/check", post(simulations::check_simulation))
        .route("/duplicates", get(simulations::duplicate_groups))
        .route("/questions", get(simulations::question_usage_report))
        .route("/{id}", get(simulations::get_simulation));

    let exam_routes = Router::new()
        .route("/", post(exams::create_exam))
        .route("/coverage", get(exams::coverage_report))
        .route("/wrong-questions", get(exams::wrong_questions))
        .route("/{id}/coverage", get(exams::exam_coverage));

    let admin_routes = Router::new()
        .route("/import/questions", post(import::import_questions))
        .layer(middleware::from_fn(admin_middleware));

    let protected = Router::new()
        .nest("/simulations", simulation_routes)
        .nest("/exams", exam_routes)
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", protected)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
