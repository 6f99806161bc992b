// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{health, lecturer, mastery, progress, topic},
    state::AppState,
    utils::jwt::{auth_middleware, lecturer_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (topics, progress, mastery, lecturer).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store, notifier, config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // Role and course assignment are checked inside the write handlers.
    let topic_routes = Router::new()
        .route("/", get(topic::list_topics).post(topic::create_topic))
        .route("/reorder", put(topic::reorder_topics))
        .route(
            "/{id}",
            get(topic::get_topic)
                .put(topic::update_topic)
                .delete(topic::delete_topic),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let progress_routes = Router::new()
        .route("/", get(progress::list_progress))
        .route("/topics/{topic_id}", put(progress::record_progress));

    let mastery_routes = Router::new()
        .route("/", get(mastery::get_my_mastery))
        .route("/history", get(mastery::get_my_history))
        .route("/recalculate", post(mastery::recalculate_my_mastery));

    // Auth first, then the student check
    let student_routes = Router::new()
        .nest("/progress", progress_routes)
        .nest("/mastery", mastery_routes)
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let offering = "/courses/{course_id}/semesters/{semester_id}";
    let lecturer_routes = Router::new()
        .route(&format!("{offering}/mastery"), get(lecturer::cohort_mastery))
        .route(
            &format!("{offering}/statistics"),
            get(lecturer::mastery_statistics),
        )
        .route(
            &format!("{offering}/students/{{student_id}}/mastery"),
            get(lecturer::student_mastery),
        )
        .route(
            &format!("{offering}/students/{{student_id}}/recalculate"),
            post(lecturer::recalculate_student_mastery),
        )
        .layer(middleware::from_fn(lecturer_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/topics", topic_routes)
        .nest("/api", student_routes)
        .nest("/api/lecturer", lecturer_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
