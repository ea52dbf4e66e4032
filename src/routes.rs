// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, curriculum, dashboard, notification, query, quiz, report},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, learner_middleware, trainer_middleware},
};

/// Assembles the main application router.
///
/// * `/api/auth`: public.
/// * `/api/quizzes`, `/api/curriculum`: any authenticated user; submission is learner only.
/// * `/api/learner`, `/api/trainer`, `/api/admin`: role-gated.
/// * `/media`: generated certificates.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes))
        .route("/{id}", get(quiz::get_quiz))
        .route("/{id}/data", get(quiz::quiz_data))
        .merge(
            Router::new()
                .route("/{id}/submit", post(quiz::submit_attempt))
                .layer(middleware::from_fn(learner_middleware)),
        )
        .layer(auth_layer.clone());

    let curriculum_routes = Router::new()
        .route("/subjects", get(curriculum::list_subjects))
        .route("/subjects/{slug}/lessons", get(curriculum::list_lessons))
        .route("/lessons/{slug}", get(curriculum::get_lesson))
        .layer(auth_layer.clone());

    let learner_routes = Router::new()
        .route("/dashboard", get(dashboard::learner_dashboard))
        .route("/login-activity", get(dashboard::login_activity))
        .route("/quizzes/available", get(quiz::available_quizzes))
        .route("/results", get(quiz::my_results))
        .route("/results/{id}", get(quiz::my_result_detail))
        .route("/lessons/{slug}/complete", post(curriculum::complete_lesson))
        .route("/queries", get(query::my_queries).post(query::raise_query))
        .route("/queries/{id}/responses", post(query::learner_respond))
        .route("/notifications", get(notification::inbox))
        .route("/notifications/read", post(notification::mark_read))
        // Auth first, then role check
        .layer(middleware::from_fn(learner_middleware))
        .layer(auth_layer.clone());

    let trainer_routes = Router::new()
        .route("/dashboard", get(dashboard::trainer_dashboard))
        .route("/quizzes", post(quiz::create_quiz))
        .route("/quizzes/{id}", delete(quiz::delete_quiz))
        .route("/subjects", post(curriculum::create_subject))
        .route("/lessons", post(curriculum::create_lesson))
        .route("/assessment-reports", get(report::assessment_reports))
        .route("/assessment-reports/{id}", get(report::get_report))
        .route(
            "/notifications",
            get(notification::list_sent).post(notification::send),
        )
        .route("/queries", get(query::all_queries))
        .route("/queries/{id}/responses", post(query::trainer_respond))
        .route("/queries/{id}/assign", patch(query::assign_trainer))
        .route("/queries/{id}/resolve", patch(query::resolve_query))
        .layer(middleware::from_fn(trainer_middleware))
        .layer(auth_layer.clone());

    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::list_users))
        .route("/users/{id}", delete(admin::delete_user))
        .route("/users/{id}/activation", put(admin::set_activation))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/curriculum", curriculum_routes)
        .nest("/api/learner", learner_routes)
        .nest("/api/trainer", trainer_routes)
        .nest("/api/admin", admin_routes)
        .nest_service("/media", ServeDir::new(&state.config.media_root))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
