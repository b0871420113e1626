// src/routes.rs

use std::sync::Arc;

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    handlers::{admin, auth, course, discussion, enrollment, quiz},
    models::{
        attempt::{SubmitQuizRequest, SubmittedAnswer},
        user::{LoginRequest, RegisterRequest},
    },
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, instructor_middleware},
};

#[derive(OpenApi)]
#[openapi(components(schemas(
    RegisterRequest,
    LoginRequest,
    SubmitQuizRequest,
    SubmittedAnswer
)))]
struct ApiDoc;

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, courses, lessons, quizzes, enrollments, admin).
/// * Applies global middleware (Trace, CORS) and rate limiting on submissions.
/// * Injects global state (pool + config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:5173".parse().unwrap(),
        "http://127.0.0.1:5173".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(5)
        .finish()
        .unwrap();
    let governor_conf = Arc::new(governor_conf);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let course_routes = Router::new()
        .route("/", get(course::list_courses))
        .route("/{id}", get(course::get_course))
        // Learner actions
        .merge(
            Router::new()
                .route(
                    "/{id}/enroll",
                    post(enrollment::enroll).delete(enrollment::unenroll),
                )
                .route("/{id}/progress", get(enrollment::my_progress))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        // Instructor actions
        .merge(
            Router::new()
                .route("/", post(course::create_course))
                .route("/{id}/modules", post(course::create_module))
                .layer(middleware::from_fn(instructor_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let module_routes = Router::new()
        .route("/{id}/lessons", post(course::create_lesson))
        .layer(middleware::from_fn(instructor_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let lesson_routes = Router::new()
        .route("/{id}/comments", get(discussion::list_comments))
        .merge(
            Router::new()
                .route("/{id}/complete", put(course::complete_lesson))
                .route("/{id}/uncomplete", put(course::uncomplete_lesson))
                .route("/{id}/comments", post(discussion::create_comment))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let comment_routes = Router::new()
        .route("/{id}", delete(discussion::delete_comment))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let quiz_routes = Router::new()
        .merge(
            Router::new()
                .route("/{id}", get(quiz::get_quiz))
                .route("/{id}/score", get(quiz::quiz_score))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        // Submissions are rate limited per client IP.
        .merge(
            Router::new()
                .route("/{id}/submit", post(quiz::submit_quiz))
                .layer(GovernorLayer::new(governor_conf))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .merge(
            Router::new()
                .route("/", post(quiz::create_quiz))
                .route("/{id}", put(quiz::update_quiz))
                .layer(middleware::from_fn(instructor_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let enrollment_routes = Router::new()
        .route("/me", get(enrollment::my_enrollments))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/courses/pending", get(admin::list_pending_courses))
        .route("/courses/{id}/approve", put(admin::approve_course))
        .route("/courses/{id}/reject", put(admin::reject_course))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/courses", course_routes)
        .nest("/api/modules", module_routes)
        .nest("/api/lessons", lesson_routes)
        .nest("/api/comments", comment_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/enrollments", enrollment_routes)
        .nest("/api/admin", admin_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
