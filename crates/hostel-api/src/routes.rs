use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tower_http::services::ServeDir;

use crate::complaints::{MAX_IMAGE_BYTES, MAX_IMAGES};
use crate::middleware::require_auth;
use crate::state::AppState;
use crate::storage::PUBLIC_PREFIX;
use crate::{auth, categories, complaints};

/// Room for the text fields and multipart framing on top of the images.
const FORM_OVERHEAD: usize = 1024 * 1024;

/// The whole HTTP surface. CORS and tracing layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let upload_dir = state.complaints.images().dir().to_path_buf();

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/admin/reset-super", post(auth::reset_super_admin))
        .route("/categories", get(categories::list_categories))
        .route(
            "/complaints",
            post(complaints::create_complaint)
                .layer(DefaultBodyLimit::max(MAX_IMAGES * MAX_IMAGE_BYTES + FORM_OVERHEAD)),
        )
        .route("/complaints/public/{tracking_code}", get(complaints::track_complaint))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/admin/departments", get(auth::list_departments))
        .route("/auth/admin/users/{id}/password", put(auth::change_password))
        .route("/complaints", get(complaints::list_complaints))
        .route(
            "/complaints/{id}",
            get(complaints::get_complaint).put(complaints::update_complaint_status),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(upload_dir))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
