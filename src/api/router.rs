//! HTTP router.
//!
//! Two route trees, `/api/users` (patients) and `/api/doctors`, plus
//! `/api/health`. Every route is `POST`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Rate limiter → 2. Auth → 3. Role guard → 4. Audit logger

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::middleware::from_fn;
use axum::routing::post;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build router from a pre-constructed `ApiContext`.
#[cfg(test)]
pub(crate) fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

/// Authenticated responses must not be cached by intermediaries.
fn no_store() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
}

fn build_router(ctx: ApiContext) -> Router {
    use endpoints::*;

    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension → Rate limit → Auth → Guard → Audit → Handler
    let patient = Router::new()
        .route("/profile", post(account::patient_profile))
        .route("/update", post(account::update_patient))
        .route("/delete", post(account::delete_patient))
        .route("/appointments", post(appointments::patient_list))
        .route("/appointments/book", post(appointments::book))
        .route("/appointments/cancel", post(appointments::patient_cancel))
        .route("/prescriptions", post(prescriptions::patient_get))
        .route("/prescriptions/upload", post(prescriptions::upload_images))
        .route("/medications", post(prescriptions::patient_upsert))
        .route("/medications/delete", post(prescriptions::patient_delete))
        .route("/medical/history", post(care::upsert_history))
        .route("/portfolio", post(care::portfolio))
        .route("/portfolio/update", post(care::update_portfolio))
        .route("/feedback/add", post(feedback::add))
        .route("/feedback/get", post(feedback::for_doctor))
        .route("/feedback", post(feedback::all))
        .route("/alarms", post(reminders::list))
        .route("/alarms/add", post(reminders::add))
        .route("/alarms/update", post(reminders::update_status))
        .route("/alarms/delete", post(reminders::delete))
        .route("/chatbot/message", post(chatbot::message))
        .route("/chatbot/history", post(chatbot::history))
        .with_state(ctx.clone())
        .layer(from_fn(middleware::audit::log_access))
        .layer(from_fn(middleware::auth::require_patient))
        .layer(no_store())
        .layer(from_fn(middleware::auth::require_auth))
        .layer(from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let patient_public = Router::new()
        .route("/register", post(account::register_patient))
        .route("/login", post(account::login_patient))
        .route("/logout", post(account::logout))
        .route("/get/doctors", post(directory::list))
        .route("/get/id", post(directory::get_by_id))
        .route("/get/search", post(directory::search))
        .route("/insight", post(insights::list))
        .route("/insight/id", post(insights::get))
        .route("/insight/category", post(insights::by_category))
        .with_state(ctx.clone())
        .layer(from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let doctor = Router::new()
        .route("/profile", post(account::doctor_profile))
        .route("/update", post(account::update_doctor))
        .route("/delete", post(account::delete_doctor))
        .route("/appointments", post(appointments::doctor_list))
        .route("/appointments/completed", post(appointments::doctor_complete))
        .route("/appointments/cancel", post(appointments::doctor_cancel))
        .route("/prescriptions/add", post(prescriptions::doctor_upsert))
        .route("/patients/portfolio", post(care::patient_portfolio))
        .route("/patients/medical_history", post(care::patient_history))
        .route("/insight/add", post(insights::add))
        .route("/feedback/get", post(feedback::own))
        .with_state(ctx.clone())
        .layer(from_fn(middleware::audit::log_access))
        .layer(from_fn(middleware::auth::require_doctor))
        .layer(no_store())
        .layer(from_fn(middleware::auth::require_auth))
        .layer(from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let doctor_public = Router::new()
        .route("/register", post(account::register_doctor))
        .route("/login", post(account::login_doctor))
        .route("/logout", post(account::logout))
        .route("/insight", post(insights::list))
        .route("/insight/id", post(insights::get))
        .route("/insight/category", post(insights::by_category))
        .with_state(ctx.clone())
        .layer(from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let liveness = Router::new()
        .route("/health", post(health::check))
        .layer(from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api/users", patient)
        .nest("/api/users", patient_public)
        .nest("/api/doctors", doctor)
        .nest("/api/doctors", doctor_public)
        .nest("/api", liveness)
}
