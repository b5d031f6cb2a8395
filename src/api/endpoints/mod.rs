//! API endpoint handlers.
//!
//! One module per feature. Every route is `POST` with a JSON body, and every
//! success body is `{ "message": ..., ...payload }`.

pub mod account;
pub mod appointments;
pub mod care;
pub mod chatbot;
pub mod directory;
pub mod feedback;
pub mod health;
pub mod insights;
pub mod prescriptions;
pub mod reminders;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Unwrap a JSON body, turning a rejection into a 400 `VALIDATION` error.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(ApiError::from)
}

/// Run `f` with a fresh connection on the blocking pool.
///
/// For work that is CPU-heavy (password hashing) or waits on another
/// service (chat completion).
pub(crate) async fn blocking<T, F>(ctx: &ApiContext, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Connection, &CoreState) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let core = ctx.core.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = core.open_db()?;
        f(&mut conn, &core)
    })
    .await?
}
