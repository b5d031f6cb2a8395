//! Reminder endpoints: `alarms`, `alarms/add`, `alarms/update`, `alarms/delete`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::body;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiMessage, Empty, PatientContext};
use crate::models::Reminder;
use crate::reminders::{self, NewReminder};

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    #[serde(alias = "reminderId", alias = "id")]
    pub reminder_id: Uuid,
    pub status: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReminderRef {
    #[serde(alias = "reminderId", alias = "id")]
    pub reminder_id: Uuid,
}

#[derive(Serialize)]
pub struct ReminderPayload {
    pub reminder: Reminder,
}

#[derive(Serialize)]
pub struct ReminderListPayload {
    pub reminders: Vec<Reminder>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
) -> Result<Json<ApiMessage<ReminderListPayload>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let reminders = reminders::list(&conn, &user.id)?;
    Ok(Json(ApiMessage::new(
        "Reminders fetched successfully",
        ReminderListPayload { reminders },
    )))
}

pub async fn add(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<NewReminder>, JsonRejection>,
) -> Result<Json<ApiMessage<ReminderPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let reminder = reminders::add(&conn, &user.id, &req)?;
    Ok(Json(ApiMessage::new("Reminder added successfully", ReminderPayload { reminder })))
}

pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<ApiMessage<ReminderPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let reminder = reminders::set_status(&conn, &user.id, &req.reminder_id, req.status)?;
    Ok(Json(ApiMessage::new("Reminder updated successfully", ReminderPayload { reminder })))
}

pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<ReminderRef>, JsonRejection>,
) -> Result<Json<ApiMessage<Empty>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    reminders::delete(&conn, &user.id, &req.reminder_id)?;
    Ok(Json(ApiMessage::new("Reminder deleted successfully", Empty {})))
}
