//! Feedback endpoints.
//!
//! Patient: `feedback/add`, `feedback/get` (one doctor), `feedback` (all).
//! Doctor: `feedback/get` (their own).

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::body;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiMessage, DoctorContext, PatientContext};
use crate::care_records::{self, NewFeedback};
use crate::models::Feedback;

#[derive(Debug, Deserialize)]
pub struct DoctorRef {
    #[serde(alias = "doctorId", alias = "id")]
    pub doctor_id: Uuid,
}

#[derive(Serialize)]
pub struct FeedbackPayload {
    pub feedback: Feedback,
}

#[derive(Serialize)]
pub struct FeedbackListPayload {
    pub feedback: Vec<Feedback>,
}

pub async fn add(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<NewFeedback>, JsonRejection>,
) -> Result<Json<ApiMessage<FeedbackPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let feedback = care_records::add_feedback(&conn, &user.id, &req)?;
    Ok(Json(ApiMessage::new("Feedback submitted successfully", FeedbackPayload { feedback })))
}

pub async fn for_doctor(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(_user)): Extension<PatientContext>,
    payload: Result<Json<DoctorRef>, JsonRejection>,
) -> Result<Json<ApiMessage<FeedbackListPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let feedback = care_records::feedback_for_doctor(&conn, &req.doctor_id)?;
    Ok(Json(ApiMessage::new("Feedback fetched successfully", FeedbackListPayload { feedback })))
}

pub async fn all(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(_user)): Extension<PatientContext>,
) -> Result<Json<ApiMessage<FeedbackListPayload>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let feedback = care_records::all_feedback(&conn)?;
    Ok(Json(ApiMessage::new("Feedback fetched successfully", FeedbackListPayload { feedback })))
}

pub async fn own(
    State(ctx): State<ApiContext>,
    Extension(DoctorContext(doctor)): Extension<DoctorContext>,
) -> Result<Json<ApiMessage<FeedbackListPayload>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let feedback = care_records::feedback_for_doctor(&conn, &doctor.id)?;
    Ok(Json(ApiMessage::new("Feedback fetched successfully", FeedbackListPayload { feedback })))
}
