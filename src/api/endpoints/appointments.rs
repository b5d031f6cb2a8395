//! Appointment endpoints.
//!
//! Patient tree: `appointments`, `appointments/book`, `appointments/cancel`.
//! Doctor tree: `appointments`, `appointments/completed`, `appointments/cancel`.

use axum::extract::rejection::JsonRejection;
use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::body;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiMessage, DoctorContext, PatientContext};
use crate::appointment::{self, BookingRequest, StatusFilter};
use crate::models::{Appointment, AppointmentSummary, Principal};

#[derive(Debug, Deserialize)]
pub struct AppointmentRef {
    #[serde(alias = "appointmentId", alias = "id")]
    pub appointment_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct DoctorListQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct AppointmentPayload {
    pub appointment: Appointment,
}

#[derive(Serialize)]
pub struct AppointmentListPayload {
    pub appointments: Vec<AppointmentSummary>,
}

// ─── Patient tree ───

pub async fn patient_list(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
) -> Result<Json<ApiMessage<AppointmentListPayload>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let appointments = appointment::list_for_patient(&conn, &user.id)?;
    Ok(Json(ApiMessage::new(
        "Appointments fetched successfully",
        AppointmentListPayload { appointments },
    )))
}

pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<Json<ApiMessage<AppointmentPayload>>, ApiError> {
    let req = body(payload)?;
    let today = chrono::Local::now().date_naive();
    let conn = ctx.core.open_db()?;
    let appointment = appointment::book(&conn, &user.id, &req, today)?;
    Ok(Json(ApiMessage::new(
        "Appointment booked successfully",
        AppointmentPayload { appointment },
    )))
}

pub async fn patient_cancel(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<AppointmentRef>, JsonRejection>,
) -> Result<Json<ApiMessage<AppointmentPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let appointment = appointment::cancel(&conn, &Principal::Patient(user), &req.appointment_id)?;
    Ok(Json(ApiMessage::new(
        "Appointment cancelled successfully",
        AppointmentPayload { appointment },
    )))
}

// ─── Doctor tree ───

/// Scheduled by default; `{"status": "all"}` or a specific status widens it.
/// An empty body means the default, a malformed one is a 400.
pub async fn doctor_list(
    State(ctx): State<ApiContext>,
    Extension(DoctorContext(doctor)): Extension<DoctorContext>,
    raw: Bytes,
) -> Result<Json<ApiMessage<AppointmentListPayload>>, ApiError> {
    let query = if raw.iter().all(u8::is_ascii_whitespace) {
        DoctorListQuery::default()
    } else {
        body(Json::<DoctorListQuery>::from_bytes(&raw))?
    };
    let filter = StatusFilter::parse(query.status.as_deref())?;
    let conn = ctx.core.open_db()?;
    let appointments = appointment::list_for_doctor(&conn, &doctor.id, filter)?;
    Ok(Json(ApiMessage::new(
        "Appointments fetched successfully",
        AppointmentListPayload { appointments },
    )))
}

pub async fn doctor_complete(
    State(ctx): State<ApiContext>,
    Extension(DoctorContext(doctor)): Extension<DoctorContext>,
    payload: Result<Json<AppointmentRef>, JsonRejection>,
) -> Result<Json<ApiMessage<AppointmentPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let appointment = appointment::confirm(&conn, &Principal::Doctor(doctor), &req.appointment_id)?;
    Ok(Json(ApiMessage::new(
        "Appointment marked as completed",
        AppointmentPayload { appointment },
    )))
}

pub async fn doctor_cancel(
    State(ctx): State<ApiContext>,
    Extension(DoctorContext(doctor)): Extension<DoctorContext>,
    payload: Result<Json<AppointmentRef>, JsonRejection>,
) -> Result<Json<ApiMessage<AppointmentPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let appointment = appointment::cancel(&conn, &Principal::Doctor(doctor), &req.appointment_id)?;
    Ok(Json(ApiMessage::new(
        "Appointment cancelled successfully",
        AppointmentPayload { appointment },
    )))
}
