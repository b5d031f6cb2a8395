//! Prescription endpoints.
//!
//! Doctor: `prescriptions/add`. Patient: `prescriptions`, `prescriptions/upload`,
//! `medications`, `medications/delete`. All require appointment participation.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::appointments::AppointmentRef;
use super::body;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiMessage, Empty, DoctorContext, PatientContext};
use crate::models::{Prescription, Principal};
use crate::prescriptions::{self, PrescriptionUpsert};

#[derive(Debug, Deserialize)]
pub struct ImageUpload {
    #[serde(alias = "appointmentId")]
    pub appointment_id: Uuid,
    #[serde(alias = "imageUrls")]
    pub images: Vec<String>,
}

#[derive(Serialize)]
pub struct PrescriptionPayload {
    pub prescription: Prescription,
}

async fn save(
    ctx: ApiContext,
    principal: Principal,
    req: PrescriptionUpsert,
) -> Result<Json<ApiMessage<PrescriptionPayload>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let prescription = prescriptions::upsert(&conn, &principal, &req)?;
    Ok(Json(ApiMessage::new(
        "Prescription saved successfully",
        PrescriptionPayload { prescription },
    )))
}

pub async fn doctor_upsert(
    State(ctx): State<ApiContext>,
    Extension(DoctorContext(doctor)): Extension<DoctorContext>,
    payload: Result<Json<PrescriptionUpsert>, JsonRejection>,
) -> Result<Json<ApiMessage<PrescriptionPayload>>, ApiError> {
    save(ctx, Principal::Doctor(doctor), body(payload)?).await
}

pub async fn patient_upsert(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<PrescriptionUpsert>, JsonRejection>,
) -> Result<Json<ApiMessage<PrescriptionPayload>>, ApiError> {
    save(ctx, Principal::Patient(user), body(payload)?).await
}

pub async fn patient_get(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<AppointmentRef>, JsonRejection>,
) -> Result<Json<ApiMessage<PrescriptionPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let prescription = prescriptions::get(&conn, &Principal::Patient(user), &req.appointment_id)?;
    Ok(Json(ApiMessage::new(
        "Prescription fetched successfully",
        PrescriptionPayload { prescription },
    )))
}

pub async fn upload_images(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<ImageUpload>, JsonRejection>,
) -> Result<Json<ApiMessage<PrescriptionPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let prescription = prescriptions::attach_images(
        &conn,
        &Principal::Patient(user),
        &req.appointment_id,
        &req.images,
    )?;
    Ok(Json(ApiMessage::new(
        "Images attached successfully",
        PrescriptionPayload { prescription },
    )))
}

pub async fn patient_delete(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<AppointmentRef>, JsonRejection>,
) -> Result<Json<ApiMessage<Empty>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    prescriptions::delete(&conn, &Principal::Patient(user), &req.appointment_id)?;
    Ok(Json(ApiMessage::new("Prescription deleted successfully", Empty {})))
}
