//! Health portfolio and medical history endpoints.
//!
//! Patient: `portfolio`, `portfolio/update`, `medical/history`.
//! Doctor: `patients/portfolio`, `patients/medical_history`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::body;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiMessage, DoctorContext, PatientContext};
use crate::care_records::{self, MedicalHistoryUpsert, PortfolioUpdate};
use crate::models::{HealthPortfolio, MedicalHistoryEntry};

#[derive(Debug, Deserialize)]
pub struct PatientRef {
    #[serde(alias = "patientId", alias = "id")]
    pub patient_id: Uuid,
}

#[derive(Serialize)]
pub struct PortfolioPayload {
    pub portfolio: HealthPortfolio,
}

#[derive(Serialize)]
pub struct HistoryEntryPayload {
    pub entry: MedicalHistoryEntry,
}

#[derive(Serialize)]
pub struct HistoryPayload {
    pub medical_history: Vec<MedicalHistoryEntry>,
}

pub async fn portfolio(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
) -> Result<Json<ApiMessage<PortfolioPayload>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let portfolio = care_records::get_portfolio(&conn, &user.id)?;
    Ok(Json(ApiMessage::new("Health portfolio fetched successfully", PortfolioPayload { portfolio })))
}

pub async fn update_portfolio(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<PortfolioUpdate>, JsonRejection>,
) -> Result<Json<ApiMessage<PortfolioPayload>>, ApiError> {
    let update = body(payload)?;
    let conn = ctx.core.open_db()?;
    let portfolio = care_records::upsert_portfolio(&conn, &user.id, &update)?;
    Ok(Json(ApiMessage::new("Health portfolio updated successfully", PortfolioPayload { portfolio })))
}

pub async fn upsert_history(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<MedicalHistoryUpsert>, JsonRejection>,
) -> Result<Json<ApiMessage<HistoryEntryPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let entry = care_records::upsert_medical_history(&conn, &user.id, &req)?;
    Ok(Json(ApiMessage::new("Medical history saved successfully", HistoryEntryPayload { entry })))
}

pub async fn patient_portfolio(
    State(ctx): State<ApiContext>,
    Extension(DoctorContext(_doctor)): Extension<DoctorContext>,
    payload: Result<Json<PatientRef>, JsonRejection>,
) -> Result<Json<ApiMessage<PortfolioPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let portfolio = care_records::get_patient_portfolio(&conn, &req.patient_id)?;
    Ok(Json(ApiMessage::new("Health portfolio fetched successfully", PortfolioPayload { portfolio })))
}

pub async fn patient_history(
    State(ctx): State<ApiContext>,
    Extension(DoctorContext(_doctor)): Extension<DoctorContext>,
    payload: Result<Json<PatientRef>, JsonRejection>,
) -> Result<Json<ApiMessage<HistoryPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let medical_history = care_records::list_patient_history(&conn, &req.patient_id)?;
    Ok(Json(ApiMessage::new("Medical history fetched successfully", HistoryPayload { medical_history })))
}
