//! Public doctor directory: `get/doctors`, `get/id`, `get/search`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::body;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiMessage};
use crate::directory::{self, SearchRequest};
use crate::models::Doctor;

#[derive(Debug, Deserialize)]
pub struct DoctorId {
    #[serde(alias = "doctorId", alias = "doctor_id")]
    pub id: Uuid,
}

#[derive(Serialize)]
pub struct DoctorPayload {
    pub doctor: Doctor,
}

#[derive(Serialize)]
pub struct DoctorListPayload {
    pub doctors: Vec<Doctor>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
) -> Result<Json<ApiMessage<DoctorListPayload>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctors = directory::list(&conn)?;
    Ok(Json(ApiMessage::new("Doctors fetched successfully", DoctorListPayload { doctors })))
}

pub async fn get_by_id(
    State(ctx): State<ApiContext>,
    payload: Result<Json<DoctorId>, JsonRejection>,
) -> Result<Json<ApiMessage<DoctorPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let doctor = directory::get_by_id(&conn, &req.id)?;
    Ok(Json(ApiMessage::new("Doctor fetched successfully", DoctorPayload { doctor })))
}

pub async fn search(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<ApiMessage<DoctorListPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let doctors = directory::search(&conn, &req)?;
    Ok(Json(ApiMessage::new("Search completed", DoctorListPayload { doctors })))
}
