//! Insight endpoints. `insight/add` is doctor-only; reads are public on both trees.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::body;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiMessage, DoctorContext};
use crate::insights::{self, NewInsight};
use crate::models::Insight;

#[derive(Debug, Deserialize)]
pub struct InsightId {
    #[serde(alias = "insightId", alias = "insight_id")]
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: String,
}

#[derive(Serialize)]
pub struct InsightPayload {
    pub insight: Insight,
}

#[derive(Serialize)]
pub struct InsightListPayload {
    pub insights: Vec<Insight>,
}

pub async fn add(
    State(ctx): State<ApiContext>,
    Extension(DoctorContext(doctor)): Extension<DoctorContext>,
    payload: Result<Json<NewInsight>, JsonRejection>,
) -> Result<Json<ApiMessage<InsightPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let insight = insights::add(&conn, &doctor, &req)?;
    Ok(Json(ApiMessage::new("Insight published successfully", InsightPayload { insight })))
}

pub async fn list(
    State(ctx): State<ApiContext>,
) -> Result<Json<ApiMessage<InsightListPayload>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let insights = insights::list(&conn)?;
    Ok(Json(ApiMessage::new("Insights fetched successfully", InsightListPayload { insights })))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    payload: Result<Json<InsightId>, JsonRejection>,
) -> Result<Json<ApiMessage<InsightPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let insight = insights::get(&conn, &req.id)?;
    Ok(Json(ApiMessage::new("Insight fetched successfully", InsightPayload { insight })))
}

pub async fn by_category(
    State(ctx): State<ApiContext>,
    payload: Result<Json<CategoryQuery>, JsonRejection>,
) -> Result<Json<ApiMessage<InsightListPayload>>, ApiError> {
    let req = body(payload)?;
    let conn = ctx.core.open_db()?;
    let insights = insights::by_category(&conn, &req.category)?;
    Ok(Json(ApiMessage::new("Insights fetched successfully", InsightListPayload { insights })))
}
