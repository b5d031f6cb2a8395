//! Registration, login, logout and account maintenance for both trees.
//!
//! - `POST {tree}/register`, `{tree}/login`, `{tree}/logout`: unprotected
//! - `POST {tree}/profile`, `{tree}/update`, `{tree}/delete`: own account only

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{blocking, body};
use crate::api::error::ApiError;
use crate::api::middleware::auth::bearer_token;
use crate::api::types::{ApiContext, ApiMessage, Empty, DoctorContext, PatientContext};
use crate::auth::{
    self, Credentials, DoctorRegistration, DoctorUpdate, PatientRegistration, PatientUpdate,
};
use crate::db;
use crate::models::enums::PrincipalKind;
use crate::models::{Doctor, HealthPortfolio, Patient, Principal};

#[derive(Serialize)]
pub struct PatientPayload {
    pub user: Patient,
}

#[derive(Serialize)]
pub struct PatientProfilePayload {
    pub user: Patient,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<HealthPortfolio>,
}

#[derive(Serialize)]
pub struct DoctorPayload {
    pub doctor: Doctor,
}

#[derive(Serialize)]
pub struct LoginPayload {
    pub principal: Principal,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ─── Registration ───

pub async fn register_patient(
    State(ctx): State<ApiContext>,
    payload: Result<Json<PatientRegistration>, JsonRejection>,
) -> Result<Json<ApiMessage<PatientPayload>>, ApiError> {
    let req = body(payload)?;
    let user = blocking(&ctx, move |conn, core| {
        Ok(auth::register_patient(conn, &req, core.config.password_iterations)?)
    })
    .await?;
    Ok(Json(ApiMessage::new("Registration successful", PatientPayload { user })))
}

pub async fn register_doctor(
    State(ctx): State<ApiContext>,
    payload: Result<Json<DoctorRegistration>, JsonRejection>,
) -> Result<Json<ApiMessage<DoctorPayload>>, ApiError> {
    let req = body(payload)?;
    let doctor = blocking(&ctx, move |conn, core| {
        Ok(auth::register_doctor(conn, &req, core.config.password_iterations)?)
    })
    .await?;
    Ok(Json(ApiMessage::new("Doctor registered successfully", DoctorPayload { doctor })))
}

// ─── Session ───

async fn login(
    ctx: ApiContext,
    kind: PrincipalKind,
    credentials: Credentials,
) -> Result<Json<ApiMessage<LoginPayload>>, ApiError> {
    let outcome = blocking(&ctx, move |conn, core| {
        Ok(auth::login(conn, &core.tokens, &core.config, kind, &credentials)?)
    })
    .await?;
    Ok(Json(ApiMessage::new(
        "Login successful",
        LoginPayload {
            principal: outcome.principal,
            token: outcome.token,
            expires_at: outcome.expires_at,
        },
    )))
}

pub async fn login_patient(
    State(ctx): State<ApiContext>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<ApiMessage<LoginPayload>>, ApiError> {
    login(ctx, PrincipalKind::Patient, body(payload)?).await
}

pub async fn login_doctor(
    State(ctx): State<ApiContext>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<ApiMessage<LoginPayload>>, ApiError> {
    login(ctx, PrincipalKind::Doctor, body(payload)?).await
}

/// Ends the presented session if there is one. Always succeeds.
pub async fn logout(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<Json<ApiMessage<Empty>>, ApiError> {
    let conn = ctx.core.open_db()?;
    auth::logout(&conn, bearer_token(&headers).as_deref())?;
    Ok(Json(ApiMessage::new("Logged out successfully", Empty {})))
}

// ─── Own account ───

pub async fn patient_profile(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
) -> Result<Json<ApiMessage<PatientProfilePayload>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let portfolio = db::get_portfolio(&conn, &user.id)?;
    Ok(Json(ApiMessage::new(
        "Profile fetched successfully",
        PatientProfilePayload { user, portfolio },
    )))
}

pub async fn doctor_profile(
    Extension(DoctorContext(doctor)): Extension<DoctorContext>,
) -> Result<Json<ApiMessage<DoctorPayload>>, ApiError> {
    Ok(Json(ApiMessage::new("Profile fetched successfully", DoctorPayload { doctor })))
}

pub async fn update_patient(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<PatientUpdate>, JsonRejection>,
) -> Result<Json<ApiMessage<PatientPayload>>, ApiError> {
    let update = body(payload)?;
    let conn = ctx.core.open_db()?;
    let user = auth::update_patient_profile(&conn, &user.id, update)?;
    Ok(Json(ApiMessage::new("Profile updated successfully", PatientPayload { user })))
}

pub async fn update_doctor(
    State(ctx): State<ApiContext>,
    Extension(DoctorContext(doctor)): Extension<DoctorContext>,
    payload: Result<Json<DoctorUpdate>, JsonRejection>,
) -> Result<Json<ApiMessage<DoctorPayload>>, ApiError> {
    let update = body(payload)?;
    let conn = ctx.core.open_db()?;
    let doctor = auth::update_doctor_profile(&conn, &doctor.id, update)?;
    Ok(Json(ApiMessage::new("Profile updated successfully", DoctorPayload { doctor })))
}

pub async fn delete_patient(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
) -> Result<Json<ApiMessage<Empty>>, ApiError> {
    let conn = ctx.core.open_db()?;
    auth::delete_account(&conn, PrincipalKind::Patient, &user.id)?;
    Ok(Json(ApiMessage::new("Account deleted successfully", Empty {})))
}

pub async fn delete_doctor(
    State(ctx): State<ApiContext>,
    Extension(DoctorContext(doctor)): Extension<DoctorContext>,
) -> Result<Json<ApiMessage<Empty>>, ApiError> {
    let conn = ctx.core.open_db()?;
    auth::delete_account(&conn, PrincipalKind::Doctor, &doctor.id)?;
    Ok(Json(ApiMessage::new("Account deleted successfully", Empty {})))
}
