//! Accounts and bearer sessions for patients and doctors.
//!
//! Sessions live in their own table keyed by the SHA-256 of the token, so a
//! login never writes onto the account row. With `max_sessions = 1` a new
//! login prunes the previous session and the old token stops authenticating.
//!
//! Everything here is synchronous (SQLite + PBKDF2); HTTP handlers run these
//! functions on the blocking pool.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::crypto::{self, hash_token, CryptoError, TokenError, TokenSigner};
use crate::db::{self, DatabaseError, SessionRow};
use crate::models::enums::{Gender, PrincipalKind};
use crate::models::{Doctor, HospitalAffiliation, Patient, Principal};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    DuplicateIdentity(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Session expired, please log in again")]
    TokenExpired,

    #[error("{0} not found")]
    PrincipalNotFound(PrincipalKind),

    #[error("Session superseded by a newer login")]
    SessionSuperseded,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

// ═══════════════════════════════════════════════════════════
// Request schemas
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct PatientRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, alias = "specialization")]
    pub specializations: Vec<String>,
    #[serde(default, alias = "hospital")]
    pub hospitals: Vec<HospitalAffiliation>,
    #[serde(default, alias = "experience")]
    pub experience_years: Option<i64>,
    #[serde(default)]
    pub rating: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Partial patient update; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
}

/// Partial doctor update; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(alias = "specialization")]
    pub specializations: Option<Vec<String>>,
    #[serde(alias = "hospital")]
    pub hospitals: Option<Vec<HospitalAffiliation>>,
    #[serde(alias = "experience")]
    pub experience_years: Option<i64>,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub principal: Principal,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(AuthError::Validation("A valid email is required".into()));
    }
    Ok(email)
}

fn require_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::Validation("Name is required".into()));
    }
    Ok(name.to_string())
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::Validation("Password is required".into()));
    }
    Ok(())
}

fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

fn check_experience(years: Option<i64>) -> Result<Option<u32>, AuthError> {
    match years {
        None => Ok(None),
        Some(y) => u32::try_from(y)
            .map(Some)
            .map_err(|_| AuthError::Validation("Experience cannot be negative".into())),
    }
}

fn check_rating(rating: Option<f32>) -> Result<Option<f32>, AuthError> {
    match rating {
        Some(r) if !(1.0..=5.0).contains(&r) => Err(AuthError::Validation(
            "Rating must be between 1 and 5".into(),
        )),
        other => Ok(other),
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════════════════════

pub fn register_patient(
    conn: &Connection,
    req: &PatientRegistration,
    password_iterations: u32,
) -> Result<Patient, AuthError> {
    let name = require_name(&req.name)?;
    let email = normalize_email(&req.email)?;
    check_password(&req.password)?;
    let phone = normalize_phone(req.phone.as_deref());

    if db::patient_identity_taken(conn, &email, phone.as_deref(), None)? {
        return Err(AuthError::DuplicateIdentity(
            "A patient with this email or phone already exists".into(),
        ));
    }

    let patient = Patient {
        id: Uuid::new_v4(),
        name,
        email,
        phone,
        gender: req.gender,
        created_at: Utc::now(),
    };
    let hash = crypto::hash_password(&req.password, password_iterations);
    db::insert_patient(conn, &patient, &hash).map_err(|e| {
        if e.is_unique_violation() {
            AuthError::DuplicateIdentity("A patient with this email or phone already exists".into())
        } else {
            e.into()
        }
    })?;

    tracing::info!(patient_id = %patient.id, "Patient registered");
    Ok(patient)
}

pub fn register_doctor(
    conn: &Connection,
    req: &DoctorRegistration,
    password_iterations: u32,
) -> Result<Doctor, AuthError> {
    let name = require_name(&req.name)?;
    let email = normalize_email(&req.email)?;
    check_password(&req.password)?;
    let experience_years = check_experience(req.experience_years)?;
    let rating = check_rating(req.rating)?;

    if db::doctor_email_taken(conn, &email)? {
        return Err(AuthError::DuplicateIdentity(
            "A doctor with this email already exists".into(),
        ));
    }

    let now = Utc::now();
    let doctor = Doctor {
        id: Uuid::new_v4(),
        name,
        email,
        phone: normalize_phone(req.phone.as_deref()),
        address: req.address.clone(),
        specializations: clean_list(req.specializations.clone()),
        hospitals: req.hospitals.clone(),
        experience_years,
        rating,
        created_at: now,
        updated_at: now,
    };
    let hash = crypto::hash_password(&req.password, password_iterations);
    db::insert_doctor(conn, &doctor, &hash).map_err(|e| {
        if e.is_unique_violation() {
            AuthError::DuplicateIdentity("A doctor with this email already exists".into())
        } else {
            e.into()
        }
    })?;

    tracing::info!(doctor_id = %doctor.id, "Doctor registered");
    Ok(doctor)
}

// ═══════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════

fn token_ttl(config: &AppConfig, kind: PrincipalKind) -> chrono::Duration {
    match kind {
        PrincipalKind::Patient => config.patient_token_ttl,
        PrincipalKind::Doctor => config.doctor_token_ttl,
    }
}

/// Verify credentials for `kind`, open a session and prune older ones.
pub fn login(
    conn: &Connection,
    signer: &TokenSigner,
    config: &AppConfig,
    kind: PrincipalKind,
    credentials: &Credentials,
) -> Result<LoginOutcome, AuthError> {
    let email = credentials.email.trim().to_lowercase();
    let found = match kind {
        PrincipalKind::Patient => db::find_patient_credentials(conn, &email)?
            .map(|(p, hash)| (Principal::Patient(p), hash)),
        PrincipalKind::Doctor => db::find_doctor_credentials(conn, &email)?
            .map(|(d, hash)| (Principal::Doctor(d), hash)),
    };

    let Some((principal, stored_hash)) = found else {
        // Same PBKDF2 cost as a wrong password, so response time does not reveal the email
        crypto::burn_password_check(&credentials.password, config.password_iterations);
        tracing::info!(kind = %kind, "Login failed: unknown email");
        return Err(AuthError::InvalidCredentials);
    };
    if !crypto::verify_password(&credentials.password, &stored_hash)? {
        tracing::info!(kind = %kind, principal_id = %principal.id(), "Login failed: wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    let now = Utc::now();
    db::purge_expired_sessions(conn, now.timestamp())?;

    let issued = signer.issue(kind, principal.id(), token_ttl(config, kind))?;
    db::insert_session(
        conn,
        &SessionRow {
            token_hash: hash_token(&issued.token),
            principal_kind: kind,
            principal_id: principal.id(),
            issued_at: issued.claims.iat,
            expires_at: issued.claims.exp,
        },
    )?;
    let superseded =
        db::retain_newest_sessions(conn, kind, &principal.id(), config.max_sessions as usize)?;
    if superseded > 0 {
        tracing::info!(principal_id = %principal.id(), superseded, "Older sessions superseded");
    }

    tracing::info!(kind = %kind, principal_id = %principal.id(), "Login succeeded");
    Ok(LoginOutcome {
        expires_at: issued.expires_at(),
        principal,
        token: issued.token,
    })
}

pub fn load_principal(
    conn: &Connection,
    kind: PrincipalKind,
    id: &Uuid,
) -> Result<Option<Principal>, AuthError> {
    Ok(match kind {
        PrincipalKind::Patient => db::get_patient(conn, id)?.map(Principal::Patient),
        PrincipalKind::Doctor => db::get_doctor(conn, id)?.map(Principal::Doctor),
    })
}

/// Resolve a bearer token to its principal.
///
/// Checks in order: signature, expiry, principal existence, live session.
pub fn authenticate(
    conn: &Connection,
    signer: &TokenSigner,
    token: &str,
) -> Result<Principal, AuthError> {
    let claims = signer.verify(token).map_err(|e| match e {
        TokenError::Expired => AuthError::TokenExpired,
        TokenError::Invalid => AuthError::Unauthenticated,
    })?;

    let principal = load_principal(conn, claims.kind, &claims.sub)?
        .ok_or(AuthError::PrincipalNotFound(claims.kind))?;

    let session = db::find_session(conn, &hash_token(token))?;
    match session {
        Some(row) if row.principal_id == claims.sub && row.principal_kind == claims.kind => {
            Ok(principal)
        }
        _ => {
            tracing::debug!(principal_id = %claims.sub, "Rejected superseded session");
            Err(AuthError::SessionSuperseded)
        }
    }
}

/// End the session for `token`, if any. Always succeeds.
pub fn logout(conn: &Connection, token: Option<&str>) -> Result<(), AuthError> {
    if let Some(token) = token {
        if db::delete_session(conn, &hash_token(token))? {
            tracing::info!("Session closed");
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Account maintenance
// ═══════════════════════════════════════════════════════════

pub fn update_patient_profile(
    conn: &Connection,
    patient_id: &Uuid,
    update: PatientUpdate,
) -> Result<Patient, AuthError> {
    let mut patient = db::get_patient(conn, patient_id)?
        .ok_or(AuthError::PrincipalNotFound(PrincipalKind::Patient))?;

    if let Some(name) = update.name {
        patient.name = require_name(&name)?;
    }
    if let Some(phone) = update.phone {
        let phone = normalize_phone(Some(&phone));
        if let Some(p) = phone.as_deref() {
            if db::patient_phone_taken(conn, p, patient_id)? {
                return Err(AuthError::DuplicateIdentity(
                    "This phone number is already in use".into(),
                ));
            }
        }
        patient.phone = phone;
    }
    if let Some(gender) = update.gender {
        patient.gender = Some(gender);
    }

    db::update_patient(conn, &patient)?;
    Ok(patient)
}

pub fn update_doctor_profile(
    conn: &Connection,
    doctor_id: &Uuid,
    update: DoctorUpdate,
) -> Result<Doctor, AuthError> {
    let mut doctor = db::get_doctor(conn, doctor_id)?
        .ok_or(AuthError::PrincipalNotFound(PrincipalKind::Doctor))?;

    if let Some(name) = update.name {
        doctor.name = require_name(&name)?;
    }
    if let Some(phone) = update.phone {
        doctor.phone = normalize_phone(Some(&phone));
    }
    if let Some(address) = update.address {
        doctor.address = Some(address);
    }
    if let Some(specializations) = update.specializations {
        doctor.specializations = clean_list(specializations);
    }
    if let Some(hospitals) = update.hospitals {
        doctor.hospitals = hospitals;
    }
    if update.experience_years.is_some() {
        doctor.experience_years = check_experience(update.experience_years)?;
    }
    doctor.updated_at = Utc::now();

    db::update_doctor(conn, &doctor)?;
    Ok(doctor)
}

/// Delete the account, its sessions, and everything it owns.
pub fn delete_account(conn: &Connection, kind: PrincipalKind, id: &Uuid) -> Result<(), AuthError> {
    db::delete_sessions_for_principal(conn, kind, id)?;
    let deleted = match kind {
        PrincipalKind::Patient => db::delete_patient(conn, id)?,
        PrincipalKind::Doctor => db::delete_doctor(conn, id)?,
    };
    if !deleted {
        return Err(AuthError::PrincipalNotFound(kind));
    }
    tracing::info!(kind = %kind, principal_id = %id, "Account deleted");
    Ok(())
}
