//! Public doctor directory: list, lookup by id, term search.

use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::Doctor;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("{0}")]
    Validation(String),

    #[error("Doctor not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default, alias = "searchTerms")]
    pub terms: Option<Vec<String>>,
}

pub fn list(conn: &Connection) -> Result<Vec<Doctor>, DirectoryError> {
    Ok(db::list_doctors(conn)?)
}

pub fn get_by_id(conn: &Connection, id: &Uuid) -> Result<Doctor, DirectoryError> {
    db::get_doctor(conn, id)?.ok_or(DirectoryError::NotFound)
}

fn matches_any(doctor: &Doctor, terms: &[String]) -> bool {
    let name = doctor.name.to_lowercase();
    let specializations: Vec<String> = doctor
        .specializations
        .iter()
        .map(|s| s.to_lowercase())
        .collect();
    terms
        .iter()
        .any(|t| name.contains(t.as_str()) || specializations.iter().any(|s| s.contains(t.as_str())))
}

/// Doctors whose name or any specialization contains one of the terms.
pub fn search(conn: &Connection, req: &SearchRequest) -> Result<Vec<Doctor>, DirectoryError> {
    let terms: Vec<String> = req
        .terms
        .iter()
        .flatten()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return Err(DirectoryError::Validation("At least one search term is required".into()));
    }

    let found: Vec<Doctor> = db::list_doctors(conn)?
        .into_iter()
        .filter(|d| matches_any(d, &terms))
        .collect();
    tracing::debug!(terms = terms.len(), results = found.len(), "Doctor search");
    Ok(found)
}
