use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::{optional_uuid_column, uuid_column, DatabaseError};
use crate::models::*;

const FEEDBACK_COLUMNS: &str =
    "id, patient_id, doctor_id, appointment_id, rating, comment, created_at";

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    Ok(Feedback {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        doctor_id: uuid_column(row, 2)?,
        appointment_id: optional_uuid_column(row, 3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn insert_feedback(conn: &Connection, feedback: &Feedback) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO feedback (id, patient_id, doctor_id, appointment_id, rating, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            feedback.id.to_string(),
            feedback.patient_id.to_string(),
            feedback.doctor_id.to_string(),
            feedback.appointment_id.map(|id| id.to_string()),
            feedback.rating,
            feedback.comment,
            feedback.created_at,
        ],
    )?;
    Ok(())
}

pub fn list_feedback_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Feedback>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE doctor_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string()], feedback_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn list_all_feedback(conn: &Connection) -> Result<Vec<Feedback>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedback ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], feedback_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}
