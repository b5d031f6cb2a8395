use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{uuid_column, DatabaseError};
use crate::models::*;

const PATIENT_COLUMNS: &str = "id, name, email, phone, gender, created_at";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        gender: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_patient(
    conn: &Connection,
    patient: &Patient,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, email, phone, gender, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.email,
            patient.phone,
            patient.gender,
            password_hash,
            patient.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let patient = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            patient_from_row,
        )
        .optional()?;
    Ok(patient)
}

/// Patient plus stored password hash, looked up by email (case-insensitive).
pub fn find_patient_credentials(
    conn: &Connection,
    email: &str,
) -> Result<Option<(Patient, String)>, DatabaseError> {
    let found = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS}, password_hash FROM patients WHERE email = ?1"),
            params![email],
            |row| Ok((patient_from_row(row)?, row.get::<_, String>(6)?)),
        )
        .optional()?;
    Ok(found)
}

/// True when another patient already holds this email or phone.
pub fn patient_identity_taken(
    conn: &Connection,
    email: &str,
    phone: Option<&str>,
    exclude: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patients
         WHERE (email = ?1 OR (?2 IS NOT NULL AND phone = ?2))
           AND (?3 IS NULL OR id != ?3)",
        params![email, phone, exclude.map(|id| id.to_string())],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// True when a patient other than `exclude` already holds this phone.
pub fn patient_phone_taken(
    conn: &Connection,
    phone: &str,
    exclude: &Uuid,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE phone = ?1 AND id != ?2",
        params![phone, exclude.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET name = ?2, phone = ?3, gender = ?4 WHERE id = ?1",
        params![
            patient.id.to_string(),
            patient.name,
            patient.phone,
            patient.gender,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: patient.id.to_string(),
        });
    }
    Ok(())
}

/// Delete a patient; owned rows go with it through ON DELETE CASCADE.
pub fn delete_patient(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM patients WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}
