use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::{json_column, to_json, uuid_column, DatabaseError};
use crate::models::*;

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalHistoryEntry> {
    Ok(MedicalHistoryEntry {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        illness: row.get(2)?,
        treatment: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        doctor_ids: json_column(row, 6)?,
        notes: row.get(7)?,
    })
}

/// Insert or update the entry keyed by (patient, illness). Returns the stored row.
pub fn upsert_medical_history(
    conn: &Connection,
    entry: &MedicalHistoryEntry,
) -> Result<MedicalHistoryEntry, DatabaseError> {
    conn.execute(
        "INSERT INTO medical_history (id, patient_id, illness, treatment, start_date, end_date,
         doctor_ids, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(patient_id, illness) DO UPDATE SET
             treatment = excluded.treatment,
             start_date = excluded.start_date,
             end_date = excluded.end_date,
             doctor_ids = excluded.doctor_ids,
             notes = excluded.notes",
        params![
            entry.id.to_string(),
            entry.patient_id.to_string(),
            entry.illness,
            entry.treatment,
            entry.start_date,
            entry.end_date,
            to_json(&entry.doctor_ids)?,
            entry.notes,
        ],
    )?;
    let stored = conn.query_row(
        "SELECT id, patient_id, illness, treatment, start_date, end_date, doctor_ids, notes
         FROM medical_history WHERE patient_id = ?1 AND illness = ?2",
        params![entry.patient_id.to_string(), entry.illness],
        entry_from_row,
    )?;
    Ok(stored)
}

pub fn list_medical_history(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicalHistoryEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, illness, treatment, start_date, end_date, doctor_ids, notes
         FROM medical_history WHERE patient_id = ?1
         ORDER BY start_date IS NULL, start_date, illness",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], entry_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}
