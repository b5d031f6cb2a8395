use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{uuid_column, DatabaseError};
use crate::models::*;

const REMINDER_COLUMNS: &str =
    "id, patient_id, medication, reminder_type, time, date, repeat_rule, status, created_at";

fn reminder_from_row(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        medication: row.get(2)?,
        reminder_type: row.get(3)?,
        time: row.get(4)?,
        date: row.get(5)?,
        repeat: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn insert_reminder(conn: &Connection, reminder: &Reminder) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reminders (id, patient_id, medication, reminder_type, time, date,
         repeat_rule, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            reminder.id.to_string(),
            reminder.patient_id.to_string(),
            reminder.medication,
            reminder.reminder_type,
            reminder.time,
            reminder.date,
            reminder.repeat,
            reminder.status,
            reminder.created_at,
        ],
    )?;
    Ok(())
}

/// A patient's reminders in schedule order.
pub fn list_reminders(conn: &Connection, patient_id: &Uuid) -> Result<Vec<Reminder>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders WHERE patient_id = ?1
         ORDER BY date, time, created_at"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], reminder_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Set the active flag of a patient's reminder. `None` when the reminder
/// does not exist or belongs to someone else.
pub fn set_reminder_status(
    conn: &Connection,
    patient_id: &Uuid,
    reminder_id: &Uuid,
    status: bool,
) -> Result<Option<Reminder>, DatabaseError> {
    let changed = conn.execute(
        "UPDATE reminders SET status = ?3 WHERE id = ?1 AND patient_id = ?2",
        params![reminder_id.to_string(), patient_id.to_string(), status],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    let reminder = conn
        .query_row(
            &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
            params![reminder_id.to_string()],
            reminder_from_row,
        )
        .optional()?;
    Ok(reminder)
}

pub fn delete_reminder(
    conn: &Connection,
    patient_id: &Uuid,
    reminder_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM reminders WHERE id = ?1 AND patient_id = ?2",
        params![reminder_id.to_string(), patient_id.to_string()],
    )?;
    Ok(deleted > 0)
}
