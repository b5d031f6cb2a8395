//! Patient reminders: add, list, toggle, delete.
//!
//! Reminders never expire on their own. Every lookup is scoped to the owning
//! patient, so someone else's reminder id behaves exactly like a missing one.

use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::{ReminderType, RepeatRule};
use crate::models::Reminder;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("{0}")]
    Validation(String),

    #[error("Reminder not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Body of `alarms/add`. Fields stay loose so each gets a clear message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReminder {
    #[serde(default)]
    pub medication: Option<String>,
    #[serde(default, rename = "type")]
    pub reminder_type: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub repeat: Option<String>,
    #[serde(default)]
    pub status: Option<bool>,
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ReminderError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ReminderError::Validation(format!("{field} is required")))
}

/// Accepts `H:MM` or `HH:MM` (24h) and stores `HH:MM`.
fn normalize_time(raw: &str) -> Result<String, ReminderError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| ReminderError::Validation("time must be HH:MM (24h)".into()))
}

fn parse_choice<T: std::str::FromStr>(field: &str, raw: &str, allowed: &str) -> Result<T, ReminderError> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|_| ReminderError::Validation(format!("{field} must be one of {allowed}")))
}

/// Validate a request into a storable reminder.
pub fn validate(patient_id: &Uuid, req: &NewReminder) -> Result<Reminder, ReminderError> {
    let medication = required("medication", req.medication.as_deref())?;
    let reminder_type: ReminderType = parse_choice(
        "type",
        required("type", req.reminder_type.as_deref())?,
        "Medication, Appointment, General",
    )?;
    let time = normalize_time(required("time", req.time.as_deref())?)?;
    let date = NaiveDate::parse_from_str(required("date", req.date.as_deref())?, "%Y-%m-%d")
        .map_err(|_| ReminderError::Validation("date must be YYYY-MM-DD".into()))?;
    let repeat = match req.repeat.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => parse_choice("repeat", raw, "Daily, Weekly, Monthly, None")?,
        None => RepeatRule::default(),
    };

    Ok(Reminder {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        medication: medication.to_string(),
        reminder_type,
        time,
        date,
        repeat,
        status: req.status.unwrap_or(true),
        created_at: Utc::now(),
    })
}

pub fn add(conn: &Connection, patient_id: &Uuid, req: &NewReminder) -> Result<Reminder, ReminderError> {
    let reminder = validate(patient_id, req)?;
    db::insert_reminder(conn, &reminder)?;
    tracing::debug!(reminder_id = %reminder.id, patient_id = %patient_id, "Reminder added");
    Ok(reminder)
}

/// All of the patient's reminders; empty when there are none.
pub fn list(conn: &Connection, patient_id: &Uuid) -> Result<Vec<Reminder>, ReminderError> {
    Ok(db::list_reminders(conn, patient_id)?)
}

/// Set the active flag to `status`. Repeating the call is a no-op.
pub fn set_status(
    conn: &Connection,
    patient_id: &Uuid,
    reminder_id: &Uuid,
    status: bool,
) -> Result<Reminder, ReminderError> {
    db::set_reminder_status(conn, patient_id, reminder_id, status)?.ok_or(ReminderError::NotFound)
}

pub fn delete(conn: &Connection, patient_id: &Uuid, reminder_id: &Uuid) -> Result<(), ReminderError> {
    if db::delete_reminder(conn, patient_id, reminder_id)? {
        Ok(())
    } else {
        Err(ReminderError::NotFound)
    }
}
