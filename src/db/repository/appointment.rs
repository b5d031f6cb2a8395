use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{optional_uuid_column, uuid_column, DatabaseError};
use crate::models::enums::AppointmentStatus;
use crate::models::*;

/// Appointment columns plus linked prescription / feedback ids.
const APPOINTMENT_SELECT: &str = "SELECT a.id, a.patient_id, a.doctor_id, a.date, a.status,
        p.id, f.id, a.created_at, a.updated_at, pt.name, d.name
     FROM appointments a
     JOIN patients pt ON pt.id = a.patient_id
     JOIN doctors d ON d.id = a.doctor_id
     LEFT JOIN prescriptions p ON p.appointment_id = a.id
     LEFT JOIN feedback f ON f.appointment_id = a.id";

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        doctor_id: uuid_column(row, 2)?,
        date: row.get(3)?,
        status: row.get(4)?,
        prescription_id: optional_uuid_column(row, 5)?,
        feedback_id: optional_uuid_column(row, 6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<AppointmentSummary> {
    Ok(AppointmentSummary {
        appointment: appointment_from_row(row)?,
        patient_name: row.get(9)?,
        doctor_name: row.get(10)?,
    })
}

/// Insert a new appointment. A second Scheduled row for the same
/// (patient, doctor, date) fails with a unique violation.
pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, date, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.date,
            appt.status,
            appt.created_at,
            appt.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let appt = conn
        .query_row(
            &format!("{APPOINTMENT_SELECT} WHERE a.id = ?1"),
            params![id.to_string()],
            appointment_from_row,
        )
        .optional()?;
    Ok(appt)
}

/// Move an appointment from `from` to `to`. Returns false when the row is
/// missing or is no longer in `from`.
pub fn transition_appointment(
    conn: &Connection,
    id: &Uuid,
    from: AppointmentStatus,
    to: AppointmentStatus,
    at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id.to_string(), from, to, at],
    )?;
    Ok(changed > 0)
}

pub fn list_patient_appointments(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<AppointmentSummary>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{APPOINTMENT_SELECT} WHERE a.patient_id = ?1 ORDER BY a.date, a.created_at"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], summary_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Doctor's appointments, optionally restricted to one status.
pub fn list_doctor_appointments(
    conn: &Connection,
    doctor_id: &Uuid,
    status: Option<AppointmentStatus>,
) -> Result<Vec<AppointmentSummary>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{APPOINTMENT_SELECT} WHERE a.doctor_id = ?1 AND (?2 IS NULL OR a.status = ?2)
         ORDER BY a.date, a.created_at"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string(), status], summary_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn scheduled(patient: Uuid, doctor: Uuid, date: NaiveDate) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: patient,
            doctor_id: doctor,
            date,
            status: AppointmentStatus::Scheduled,
            prescription_id: None,
            feedback_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn second_scheduled_row_violates_unique_index() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let d = fixtures::doctor(&conn, "d@example.com");
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        insert_appointment(&conn, &scheduled(p.id, d.id, date)).unwrap();
        let err = insert_appointment(&conn, &scheduled(p.id, d.id, date)).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn terminal_rows_do_not_block_rebooking() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let d = fixtures::doctor(&conn, "d@example.com");
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        let first = scheduled(p.id, d.id, date);
        insert_appointment(&conn, &first).unwrap();
        assert!(transition_appointment(
            &conn,
            &first.id,
            AppointmentStatus::Scheduled,
            AppointmentStatus::Cancelled,
            Utc::now()
        )
        .unwrap());

        insert_appointment(&conn, &scheduled(p.id, d.id, date)).unwrap();
    }

    #[test]
    fn conditional_transition_refuses_wrong_source_state() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let d = fixtures::doctor(&conn, "d@example.com");
        let appt = scheduled(p.id, d.id, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        insert_appointment(&conn, &appt).unwrap();

        let moved = transition_appointment(
            &conn,
            &appt.id,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            Utc::now(),
        )
        .unwrap();
        assert!(!moved);
        let loaded = get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(loaded.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn doctor_listing_filters_and_orders_by_date() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let d = fixtures::doctor(&conn, "d@example.com");
        let later = scheduled(p.id, d.id, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        let earlier = scheduled(p.id, d.id, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        let done = scheduled(p.id, d.id, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        for appt in [&later, &earlier, &done] {
            insert_appointment(&conn, appt).unwrap();
        }
        transition_appointment(
            &conn,
            &done.id,
            AppointmentStatus::Scheduled,
            AppointmentStatus::Completed,
            Utc::now(),
        )
        .unwrap();

        let scheduled_only =
            list_doctor_appointments(&conn, &d.id, Some(AppointmentStatus::Scheduled)).unwrap();
        let ids: Vec<Uuid> = scheduled_only.iter().map(|s| s.appointment.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);
        assert_eq!(scheduled_only[0].patient_name, "Test Patient");

        let all = list_doctor_appointments(&conn, &d.id, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].appointment.id, done.id);
    }
}
