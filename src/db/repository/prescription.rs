use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{json_column, to_json, uuid_column, DatabaseError};
use crate::models::*;

fn prescription_from_row(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        id: uuid_column(row, 0)?,
        appointment_id: uuid_column(row, 1)?,
        medicines: json_column(row, 2)?,
        images: json_column(row, 3)?,
        updated_at: row.get(4)?,
    })
}

pub fn get_prescription_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let prescription = conn
        .query_row(
            "SELECT id, appointment_id, medicines, images, updated_at
             FROM prescriptions WHERE appointment_id = ?1",
            params![appointment_id.to_string()],
            prescription_from_row,
        )
        .optional()?;
    Ok(prescription)
}

/// Create or replace the medicine list for an appointment in one statement.
/// An existing row keeps its id and images unless `images` is given.
pub fn upsert_prescription(
    conn: &Connection,
    appointment_id: &Uuid,
    medicines: &[PrescribedMedicine],
    images: Option<&[String]>,
    at: DateTime<Utc>,
) -> Result<Prescription, DatabaseError> {
    let images_json = images.map(to_json).transpose()?;
    conn.execute(
        "INSERT INTO prescriptions (id, appointment_id, medicines, images, updated_at)
         VALUES (?1, ?2, ?3, COALESCE(?4, '[]'), ?5)
         ON CONFLICT(appointment_id) DO UPDATE SET
             medicines = excluded.medicines,
             images = COALESCE(?4, prescriptions.images),
             updated_at = excluded.updated_at",
        params![
            Uuid::new_v4().to_string(),
            appointment_id.to_string(),
            to_json(medicines)?,
            images_json,
            at,
        ],
    )?;
    get_prescription_for_appointment(conn, appointment_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Prescription".into(),
        id: appointment_id.to_string(),
    })
}

pub fn set_prescription_images(
    conn: &Connection,
    appointment_id: &Uuid,
    images: &[String],
    at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET images = ?2, updated_at = ?3 WHERE appointment_id = ?1",
        params![appointment_id.to_string(), to_json(images)?, at],
    )?;
    Ok(changed > 0)
}

pub fn delete_prescription_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM prescriptions WHERE appointment_id = ?1",
        params![appointment_id.to_string()],
    )?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::db::repository::{fixtures, get_appointment, insert_appointment};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::AppointmentStatus;

    fn booked(conn: &Connection) -> Uuid {
        let p = fixtures::patient(conn, "p@example.com");
        let d = fixtures::doctor(conn, "d@example.com");
        let now = Utc::now();
        let appt = Appointment {
            id: Uuid::new_v4(),
            patient_id: p.id,
            doctor_id: d.id,
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            status: AppointmentStatus::Scheduled,
            prescription_id: None,
            feedback_id: None,
            created_at: now,
            updated_at: now,
        };
        insert_appointment(conn, &appt).unwrap();
        appt.id
    }

    fn medicine(name: &str) -> PrescribedMedicine {
        PrescribedMedicine {
            name: name.into(),
            dosage: "500mg".into(),
            frequency: "twice daily".into(),
            duration: "7 days".into(),
            instructions: None,
        }
    }

    #[test]
    fn upsert_replaces_medicines_and_keeps_identity() {
        let conn = open_memory_database().unwrap();
        let appt_id = booked(&conn);

        let first = upsert_prescription(&conn, &appt_id, &[medicine("Amoxicillin")], None, Utc::now())
            .unwrap();
        set_prescription_images(&conn, &appt_id, &["scan-1".to_string()], Utc::now()).unwrap();
        let second = upsert_prescription(&conn, &appt_id, &[medicine("Ibuprofen")], None, Utc::now())
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.medicines, vec![medicine("Ibuprofen")]);
        assert_eq!(second.images, vec!["scan-1".to_string()]);

        let linked = get_appointment(&conn, &appt_id).unwrap().unwrap();
        assert_eq!(linked.prescription_id, Some(first.id));
    }

    #[test]
    fn images_on_missing_prescription_report_nothing_changed() {
        let conn = open_memory_database().unwrap();
        let appt_id = booked(&conn);
        assert!(!set_prescription_images(&conn, &appt_id, &[], Utc::now()).unwrap());
        assert!(!delete_prescription_for_appointment(&conn, &appt_id).unwrap());
    }
}
