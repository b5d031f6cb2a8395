use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{json_column, to_json, uuid_column, DatabaseError};
use crate::models::*;

const DOCTOR_COLUMNS: &str = "id, name, email, phone, address, specializations, hospitals,
     experience_years, rating, created_at, updated_at";

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        specializations: json_column(row, 5)?,
        hospitals: json_column(row, 6)?,
        experience_years: row.get(7)?,
        rating: row.get::<_, Option<f64>>(8)?.map(|r| r as f32),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn insert_doctor(
    conn: &Connection,
    doctor: &Doctor,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, name, email, phone, address, specializations, hospitals,
         experience_years, rating, password_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            doctor.id.to_string(),
            doctor.name,
            doctor.email,
            doctor.phone,
            doctor.address,
            to_json(&doctor.specializations)?,
            to_json(&doctor.hospitals)?,
            doctor.experience_years,
            doctor.rating.map(f64::from),
            password_hash,
            doctor.created_at,
            doctor.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let doctor = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ?1"),
            params![id.to_string()],
            doctor_from_row,
        )
        .optional()?;
    Ok(doctor)
}

pub fn find_doctor_credentials(
    conn: &Connection,
    email: &str,
) -> Result<Option<(Doctor, String)>, DatabaseError> {
    let found = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLUMNS}, password_hash FROM doctors WHERE email = ?1"),
            params![email],
            |row| Ok((doctor_from_row(row)?, row.get::<_, String>(11)?)),
        )
        .optional()?;
    Ok(found)
}

pub fn doctor_email_taken(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM doctors WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn update_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET name = ?2, phone = ?3, address = ?4, specializations = ?5,
         hospitals = ?6, experience_years = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            doctor.id.to_string(),
            doctor.name,
            doctor.phone,
            doctor.address,
            to_json(&doctor.specializations)?,
            to_json(&doctor.hospitals)?,
            doctor.experience_years,
            doctor.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Doctor".into(),
            id: doctor.id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_doctor(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM doctors WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

/// All doctors, by name.
pub fn list_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors ORDER BY name COLLATE NOCASE, created_at"
    ))?;
    let rows = stmt.query_map([], doctor_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn nested_lists_round_trip() {
        let conn = open_memory_database().unwrap();
        let mut doctor = fixtures::doctor(&conn, "house@example.com");
        doctor.hospitals = vec![HospitalAffiliation {
            name: "Princeton-Plainsboro".into(),
            address: "NJ".into(),
            specialty: "Diagnostics".into(),
        }];
        doctor.specializations = vec!["Nephrology".into(), "Infectious Disease".into()];
        update_doctor(&conn, &doctor).unwrap();

        let loaded = get_doctor(&conn, &doctor.id).unwrap().unwrap();
        assert_eq!(loaded.hospitals, doctor.hospitals);
        assert_eq!(loaded.specializations, doctor.specializations);
    }

    #[test]
    fn email_uniqueness_is_case_insensitive() {
        let conn = open_memory_database().unwrap();
        fixtures::doctor(&conn, "house@example.com");
        assert!(doctor_email_taken(&conn, "HOUSE@example.com").unwrap());
    }

    #[test]
    fn duplicate_insert_is_a_unique_violation() {
        let conn = open_memory_database().unwrap();
        let doctor = fixtures::doctor(&conn, "house@example.com");
        let mut clone = doctor.clone();
        clone.id = Uuid::new_v4();
        let err = insert_doctor(&conn, &clone, "hash").unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn list_is_sorted_by_name() {
        let conn = open_memory_database().unwrap();
        let mut b = fixtures::doctor(&conn, "b@example.com");
        b.name = "Zed".into();
        update_doctor(&conn, &b).unwrap();
        let mut a = fixtures::doctor(&conn, "a@example.com");
        a.name = "Amy".into();
        update_doctor(&conn, &a).unwrap();

        let names: Vec<String> = list_doctors(&conn).unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Amy", "Zed"]);
    }
}
