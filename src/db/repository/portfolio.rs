use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{json_column, to_json, uuid_column, DatabaseError};
use crate::models::*;

pub fn get_portfolio(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<HealthPortfolio>, DatabaseError> {
    let portfolio = conn
        .query_row(
            "SELECT patient_id, age, blood_group, weight_kg, height_cm, chronic_diseases,
             allergies, last_updated
             FROM health_portfolios WHERE patient_id = ?1",
            params![patient_id.to_string()],
            |row| {
                Ok(HealthPortfolio {
                    patient_id: uuid_column(row, 0)?,
                    age: row.get(1)?,
                    blood_group: row.get(2)?,
                    weight_kg: row.get(3)?,
                    height_cm: row.get(4)?,
                    chronic_diseases: json_column(row, 5)?,
                    allergies: json_column(row, 6)?,
                    last_updated: row.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(portfolio)
}

pub fn upsert_portfolio(conn: &Connection, portfolio: &HealthPortfolio) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO health_portfolios (patient_id, age, blood_group, weight_kg, height_cm,
         chronic_diseases, allergies, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(patient_id) DO UPDATE SET
             age = excluded.age,
             blood_group = excluded.blood_group,
             weight_kg = excluded.weight_kg,
             height_cm = excluded.height_cm,
             chronic_diseases = excluded.chronic_diseases,
             allergies = excluded.allergies,
             last_updated = excluded.last_updated",
        params![
            portfolio.patient_id.to_string(),
            portfolio.age,
            portfolio.blood_group,
            portfolio.weight_kg,
            portfolio.height_cm,
            to_json(&portfolio.chronic_diseases)?,
            to_json(&portfolio.allergies)?,
            portfolio.last_updated,
        ],
    )?;
    Ok(())
}
