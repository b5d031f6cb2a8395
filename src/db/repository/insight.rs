use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{json_column, uuid_column, DatabaseError};
use crate::models::enums::InsightCategory;
use crate::models::*;

const INSIGHT_SELECT: &str = "SELECT i.id, i.title, i.description, i.category, i.photo,
        i.created_by, d.name, d.specializations, i.created_at
     FROM insights i JOIN doctors d ON d.id = i.created_by";

fn insight_from_row(row: &Row<'_>) -> rusqlite::Result<Insight> {
    Ok(Insight {
        id: uuid_column(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        photo: row.get(4)?,
        created_by: uuid_column(row, 5)?,
        author_name: row.get(6)?,
        author_specializations: json_column(row, 7)?,
        created_at: row.get(8)?,
    })
}

pub fn insert_insight(conn: &Connection, insight: &Insight) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO insights (id, title, description, category, photo, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            insight.id.to_string(),
            insight.title,
            insight.description,
            insight.category,
            insight.photo,
            insight.created_by.to_string(),
            insight.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_insight(conn: &Connection, id: &Uuid) -> Result<Option<Insight>, DatabaseError> {
    let insight = conn
        .query_row(
            &format!("{INSIGHT_SELECT} WHERE i.id = ?1"),
            params![id.to_string()],
            insight_from_row,
        )
        .optional()?;
    Ok(insight)
}

/// Newest first, optionally restricted to one category.
pub fn list_insights(
    conn: &Connection,
    category: Option<InsightCategory>,
) -> Result<Vec<Insight>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{INSIGHT_SELECT} WHERE (?1 IS NULL OR i.category = ?1) ORDER BY i.created_at DESC"
    ))?;
    let rows = stmt.query_map(params![category], insight_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn category_filter_and_author_join() {
        let conn = open_memory_database().unwrap();
        let d = fixtures::doctor(&conn, "d@example.com");
        for (title, category) in [
            ("Sleep", InsightCategory::MentalHealth),
            ("Greens", InsightCategory::Diet),
        ] {
            insert_insight(
                &conn,
                &Insight {
                    id: Uuid::new_v4(),
                    title: title.into(),
                    description: "…".into(),
                    category,
                    photo: None,
                    created_by: d.id,
                    author_name: String::new(),
                    author_specializations: vec![],
                    created_at: Utc::now(),
                },
            )
            .unwrap();
        }

        assert_eq!(list_insights(&conn, None).unwrap().len(), 2);
        let diet = list_insights(&conn, Some(InsightCategory::Diet)).unwrap();
        assert_eq!(diet.len(), 1);
        assert_eq!(diet[0].author_name, "Dr. Test");
        assert_eq!(diet[0].author_specializations, vec!["Cardiology".to_string()]);
        assert!(get_insight(&conn, &diet[0].id).unwrap().is_some());
    }
}
