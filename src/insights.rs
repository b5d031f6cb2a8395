//! Health articles written by doctors and readable by anyone.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::InsightCategory;
use crate::models::{Doctor, Insight};

const MAX_TITLE_LEN: usize = 200;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("{0}")]
    Validation(String),

    #[error("Insight not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewInsight {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

/// Accepts any casing, and spaces or underscores ("Mental Health", "mental_health").
pub fn parse_category(raw: &str) -> Result<InsightCategory, InsightError> {
    raw.trim()
        .to_lowercase()
        .replace(' ', "_")
        .parse()
        .map_err(|_| {
            InsightError::Validation(
                "category must be one of General, Diet, Fitness, Mental Health, Medical".into(),
            )
        })
}

fn required(field: &str, value: Option<&str>) -> Result<String, InsightError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| InsightError::Validation(format!("{field} is required")))
}

pub fn add(conn: &Connection, author: &Doctor, req: &NewInsight) -> Result<Insight, InsightError> {
    let title = required("title", req.title.as_deref())?;
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(InsightError::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    let description = required("description", req.description.as_deref())?;
    let category = match req.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => parse_category(raw)?,
        None => InsightCategory::default(),
    };

    let insight = Insight {
        id: Uuid::new_v4(),
        title,
        description,
        category,
        photo: req
            .photo
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        created_by: author.id,
        author_name: author.name.clone(),
        author_specializations: author.specializations.clone(),
        created_at: Utc::now(),
    };
    db::insert_insight(conn, &insight)?;
    tracing::info!(insight_id = %insight.id, doctor_id = %author.id, category = %category, "Insight published");
    Ok(insight)
}

pub fn list(conn: &Connection) -> Result<Vec<Insight>, InsightError> {
    Ok(db::list_insights(conn, None)?)
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Insight, InsightError> {
    db::get_insight(conn, id)?.ok_or(InsightError::NotFound)
}

pub fn by_category(conn: &Connection, raw: &str) -> Result<Vec<Insight>, InsightError> {
    let category = parse_category(raw)?;
    Ok(db::list_insights(conn, Some(category))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn article(category: Option<&str>) -> NewInsight {
        NewInsight {
            title: Some("Sleep well".into()),
            description: Some("Seven hours at least.".into()),
            category: category.map(str::to_string),
            photo: None,
        }
    }

    #[test]
    fn category_parsing_is_lenient() {
        assert_eq!(parse_category("Mental Health").unwrap(), InsightCategory::MentalHealth);
        assert_eq!(parse_category("mental_health").unwrap(), InsightCategory::MentalHealth);
        assert_eq!(parse_category(" DIET ").unwrap(), InsightCategory::Diet);
        assert!(parse_category("gossip").is_err());
    }

    #[test]
    fn add_defaults_category_and_carries_author() {
        let conn = open_memory_database().unwrap();
        let d = fixtures::doctor(&conn, "d@example.com");

        let insight = add(&conn, &d, &article(None)).unwrap();
        assert_eq!(insight.category, InsightCategory::General);

        let fetched = get(&conn, &insight.id).unwrap();
        assert_eq!(fetched.author_name, d.name);
        assert_eq!(fetched.author_specializations, d.specializations);
    }

    #[test]
    fn filter_by_category() {
        let conn = open_memory_database().unwrap();
        let d = fixtures::doctor(&conn, "d@example.com");
        add(&conn, &d, &article(Some("Fitness"))).unwrap();
        add(&conn, &d, &article(Some("Mental Health"))).unwrap();

        assert_eq!(list(&conn).unwrap().len(), 2);
        let fitness = by_category(&conn, "fitness").unwrap();
        assert_eq!(fitness.len(), 1);
        assert_eq!(fitness[0].category, InsightCategory::Fitness);
        assert!(by_category(&conn, "Medical").unwrap().is_empty());
    }

    #[test]
    fn title_and_description_required() {
        let conn = open_memory_database().unwrap();
        let d = fixtures::doctor(&conn, "d@example.com");
        let mut req = article(None);
        req.description = Some("   ".into());
        assert!(matches!(add(&conn, &d, &req), Err(InsightError::Validation(_))));
        assert!(matches!(get(&conn, &Uuid::new_v4()), Err(InsightError::NotFound)));
    }
}
