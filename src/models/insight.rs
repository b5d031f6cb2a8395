use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::InsightCategory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: InsightCategory,
    pub photo: Option<String>,
    pub created_by: Uuid,
    pub author_name: String,
    pub author_specializations: Vec<String>,
    pub created_at: DateTime<Utc>,
}
