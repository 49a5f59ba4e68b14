use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum BadgeType {
    #[serde(rename = "preset")]
    #[sqlx(rename = "preset")]
    Preset,
    #[serde(rename = "custom")]
    #[sqlx(rename = "custom")]
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub page_id: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub badge_type: BadgeType,
    pub name: String,
    pub image_url: Option<String>,
    pub preset_key: Option<String>,
    pub created_at: String,
}
