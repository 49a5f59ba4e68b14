use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Page {
    pub id: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Json<Value>,
    pub is_published: bool,
    pub show_badges: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Page {
    /// A fresh, unpublished page with the default theme.
    pub fn new(user_id: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            display_name: None,
            avatar_url: None,
            theme: Json(default_theme()),
            is_published: false,
            show_badges: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

pub fn default_theme() -> Value {
    json!({
        "backgroundColor": "#ffffff",
        "textColor": "#000000",
        "buttonColor": "#0070f3",
    })
}
