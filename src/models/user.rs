use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub slug: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn new(email: String, username: String, slug: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.trim().to_lowercase(),
            username,
            slug,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
