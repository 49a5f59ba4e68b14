use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One counted visit: at most one per `(page_id, ip_address)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct View {
    pub id: String,
    pub page_id: String,
    pub ip_address: String,
    pub created_at: String,
}

impl View {
    pub fn new(page_id: String, ip_address: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            page_id,
            ip_address,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
