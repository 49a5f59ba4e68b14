use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::FromRow;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum BlockType {
    #[serde(rename = "text")]
    #[sqlx(rename = "text")]
    Text,
    #[serde(rename = "link")]
    #[sqlx(rename = "link")]
    Link,
    #[serde(rename = "image")]
    #[sqlx(rename = "image")]
    Image,
    #[serde(rename = "spotify")]
    #[sqlx(rename = "spotify")]
    Spotify,
    #[serde(rename = "discord")]
    #[sqlx(rename = "discord")]
    Discord,
    #[serde(rename = "divider")]
    #[sqlx(rename = "divider")]
    Divider,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Text => "text",
            BlockType::Link => "link",
            BlockType::Image => "image",
            BlockType::Spotify => "spotify",
            BlockType::Discord => "discord",
            BlockType::Divider => "divider",
        }
    }

    /// Fill in defaults for the fields this block type renders and reject
    /// unusable URLs. Unknown keys are dropped.
    pub fn normalize_data(&self, data: &Value) -> Result<Value, String> {
        if !data.is_object() && !data.is_null() {
            return Err(format!("{self} block data must be an object"));
        }

        let text = |key: &str, default: &str| -> String {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };
        let optional = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

        let normalized = match self {
            BlockType::Text => json!({
                "content": text("content", ""),
                "fontSize": text("fontSize", "medium"),
                "alignment": text("alignment", "left"),
            }),
            BlockType::Link => {
                let url = text("url", "#");
                if url != "#" {
                    check_url(&url)?;
                }
                json!({
                    "title": text("title", "Link"),
                    "url": url,
                    "icon": optional("icon"),
                })
            }
            BlockType::Image => {
                let url = text("url", "");
                if !url.is_empty() && !url.starts_with('/') {
                    check_url(&url)?;
                }
                json!({
                    "url": url,
                    "alt": text("alt", ""),
                    "width": text("width", "100%"),
                })
            }
            BlockType::Spotify => json!({
                "playlistId": optional("playlistId"),
                "playlistName": text("playlistName", ""),
                "playlistImage": text("playlistImage", ""),
            }),
            BlockType::Discord => json!({
                "username": text("username", ""),
                "discriminator": text("discriminator", ""),
                "avatar": text("avatar", ""),
                "userId": text("userId", ""),
            }),
            BlockType::Divider => json!({
                "style": text("style", "solid"),
                "color": text("color", "#cccccc"),
            }),
        };

        Ok(normalized)
    }
}

fn check_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid url {raw:?}: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!("unsupported url scheme {scheme:?} in {raw:?}")),
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(BlockType::Text),
            "link" => Ok(BlockType::Link),
            "image" => Ok(BlockType::Image),
            "spotify" => Ok(BlockType::Spotify),
            "discord" => Ok(BlockType::Discord),
            "divider" => Ok(BlockType::Divider),
            other => Err(format!("unknown block type: {other}")),
        }
    }
}

/// One ordered content unit on a page. `data` is a free-form JSON object
/// whose shape depends on `block_type`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub page_id: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub block_type: BlockType,
    pub position: i64,
    pub data: Json<Value>,
    pub created_at: String,
    pub updated_at: String,
}
