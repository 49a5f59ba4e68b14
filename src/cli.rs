//! Operator commands: seed users and page content, publish pages, and run
//! leaderboard maintenance outside the request path.

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::models::{BadgeType, BlockType, Page, User};
use crate::slug::{generate_unique_slug, is_slug_taken, is_valid_slug};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImport {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Option<Value>,
    pub is_published: Option<bool>,
    pub show_badges: Option<bool>,
    #[serde(default)]
    pub blocks: Vec<BlockImport>,
    #[serde(default)]
    pub badges: Vec<BadgeImport>,
}

#[derive(Debug, Deserialize)]
pub struct BlockImport {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub position: Option<i64>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeImport {
    #[serde(rename = "type")]
    pub badge_type: BadgeType,
    pub name: String,
    pub image_url: Option<String>,
    pub preset_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub blocks: usize,
    pub badges: usize,
}

/// Create a user together with an empty, unpublished page.
///
/// Without an explicit `slug` one is derived from `username`.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    username: &str,
    slug: Option<&str>,
) -> anyhow::Result<User> {
    let username = username.trim();
    if !(3..=30).contains(&username.chars().count()) {
        bail!("Username must be between 3 and 30 characters");
    }
    if !email.contains('@') {
        bail!("Invalid email: {email}");
    }

    let slug = match slug {
        Some(slug) => {
            let slug = slug.trim().to_lowercase();
            if !is_valid_slug(&slug) {
                bail!("Invalid slug '{slug}': use 3-30 of [a-z0-9_-]");
            }
            if is_slug_taken(pool, &slug).await? {
                bail!("Slug '{slug}' is already taken");
            }
            slug
        }
        None => generate_unique_slug(pool, username).await?,
    };

    let user = User::new(email.to_string(), username.to_string(), slug);
    let page = Page::new(user.id.clone());

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, email, username, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)"
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.slug)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("Failed to create user {}", user.email))?;

    sqlx::query(
        r#"
        INSERT INTO pages (id, user_id, display_name, avatar_url, theme, is_published, show_badges, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(&page.id)
    .bind(&page.user_id)
    .bind(&page.display_name)
    .bind(&page.avatar_url)
    .bind(page.theme.0.to_string())
    .bind(page.is_published)
    .bind(page.show_badges)
    .bind(&page.created_at)
    .bind(&page.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(slug = %user.slug, "created user");
    Ok(user)
}

pub async fn import_page_file(pool: &SqlitePool, slug: &str, file_path: &Path) -> anyhow::Result<ImportSummary> {
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;
    let import: PageImport = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", file_path.display()))?;
    import_page(pool, slug, import).await
}

/// Replace the blocks and badges of `slug`'s page and update the page fields
/// present in `import`. Everything is written in one transaction.
pub async fn import_page(pool: &SqlitePool, slug: &str, import: PageImport) -> anyhow::Result<ImportSummary> {
    if let Some(name) = &import.display_name {
        if !(1..=50).contains(&name.chars().count()) {
            bail!("Display name must be between 1 and 50 characters");
        }
    }
    if let Some(avatar) = &import.avatar_url {
        if !avatar.is_empty()
            && !avatar.starts_with("http://")
            && !avatar.starts_with("https://")
            && !avatar.starts_with('/')
        {
            bail!("Avatar URL must be an http(s) URL or a relative path");
        }
    }
    if let Some(theme) = &import.theme {
        if !theme.is_object() {
            bail!("Theme must be a JSON object");
        }
    }

    let mut blocks = Vec::with_capacity(import.blocks.len());
    for (index, block) in import.blocks.iter().enumerate() {
        let position = block.position.unwrap_or(index as i64);
        if position < 0 {
            bail!("Block {index}: position must be >= 0");
        }
        let data = block
            .block_type
            .normalize_data(&block.data)
            .map_err(|e| anyhow!("Block {index}: {e}"))?;
        blocks.push((block.block_type, position, data));
    }

    for (index, badge) in import.badges.iter().enumerate() {
        if badge.name.trim().is_empty() {
            bail!("Badge {index}: name is required");
        }
    }

    let page_id: Option<(String,)> = sqlx::query_as(
        "SELECT p.id FROM pages p JOIN users u ON u.id = p.user_id WHERE u.slug = ?"
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    let Some((page_id,)) = page_id else {
        bail!("No page found for slug '{slug}'");
    };

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE pages SET
            display_name = COALESCE(?, display_name),
            avatar_url = COALESCE(?, avatar_url),
            theme = COALESCE(?, theme),
            is_published = COALESCE(?, is_published),
            show_badges = COALESCE(?, show_badges),
            updated_at = ?
        WHERE id = ?
        "#
    )
    .bind(&import.display_name)
    .bind(&import.avatar_url)
    .bind(import.theme.as_ref().map(Value::to_string))
    .bind(import.is_published)
    .bind(import.show_badges)
    .bind(&now)
    .bind(&page_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM blocks WHERE page_id = ?")
        .bind(&page_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM badges WHERE page_id = ?")
        .bind(&page_id)
        .execute(&mut *tx)
        .await?;

    for (block_type, position, data) in &blocks {
        sqlx::query(
            "INSERT INTO blocks (id, page_id, type, position, data, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&page_id)
        .bind(*block_type)
        .bind(*position)
        .bind(data.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    // Badges keep their file order through created_at, so the stamps need a
    // fixed width to sort lexically.
    let base = chrono::Utc::now();
    for (index, badge) in import.badges.iter().enumerate() {
        let created_at = (base + chrono::Duration::milliseconds(index as i64))
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        sqlx::query(
            "INSERT INTO badges (id, page_id, type, name, image_url, preset_key, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&page_id)
        .bind(badge.badge_type)
        .bind(badge.name.trim())
        .bind(&badge.image_url)
        .bind(&badge.preset_key)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let summary = ImportSummary {
        blocks: blocks.len(),
        badges: import.badges.len(),
    };
    tracing::info!(%slug, blocks = summary.blocks, badges = summary.badges, "imported page");
    Ok(summary)
}

pub async fn set_published(pool: &SqlitePool, slug: &str, published: bool) -> anyhow::Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE pages SET is_published = ?, updated_at = ?
        WHERE user_id = (SELECT id FROM users WHERE slug = ?)
        "#
    )
    .bind(published)
    .bind(&now)
    .bind(slug)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        bail!("No page found for slug '{slug}'");
    }
    Ok(())
}
