use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::leaderboard::{self, LeaderboardEntry};
use crate::ledger;
use crate::models::{Badge, Block, Page, User};
use crate::routes::ApiResponse;
use crate::visitor::VisitorIdentity;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPage {
    pub slug: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Value,
    pub blocks: Vec<Block>,
    pub badges: Vec<Badge>,
    pub show_badges: bool,
}

#[derive(Serialize)]
pub struct PageViews {
    pub slug: String,
    pub views: i64,
}

#[derive(Deserialize)]
pub struct LeaderboardParams {
    limit: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/public/leaderboard", get(get_leaderboard))
        .route("/api/public/{slug}/views", get(get_page_views))
        .route("/api/public/{slug}", get(get_public_page))
}

async fn find_published_page(db: &SqlitePool, slug: &str) -> Result<(User, Page), AppError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE slug = ?")
        .bind(slug)
        .fetch_optional(db)
        .await?;

    let Some(user) = user else {
        return Err(AppError::NotFound("Page not found"));
    };

    let page: Option<Page> =
        sqlx::query_as("SELECT * FROM pages WHERE user_id = ? AND is_published = 1")
            .bind(&user.id)
            .fetch_optional(db)
            .await?;

    let Some(page) = page else {
        return Err(AppError::NotFound("Page not published or not found"));
    };

    Ok((user, page))
}

async fn get_public_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    VisitorIdentity(visitor): VisitorIdentity,
) -> Result<Json<ApiResponse<PublicPage>>, AppError> {
    let (user, page) = find_published_page(&state.db, &slug).await?;

    // Not awaited: counting must not delay or fail the page.
    state.views.spawn(user.slug.clone(), visitor);

    let blocks: Vec<Block> = sqlx::query_as(
        "SELECT * FROM blocks WHERE page_id = ? ORDER BY position ASC, created_at ASC"
    )
    .bind(&page.id)
    .fetch_all(&state.db)
    .await?;

    let badges: Vec<Badge> = if page.show_badges {
        sqlx::query_as("SELECT * FROM badges WHERE page_id = ? ORDER BY created_at ASC")
            .bind(&page.id)
            .fetch_all(&state.db)
            .await?
    } else {
        Vec::new()
    };

    Ok(Json(ApiResponse::ok(PublicPage {
        slug: user.slug,
        username: user.username,
        display_name: page.display_name,
        avatar_url: page.avatar_url,
        theme: page.theme.0,
        blocks,
        badges,
        show_badges: page.show_badges,
    })))
}

async fn get_page_views(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<PageViews>>, AppError> {
    let (_user, page) = find_published_page(&state.db, &slug).await?;
    let views = ledger::count_views(&state.db, &page.id).await?;

    Ok(Json(ApiResponse::ok(PageViews { slug, views })))
}

async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<ApiResponse<Vec<LeaderboardEntry>>>, AppError> {
    let limit = leaderboard::parse_limit(params.limit.as_deref());
    let entries = leaderboard::top(&state.db, limit).await?;

    Ok(Json(ApiResponse::ok(entries)))
}
