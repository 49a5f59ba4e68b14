//! Leaderboard cache maintenance and reads.
//!
//! `leaderboard_cache` is a projection of the view ledger: every value can be
//! rebuilt with a recount, so writes always store a full count rather than an
//! increment.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::ledger;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub position: i64,
    pub slug: String,
    pub views: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub refreshed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pruned: u64,
}

/// Recount the ledger for `slug` and store the result in the cache.
///
/// Returns `None` without writing when the slug has no user or no page.
/// The count and the upsert run as one statement, so a recompute that
/// finishes last always stores a count that includes every committed view.
pub async fn recompute(db: &SqlitePool, slug: &str) -> Result<Option<i64>, sqlx::Error> {
    let Some(page_id) = ledger::page_id_for_slug(db, slug).await? else {
        return Ok(None);
    };

    let now = chrono::Utc::now().to_rfc3339();

    let (views_total,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO leaderboard_cache (slug, views_total, updated_at)
        SELECT ?, COUNT(*), ? FROM views WHERE page_id = ?
        ON CONFLICT(slug) DO UPDATE SET
            views_total = excluded.views_total,
            updated_at = excluded.updated_at
        RETURNING views_total
        "#
    )
    .bind(slug)
    .bind(&now)
    .bind(&page_id)
    .fetch_one(db)
    .await?;

    Ok(Some(views_total))
}

/// Recompute every user's slug, then drop cache rows whose slug no longer
/// belongs to a user with a page.
///
/// Each slug is independent: a failure is logged and counted and the sweep
/// moves on.
pub async fn rebuild_all(db: &SqlitePool) -> Result<RebuildReport, sqlx::Error> {
    let slugs: Vec<(String,)> = sqlx::query_as("SELECT slug FROM users ORDER BY slug")
        .fetch_all(db)
        .await?;

    let mut report = RebuildReport::default();

    for (slug,) in slugs {
        match recompute(db, &slug).await {
            Ok(Some(views)) => {
                tracing::debug!(%slug, views, "leaderboard entry refreshed");
                report.refreshed += 1;
            }
            Ok(None) => report.skipped += 1,
            Err(e) => {
                tracing::warn!(%slug, "leaderboard recompute failed: {e}");
                report.failed += 1;
            }
        }
    }

    report.pruned = sqlx::query(
        r#"
        DELETE FROM leaderboard_cache
        WHERE slug NOT IN (
            SELECT u.slug FROM users u JOIN pages p ON p.user_id = u.id
        )
        "#
    )
    .execute(db)
    .await?
    .rows_affected();

    tracing::info!(
        refreshed = report.refreshed,
        skipped = report.skipped,
        failed = report.failed,
        pruned = report.pruned,
        "leaderboard rebuilt"
    );

    Ok(report)
}

/// Top `limit` slugs by cached views. Equal counts are ordered by slug.
pub async fn top(db: &SqlitePool, limit: i64) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT slug, views_total
        FROM leaderboard_cache
        ORDER BY views_total DESC, slug ASC
        LIMIT ?
        "#
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, (slug, views))| LeaderboardEntry {
            position: i as i64 + 1,
            slug,
            views,
        })
        .collect())
}

/// Parse a `limit` query value. Missing, non-numeric and non-positive values
/// fall back to [`DEFAULT_LIMIT`].
pub fn parse_limit(raw: Option<&str>) -> i64 {
    match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(n) if n >= 1 => n.min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    }
}
