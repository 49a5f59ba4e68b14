//! The view ledger: one row per `(page, visitor)` pair.
//!
//! Duplicate suppression rests on the `UNIQUE(page_id, ip_address)`
//! constraint of the `views` table. Two concurrent inserts for the same pair
//! both reach the database; one wins and the other surfaces as
//! [`InsertOutcome::AlreadyExists`].

use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::leaderboard;
use crate::models::View;

/// Result of a single ledger insert. Storage failures other than a
/// uniqueness violation are returned as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// What [`record_view`] did for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// A new view row was written and the leaderboard was asked to recompute.
    Counted,
    /// The visitor had already been counted for this page.
    AlreadyCounted,
    /// The slug does not resolve to a user with a page.
    Skipped,
}

/// Resolve a slug to the id of its owner's page, published or not.
pub async fn page_id_for_slug(db: &SqlitePool, slug: &str) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT p.id
        FROM pages p
        JOIN users u ON u.id = p.user_id
        WHERE u.slug = ?
        "#
    )
    .bind(slug)
    .fetch_optional(db)
    .await?;

    Ok(row.map(|(id,)| id))
}

pub async fn insert_view(
    db: &SqlitePool,
    page_id: &str,
    visitor: &str,
) -> Result<InsertOutcome, sqlx::Error> {
    let view = View::new(page_id.to_string(), visitor.to_string());

    let result = sqlx::query(
        "INSERT INTO views (id, page_id, ip_address, created_at) VALUES (?, ?, ?, ?)"
    )
    .bind(&view.id)
    .bind(&view.page_id)
    .bind(&view.ip_address)
    .bind(&view.created_at)
    .execute(db)
    .await;

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(InsertOutcome::AlreadyExists),
        Err(e) => Err(e),
    }
}

/// Authoritative distinct-visitor count for a page, read from the ledger.
pub async fn count_views(db: &SqlitePool, page_id: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM views WHERE page_id = ?")
        .bind(page_id)
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Count `visitor` against the page behind `slug`, at most once.
///
/// The leaderboard recompute runs only after the insert has returned, so the
/// new row is already committed when it is counted. A failing recompute is
/// logged and does not turn into an error here.
pub async fn record_view(db: &SqlitePool, slug: &str, visitor: &str) -> Result<Recorded, sqlx::Error> {
    let Some(page_id) = page_id_for_slug(db, slug).await? else {
        return Ok(Recorded::Skipped);
    };

    match insert_view(db, &page_id, visitor).await? {
        InsertOutcome::AlreadyExists => Ok(Recorded::AlreadyCounted),
        InsertOutcome::Inserted => {
            if let Err(e) = leaderboard::recompute(db, slug).await {
                tracing::warn!(%slug, "leaderboard recompute failed: {e}");
            }
            Ok(Recorded::Counted)
        }
    }
}

/// Records views on detached tasks so the page response never waits on
/// the ledger.
#[derive(Clone)]
pub struct ViewCounter {
    db: SqlitePool,
}

impl ViewCounter {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Spawn the ledger write. Errors are logged inside the task; the
    /// returned handle may be dropped.
    pub fn spawn(&self, slug: String, visitor: String) -> JoinHandle<()> {
        let db = self.db.clone();
        tokio::spawn(async move {
            match record_view(&db, &slug, &visitor).await {
                Ok(outcome) => tracing::debug!(%slug, ?outcome, "view processed"),
                Err(e) => tracing::error!(%slug, "failed to record view: {e}"),
            }
        })
    }
}
