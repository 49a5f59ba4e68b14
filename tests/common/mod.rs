#![allow(dead_code)]

use axum::body::Body;
use http_body_util::BodyExt;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use linkpage::config::Config;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
}

impl TestApp {
    pub async fn new() -> Self {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("Failed to create in-memory SQLite pool");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let router = linkpage::build_app(pool.clone(), &Config::default());

        Self { router, db: pool }
    }

    /// Send a request through the app and return the response.
    pub async fn request(&self, req: Request<Body>) -> Response {
        tower::ServiceExt::oneshot(self.router.clone(), req)
            .await
            .unwrap()
    }

    /// Create a user (and their empty page) and return the page id.
    pub async fn create_user(&self, slug: &str) -> String {
        let user = linkpage::cli::create_user(
            &self.db,
            &format!("{slug}@example.com"),
            slug,
            Some(slug),
        )
        .await
        .expect("Failed to create test user");

        let (page_id,): (String,) = sqlx::query_as("SELECT id FROM pages WHERE user_id = ?")
            .bind(&user.id)
            .fetch_one(&self.db)
            .await
            .unwrap();
        page_id
    }

    /// Create a user with a published page and return the page id.
    pub async fn create_published(&self, slug: &str) -> String {
        let page_id = self.create_user(slug).await;
        linkpage::cli::set_published(&self.db, slug, true)
            .await
            .unwrap();
        page_id
    }

    /// Send a GET request with no origin headers.
    pub async fn get(&self, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.request(req).await
    }

    /// Send a GET request as the given visitor (via `X-Forwarded-For`).
    pub async fn get_as(&self, uri: &str, visitor: &str) -> Response {
        let req = Request::builder()
            .uri(uri)
            .header("x-forwarded-for", visitor)
            .body(Body::empty())
            .unwrap();
        self.request(req).await
    }

    pub async fn ledger_count(&self, page_id: &str) -> i64 {
        linkpage::ledger::count_views(&self.db, page_id).await.unwrap()
    }

    pub async fn cached_views(&self, slug: &str) -> Option<i64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT views_total FROM leaderboard_cache WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.db)
                .await
                .unwrap();
        row.map(|(v,)| v)
    }

    /// Make every cache write for `slug` fail.
    pub async fn break_cache_for(&self, slug: &str) {
        for event in ["INSERT", "UPDATE"] {
            sqlx::query(&format!(
                "CREATE TRIGGER fail_cache_{event}_{slug} BEFORE {event} ON leaderboard_cache \
                 WHEN NEW.slug = '{slug}' BEGIN SELECT RAISE(ABORT, 'cache unavailable'); END"
            ))
            .execute(&self.db)
            .await
            .unwrap();
        }
    }
}

/// Read the full response body as a String.
pub async fn body_string(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: Response) -> serde_json::Value {
    serde_json::from_str(&body_string(resp).await).unwrap()
}

/// Poll `check` until it holds, letting detached view tasks run in between.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
