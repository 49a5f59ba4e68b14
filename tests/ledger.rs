mod common;

use common::TestApp;
use linkpage::leaderboard::{self, LeaderboardEntry, RebuildReport};
use linkpage::ledger::{self, InsertOutcome, Recorded};

#[tokio::test]
async fn duplicate_insert_reports_already_exists() {
    let app = TestApp::new().await;
    let page_id = app.create_published("alice").await;

    let first = ledger::insert_view(&app.db, &page_id, "203.0.113.5").await.unwrap();
    let second = ledger::insert_view(&app.db, &page_id, "203.0.113.5").await.unwrap();

    assert_eq!(first, InsertOutcome::Inserted);
    assert_eq!(second, InsertOutcome::AlreadyExists);
    assert_eq!(app.ledger_count(&page_id).await, 1);
}

#[tokio::test]
async fn insert_for_missing_page_is_a_failure() {
    let app = TestApp::new().await;

    // Foreign key violation, not a uniqueness violation.
    let result = ledger::insert_view(&app.db, "no-such-page", "203.0.113.5").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn record_view_counts_each_visitor_once() {
    let app = TestApp::new().await;
    let page_id = app.create_published("alice").await;

    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.push(ledger::record_view(&app.db, "alice", "visitor-a").await.unwrap());
    }

    assert_eq!(outcomes[0], Recorded::Counted);
    assert!(outcomes[1..].iter().all(|o| *o == Recorded::AlreadyCounted));
    assert_eq!(app.ledger_count(&page_id).await, 1);
    assert_eq!(app.cached_views("alice").await, Some(1));

    assert_eq!(
        ledger::record_view(&app.db, "alice", "visitor-b").await.unwrap(),
        Recorded::Counted
    );
    assert_eq!(app.ledger_count(&page_id).await, 2);
    assert_eq!(app.cached_views("alice").await, Some(2));
}

#[tokio::test]
async fn concurrent_duplicates_produce_one_row() {
    let app = TestApp::new().await;
    let page_id = app.create_published("alice").await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let db = app.db.clone();
            tokio::spawn(async move { ledger::record_view(&db, "alice", "visitor-a").await })
        })
        .collect();

    let mut counted = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            Recorded::Counted => counted += 1,
            Recorded::AlreadyCounted => {}
            Recorded::Skipped => panic!("alice should resolve"),
        }
    }

    assert_eq!(counted, 1);
    assert_eq!(app.ledger_count(&page_id).await, 1);
    assert_eq!(app.cached_views("alice").await, Some(1));
}

#[tokio::test]
async fn concurrent_distinct_visitors_settle_to_exact_count() {
    let app = TestApp::new().await;
    let page_id = app.create_published("alice").await;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let db = app.db.clone();
            tokio::spawn(async move {
                ledger::record_view(&db, "alice", &format!("visitor-{i}")).await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Recorded::Counted);
    }

    assert_eq!(app.ledger_count(&page_id).await, 10);
    assert_eq!(app.cached_views("alice").await, Some(10));
}

#[tokio::test]
async fn record_view_for_unknown_slug_is_skipped() {
    let app = TestApp::new().await;

    let outcome = ledger::record_view(&app.db, "ghost", "visitor-a").await.unwrap();
    assert_eq!(outcome, Recorded::Skipped);
    assert_eq!(app.cached_views("ghost").await, None);
}

#[tokio::test]
async fn record_view_survives_recompute_failure() {
    let app = TestApp::new().await;
    let page_id = app.create_published("alice").await;
    app.break_cache_for("alice").await;

    let outcome = ledger::record_view(&app.db, "alice", "visitor-a").await.unwrap();
    assert_eq!(outcome, Recorded::Counted);
    assert_eq!(app.ledger_count(&page_id).await, 1);
    assert_eq!(app.cached_views("alice").await, None);
}

#[tokio::test]
async fn recompute_is_a_full_recount_and_idempotent() {
    let app = TestApp::new().await;
    let page_id = app.create_published("alice").await;

    for visitor in ["a", "b", "c"] {
        ledger::insert_view(&app.db, &page_id, visitor).await.unwrap();
    }

    assert_eq!(leaderboard::recompute(&app.db, "alice").await.unwrap(), Some(3));
    assert_eq!(leaderboard::recompute(&app.db, "alice").await.unwrap(), Some(3));
    assert_eq!(app.cached_views("alice").await, Some(3));

    // Rows removed out of band are reflected on the next recount.
    sqlx::query("DELETE FROM views WHERE ip_address = 'a'")
        .execute(&app.db)
        .await
        .unwrap();
    assert_eq!(leaderboard::recompute(&app.db, "alice").await.unwrap(), Some(2));
    assert_eq!(app.cached_views("alice").await, Some(2));
}

#[tokio::test]
async fn recompute_unknown_slug_is_noop() {
    let app = TestApp::new().await;
    assert_eq!(leaderboard::recompute(&app.db, "ghost").await.unwrap(), None);
    assert_eq!(app.cached_views("ghost").await, None);
}

#[tokio::test]
async fn top_orders_by_views_then_slug() {
    let app = TestApp::new().await;
    let now = chrono::Utc::now().to_rfc3339();
    for (slug, views) in [("carol", 5), ("alice", 7), ("bob", 5), ("dave", 1)] {
        sqlx::query("INSERT INTO leaderboard_cache (slug, views_total, updated_at) VALUES (?, ?, ?)")
            .bind(slug)
            .bind(views)
            .bind(&now)
            .execute(&app.db)
            .await
            .unwrap();
    }

    let entries = leaderboard::top(&app.db, 3).await.unwrap();
    let expected = vec![
        LeaderboardEntry { position: 1, slug: "alice".to_string(), views: 7 },
        LeaderboardEntry { position: 2, slug: "bob".to_string(), views: 5 },
        LeaderboardEntry { position: 3, slug: "carol".to_string(), views: 5 },
    ];
    assert_eq!(entries, expected);

    assert_eq!(leaderboard::top(&app.db, 10).await.unwrap().len(), 4);
}

#[tokio::test]
async fn rebuild_all_isolates_failures_and_prunes_stale_rows() {
    let app = TestApp::new().await;
    let alice = app.create_published("alice").await;
    let bob = app.create_published("bob").await;
    app.create_user("carol").await;

    ledger::insert_view(&app.db, &alice, "a").await.unwrap();
    ledger::insert_view(&app.db, &alice, "b").await.unwrap();
    ledger::insert_view(&app.db, &bob, "a").await.unwrap();

    // A user whose page was removed, and a slug nobody owns any more.
    let dave = app.create_user("dave").await;
    leaderboard::recompute(&app.db, "dave").await.unwrap();
    sqlx::query("DELETE FROM pages WHERE id = ?")
        .bind(&dave)
        .execute(&app.db)
        .await
        .unwrap();
    sqlx::query("INSERT INTO leaderboard_cache (slug, views_total, updated_at) VALUES ('gone', 9, '')")
        .execute(&app.db)
        .await
        .unwrap();

    app.break_cache_for("bob").await;

    let report = leaderboard::rebuild_all(&app.db).await.unwrap();
    assert_eq!(
        report,
        RebuildReport { refreshed: 2, skipped: 1, failed: 1, pruned: 2 }
    );

    assert_eq!(app.cached_views("alice").await, Some(2));
    assert_eq!(app.cached_views("carol").await, Some(0));
    assert_eq!(app.cached_views("bob").await, None);
    assert_eq!(app.cached_views("dave").await, None);
    assert_eq!(app.cached_views("gone").await, None);
}
