//! Full and batch sync end to end: mock catalog + in-memory SQLite store

mod helpers;

use helpers::{
    fast, machine, machine_page, memory_store, page_route, tags_body, tags_route, technique,
    test_settings, MockServer,
};
use serde_json::json;
use skilltree_sync::db::SqliteStore;
use skilltree_sync::services::sync_orchestrator::{
    ACTIVE_MACHINES_ENDPOINT, RETIRED_MACHINES_ENDPOINT,
};
use skilltree_sync::services::{RetryPolicy, SyncError, SyncOrchestrator};
use skilltree_sync::CatalogStore;
use sqlx::Row;
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(mock: &MockServer, store: &SqliteStore, policy: RetryPolicy) -> SyncOrchestrator {
    SyncOrchestrator::new(
        Arc::new(store.clone()),
        "token",
        test_settings(&mock.api_base()),
        fast(policy),
    )
    .unwrap()
}

async fn technique_ids(store: &SqliteStore, machine_id: i64) -> Vec<i64> {
    store
        .links_for_machine(machine_id)
        .await
        .unwrap()
        .into_iter()
        .map(|link| link.technique_id)
        .collect()
}

#[tokio::test]
async fn test_full_sync_end_to_end() {
    let mock = MockServer::start().await;
    let store = memory_store().await;

    // Machine 2 had links from an earlier run; its tag endpoint is now denied
    store.upsert_machine(&machine(2, "Old name")).await.unwrap();
    store
        .upsert_techniques(&[technique(50, "Stale")], skilltree_sync::db::ConflictPolicy::Overwrite)
        .await
        .unwrap();
    store.replace_api_links(&[(2, vec![50])]).await.unwrap();

    mock.respond(&page_route(ACTIVE_MACHINES_ENDPOINT, 1), 200, machine_page(1..=2));
    mock.respond(&page_route(RETIRED_MACHINES_ENDPOINT, 1), 200, machine_page(3..=3));
    mock.respond(
        &tags_route(1),
        200,
        tags_body(&[
            (10, "SQL Injection", "Technique"),
            (11, "Cross-Site Scripting", "Technique"),
            (900, "Web", "Area of Interest"),
        ]),
    );
    mock.respond(&tags_route(2), 403, json!({"message": "Forbidden"}));
    mock.respond(&tags_route(3), 500, json!({}));

    let summary = orchestrator(&mock, &store, RetryPolicy::full_sync())
        .run_full_sync()
        .await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.errors, 1);

    assert_eq!(technique_ids(&store, 1).await, vec![10, 11]);
    assert!(technique_ids(&store, 2).await.is_empty());
    assert!(technique_ids(&store, 3).await.is_empty());
    assert!(store.find_technique_by_name("Web").await.unwrap().is_none());

    // Every listed machine was upserted, including the ones whose tags failed
    let machines = store.list_machines().await.unwrap();
    let names: Vec<_> = machines.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Machine1", "Machine2", "Machine3"]);

    let row = sqlx::query("SELECT status, avatar FROM htb_machines WHERE id = 3")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("status"), "retired");
    assert!(row
        .get::<String, _>("avatar")
        .starts_with("https://htb-mp-prod-public-storage.s3.eu-central-1.amazonaws.com/"));

    assert_eq!(mock.hits(&tags_route(3)), 4);
}

#[tokio::test]
async fn test_full_sync_skips_malformed_records() {
    let mock = MockServer::start().await;
    let store = memory_store().await;

    mock.respond(
        &page_route(ACTIVE_MACHINES_ENDPOINT, 1),
        200,
        json!({"data": [{"name": "No id"}, {"id": 4, "name": "Good"}]}),
    );
    mock.respond(&page_route(RETIRED_MACHINES_ENDPOINT, 1), 200, json!({"data": []}));
    mock.respond(&tags_route(4), 200, tags_body(&[(10, "LFI", "Technique")]));

    let summary = orchestrator(&mock, &store, RetryPolicy::full_sync())
        .run_full_sync()
        .await;

    assert_eq!(summary.total, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(technique_ids(&store, 4).await, vec![10]);
}

async fn seed_machines(store: &SqliteStore, count: i64) {
    for id in 1..=count {
        store
            .upsert_machine(&machine(id, &format!("Machine{}", id)))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_batch_windows_over_237_machines() {
    let mock = MockServer::start().await;
    let store = memory_store().await;
    seed_machines(&store, 237).await;
    for id in 1..=237 {
        mock.respond(&tags_route(id), 200, tags_body(&[(10, "Enumeration", "Technique")]));
    }
    let orchestrator = orchestrator(&mock, &store, RetryPolicy::batch());

    let first = orchestrator.run_batch(1).await.unwrap();
    assert_eq!(first.window, 0..50);
    assert_eq!(first.total_batches, 5);
    assert_eq!(first.next_batch, Some(2));
    assert_eq!(first.summary.processed, 50);
    assert_eq!(mock.requests().len(), 50);
    assert_eq!(mock.hits(&tags_route(1)), 1);
    assert_eq!(mock.hits(&tags_route(51)), 0);

    let last = orchestrator.run_batch(5).await.unwrap();
    assert_eq!(last.window, 200..237);
    assert_eq!(last.summary.total, 37);
    assert!(last.is_last());
    assert_eq!(mock.hits(&tags_route(201)), 1);
    assert_eq!(mock.hits(&tags_route(237)), 1);
    assert_eq!(mock.requests().len(), 87);

    let past_end = orchestrator.run_batch(6).await.unwrap();
    assert!(past_end.window.is_empty());
    assert_eq!(past_end.summary.processed, 0);
    assert_eq!(past_end.next_batch, None);
    assert_eq!(mock.requests().len(), 87);

    assert_eq!(technique_ids(&store, 237).await, vec![10]);
    assert!(technique_ids(&store, 100).await.is_empty());
}

#[tokio::test]
async fn test_batch_zero_rejected() {
    let mock = MockServer::start().await;
    let store = memory_store().await;

    let result = orchestrator(&mock, &store, RetryPolicy::batch())
        .run_batch(0)
        .await;

    assert!(matches!(result, Err(SyncError::InvalidBatch(0))));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_batch_flush_touches_only_successful_fetches() {
    let mock = MockServer::start().await;
    let store = memory_store().await;
    seed_machines(&store, 3).await;
    store
        .upsert_techniques(
            &[technique(10, "Old name"), technique(20, "Kept")],
            skilltree_sync::db::ConflictPolicy::Overwrite,
        )
        .await
        .unwrap();
    store
        .replace_api_links(&[(1, vec![20]), (2, vec![20]), (3, vec![20])])
        .await
        .unwrap();

    mock.respond(&tags_route(1), 200, tags_body(&[(10, "New name", "Technique")]));
    mock.respond(&tags_route(2), 403, json!({}));
    mock.respond(&tags_route(3), 404, json!({}));

    let outcome = orchestrator(&mock, &store, RetryPolicy::batch())
        .run_batch(1)
        .await
        .unwrap();

    assert_eq!(outcome.summary.processed, 3);
    assert_eq!(outcome.summary.errors, 1);
    assert_eq!(outcome.report.links_written, 1);

    assert_eq!(technique_ids(&store, 1).await, vec![10]);
    // Denied: fetched as an empty set, so cleared
    assert!(technique_ids(&store, 2).await.is_empty());
    // Failed: untouched
    assert_eq!(technique_ids(&store, 3).await, vec![20]);
    assert!(store.find_technique_by_name("New name").await.unwrap().is_some());
}

#[tokio::test]
async fn test_batch_rate_limit_exhaustion_counts_as_error() {
    let mock = MockServer::start().await;
    let store = memory_store().await;
    seed_machines(&store, 2).await;

    mock.respond(&tags_route(1), 429, json!({}));
    mock.respond(&tags_route(2), 200, tags_body(&[(10, "A", "Technique")]));

    let outcome = orchestrator(&mock, &store, RetryPolicy::batch())
        .run_batch(1)
        .await
        .unwrap();

    assert_eq!(outcome.summary.errors, 1);
    assert_eq!(mock.hits(&tags_route(1)), 4);
    assert_eq!(technique_ids(&store, 2).await, vec![10]);
}

#[tokio::test]
async fn test_full_sync_paces_every_catalog_request() {
    let mock = MockServer::start().await;
    let store = memory_store().await;
    let delay = Duration::from_millis(150);

    let list_route = |endpoint: &str, page: u32| {
        format!("/api/v4{}?per_page=2&page={}", endpoint, page)
    };
    mock.respond(&list_route(ACTIVE_MACHINES_ENDPOINT, 1), 200, machine_page(1..=2));
    mock.respond(&list_route(ACTIVE_MACHINES_ENDPOINT, 2), 200, machine_page(3..=3));
    mock.respond(&list_route(RETIRED_MACHINES_ENDPOINT, 1), 200, machine_page(4..=4));
    for id in 1..=4 {
        mock.respond(&tags_route(id), 200, tags_body(&[(10, "LFI", "Technique")]));
    }

    let mut settings = test_settings(&mock.api_base());
    settings.page_size = 2;
    settings.request_delay = delay;
    let summary = SyncOrchestrator::new(
        Arc::new(store.clone()),
        "token",
        settings,
        fast(RetryPolicy::full_sync()),
    )
    .unwrap()
    .run_full_sync()
    .await;

    assert_eq!(summary.errors, 0);
    let requests = mock.requests();
    let paths: Vec<String> = requests
        .iter()
        .map(|r| match &r.raw_query {
            Some(query) => format!("{}?{}", r.path, query),
            None => r.path.clone(),
        })
        .collect();
    assert_eq!(
        paths,
        vec![
            list_route(ACTIVE_MACHINES_ENDPOINT, 1),
            list_route(ACTIVE_MACHINES_ENDPOINT, 2),
            list_route(RETIRED_MACHINES_ENDPOINT, 1),
            tags_route(1),
            tags_route(2),
            tags_route(3),
            tags_route(4),
        ]
    );

    // Between pages, between the two lists, and before each tag lookup
    for pair in requests.windows(2) {
        let gap = pair[1].received_at.duration_since(pair[0].received_at);
        assert!(
            gap >= delay,
            "{} followed {} after only {:?}",
            pair[1].path,
            pair[0].path,
            gap
        );
    }
}

#[tokio::test]
async fn test_full_sync_ignores_malformed_non_technique_tags() {
    let mock = MockServer::start().await;
    let store = memory_store().await;

    mock.respond(&page_route(ACTIVE_MACHINES_ENDPOINT, 1), 200, machine_page(1..=1));
    mock.respond(&page_route(RETIRED_MACHINES_ENDPOINT, 1), 200, json!({"data": []}));
    mock.respond(
        &tags_route(1),
        200,
        json!({
            "info": [
                {"id": 10, "name": "SQL Injection", "category": "Technique"},
                {"id": null, "name": null, "category": "Area of Interest"}
            ]
        }),
    );

    let summary = orchestrator(&mock, &store, RetryPolicy::full_sync())
        .run_full_sync()
        .await;

    assert_eq!(summary.errors, 0);
    assert_eq!(technique_ids(&store, 1).await, vec![10]);
}
