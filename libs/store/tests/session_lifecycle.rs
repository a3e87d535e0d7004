//! End-to-end exercises of the relational store against an in-memory
//! database: no mocks, the real schema and the real cascade-delete
//! behavior foreign keys are supposed to give us.

use indexmap::IndexMap;
use serde_json::json;

use secchiware_store::{
    ExecutionRepository, NewReport, ReportRepository, SessionRepository, StoreClient, StoreError,
};

async fn memory_store() -> StoreClient {
    StoreClient::connect(":memory:").await.expect("connect to in-memory store")
}

#[tokio::test]
async fn registering_twice_at_the_same_address_ends_the_first_session() {
    let store = memory_store().await;
    let conn = store.connection().await.unwrap();

    let first = SessionRepository::insert(&conn, "10.0.0.5", 9000, &json!({"os": "linux"}))
        .await
        .unwrap();
    assert!(first.session_end.is_none());

    let prior = SessionRepository::find_active_by_addr(&conn, "10.0.0.5", 9000)
        .await
        .unwrap()
        .expect("first session is active");
    SessionRepository::end(&conn, prior.id).await.unwrap();

    let second = SessionRepository::insert(&conn, "10.0.0.5", 9000, &json!({"os": "linux"}))
        .await
        .unwrap();

    let ended_first = SessionRepository::get(&conn, first.id).await.unwrap();
    assert!(ended_first.session_end.is_some());
    assert!(second.session_end.is_none());
    assert_ne!(ended_first.id, second.id);

    let active = SessionRepository::list_active(&conn).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);
}

#[tokio::test]
async fn deleting_a_session_cascades_to_its_executions_and_reports() {
    let store = memory_store().await;
    let conn = store.connection().await.unwrap();

    let session = SessionRepository::insert(&conn, "10.0.0.5", 9000, &json!({})).await.unwrap();
    let execution = ExecutionRepository::insert(&conn, session.id).await.unwrap();

    let reports = vec![
        NewReport {
            test_name: "test_one".into(),
            test_description: "first test".into(),
            timestamp_start: "2026-01-01T00:00:00Z".into(),
            timestamp_end: "2026-01-01T00:00:01Z".into(),
            result_code: 1,
            additional_info: Some(json!({"detail": "ok"})),
        },
        NewReport {
            test_name: "test_two".into(),
            test_description: "second test".into(),
            timestamp_start: "2026-01-01T00:00:02Z".into(),
            timestamp_end: "2026-01-01T00:00:03Z".into(),
            result_code: -1,
            additional_info: None,
        },
    ];
    ReportRepository::bulk_insert(&conn, execution.id, &reports).await.unwrap();

    let stored = ReportRepository::list_for_execution(&conn, execution.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].additional_info, Some(json!({"detail": "ok"})));

    SessionRepository::end(&conn, session.id).await.unwrap();
    SessionRepository::delete(&conn, session.id).await.unwrap();

    let err = ExecutionRepository::get(&conn, execution.id).await.unwrap_err();
    assert!(matches!(err, StoreError::ExecutionNotFound(_)));

    let remaining_reports = ReportRepository::list_for_execution(&conn, execution.id).await.unwrap();
    assert!(remaining_reports.is_empty());
}

#[tokio::test]
async fn insert_with_reports_commits_execution_and_its_reports_together() {
    let store = memory_store().await;
    let conn = store.connection().await.unwrap();

    let session = SessionRepository::insert(&conn, "10.0.0.9", 9100, &json!({})).await.unwrap();
    let reports = vec![NewReport {
        test_name: "test_one".into(),
        test_description: "first test".into(),
        timestamp_start: "2026-01-01T00:00:00Z".into(),
        timestamp_end: "2026-01-01T00:00:01Z".into(),
        result_code: 1,
        additional_info: None,
    }];

    let execution = ExecutionRepository::insert_with_reports(&conn, session.id, &reports)
        .await
        .unwrap();

    let stored = ReportRepository::list_for_execution(&conn, execution.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].test_name, "test_one");
}

#[tokio::test]
async fn deleting_a_still_active_session_fails() {
    let store = memory_store().await;
    let conn = store.connection().await.unwrap();

    let session = SessionRepository::insert(&conn, "10.0.0.5", 9000, &json!({})).await.unwrap();
    let err = SessionRepository::delete(&conn, session.id).await.unwrap_err();
    assert!(matches!(err, StoreError::SessionStillActive(_)));
}

#[tokio::test]
async fn search_filters_and_orders_sessions() {
    let store = memory_store().await;
    let conn = store.connection().await.unwrap();

    SessionRepository::insert(&conn, "10.0.0.1", 9000, &json!({})).await.unwrap();
    SessionRepository::insert(&conn, "10.0.0.2", 9000, &json!({})).await.unwrap();
    SessionRepository::insert(&conn, "10.0.0.3", 9001, &json!({})).await.unwrap();

    let mut params = IndexMap::new();
    params.insert("ip".to_string(), "10.0.0.1,10.0.0.2".to_string());
    params.insert("order_by".to_string(), "id".to_string());
    params.insert("arrange".to_string(), "desc".to_string());

    let results = SessionRepository::search(&conn, &params).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].env_ip, "10.0.0.2");
    assert_eq!(results[1].env_ip, "10.0.0.1");
}

#[tokio::test]
async fn search_rejects_unknown_query_key() {
    let store = memory_store().await;
    let conn = store.connection().await.unwrap();

    let mut params = IndexMap::new();
    params.insert("bogus".to_string(), "1".to_string());

    let err = SessionRepository::search(&conn, &params).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidParameter(_)));
}

#[tokio::test]
async fn end_all_active_stamps_every_open_session() {
    let store = memory_store().await;
    let conn = store.connection().await.unwrap();

    SessionRepository::insert(&conn, "10.0.0.1", 9000, &json!({})).await.unwrap();
    SessionRepository::insert(&conn, "10.0.0.2", 9000, &json!({})).await.unwrap();

    SessionRepository::end_all_active(&conn).await.unwrap();

    let active = SessionRepository::list_active(&conn).await.unwrap();
    assert!(active.is_empty());
}
