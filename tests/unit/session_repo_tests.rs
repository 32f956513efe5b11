use std::sync::Arc;

use sms_session_supervisor::models::session::{
    LastAction, Lifecycle, NewProgramSession, ProgramSession, SessionFilter, StatusUpdate,
};
use sms_session_supervisor::persistence::{db, session_repo::SessionRepo};
use sms_session_supervisor::AppError;

fn new_session(name: &str) -> ProgramSession {
    ProgramSession::new(
        NewProgramSession {
            session_name: name.into(),
            script_name: "program.py".into(),
            country: "Kenya".into(),
            operator: "Safaricom".into(),
        },
        "u-admin".into(),
    )
}

async fn repo() -> SessionRepo {
    let pool = db::connect_memory().await.expect("db connect");
    SessionRepo::new(Arc::new(pool))
}

#[tokio::test]
async fn in_memory_connect_creates_table() {
    let pool = db::connect_memory().await.expect("db connect");
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM program_session")
        .fetch_one(&pool)
        .await
        .expect("table should be queryable");
    assert_eq!(row.0, 0);
}

#[tokio::test]
async fn file_connect_creates_parent_dirs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("sessions.db");
    let pool = db::connect(&path).await.expect("file db");
    drop(pool);
    assert!(path.exists());
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let repo = repo().await;
    let session = new_session("s");
    repo.create(&session).await.expect("create");

    let fetched = repo.get_by_id(&session.id).await.expect("get").expect("exists");
    assert_eq!(fetched.id, session.id);
    assert_eq!(fetched.country, "Kenya");
    assert_eq!(fetched.lifecycle, Lifecycle::Stopped);
    assert!(fetched.last_action.is_none());
}

#[tokio::test]
async fn get_missing_returns_none() {
    let repo = repo().await;
    assert!(repo.get_by_id("missing").await.expect("query").is_none());
}

#[tokio::test]
async fn update_to_running_stamps_start_time() {
    let repo = repo().await;
    let session = new_session("s");
    repo.create(&session).await.expect("create");

    let updated = repo
        .update_status(&session.id, &StatusUpdate::started("u-op"))
        .await
        .expect("update");
    assert_eq!(updated.lifecycle, Lifecycle::Running);
    assert_eq!(updated.last_action, Some(LastAction::Started));
    assert_eq!(updated.updated_by.as_deref(), Some("u-op"));
    assert!(updated.start_time.is_some());
    assert!(updated.end_time.is_none());
    assert!(updated.updated_at >= session.updated_at);
}

#[tokio::test]
async fn update_to_stopped_stamps_end_time() {
    let repo = repo().await;
    let session = new_session("s");
    repo.create(&session).await.expect("create");
    repo.update_status(&session.id, &StatusUpdate::started("u-op"))
        .await
        .expect("start");

    let stopped = repo
        .update_status(&session.id, &StatusUpdate::stopped(None))
        .await
        .expect("stop");
    assert_eq!(stopped.lifecycle, Lifecycle::Stopped);
    assert_eq!(stopped.last_action, Some(LastAction::Stopped));
    assert!(stopped.updated_by.is_none());
    assert!(stopped.start_time.is_some());
    assert!(stopped.end_time.is_some());
}

#[tokio::test]
async fn update_missing_session_is_not_found() {
    let repo = repo().await;
    let err = repo
        .update_status("missing", &StatusUpdate::started("u"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn list_filters_by_lifecycle() {
    let repo = repo().await;
    let a = new_session("a");
    let b = new_session("b");
    repo.create(&a).await.expect("create a");
    repo.create(&b).await.expect("create b");
    repo.update_status(&b.id, &StatusUpdate::started("u"))
        .await
        .expect("start b");

    assert_eq!(repo.list(&SessionFilter::default()).await.expect("all").len(), 2);

    let running = repo.list(&SessionFilter::lifecycle(Lifecycle::Running)).await.expect("running");
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, b.id);

    let stopped = repo.list(&SessionFilter::lifecycle(Lifecycle::Stopped)).await.expect("stopped");
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].id, a.id);
}

#[tokio::test]
async fn delete_reports_whether_row_existed() {
    let repo = repo().await;
    let session = new_session("s");
    repo.create(&session).await.expect("create");

    assert!(repo.delete(&session.id).await.expect("delete"));
    assert!(!repo.delete(&session.id).await.expect("delete again"));
    assert!(repo.get_by_id(&session.id).await.expect("get").is_none());
}

#[tokio::test]
async fn list_filters_by_action_and_users() {
    let repo = repo().await;
    let a = new_session("a");
    let b = new_session("b");
    repo.create(&a).await.expect("create a");
    repo.create(&b).await.expect("create b");
    repo.update_status(&a.id, &StatusUpdate::started("u-op"))
        .await
        .expect("start a");
    repo.update_status(&b.id, &StatusUpdate::started("u-other"))
        .await
        .expect("start b");
    repo.update_status(&b.id, &StatusUpdate::restarted("u-other"))
        .await
        .expect("restart b");

    let restarted = repo
        .list(&SessionFilter {
            last_action: Some(LastAction::Restarted),
            ..SessionFilter::default()
        })
        .await
        .expect("by action");
    assert_eq!(restarted.len(), 1);
    assert_eq!(restarted[0].id, b.id);

    let by_updater = repo
        .list(&SessionFilter {
            lifecycle: Some(Lifecycle::Running),
            updated_by: Some("u-op".into()),
            ..SessionFilter::default()
        })
        .await
        .expect("by updater");
    assert_eq!(by_updater.len(), 1);
    assert_eq!(by_updater[0].id, a.id);

    let by_creator = repo
        .list(&SessionFilter {
            created_by: Some("someone-else".into()),
            ..SessionFilter::default()
        })
        .await
        .expect("by creator");
    assert!(by_creator.is_empty());
}
