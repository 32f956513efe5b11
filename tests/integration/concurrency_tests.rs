//! Per-session serialization of lifecycle transitions.

use std::sync::Arc;

use sms_session_supervisor::models::session::Lifecycle;
use sms_session_supervisor::AppError;

use super::test_helpers::Harness;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_launch_exactly_once() {
    let h = Harness::new().await;
    let session = h.seed_stopped().await;

    let first = {
        let supervisor = Arc::clone(&h.supervisor);
        let id = session.id.clone();
        tokio::spawn(async move { supervisor.run(&id, "u-1").await })
    };
    let second = {
        let supervisor = Arc::clone(&h.supervisor);
        let id = session.id.clone();
        tokio::spawn(async move { supervisor.run(&id, "u-2").await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::AlreadyRunning(_))))
        .count();

    assert_eq!(ok, 1);
    assert_eq!(rejected, 1);
    assert_eq!(h.control.launch_count(), 1);
    assert_eq!(h.control.container_names().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stops_terminate_exactly_once() {
    let h = Harness::new().await;
    let session = h.seed_running().await;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let supervisor = Arc::clone(&h.supervisor);
        let id = session.id.clone();
        tasks.push(tokio::spawn(async move { supervisor.stop(&id, "u-op").await }));
    }

    let mut ok = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(err) => assert!(matches!(err, AppError::AlreadyStopped(_)), "{err}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(h.control.terminations().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_racing_stop_ends_consistent() {
    let h = Harness::new().await;
    let session = h.seed_stopped().await;

    let run = {
        let supervisor = Arc::clone(&h.supervisor);
        let id = session.id.clone();
        tokio::spawn(async move { supervisor.run(&id, "u-1").await })
    };
    let stop = {
        let supervisor = Arc::clone(&h.supervisor);
        let id = session.id.clone();
        tokio::spawn(async move { supervisor.stop(&id, "u-2").await })
    };
    run.await.unwrap().expect("run always succeeds");
    let stop_result = stop.await.unwrap();

    let stored = h.repo.get_by_id(&session.id).await.unwrap().unwrap();
    let registered = h.supervisor.registry().contains(&session.id).await;
    match stop_result {
        Ok(_) => {
            assert_eq!(stored.lifecycle, Lifecycle::Stopped);
            assert!(!registered);
            assert!(h.control.container_names().is_empty());
        }
        Err(err) => {
            assert!(matches!(err, AppError::AlreadyStopped(_)));
            assert_eq!(stored.lifecycle, Lifecycle::Running);
            assert!(registered);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_sessions_run_in_parallel() {
    let h = Harness::new().await;
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(h.seed_stopped().await.id);
    }

    let mut tasks = Vec::new();
    for id in &ids {
        let supervisor = Arc::clone(&h.supervisor);
        let id = id.clone();
        tasks.push(tokio::spawn(async move { supervisor.run(&id, "u-op").await }));
    }
    for task in tasks {
        task.await.unwrap().expect("run");
    }

    assert_eq!(h.control.launch_count(), ids.len());
    assert_eq!(h.supervisor.registry().len().await, ids.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_racing_run_never_orphans_a_process() {
    let h = Harness::new().await;

    for _ in 0..20 {
        let session = h.seed_stopped().await;
        let run = {
            let supervisor = Arc::clone(&h.supervisor);
            let id = session.id.clone();
            tokio::spawn(async move { supervisor.run(&id, "u-op").await })
        };
        let remove = {
            let supervisor = Arc::clone(&h.supervisor);
            let id = session.id.clone();
            tokio::spawn(async move { supervisor.remove_session(&id).await })
        };

        remove.await.unwrap().expect("remove always finds the record");
        match run.await.unwrap() {
            Ok(_) | Err(AppError::NotFound(_)) => {}
            Err(err) => panic!("unexpected run error: {err}"),
        }

        assert!(h.repo.get_by_id(&session.id).await.unwrap().is_none());
        assert!(
            !h.control.container_names().contains(&session.id),
            "container left behind for deleted session {}",
            session.id
        );
        assert!(!h.supervisor.registry().contains(&session.id).await);
    }
}

#[tokio::test]
async fn unknown_session_ids_do_not_accumulate_locks() {
    let h = Harness::new().await;
    for i in 0..50 {
        let err = h
            .supervisor
            .run(&format!("missing-{i}"), "u-op")
            .await
            .expect_err("not found");
        assert!(matches!(err, AppError::NotFound(_)));
    }
    assert!(h.supervisor.registry().lock_count().await <= 1);
}
