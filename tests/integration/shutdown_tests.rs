//! Draining every running script at daemon shutdown.

use std::time::Duration;

use serial_test::serial;

use super::test_helpers::{wait_for_output, Fixture, WAIT};

#[tokio::test]
#[serial]
async fn shutdown_signals_every_process_and_empties_registry() {
    let fx = Fixture::new();
    let supervisor = fx
        .supervisor()
        .with_stop_grace(Some(Duration::from_millis(300)));
    let mut rx = supervisor.subscribe().await;

    supervisor
        .run_script(fx.project_path(), "sleep")
        .await
        .expect("sleep starts");
    supervisor
        .run_script(fx.project_path(), "stubborn")
        .await
        .expect("stubborn starts");
    wait_for_output(&mut rx, "stubborn", "ignoring").await;

    let watches = supervisor.shutdown().await;
    assert_eq!(watches.len(), 2);
    assert!(supervisor.registry().is_empty().await);

    for watch in watches {
        let outcome = tokio::time::timeout(WAIT, watch.wait())
            .await
            .expect("process exits after shutdown")
            .expect("outcome");
        assert_eq!(outcome.code, None);
    }
}

#[tokio::test]
#[serial]
async fn shutdown_with_nothing_running_is_noop() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();

    assert!(supervisor.shutdown().await.is_empty());
    assert!(supervisor.list_running().await.is_empty());
}
