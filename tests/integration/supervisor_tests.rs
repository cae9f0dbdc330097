//! Run/stop lifecycle against real child processes.

use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;

use script_commander::models::event::ScriptEvent;
use script_commander::AppError;

use super::test_helpers::{
    collect_run, exit_code, stream_text, wait_for_output, Fixture, WAIT,
};

#[tokio::test]
#[serial]
async fn run_streams_both_pipes_then_exit() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();
    let mut rx = supervisor.subscribe().await;

    supervisor
        .run_script(fx.project_path(), "build")
        .await
        .expect("run starts");

    let events = collect_run(&mut rx, "build").await;
    assert!(stream_text(&events, "stdout").contains("building"));
    assert!(stream_text(&events, "stderr").contains("deprecated option"));
    assert_eq!(exit_code(&events), Some(0));

    // Deregistration happens before the exit event is published.
    assert!(supervisor.list_running().await.is_empty());
}

#[tokio::test]
#[serial]
async fn failing_script_reports_its_code() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();
    let mut rx = supervisor.subscribe().await;

    let watch = supervisor
        .run_script(fx.project_path(), "fail")
        .await
        .expect("run starts");

    let events = collect_run(&mut rx, "fail").await;
    assert_eq!(stream_text(&events, "stderr"), "boom\n");
    assert_eq!(exit_code(&events), Some(3));

    let outcome = watch.wait().await.expect("exit observed");
    assert_eq!(outcome.code, Some(3));
    assert!(!outcome.success());
}

#[tokio::test]
#[serial]
async fn output_arrives_in_order_before_exit() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();
    let mut rx = supervisor.subscribe().await;

    supervisor
        .run_script(fx.project_path(), "lines")
        .await
        .expect("run starts");

    let events = collect_run(&mut rx, "lines").await;
    let expected: String = (1..=200).map(|i| format!("line {i}\n")).collect();
    assert_eq!(stream_text(&events, "stdout"), expected);

    let exits = events
        .iter()
        .filter(|event| matches!(event, ScriptEvent::ScriptExit(_)))
        .count();
    assert_eq!(exits, 1);
    assert!(matches!(events.last(), Some(ScriptEvent::ScriptExit(_))));
}

#[tokio::test]
#[serial]
async fn second_run_is_rejected_while_running() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();

    supervisor
        .run_script(fx.project_path(), "sleep")
        .await
        .expect("first run starts");

    let second = supervisor.run_script(fx.project_path(), "sleep").await;
    match second {
        Err(err @ AppError::AlreadyRunning(_)) => {
            assert_eq!(err.to_string(), "Script 'sleep' is already running");
        }
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
    assert_eq!(supervisor.list_running().await, vec!["sleep".to_owned()]);

    let watch = supervisor.stop_script("sleep").await.expect("stop");
    tokio::time::timeout(WAIT, watch.wait()).await.expect("exits");
}

#[tokio::test]
#[serial]
async fn concurrent_runs_spawn_exactly_once() {
    let fx = Fixture::new();
    let supervisor = Arc::new(fx.supervisor());
    let project = fx.project_path().to_path_buf();

    let attempts: Vec<_> = (0..6)
        .map(|_| {
            let supervisor = Arc::clone(&supervisor);
            let project = project.clone();
            tokio::spawn(async move { supervisor.run_script(&project, "sleep").await })
        })
        .collect();

    let mut started = Vec::new();
    let mut rejected = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(watch) => started.push(watch),
            Err(AppError::AlreadyRunning(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(started.len(), 1);
    assert_eq!(rejected, 5);
    assert_eq!(supervisor.registry().len().await, 1);

    supervisor.stop_script("sleep").await.expect("stop");
    for watch in started {
        tokio::time::timeout(WAIT, watch.wait()).await.expect("exits");
    }
}

#[tokio::test]
#[serial]
async fn stop_unknown_script_is_not_running() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();

    let result = supervisor.stop_script("dev").await;
    assert!(matches!(result, Err(AppError::NotRunning(ref name)) if name == "dev"));
}

#[tokio::test]
#[serial]
async fn stop_frees_identifier_immediately() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();
    let mut rx = supervisor.subscribe().await;

    supervisor
        .run_script(fx.project_path(), "sleep")
        .await
        .expect("first run");
    let first_run = supervisor
        .process_info("sleep")
        .await
        .expect("registered")
        .run;

    let first_exit = supervisor.stop_script("sleep").await.expect("stop");
    assert!(supervisor.list_running().await.is_empty());

    // Rerun before the first process has been reaped.
    supervisor
        .run_script(fx.project_path(), "sleep")
        .await
        .expect("rerun after stop");
    let second_run = supervisor
        .process_info("sleep")
        .await
        .expect("registered")
        .run;
    assert_ne!(first_run, second_run);

    let outcome = tokio::time::timeout(WAIT, first_exit.wait())
        .await
        .expect("first run exits")
        .expect("outcome");
    assert_eq!(outcome.code, None, "terminated by signal");

    let events = collect_run(&mut rx, "sleep").await;
    assert_eq!(events.last().map(ScriptEvent::run), Some(first_run));

    // The late exit of the first run must not evict the second.
    assert_eq!(
        supervisor.process_info("sleep").await.map(|info| info.run),
        Some(second_run)
    );

    let second_exit = supervisor.stop_script("sleep").await.expect("stop second");
    tokio::time::timeout(WAIT, second_exit.wait())
        .await
        .expect("second run exits");
}

#[tokio::test]
#[serial]
async fn stop_emits_exactly_one_exit_event() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();
    let mut rx = supervisor.subscribe().await;

    supervisor
        .run_script(fx.project_path(), "sleep")
        .await
        .expect("run starts");
    wait_for_output(&mut rx, "sleep", "started").await;

    supervisor.stop_script("sleep").await.expect("stop");
    let events = collect_run(&mut rx, "sleep").await;
    assert_eq!(exit_code(&events), None);

    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(event) = rx.try_recv() {
        assert!(
            !matches!(event, ScriptEvent::ScriptExit(_)),
            "duplicate exit event: {event:?}"
        );
    }
}

#[tokio::test]
#[serial]
async fn stubborn_script_is_force_killed_after_grace() {
    let fx = Fixture::new();
    let supervisor = fx
        .supervisor()
        .with_stop_grace(Some(Duration::from_millis(300)));
    let mut rx = supervisor.subscribe().await;

    supervisor
        .run_script(fx.project_path(), "stubborn")
        .await
        .expect("run starts");
    wait_for_output(&mut rx, "stubborn", "ignoring").await;

    let watch = supervisor.stop_script("stubborn").await.expect("stop");
    let outcome = tokio::time::timeout(WAIT, watch.wait())
        .await
        .expect("killed after grace")
        .expect("outcome");
    assert_eq!(outcome.code, None);
}

#[tokio::test]
#[serial]
async fn missing_project_directory_fails_to_spawn() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();
    let missing = fx.project_path().join("does-not-exist");

    let result = supervisor.run_script(&missing, "build").await;
    assert!(matches!(result, Err(AppError::Spawn(_))));
    assert!(supervisor.list_running().await.is_empty());
}

#[tokio::test]
#[serial]
async fn unknown_script_runs_and_fails() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();
    let mut rx = supervisor.subscribe().await;

    supervisor
        .run_script(fx.project_path(), "nope")
        .await
        .expect("package manager still starts");

    let events = collect_run(&mut rx, "nope").await;
    assert!(stream_text(&events, "stderr").contains("Missing script: nope"));
    assert_eq!(exit_code(&events), Some(1));
}
