//! Dependency installation: awaited, streamed under `install`, untracked.

use serial_test::serial;

use script_commander::models::event::ScriptEvent;
use script_commander::supervisor::INSTALL_IDENTIFIER;

use super::test_helpers::{stream_text, Fixture};

fn drain(rx: &mut script_commander::supervisor::Subscription) -> Vec<ScriptEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
#[serial]
async fn successful_install_streams_output_and_creates_modules() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();
    let mut rx = supervisor.subscribe().await;

    let outcome = supervisor
        .install_dependencies(fx.project_path())
        .await
        .expect("installer starts");

    assert!(outcome.success);
    assert_eq!(outcome.code, Some(0));
    assert!(fx.project_path().join("node_modules").is_dir());

    // All output is published before install_dependencies returns.
    let events = drain(&mut rx);
    assert!(events.iter().all(|e| e.identifier() == INSTALL_IDENTIFIER));
    assert!(stream_text(&events, "stdout").contains("added 1 package"));
    assert!(
        !events.iter().any(|e| matches!(e, ScriptEvent::ScriptExit(_))),
        "install must not emit an exit event"
    );
    assert!(supervisor.list_running().await.is_empty());
}

#[tokio::test]
#[serial]
async fn failing_install_reports_failure_and_stderr() {
    let fx = Fixture::new();
    std::fs::write(fx.project_path().join("fail-install"), "").expect("marker");
    let supervisor = fx.supervisor();
    let mut rx = supervisor.subscribe().await;

    let outcome = supervisor
        .install_dependencies(fx.project_path())
        .await
        .expect("installer starts");

    assert!(!outcome.success);
    assert_eq!(outcome.code, Some(1));

    let events = drain(&mut rx);
    assert!(stream_text(&events, "stderr").contains("could not resolve dependency"));
}

#[tokio::test]
#[serial]
async fn concurrent_installs_are_allowed() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor();

    let (install, rerun) = tokio::join!(
        supervisor.install_dependencies(fx.project_path()),
        supervisor.install_dependencies(fx.project_path()),
    );

    assert!(install.expect("first install").success);
    assert!(rerun.expect("second install").success);
}

#[tokio::test]
#[serial]
async fn missing_package_manager_is_spawn_error_without_output() {
    let fx = Fixture::new();
    let supervisor = script_commander::supervisor::Supervisor::new(
        script_commander::supervisor::CommandBuilder::new("no-such-pm", fx.shell_env()),
    );
    let mut rx = supervisor.subscribe().await;

    let result = supervisor.install_dependencies(fx.project_path()).await;
    assert!(matches!(
        result,
        Err(script_commander::AppError::Spawn(ref msg)) if msg.contains("cannot find 'no-such-pm'")
    ));
    assert!(drain(&mut rx).is_empty());
}
