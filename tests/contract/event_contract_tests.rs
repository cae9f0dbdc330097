//! Wire shape of events and snapshots delivered to UI clients.

use bytes::Bytes;
use script_commander::models::event::{ExitEvent, OutputEvent, ScriptEvent, StreamKind};
use script_commander::models::process::{ExitOutcome, InstallOutcome};

#[test]
fn output_event_json_shape() {
    let event = ScriptEvent::ScriptOutput(OutputEvent {
        identifier: "build".into(),
        run: 7,
        stream: StreamKind::Stderr,
        payload: Bytes::from_static(b"warning\n"),
    });

    let value = serde_json::to_value(&event).expect("serialises");
    assert_eq!(
        value,
        serde_json::json!({
            "event": "script-output",
            "script": "build",
            "run": 7,
            "type": "stderr",
            "data": "warning\n",
        })
    );
}

#[test]
fn exit_event_with_signal_has_null_code() {
    let event = ScriptEvent::ScriptExit(ExitEvent {
        identifier: "dev".into(),
        run: 2,
        code: None,
    });

    let value = serde_json::to_value(&event).expect("serialises");
    assert_eq!(value["event"], "script-exit");
    assert_eq!(value["script"], "dev");
    assert!(value["code"].is_null());
    assert_eq!(event.identifier(), "dev");
    assert_eq!(event.run(), 2);
}

#[test]
fn invalid_utf8_is_replaced_not_dropped() {
    let event = OutputEvent {
        identifier: "dev".into(),
        run: 1,
        stream: StreamKind::Stdout,
        payload: Bytes::from_static(b"ok \xff done"),
    };

    assert_eq!(event.text(), "ok \u{fffd} done");
    let value = serde_json::to_value(&event).expect("serialises");
    assert_eq!(value["data"], "ok \u{fffd} done");
}

#[test]
fn install_outcome_follows_exit_code() {
    assert!(InstallOutcome::from(ExitOutcome { code: Some(0) }).success);
    assert!(!InstallOutcome::from(ExitOutcome { code: Some(1) }).success);
    assert!(!InstallOutcome::from(ExitOutcome { code: None }).success);
}
