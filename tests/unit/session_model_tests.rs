use sms_session_supervisor::models::session::{
    validate_script_name, LastAction, Lifecycle, NewProgramSession, ProgramSession, StatusUpdate,
};
use sms_session_supervisor::AppError;

fn input() -> NewProgramSession {
    NewProgramSession {
        session_name: "India Airtel".into(),
        script_name: "program.py".into(),
        country: "India".into(),
        operator: "Airtel".into(),
    }
}

#[test]
fn new_session_starts_stopped_without_last_action() {
    let session = ProgramSession::new(input(), "u1".into());
    assert_eq!(session.lifecycle, Lifecycle::Stopped);
    assert!(!session.is_running());
    assert!(session.last_action.is_none());
    assert!(session.updated_by.is_none());
    assert!(session.start_time.is_none());
    assert_eq!(session.created_by, "u1");
    assert_eq!(session.created_at, session.updated_at);
}

#[test]
fn new_sessions_get_unique_ids() {
    let a = ProgramSession::new(input(), "u1".into());
    let b = ProgramSession::new(input(), "u1".into());
    assert_ne!(a.id, b.id);
}

#[test]
fn script_reference_carries_arguments() {
    let session = ProgramSession::new(input(), "u1".into());
    let script = session.script_reference();
    assert_eq!(script.script_name, "program.py");
    assert_eq!(script.country, "India");
    assert_eq!(script.operator, "Airtel");
}

#[test]
fn status_updates_match_transitions() {
    let started = StatusUpdate::started("u1");
    assert_eq!(started.lifecycle, Lifecycle::Running);
    assert_eq!(started.last_action, LastAction::Started);
    assert_eq!(started.updated_by.as_deref(), Some("u1"));

    let stopped = StatusUpdate::stopped(None);
    assert_eq!(stopped.lifecycle, Lifecycle::Stopped);
    assert_eq!(stopped.last_action, LastAction::Stopped);
    assert!(stopped.updated_by.is_none());

    let restarted = StatusUpdate::restarted("u2");
    assert_eq!(restarted.lifecycle, Lifecycle::Running);
    assert_eq!(restarted.last_action, LastAction::Restarted);
}

#[test]
fn enums_round_trip_storage_strings() {
    for lc in [Lifecycle::Running, Lifecycle::Stopped] {
        assert_eq!(Lifecycle::parse(lc.as_str()).unwrap(), lc);
    }
    for action in [LastAction::Started, LastAction::Stopped, LastAction::Restarted] {
        assert_eq!(LastAction::parse(action.as_str()).unwrap(), action);
    }
    assert!(matches!(Lifecycle::parse("paused"), Err(AppError::Validation(_))));
}

#[test]
fn serializes_camel_case() {
    let session = ProgramSession::new(input(), "u1".into());
    let json = serde_json::to_value(&session).unwrap();
    assert_eq!(json["sessionName"], "India Airtel");
    assert_eq!(json["lifecycle"], "stopped");
    assert!(json["lastAction"].is_null());
}

#[test]
fn script_name_validation() {
    assert!(validate_script_name("program.py").is_ok());
    for bad in ["", "  ", ".", "..", "../etc/passwd", "dir/program.py", "a\\b.py"] {
        assert!(validate_script_name(bad).is_err(), "{bad:?} should be rejected");
    }
}

#[test]
fn new_session_validation_rejects_blank_fields() {
    assert!(input().validate().is_ok());

    let mut blank_country = input();
    blank_country.country = " ".into();
    assert!(matches!(blank_country.validate(), Err(AppError::Validation(m)) if m.contains("country")));

    let mut bad_script = input();
    bad_script.script_name = "../x.py".into();
    assert!(bad_script.validate().is_err());
}
