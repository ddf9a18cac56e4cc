//! Exit classification and retry policy, over the public API.

use std::time::Duration;
use streamcast::engine::StreamError;
use streamcast::engine::launch::{EngineStatus, RetryPolicy, classify_exit};

#[test]
fn clean_engine_exit_ends_supervision() {
    assert!(classify_exit(EngineStatus::Exited(0), "").is_none());
}

#[test]
fn operator_interrupt_is_not_a_failure() {
    assert!(classify_exit(EngineStatus::Crashed(libc::SIGINT), "").is_none());
}

#[test]
fn network_loss_is_retried() {
    let err = classify_exit(
        EngineStatus::Exited(1),
        "ERROR: from element rtmp2sink0: Could not write to resource.\nConnection reset by peer",
    )
    .unwrap();
    assert!(err.is_transient());
    assert_eq!(err.exit_code(), 6);
}

#[test]
fn unfixable_faults_are_not_retried() {
    for stderr in [
        "ERROR: Permission denied opening /dev/video4",
        "WARNING: erroneous pipeline: no element \"nvh264enc\"",
        "ERROR: could not link videoconvert0 to x264enc0",
    ] {
        let err = classify_exit(EngineStatus::Exited(1), stderr).unwrap();
        assert!(matches!(err, StreamError::Fatal(_)), "{}", stderr);
        assert!(!err.is_transient());
    }
}

#[test]
fn default_policy_matches_field_settings() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.base_delay, Duration::from_secs(2));
    assert!(policy.max_delay >= policy.base_delay);
}
