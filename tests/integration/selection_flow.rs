//! Discovery -> verification -> selection, end to end over the public API.

use crate::common;
use streamcast::engine::StreamError;
use streamcast::engine::catalog::Tier;
use streamcast::engine::platform::discover_with;
use streamcast::engine::select::select;

#[test]
fn degraded_host_falls_back_to_software() {
    // Hardware plugins installed but broken: only x264enc verifies.
    let candidates = common::candidates_verified(&["x264enc"]);
    let chosen = select(&candidates, "UYVY").unwrap();
    assert_eq!(chosen.id, "x264enc");
    assert_eq!(chosen.tier, Tier::Software);
}

#[test]
fn jetson_host_prefers_soc_hardware() {
    let candidates = common::candidates_verified(&["nvv4l2h264enc", "v4l2h264enc", "x264enc"]);
    assert_eq!(select(&candidates, "NV12").unwrap().id, "nvv4l2h264enc");
}

#[test]
fn present_but_unverified_hardware_is_skipped() {
    // The Jetson encoder element exists in the registry but its verification
    // run failed; selection must not trust presence.
    let candidates = common::candidates_verified(&["x264enc"]);
    let soc = candidates.iter().find(|c| c.id == "nvv4l2h264enc").unwrap();
    assert!(soc.present);
    assert!(!soc.verified);

    assert_eq!(select(&candidates, "NV12").unwrap().id, "x264enc");
}

#[test]
fn no_verified_encoder_is_a_distinct_failure() {
    let candidates = common::candidates_verified(&[]);
    let err = select(&candidates, "UYVY").unwrap_err();
    assert!(matches!(err, StreamError::NoEncoderAvailable));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn registry_failure_aborts_discovery() {
    let err = discover_with(|_| Err(StreamError::Environment("registry unreachable".into())))
        .unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
