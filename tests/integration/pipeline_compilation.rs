//! Request-to-pipeline compilation over the public API.

use crate::common;
use streamcast::engine::StreamError;
use streamcast::engine::pipeline::{BuildOptions, build};
use streamcast::engine::select::select;
use streamcast::engine::types::Protocol;

#[test]
fn uyvy_udp_on_software_compiles_the_expected_stages() {
    // Capture card delivering UYVY, only software encoding available, UDP
    // point-to-point delivery.
    let candidates = common::candidates_verified(&["x264enc"]);
    let chosen = select(&candidates, "UYVY").unwrap();
    let spec = build(&common::request(Protocol::Udp), chosen, &BuildOptions::default()).unwrap();

    let names: Vec<&str> = spec.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        ["v4l2src", "videoconvert", "x264enc", "rtph264pay", "udpsink"]
    );

    // Numeric parameters survive compilation exactly.
    assert_eq!(spec.stage("x264enc").unwrap().get("bitrate"), Some("2000"));
    assert_eq!(spec.stage("x264enc").unwrap().get("key-int-max"), Some("1"));
    assert_eq!(spec.stage("udpsink").unwrap().get("port"), Some("8000"));
}

#[test]
fn rtmp_delivery_addresses_the_server_by_url() {
    let candidates = common::candidates_verified(&["x264enc"]);
    let chosen = select(&candidates, "UYVY").unwrap();
    let spec = build(&common::request(Protocol::Rtmp), chosen, &BuildOptions::default()).unwrap();

    assert_eq!(
        spec.stage("rtmp2sink").unwrap().get("location"),
        Some("rtmp://10.1.101.210:1935/stream/go2/front")
    );
    assert!(spec.stage("flvmux").is_some());
    // UDP-only stages never leak into RTMP pipelines.
    assert!(spec.stage("udpsink").is_none());
    assert!(spec.stage("rtph264pay").is_none());
}

#[test]
fn selection_and_compilation_agree_on_conversion() {
    // NV12-only hardware with an NV12 request: no CPU conversion stage.
    let candidates = common::candidates_verified(&["vaapih264enc"]);
    let chosen = select(&candidates, "NV12").unwrap();
    let mut request = common::request(Protocol::Udp);
    request.pixel_format = "NV12".into();

    let spec = build(&request, chosen, &BuildOptions::default()).unwrap();
    assert!(spec.stage("videoconvert").is_none());
    assert!(spec.stage("vaapipostproc").is_some());
}

#[test]
fn compressed_source_format_is_rejected() {
    // MJPG is not raw video; there is no conversion path to the encoder.
    let candidates = common::candidates_verified(&["x264enc"]);
    let chosen = select(&candidates, "MJPG").unwrap();
    let mut request = common::request(Protocol::Udp);
    request.pixel_format = "MJPG".into();

    let err = build(&request, chosen, &BuildOptions::default()).unwrap_err();
    assert!(matches!(err, StreamError::IncompatibleFormat { .. }));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn identical_requests_render_identically() {
    let candidates = common::candidates_verified(&["nvv4l2h264enc"]);
    let chosen = select(&candidates, "UYVY").unwrap();
    let request = common::request(Protocol::Rtmp);

    let a = build(&request, chosen, &BuildOptions::default()).unwrap();
    let b = build(&request, chosen, &BuildOptions::default()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.render(), b.render());
}
