//! Snapshot tests pinning the rendered launch syntax for representative
//! host/protocol combinations. Any change here is a wire-visible change.

mod common;

use insta::assert_snapshot;
use streamcast::engine::pipeline::{BuildOptions, build};
use streamcast::engine::select::select;
use streamcast::engine::types::Protocol;

fn render(verified: &[&str], protocol: Protocol) -> String {
    let candidates = common::candidates_verified(verified);
    let chosen = select(&candidates, "UYVY").unwrap();
    build(&common::request(protocol), chosen, &BuildOptions::default())
        .unwrap()
        .render()
}

#[test]
fn snapshot_software_udp() {
    assert_snapshot!(
        render(&["x264enc"], Protocol::Udp),
        @"v4l2src device=/dev/video4 io-mode=2 do-timestamp=true ! video/x-raw,format=UYVY,width=1280,height=720 ! videoconvert ! video/x-raw,format=I420 ! x264enc bitrate=2000 key-int-max=1 speed-preset=ultrafast tune=zerolatency ! rtph264pay config-interval=1 pt=96 mtu=1400 ! udpsink host=10.1.101.210 port=8000 sync=false buffer-size=1048576"
    );
}

#[test]
fn snapshot_software_rtmp() {
    assert_snapshot!(
        render(&["x264enc"], Protocol::Rtmp),
        @"v4l2src device=/dev/video4 io-mode=2 do-timestamp=true ! video/x-raw,format=UYVY,width=1280,height=720 ! videoconvert ! video/x-raw,format=I420 ! x264enc bitrate=2000 key-int-max=1 speed-preset=ultrafast tune=zerolatency ! h264parse config-interval=1 ! flvmux streamable=true ! rtmp2sink location=rtmp://10.1.101.210:1935/stream/go2/front sync=false timeout=2"
    );
}

#[test]
fn snapshot_jetson_udp() {
    assert_snapshot!(
        render(&["nvv4l2h264enc"], Protocol::Udp),
        @"v4l2src device=/dev/video4 io-mode=2 do-timestamp=true ! video/x-raw,format=UYVY,width=1280,height=720 ! videoconvert ! video/x-raw,format=NV12 ! nvvidconv ! video/x-raw(memory:NVMM),format=NV12 ! nvv4l2h264enc bitrate=2000000 iframeinterval=1 insert-sps-pps=true insert-vui=true maxperf-enable=true ! rtph264pay config-interval=1 pt=96 mtu=1400 ! udpsink host=10.1.101.210 port=8000 sync=false buffer-size=1048576"
    );
}

#[test]
fn snapshot_vaapi_rtmp() {
    assert_snapshot!(
        render(&["vaapih264enc"], Protocol::Rtmp),
        @"v4l2src device=/dev/video4 io-mode=2 do-timestamp=true ! video/x-raw,format=UYVY,width=1280,height=720 ! videoconvert ! video/x-raw,format=NV12 ! vaapipostproc ! video/x-raw,format=NV12 ! vaapih264enc bitrate=2000 keyframe-period=1 tune=low-latency ! h264parse config-interval=1 ! flvmux streamable=true ! rtmp2sink location=rtmp://10.1.101.210:1935/stream/go2/front sync=false timeout=2"
    );
}
