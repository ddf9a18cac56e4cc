// Shared fixtures for integration tests

use streamcast::engine::platform::{EncoderCandidate, discover_with};
use streamcast::engine::types::{Protocol, Resolution, StreamRequest};

/// Full candidate list with exactly the named encoders verified; everything
/// else is present but failed verification.
pub fn candidates_verified(ids: &[&str]) -> Vec<EncoderCandidate> {
    let mut list = discover_with(|_| Ok(true)).expect("static discovery cannot fail");
    for candidate in &mut list {
        candidate.verified = ids.contains(&candidate.id);
    }
    list
}

/// A representative field request: UYVY capture card at 720p.
pub fn request(protocol: Protocol) -> StreamRequest {
    StreamRequest {
        device: "/dev/video4".into(),
        resolution: Resolution {
            width: 1280,
            height: 720,
        },
        pixel_format: "UYVY".into(),
        protocol,
        host: "10.1.101.210".into(),
        port: protocol.default_port(),
        stream_path: "/stream/go2/front".into(),
        bitrate_kbps: 2000,
    }
}
