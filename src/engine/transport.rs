//! Protocol-specific stage templates.
//!
//! UDP frames the bitstream as RTP and routes by socket address alone; RTMP
//! wraps it in FLV and lets the server route by the URL path component.

use super::pipeline::StageDescriptor;
use super::types::{Protocol, StreamRequest};

/// RTP payload type and MTU used for UDP delivery.
const RTP_PAYLOAD_TYPE: u32 = 96;
const RTP_MTU: u32 = 1400;

/// UDP socket send buffer, sized for bursty keyframe-per-frame output.
const UDP_BUFFER_SIZE: u32 = 1_048_576;

/// Payload, optional mux, and sink stages for the request's protocol.
///
/// Both sinks run with clock synchronization disabled: frames leave as they
/// are produced instead of being paced against a presentation clock.
pub fn stages_for(request: &StreamRequest, rtmp_timeout_s: u32) -> (
    StageDescriptor,
    Option<StageDescriptor>,
    StageDescriptor,
) {
    match request.protocol {
        Protocol::Udp => {
            let payload = StageDescriptor::new("rtph264pay")
                .param("config-interval", "1")
                .param("pt", RTP_PAYLOAD_TYPE.to_string())
                .param("mtu", RTP_MTU.to_string());
            let sink = StageDescriptor::new("udpsink")
                .param("host", &request.host)
                .param("port", request.port.to_string())
                .param("sync", "false")
                .param("buffer-size", UDP_BUFFER_SIZE.to_string());
            (payload, None, sink)
        }
        Protocol::Rtmp => {
            let payload = StageDescriptor::new("h264parse").param("config-interval", "1");
            let mux = StageDescriptor::new("flvmux").param("streamable", "true");
            let sink = StageDescriptor::new("rtmp2sink")
                .param("location", rtmp_url(request))
                .param("sync", "false")
                .param("timeout", rtmp_timeout_s.to_string());
            (payload, Some(mux), sink)
        }
    }
}

/// Target URL for the server-addressed protocol:
/// `rtmp://host:port/stream/path`.
pub fn rtmp_url(request: &StreamRequest) -> String {
    format!(
        "rtmp://{}:{}{}",
        request.host,
        request.port,
        request.normalized_path()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{Protocol, Resolution};

    fn request(protocol: Protocol) -> StreamRequest {
        StreamRequest {
            device: "/dev/video4".into(),
            resolution: Resolution { width: 1280, height: 720 },
            pixel_format: "UYVY".into(),
            protocol,
            host: "10.1.101.210".into(),
            port: protocol.default_port(),
            stream_path: "/stream/go2/front".into(),
            bitrate_kbps: 2000,
        }
    }

    #[test]
    fn udp_routes_by_socket_address_alone() {
        let (payload, mux, sink) = stages_for(&request(Protocol::Udp), 2);
        assert_eq!(payload.name, "rtph264pay");
        assert!(mux.is_none());
        assert_eq!(sink.name, "udpsink");
        assert_eq!(sink.get("host"), Some("10.1.101.210"));
        assert_eq!(sink.get("port"), Some("8000"));
        assert_eq!(sink.get("sync"), Some("false"));
        // The stream path never reaches a UDP sink.
        assert!(sink.params.iter().all(|(_, v)| !v.contains("go2")));
    }

    #[test]
    fn rtmp_url_carries_the_stream_path() {
        let (payload, mux, sink) = stages_for(&request(Protocol::Rtmp), 2);
        assert_eq!(payload.name, "h264parse");
        assert_eq!(mux.unwrap().name, "flvmux");
        assert_eq!(
            sink.get("location"),
            Some("rtmp://10.1.101.210:1935/stream/go2/front")
        );
        assert_eq!(sink.get("sync"), Some("false"));
    }

    #[test]
    fn rtmp_url_normalizes_missing_slash() {
        let mut req = request(Protocol::Rtmp);
        req.stream_path = "bare/path".into();
        assert_eq!(rtmp_url(&req), "rtmp://10.1.101.210:1935/bare/path");
    }
}
