use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Wire protocol towards the media server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Point-to-point RTP over UDP; routing is by socket address alone.
    Udp,
    /// Server-addressed streaming; the server routes by stream path.
    Rtmp,
}

impl Protocol {
    /// Conventional MediaMTX ports per protocol, used to auto-correct a
    /// port that obviously belongs to the other protocol.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Udp => 8000,
            Protocol::Rtmp => 1935,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => write!(f, "udp"),
            Protocol::Rtmp => write!(f, "rtmp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w.trim().parse().map_err(|_| format!("bad width '{}'", w))?;
        let height = h.trim().parse().map_err(|_| format!("bad height '{}'", h))?;
        if width == 0 || height == 0 {
            return Err(format!("resolution must be non-zero, got '{}'", s));
        }
        Ok(Resolution { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Immutable input to the pipeline builder; one per stream invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub device: PathBuf,
    pub resolution: Resolution,
    /// Raw pixel format delivered by the source (fourcc-style name).
    pub pixel_format: String,
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    /// Server-side routing path; only transmitted for RTMP.
    pub stream_path: String,
    /// Target bitrate in kbit/s.
    pub bitrate_kbps: u32,
}

impl StreamRequest {
    /// Stream path with a guaranteed leading slash, as the server expects.
    pub fn normalized_path(&self) -> String {
        if self.stream_path.starts_with('/') {
            self.stream_path.clone()
        } else {
            format!("/{}", self.stream_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parses_widthxheight() {
        let r: Resolution = "1280x720".parse().unwrap();
        assert_eq!(r, Resolution { width: 1280, height: 720 });
        assert_eq!(r.to_string(), "1280x720");
    }

    #[test]
    fn resolution_rejects_garbage() {
        assert!("1280".parse::<Resolution>().is_err());
        assert!("x720".parse::<Resolution>().is_err());
        assert!("0x720".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
    }

    #[test]
    fn path_normalization_adds_leading_slash() {
        let mut req = StreamRequest {
            device: "/dev/video0".into(),
            resolution: "640x480".parse().unwrap(),
            pixel_format: "UYVY".into(),
            protocol: Protocol::Rtmp,
            host: "127.0.0.1".into(),
            port: 1935,
            stream_path: "stream/go2/front".into(),
            bitrate_kbps: 2000,
        };
        assert_eq!(req.normalized_path(), "/stream/go2/front");
        req.stream_path = "/already".into();
        assert_eq!(req.normalized_path(), "/already");
    }
}
