//! Declarative encoder policy table.
//!
//! Adding a new hardware class is a data edit here, not new control flow:
//! selection, verification and pipeline building all consume this table.

use serde::Serialize;

/// Priority class of an encoder implementation, highest first.
///
/// The ordering is fixed for the lifetime of the process. Two scripts in the
/// field disagreed on the exact order; this table is the canonical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// SoC-integrated hardware (Jetson and friends).
    SocHardware,
    /// Discrete-GPU hardware encoder (NVENC).
    DiscreteGpu,
    /// Platform video-acceleration API (VA-API).
    PlatformAccel,
    /// Generic kernel-device hardware encoder (V4L2 M2M).
    KernelDevice,
    /// Software encoder, the guaranteed last resort when present.
    Software,
}

impl Tier {
    pub const ORDERED: [Tier; 5] = [
        Tier::SocHardware,
        Tier::DiscreteGpu,
        Tier::PlatformAccel,
        Tier::KernelDevice,
        Tier::Software,
    ];

    /// Hardware tiers encode from device-resident buffers and need an upload
    /// stage in front of the encoder.
    pub fn needs_device_memory(self) -> bool {
        matches!(
            self,
            Tier::SocHardware | Tier::DiscreteGpu | Tier::PlatformAccel
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::SocHardware => "SoC hardware",
            Tier::DiscreteGpu => "discrete GPU",
            Tier::PlatformAccel => "VA-API",
            Tier::KernelDevice => "V4L2 kernel device",
            Tier::Software => "software",
        }
    }
}

/// How an encoder element expects its target bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitrateStyle {
    /// Property takes bits per second.
    Bps(&'static str),
    /// Property takes kilobits per second.
    Kbps(&'static str),
    /// No direct property; bitrate goes through the V4L2 extra-controls
    /// string as `video_bitrate` (bits per second).
    ExtraControls,
}

/// Memory-domain bridge placed in front of a hardware encoder.
#[derive(Debug, Clone, Copy)]
pub struct UploadStage {
    pub element: &'static str,
    pub caps: &'static str,
}

/// One row of the encoder policy table.
#[derive(Debug, Clone, Copy)]
pub struct EncoderEntry {
    /// GStreamer element name, also the candidate id.
    pub element: &'static str,
    pub tier: Tier,
    /// Raw input formats the encoder accepts, preferred first. The first
    /// entry is the conversion target when the request format mismatches.
    pub accepted_formats: &'static [&'static str],
    /// CPU-side converter used when the request format is not accepted.
    pub convert_element: &'static str,
    /// Device-memory bridge, for tiers that encode from device buffers.
    pub upload: Option<UploadStage>,
    pub bitrate: BitrateStyle,
    /// Property carrying the keyframe interval.
    pub keyint_prop: &'static str,
    /// Fixed properties always applied to the encoder stage.
    pub static_props: &'static [(&'static str, &'static str)],
    /// Low-latency / zero-buffering tuning, applied when non-empty.
    pub low_latency_props: &'static [(&'static str, &'static str)],
    /// Candidates naming the same resource contend for one exclusive
    /// hardware unit; their verification runs are serialized.
    pub exclusive_resource: Option<&'static str>,
    pub label: &'static str,
}

/// The policy table, in tier-priority order (highest first). Discovery
/// enumerates exactly these elements; nothing is invented at runtime.
pub const ENCODER_CATALOG: &[EncoderEntry] = &[
    EncoderEntry {
        element: "nvv4l2h264enc",
        tier: Tier::SocHardware,
        accepted_formats: &["NV12"],
        convert_element: "videoconvert",
        upload: Some(UploadStage {
            element: "nvvidconv",
            caps: "video/x-raw(memory:NVMM),format=NV12",
        }),
        bitrate: BitrateStyle::Bps("bitrate"),
        keyint_prop: "iframeinterval",
        static_props: &[("insert-sps-pps", "true"), ("insert-vui", "true")],
        low_latency_props: &[("maxperf-enable", "true")],
        exclusive_resource: Some("v4l2-encode-unit"),
        label: "Jetson hardware encoder",
    },
    EncoderEntry {
        element: "nvh264enc",
        tier: Tier::DiscreteGpu,
        accepted_formats: &["NV12", "I420", "YV12"],
        convert_element: "videoconvert",
        // NVENC uploads to CUDA memory internally; no explicit bridge.
        upload: None,
        bitrate: BitrateStyle::Kbps("bitrate"),
        keyint_prop: "gop-size",
        static_props: &[],
        low_latency_props: &[("zerolatency", "true")],
        exclusive_resource: Some("nvenc"),
        label: "NVIDIA GPU encoder",
    },
    EncoderEntry {
        element: "vaapih264enc",
        tier: Tier::PlatformAccel,
        accepted_formats: &["NV12"],
        convert_element: "videoconvert",
        upload: Some(UploadStage {
            element: "vaapipostproc",
            caps: "video/x-raw,format=NV12",
        }),
        bitrate: BitrateStyle::Kbps("bitrate"),
        keyint_prop: "keyframe-period",
        static_props: &[],
        low_latency_props: &[("tune", "low-latency")],
        exclusive_resource: Some("vaapi-render-node"),
        label: "VAAPI hardware encoder",
    },
    EncoderEntry {
        element: "v4l2h264enc",
        tier: Tier::KernelDevice,
        accepted_formats: &["I420", "NV12"],
        convert_element: "videoconvert",
        upload: None,
        bitrate: BitrateStyle::ExtraControls,
        keyint_prop: "keyframe-interval",
        static_props: &[],
        low_latency_props: &[],
        exclusive_resource: Some("v4l2-encode-unit"),
        label: "V4L2 hardware encoder",
    },
    EncoderEntry {
        element: "x264enc",
        tier: Tier::Software,
        accepted_formats: &["I420", "YV12", "NV12"],
        convert_element: "videoconvert",
        upload: None,
        bitrate: BitrateStyle::Kbps("bitrate"),
        keyint_prop: "key-int-max",
        static_props: &[("speed-preset", "ultrafast")],
        low_latency_props: &[("tune", "zerolatency")],
        exclusive_resource: None,
        label: "software encoder",
    },
];

/// Raw video formats videoconvert can translate between. A request format
/// outside this list has no known conversion path.
pub const RAW_FORMATS: &[&str] = &[
    "I420", "YV12", "NV12", "NV21", "UYVY", "YUY2", "YVYU", "RGB", "BGR", "RGBx", "BGRx", "GRAY8",
];

pub fn entry_for(element: &str) -> Option<&'static EncoderEntry> {
    ENCODER_CATALOG.iter().find(|e| e.element == element)
}

pub fn is_known_raw_format(format: &str) -> bool {
    RAW_FORMATS.contains(&format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_tier_once() {
        for tier in Tier::ORDERED {
            let count = ENCODER_CATALOG.iter().filter(|e| e.tier == tier).count();
            assert_eq!(count, 1, "tier {:?} must appear exactly once", tier);
        }
    }

    #[test]
    fn catalog_is_in_tier_priority_order() {
        let tiers: Vec<Tier> = ENCODER_CATALOG.iter().map(|e| e.tier).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
        assert_eq!(*tiers.last().unwrap(), Tier::Software);
    }

    #[test]
    fn accepted_formats_are_known_raw_formats() {
        for entry in ENCODER_CATALOG {
            assert!(!entry.accepted_formats.is_empty(), "{}", entry.element);
            for fmt in entry.accepted_formats {
                assert!(is_known_raw_format(fmt), "{} accepts unknown {}", entry.element, fmt);
            }
        }
    }

    #[test]
    fn hardware_tiers_without_internal_upload_declare_a_bridge() {
        for entry in ENCODER_CATALOG {
            if !entry.tier.needs_device_memory() {
                assert!(entry.upload.is_none(), "{}", entry.element);
            }
        }
    }

    #[test]
    fn entry_lookup() {
        assert!(entry_for("x264enc").is_some());
        assert!(entry_for("qoi-enc").is_none());
    }
}
