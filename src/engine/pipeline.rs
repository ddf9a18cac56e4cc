//! Pipeline specification compiler.
//!
//! `build` deterministically turns a stream request and one verified encoder
//! candidate into an ordered stage graph. Identical inputs always yield
//! byte-identical stage descriptors: parameter order is insertion order and
//! no unordered containers are involved.

use serde::Serialize;

use super::catalog::{BitrateStyle, EncoderEntry, entry_for, is_known_raw_format};
use super::error::{Result, StreamError};
use super::platform::EncoderCandidate;
use super::transport;
use super::types::StreamRequest;

/// One named, parameterized processing step. Data flows stage *i* -> *i+1*.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDescriptor {
    /// Engine element name.
    pub name: String,
    /// Ordered key/value properties. The reserved key `caps` renders as a
    /// trailing capability filter instead of a property assignment.
    pub params: Vec<(String, String)>,
}

impl StageDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: Vec::new() }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Launch-syntax fragment for this stage.
    fn render(&self) -> String {
        let mut out = self.name.clone();
        let mut caps = None;
        for (key, value) in &self.params {
            if key == "caps" {
                caps = Some(value);
            } else {
                out.push_str(&format!(" {}={}", key, value));
            }
        }
        if let Some(caps) = caps {
            out.push_str(&format!(" ! {}", caps));
        }
        out
    }
}

/// Complete ordered stage graph from source to sink, independent of any
/// execution. Rebuilt per invocation, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSpec {
    pub stages: Vec<StageDescriptor>,
}

impl PipelineSpec {
    /// Render to gst-launch syntax.
    pub fn render(&self) -> String {
        self.stages
            .iter()
            .map(StageDescriptor::render)
            .collect::<Vec<_>>()
            .join(" ! ")
    }

    /// Human-readable stage list for logging and dry runs.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, stage) in self.stages.iter().enumerate() {
            out.push_str(&format!("  {}. {}", i + 1, stage.name));
            for (key, value) in &stage.params {
                out.push_str(&format!(" {}={}", key, value));
            }
            out.push('\n');
        }
        out
    }

    pub fn stage(&self, name: &str) -> Option<&StageDescriptor> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// Encoder tuning knobs that do not come from the request itself.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// RTMP connection timeout in seconds.
    pub rtmp_timeout_s: u32,
    /// Extra encoder properties appended verbatim (key=value pairs), parsed
    /// from the config's free-form string.
    pub extra_encoder_props: Vec<(String, String)>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { rtmp_timeout_s: 2, extra_encoder_props: Vec::new() }
    }
}

/// Every frame is independently decodable. Minimum latency at the cost of
/// compression efficiency.
const KEYFRAME_INTERVAL: u32 = 1;

/// Compile `request` + `candidate` into a pipeline specification.
///
/// Only a verified candidate is buildable; passing an unverified one is a
/// caller bug and surfaces as a fatal error rather than a broken pipeline.
pub fn build(
    request: &StreamRequest,
    candidate: &EncoderCandidate,
    options: &BuildOptions,
) -> Result<PipelineSpec> {
    if !candidate.verified {
        return Err(StreamError::Fatal(format!(
            "pipeline requested for unverified encoder '{}'",
            candidate.id
        )));
    }
    let Some(entry) = entry_for(candidate.id) else {
        return Err(StreamError::Fatal(format!(
            "encoder '{}' is not in the policy table",
            candidate.id
        )));
    };

    let needs_conversion = !candidate.accepts(&request.pixel_format);
    if needs_conversion && !is_known_raw_format(&request.pixel_format) {
        return Err(StreamError::IncompatibleFormat {
            requested: request.pixel_format.clone(),
            accepted: candidate.accepted_formats.iter().map(|s| s.to_string()).collect(),
        });
    }

    let mut stages = Vec::with_capacity(7);

    // 1. Source, with format and geometry negotiated right at the device.
    stages.push(
        StageDescriptor::new("v4l2src")
            .param("device", request.device.display().to_string())
            .param("io-mode", "2")
            .param("do-timestamp", "true")
            .param(
                "caps",
                format!(
                    "video/x-raw,format={},width={},height={}",
                    request.pixel_format, request.resolution.width, request.resolution.height
                ),
            ),
    );

    // 2. Format conversion towards the encoder's preferred input.
    if needs_conversion {
        let target = entry.accepted_formats[0];
        stages.push(
            StageDescriptor::new(entry.convert_element)
                .param("caps", format!("video/x-raw,format={}", target)),
        );
    }

    // 3. Memory-domain upload for device-resident encoders.
    if let Some(upload) = entry.upload {
        stages.push(StageDescriptor::new(upload.element).param("caps", upload.caps));
    }

    // 4. Encoder.
    stages.push(encoder_stage(entry, request.bitrate_kbps, options));

    // 5-7. Payload, optional mux, sink.
    let (payload, mux, sink) = transport::stages_for(request, options.rtmp_timeout_s);
    stages.push(payload);
    if let Some(mux) = mux {
        stages.push(mux);
    }
    stages.push(sink);

    Ok(PipelineSpec { stages })
}

fn encoder_stage(entry: &EncoderEntry, bitrate_kbps: u32, options: &BuildOptions) -> StageDescriptor {
    let mut stage = StageDescriptor::new(entry.element);

    match entry.bitrate {
        BitrateStyle::Bps(prop) => {
            stage = stage.param(prop, (bitrate_kbps as u64 * 1000).to_string());
        }
        BitrateStyle::Kbps(prop) => {
            stage = stage.param(prop, bitrate_kbps.to_string());
        }
        BitrateStyle::ExtraControls => {
            stage = stage.param(
                "extra-controls",
                format!("controls,video_bitrate={}", bitrate_kbps as u64 * 1000),
            );
        }
    }

    stage = stage.param(entry.keyint_prop, KEYFRAME_INTERVAL.to_string());

    for (key, value) in entry.static_props {
        stage = stage.param(*key, *value);
    }
    for (key, value) in entry.low_latency_props {
        stage = stage.param(*key, *value);
    }
    for (key, value) in &options.extra_encoder_props {
        stage = stage.param(key.clone(), value.clone());
    }

    stage
}
