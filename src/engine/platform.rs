//! Host identity and raw encoder-plugin presence.
//!
//! Presence is a pure registry check (`gst-inspect-1.0 --exists`); no encode
//! is ever executed here. Functional verification lives in `verify`.

use serde::Serialize;
use std::fs;
use std::process::Command;
use tracing::debug;

use super::catalog::{ENCODER_CATALOG, Tier};
use super::error::{Result, StreamError};
use super::verify::VerificationError;

/// Detected GPU vendor, a hint only; selection trusts verification, not this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuVendor {
    #[default]
    Unknown,
    Nvidia,
    Intel,
    Amd,
}

/// Immutable host identity, computed once per run.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformProfile {
    /// Kernel release string.
    pub kernel: String,
    /// OS pretty name from os-release, when readable.
    pub os: Option<String>,
    /// Device-tree model string, present on SoC boards (Jetson, Pi).
    pub model: Option<String>,
    pub gpu: GpuVendor,
}

/// A specific encoder implementation considered during selection.
///
/// Created by discovery; `verified`/`verification_error` are set once by the
/// capability verifier and never mutated afterward.
#[derive(Debug, Clone, Serialize)]
pub struct EncoderCandidate {
    pub id: &'static str,
    pub tier: Tier,
    pub accepted_formats: &'static [&'static str],
    pub present: bool,
    pub verified: bool,
    pub verification_error: Option<VerificationError>,
}

impl EncoderCandidate {
    pub fn accepts(&self, format: &str) -> bool {
        self.accepted_formats.contains(&format)
    }
}

/// Compute the host identity. Never fails; every field degrades to a
/// best-effort value.
pub fn platform_profile() -> PlatformProfile {
    let kernel = fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let os = fs::read_to_string("/etc/os-release").ok().and_then(|body| {
        body.lines()
            .find_map(|l| l.strip_prefix("PRETTY_NAME=").map(|v| v.trim_matches('"').to_string()))
    });

    // Device-tree model strings are NUL-terminated.
    let model = fs::read_to_string("/proc/device-tree/model")
        .ok()
        .map(|s| s.trim_end_matches('\0').trim().to_string())
        .filter(|s| !s.is_empty());

    PlatformProfile {
        kernel,
        os,
        model,
        gpu: detect_gpu_vendor(),
    }
}

/// Enumerate every encoder in the policy table and mark presence.
///
/// Fails with `Environment` only if the engine registry itself cannot be
/// queried; an individual absent element is a normal `present = false`.
pub fn discover() -> Result<(PlatformProfile, Vec<EncoderCandidate>)> {
    let profile = platform_profile();
    let candidates = discover_with(element_exists)?;
    Ok((profile, candidates))
}

/// Discovery against an injectable presence probe, for tests and dry runs.
pub fn discover_with(
    mut probe: impl FnMut(&str) -> Result<bool>,
) -> Result<Vec<EncoderCandidate>> {
    let mut candidates = Vec::with_capacity(ENCODER_CATALOG.len());
    for entry in ENCODER_CATALOG {
        let present = probe(entry.element)?;
        debug!(element = entry.element, present, "probed encoder element");
        candidates.push(EncoderCandidate {
            id: entry.element,
            tier: entry.tier,
            accepted_formats: entry.accepted_formats,
            present,
            verified: false,
            verification_error: None,
        });
    }
    Ok(candidates)
}

/// Registry presence check via `gst-inspect-1.0 --exists`.
fn element_exists(element: &str) -> Result<bool> {
    let status = Command::new("gst-inspect-1.0")
        .args(["--exists", element])
        .status()
        .map_err(|e| {
            StreamError::Environment(format!("cannot run gst-inspect-1.0: {}", e))
        })?;
    Ok(status.success())
}

/// Detect the primary GPU vendor. nvidia-smi first (most specific), then
/// lspci for the rest.
fn detect_gpu_vendor() -> GpuVendor {
    if nvidia_smi_reports_gpu() {
        return GpuVendor::Nvidia;
    }

    let Ok(output) = Command::new("lspci").output() else {
        return GpuVendor::Unknown;
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        let lower = line.to_lowercase();
        if !(lower.contains("vga") || lower.contains("display") || lower.contains("3d")) {
            continue;
        }
        if lower.contains("nvidia") {
            return GpuVendor::Nvidia;
        }
        if lower.contains("intel") {
            return GpuVendor::Intel;
        }
        if lower.contains("amd") || lower.contains("radeon") {
            return GpuVendor::Amd;
        }
    }
    GpuVendor::Unknown
}

fn nvidia_smi_reports_gpu() -> bool {
    Command::new("nvidia-smi")
        .args(["--query-gpu=name", "--format=csv,noheader"])
        .output()
        .map(|o| o.status.success() && !o.stdout.is_empty())
        .unwrap_or(false)
}
