//! Capture device enumeration via `v4l2-ctl`.
//!
//! Enumeration is best-effort: a device that refuses to answer (typically
//! because another process holds it) is still listed, with an empty format
//! set, so the operator can see it exists.

use serde::Serialize;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::error::{Result, StreamError};

/// Capture formats reported by one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceFormat {
    /// FourCC name as the kernel reports it, e.g. `UYVY`, `MJPG`.
    pub fourcc: String,
    /// Frame sizes for this format, `WIDTHxHEIGHT` strings. Empty when only
    /// the coarse listing was available.
    pub sizes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub formats: Vec<DeviceFormat>,
}

impl DeviceInfo {
    pub fn supports(&self, fourcc: &str) -> bool {
        self.formats.iter().any(|f| f.fourcc == fourcc)
    }
}

/// Enumerate `/dev/video*` nodes and query each for its formats.
pub fn enumerate() -> Result<Vec<DeviceInfo>> {
    let mut paths: Vec<String> = fs::read_dir("/dev")
        .map_err(|e| StreamError::Environment(format!("cannot read /dev: {}", e)))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("video"))
        .map(|name| format!("/dev/{}", name))
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let formats = query_formats(&path);
            DeviceInfo { path, formats }
        })
        .collect())
}

pub fn device_exists(path: &str) -> bool {
    Path::new(path).exists()
}

/// Ask `v4l2-ctl` for the device's formats. The detailed listing is tried
/// first; if it yields nothing the coarse listing fills in format names
/// without sizes.
fn query_formats(device: &str) -> Vec<DeviceFormat> {
    let detailed = run_v4l2_ctl(device, "--list-formats-ext")
        .map(|out| parse_formats_ext(&out))
        .unwrap_or_default();
    if !detailed.is_empty() {
        return detailed;
    }

    run_v4l2_ctl(device, "--list-formats")
        .map(|out| parse_formats(&out))
        .unwrap_or_default()
}

fn run_v4l2_ctl(device: &str, listing: &str) -> Option<String> {
    let output = Command::new("v4l2-ctl")
        .args(["--device", device, listing])
        .output();
    match output {
        Ok(out) if out.status.success() => Some(String::from_utf8_lossy(&out.stdout).into_owned()),
        Ok(out) => {
            debug!(device, listing, code = out.status.code(), "v4l2-ctl query failed");
            None
        }
        Err(e) => {
            debug!(device, listing, error = %e, "v4l2-ctl unavailable");
            None
        }
    }
}

/// Parse `v4l2-ctl --list-formats-ext` output.
///
/// Format headers look like `[0]: 'UYVY' (UYVY 4:2:2)`; each is followed by
/// indented `Size: Discrete 1920x1080` lines (or `Stepwise` ranges) with
/// their frame intervals.
pub(crate) fn parse_formats_ext(output: &str) -> Vec<DeviceFormat> {
    let mut formats: Vec<DeviceFormat> = Vec::new();

    for raw in output.lines() {
        let line = raw.trim();
        if line.starts_with('[') && line.contains(':') {
            if let Some(fourcc) = line.split('\'').nth(1) {
                formats.push(DeviceFormat {
                    fourcc: fourcc.to_string(),
                    sizes: Vec::new(),
                });
            }
        } else if let Some(rest) = line.strip_prefix("Size:") {
            let size = rest
                .trim()
                .trim_start_matches("Discrete ")
                .trim_start_matches("Stepwise ")
                .trim();
            if size.contains('x') {
                if let Some(current) = formats.last_mut() {
                    if !current.sizes.iter().any(|s| s == size) {
                        current.sizes.push(size.to_string());
                    }
                }
            }
        }
    }

    formats
}

/// Parse the coarse `v4l2-ctl --list-formats` output: only quoted FourCC
/// names, no sizes.
pub(crate) fn parse_formats(output: &str) -> Vec<DeviceFormat> {
    let mut formats: Vec<DeviceFormat> = Vec::new();
    for line in output.lines() {
        if let Some(fourcc) = line.split('\'').nth(1) {
            if !formats.iter().any(|f| f.fourcc == fourcc) {
                formats.push(DeviceFormat {
                    fourcc: fourcc.to_string(),
                    sizes: Vec::new(),
                });
            }
        }
    }
    formats
}
