//! Functional verification of encoder candidates.
//!
//! Presence alone is not trusted: a plugin can be installed while its device
//! node is missing, busy, or firmware-less. Each present candidate gets a
//! short synthetic encode (`videotestsrc` -> bridge -> encoder -> `fakesink`)
//! that must run to completion within the timeout.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::catalog::{EncoderEntry, entry_for};
use super::platform::EncoderCandidate;

pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_millis(3000);

/// Frames the synthetic run must push through the encoder. Small enough to
/// finish well inside the timeout on anything that works at all.
const SYNTHETIC_FRAMES: u32 = 30;

/// How often the supervising loop polls the child for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Why a present candidate failed its functional test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationError {
    /// The synthetic run did not finish before the deadline.
    Timeout,
    /// The engine rejected the pipeline (missing element, link failure).
    PluginError,
    /// The underlying device is held by another process.
    DeviceBusy,
    Unknown,
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationError::Timeout => write!(f, "timeout"),
            VerificationError::PluginError => write!(f, "plugin error"),
            VerificationError::DeviceBusy => write!(f, "device busy"),
            VerificationError::Unknown => write!(f, "unknown failure"),
        }
    }
}

/// Verify every `present` candidate, concurrently across independent
/// devices but serialized within each exclusive hardware resource.
///
/// Returns the candidates in their original discovery order with
/// `verified`/`verification_error` filled in. Absent candidates pass
/// through untouched.
pub fn verify_all(candidates: Vec<EncoderCandidate>, timeout: Duration) -> Vec<EncoderCandidate> {
    verify_all_with(candidates, timeout, run_synthetic_encode)
}

pub(crate) fn verify_all_with<R>(
    candidates: Vec<EncoderCandidate>,
    timeout: Duration,
    runner: R,
) -> Vec<EncoderCandidate>
where
    R: Fn(&EncoderEntry, Duration) -> Result<(), VerificationError> + Send + Sync + Clone + 'static,
{
    // Group candidate indices by exclusive resource. Candidates without one
    // get their own group and run fully in parallel.
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        let key = entry_for(candidate.id)
            .and_then(|e| e.exclusive_resource)
            .map(str::to_string)
            .unwrap_or_else(|| format!("independent:{}", candidate.id));
        groups.entry(key).or_default().push(idx);
    }

    let (tx, rx) = mpsc::channel();
    let mut handles = Vec::new();

    for (_, indices) in groups {
        let tx = tx.clone();
        let runner = runner.clone();
        let group: Vec<(usize, EncoderCandidate)> = indices
            .into_iter()
            .map(|i| (i, candidates[i].clone()))
            .collect();

        handles.push(thread::spawn(move || {
            for (idx, candidate) in group {
                let verified = verify_one(candidate, timeout, &runner);
                let _ = tx.send((idx, verified));
            }
        }));
    }
    drop(tx);

    let mut results = candidates;
    for (idx, candidate) in rx {
        results[idx] = candidate;
    }
    for handle in handles {
        let _ = handle.join();
    }
    results
}

fn verify_one<R>(mut candidate: EncoderCandidate, timeout: Duration, runner: &R) -> EncoderCandidate
where
    R: Fn(&EncoderEntry, Duration) -> Result<(), VerificationError>,
{
    if !candidate.present {
        return candidate;
    }
    let Some(entry) = entry_for(candidate.id) else {
        return candidate;
    };

    match runner(entry, timeout) {
        Ok(()) => {
            info!(encoder = candidate.id, "verification passed");
            candidate.verified = true;
        }
        Err(err) => {
            warn!(encoder = candidate.id, %err, "verification failed");
            candidate.verified = false;
            candidate.verification_error = Some(err);
        }
    }
    candidate
}

/// Argument vector of the synthetic pipeline for one candidate.
fn synthetic_pipeline(entry: &EncoderEntry) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "videotestsrc".into(),
        format!("num-buffers={}", SYNTHETIC_FRAMES),
        "!".into(),
        "video/x-raw,width=320,height=240,format=I420".into(),
        "!".into(),
        entry.convert_element.into(),
    ];
    if let Some(upload) = entry.upload {
        args.push("!".into());
        args.push(upload.element.into());
        args.push("!".into());
        args.push(upload.caps.into());
    }
    args.push("!".into());
    args.push(entry.element.into());
    args.push("!".into());
    args.push("fakesink".into());
    args.push("sync=false".into());
    args
}

/// Run the synthetic encode via gst-launch-1.0, bounded by `timeout`.
fn run_synthetic_encode(entry: &EncoderEntry, timeout: Duration) -> Result<(), VerificationError> {
    let mut args = vec!["-q".to_string()];
    args.extend(synthetic_pipeline(entry));
    debug!(encoder = entry.element, pipeline = %args.join(" "), "starting verification run");
    run_bounded("gst-launch-1.0", &args, timeout)
}

/// Run one child process under the verification deadline.
///
/// The child is reaped on every exit path; a timed-out run is killed and
/// waited before returning so the device handle is released.
pub(crate) fn run_bounded(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<(), VerificationError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|_| VerificationError::Unknown)?;

    // Drain stderr off-thread so a chatty child can never block on a full
    // pipe while we poll for exit.
    let stderr_buf = Arc::new(Mutex::new(String::new()));
    let reader = child.stderr.take().map(|mut pipe| {
        let buf = Arc::clone(&stderr_buf);
        thread::spawn(move || {
            let mut out = String::new();
            let _ = pipe.read_to_string(&mut out);
            *buf.lock().unwrap() = out;
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    if let Some(handle) = reader {
                        let _ = handle.join();
                    }
                    return Err(VerificationError::Timeout);
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                if let Some(handle) = reader {
                    let _ = handle.join();
                }
                return Err(VerificationError::Unknown);
            }
        }
    };

    if let Some(handle) = reader {
        let _ = handle.join();
    }

    if status.success() {
        Ok(())
    } else {
        let stderr = stderr_buf.lock().unwrap().clone();
        Err(classify_failure(&stderr))
    }
}

/// Map an engine error tail to a verification error kind.
pub(crate) fn classify_failure(stderr: &str) -> VerificationError {
    let lower = stderr.to_lowercase();
    if lower.contains("busy") {
        VerificationError::DeviceBusy
    } else if lower.contains("no element")
        || lower.contains("could not link")
        || lower.contains("erroneous pipeline")
        || lower.contains("failed to load plugin")
    {
        VerificationError::PluginError
    } else {
        VerificationError::Unknown
    }
}
