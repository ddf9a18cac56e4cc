//! Execution handoff to the external media engine.
//!
//! The compiled spec is rendered into a `gst-launch-1.0` invocation and run
//! as a subordinate process. Liveness is supervised from a monitor thread so
//! `status` and `stop` never block on the child. Unexpected exits are
//! classified transient (retried with bounded backoff) or fatal (surfaced
//! once with the captured diagnostic).

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::{Result, StreamError};
use super::pipeline::PipelineSpec;

const ENGINE_BINARY: &str = "gst-launch-1.0";

/// How much of the child's stderr tail is kept for diagnostics.
const STDERR_TAIL_BYTES: usize = 4096;

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Stall watchdog sampling interval.
const STALL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Consecutive samples without any write activity before a live engine is
/// declared hung and recycled.
const STALL_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Running,
    Exited(i32),
    Crashed(i32),
}

/// Retry behavior for transient runtime faults.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt ceiling, counting the first launch.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Grace period between the shutdown request and forced termination.
    pub stop_grace: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            stop_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct Shared {
    status: Mutex<EngineStatus>,
    stderr: Mutex<String>,
}

/// Handle to one running engine process. Only one handle is active per
/// logical stream; the supervisor waits for exit before relaunching.
#[derive(Debug)]
pub struct EngineHandle {
    id: Uuid,
    pid: u32,
    shared: Arc<Shared>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl EngineHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn status(&self) -> EngineStatus {
        *self.shared.status.lock().unwrap()
    }

    /// Last bytes of the child's stderr. The reader keeps the buffer
    /// trimmed to `STDERR_TAIL_BYTES`, so this is the whole buffer.
    pub fn stderr_tail(&self) -> String {
        self.shared.stderr.lock().unwrap().clone()
    }

    /// Block until the engine exits, returning the final status.
    pub fn wait(&self) -> EngineStatus {
        loop {
            let status = self.status();
            if status != EngineStatus::Running {
                if let Some(handle) = self.monitor.lock().unwrap().take() {
                    let _ = handle.join();
                }
                return status;
            }
            thread::sleep(STATUS_POLL_INTERVAL);
        }
    }

    /// Graceful shutdown: request EOS via SIGINT, wait out the grace
    /// period, then force termination.
    pub fn stop(&self, grace: Duration) -> EngineStatus {
        if self.status() == EngineStatus::Running {
            info!(pid = self.pid, "requesting engine shutdown");
            signal(self.pid, libc::SIGINT);

            let deadline = Instant::now() + grace;
            while self.status() == EngineStatus::Running && Instant::now() < deadline {
                thread::sleep(STATUS_POLL_INTERVAL);
            }

            if self.status() == EngineStatus::Running {
                warn!(pid = self.pid, "engine ignored shutdown request, killing");
                signal(self.pid, libc::SIGKILL);
            }
        }
        self.wait()
    }
}

fn signal(pid: u32, sig: i32) {
    // The monitor thread reaps the child; this only delivers the signal.
    unsafe {
        libc::kill(pid as libc::pid_t, sig);
    }
}

/// Launch the engine with the compiled spec.
pub fn launch(spec: &PipelineSpec) -> Result<EngineHandle> {
    let rendered = spec.render();
    let args = shlex::split(&rendered).ok_or_else(|| {
        StreamError::Fatal(format!("unrenderable pipeline spec: {}", rendered))
    })?;
    // -e forwards EOS on shutdown so the mux can finalize its stream.
    let mut full_args = vec!["-e".to_string()];
    full_args.extend(args);
    spawn_engine(ENGINE_BINARY, &full_args)
}

pub(crate) fn spawn_engine(program: &str, args: &[String]) -> Result<EngineHandle> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| StreamError::Environment(format!("cannot run {}: {}", program, e)))?;

    let pid = child.id();
    let shared = Arc::new(Shared {
        status: Mutex::new(EngineStatus::Running),
        stderr: Mutex::new(String::new()),
    });

    let reader = child.stderr.take().map(|mut pipe| {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            let mut buf = [0u8; 1024];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]).to_string();
                        let mut tail = shared.stderr.lock().unwrap();
                        tail.push_str(&chunk);
                        // Keep only the tail; a chatty child must not grow
                        // the buffer for the lifetime of the stream.
                        if tail.len() > STDERR_TAIL_BYTES {
                            let mut cut = tail.len() - STDERR_TAIL_BYTES;
                            while !tail.is_char_boundary(cut) {
                                cut += 1;
                            }
                            tail.drain(..cut);
                        }
                    }
                }
            }
        })
    });

    let monitor = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            let status = child.wait();
            if let Some(handle) = reader {
                let _ = handle.join();
            }
            let final_status = match status {
                Ok(s) => exit_to_status(&s),
                Err(_) => EngineStatus::Crashed(0),
            };
            *shared.status.lock().unwrap() = final_status;
        })
    };

    Ok(EngineHandle {
        id: Uuid::new_v4(),
        pid,
        shared,
        monitor: Mutex::new(Some(monitor)),
    })
}

#[cfg(unix)]
fn exit_to_status(status: &std::process::ExitStatus) -> EngineStatus {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => EngineStatus::Exited(code),
        (None, Some(sig)) => EngineStatus::Crashed(sig),
        (None, None) => EngineStatus::Crashed(0),
    }
}

#[cfg(not(unix))]
fn exit_to_status(status: &std::process::ExitStatus) -> EngineStatus {
    EngineStatus::Exited(status.code().unwrap_or(-1))
}

/// Markers in the engine's stderr that no retry will fix.
const FATAL_MARKERS: &[&str] = &[
    "permission denied",
    "no such file",
    "no such device",
    "no element",
    "could not link",
    "erroneous pipeline",
    "not-negotiated",
];

/// Classify an engine exit. `None` means a clean or operator-initiated stop.
pub fn classify_exit(status: EngineStatus, stderr: &str) -> Option<StreamError> {
    match status {
        EngineStatus::Running => None,
        EngineStatus::Exited(0) => None,
        // SIGINT/SIGTERM are the operator stopping the stream.
        EngineStatus::Crashed(sig) if sig == libc::SIGINT || sig == libc::SIGTERM => None,
        EngineStatus::Exited(code) => {
            let lower = stderr.to_lowercase();
            if FATAL_MARKERS.iter().any(|m| lower.contains(m)) {
                Some(StreamError::Fatal(format!(
                    "engine exited with code {}: {}",
                    code,
                    tail_line(stderr)
                )))
            } else {
                Some(StreamError::Transient(format!(
                    "engine exited with code {}: {}",
                    code,
                    tail_line(stderr)
                )))
            }
        }
        EngineStatus::Crashed(sig) => Some(StreamError::Transient(format!(
            "engine crashed with signal {}",
            sig
        ))),
    }
}

fn tail_line(stderr: &str) -> &str {
    stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("(no diagnostic)")
}

/// Bytes the process has pushed through write syscalls, sockets included.
/// `None` where /proc is unavailable or the process is gone.
fn io_activity(pid: u32) -> Option<u64> {
    let body = std::fs::read_to_string(format!("/proc/{}/io", pid)).ok()?;
    body.lines()
        .find_map(|line| line.strip_prefix("wchar:"))
        .and_then(|value| value.trim().parse().ok())
}

/// Wait for the engine to exit, killing it if it is alive but has written
/// nothing for `threshold` consecutive sampling intervals. A hung pipeline
/// (device wedged, peer gone quiet) exits nothing on its own; without this
/// the stream would sit dark forever.
///
/// Returns the final status and whether the exit was forced by the watchdog.
pub(crate) fn wait_with_stall_watchdog(
    handle: &EngineHandle,
    poll: Duration,
    threshold: u32,
) -> (EngineStatus, bool) {
    let mut last = io_activity(handle.pid());
    let mut unchanged = 0u32;
    loop {
        let deadline = Instant::now() + poll;
        while Instant::now() < deadline {
            if handle.status() != EngineStatus::Running {
                return (handle.wait(), false);
            }
            thread::sleep(STATUS_POLL_INTERVAL);
        }

        let current = io_activity(handle.pid());
        match (last, current) {
            (Some(prev), Some(cur)) if cur == prev => {
                unchanged += 1;
                if unchanged >= threshold {
                    warn!(pid = handle.pid(), "engine alive but emitting no data, recycling");
                    signal(handle.pid(), libc::SIGKILL);
                    return (handle.wait(), true);
                }
            }
            _ => unchanged = 0,
        }
        last = current;
    }
}

fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.min(16);
    policy.base_delay.saturating_mul(factor).min(policy.max_delay)
}

/// Launch and supervise until the stream ends.
///
/// Transient faults relaunch the same spec after an exponential backoff, up
/// to the policy ceiling. A stall (process alive, no output) counts as a
/// transient fault. Fatal faults surface immediately; a clean exit or an
/// operator stop returns `Ok`.
pub fn run_supervised(spec: &PipelineSpec, policy: &RetryPolicy) -> Result<()> {
    let mut retries = 0u32;
    loop {
        let handle = launch(spec)?;
        info!(pid = handle.pid(), retries, "engine started");

        let (status, stalled) =
            wait_with_stall_watchdog(&handle, STALL_POLL_INTERVAL, STALL_THRESHOLD);
        let classified = if stalled {
            Some(StreamError::Transient("engine stalled with no output".into()))
        } else {
            classify_exit(status, &handle.stderr_tail())
        };
        match classified {
            None => {
                info!(pid = handle.pid(), "engine stopped cleanly");
                return Ok(());
            }
            Some(err) if err.is_transient() => {
                retries += 1;
                if retries >= policy.max_attempts {
                    warn!(retries, "retry ceiling reached");
                    return Err(err);
                }
                let delay = backoff_delay(policy, retries - 1);
                warn!(%err, delay_ms = delay.as_millis() as u64, "transient failure, restarting");
                thread::sleep(delay);
            }
            Some(err) => return Err(err),
        }
    }
}
