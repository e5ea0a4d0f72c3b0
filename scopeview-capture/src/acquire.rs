//! Capture acquisition engine
//!
//! Tries every backend candidate against every pixel-format candidate, in
//! priority order, until one combination delivers an actual frame. Probing
//! is required because many backends report a successful open before the
//! hardware has started streaming; only a successful read proves the
//! negotiated mode works.

use std::time::Duration;

use tracing::{debug, info};

use crate::backend::BackendKind;
use crate::capture::{CaptureConnector, CaptureHandle};
use crate::devices::DeviceRef;
use crate::error::{CaptureError, CaptureResult};
use crate::format::{fourcc_candidates, CaptureRequest};
use crate::frame::{FourCc, Frame};

/// Bounds on the waits involved in validating a candidate
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Read attempts before a candidate is declared dead
    pub probe_frames: u32,
    /// Pause between probe attempts
    pub probe_interval: Duration,
    /// Bounded wait for the push path's single validation pull
    pub pull_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe_frames: 5,
            probe_interval: Duration::from_millis(50),
            pull_timeout: Duration::from_secs(1),
        }
    }
}

/// A successfully acquired capture stream
pub struct Acquired {
    /// The live handle, validated by at least one good frame
    pub handle: Box<dyn CaptureHandle>,
    /// Backend the handle was opened through
    pub backend: BackendKind,
    /// Encoding candidate that was forced, `None` for the driver default
    pub encoding: Option<FourCc>,
    /// The frame consumed while probing, preserved for the caller
    pub primed: Frame,
}

impl std::fmt::Debug for Acquired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquired")
            .field("backend", &self.backend)
            .field("encoding", &self.encoding)
            .field("primed", &self.primed)
            .finish_non_exhaustive()
    }
}

/// Read a few frames to ensure the stream is alive
fn probe_stream(handle: &mut dyn CaptureHandle, probe: &ProbeConfig) -> Option<Frame> {
    for _ in 0..probe.probe_frames {
        if let Some(frame) = handle.read() {
            return Some(frame);
        }
        std::thread::sleep(probe.probe_interval);
    }
    None
}

fn open_with_name_retry(
    connector: &dyn CaptureConnector,
    device: &DeviceRef,
    device_name: Option<&str>,
    backend: BackendKind,
) -> Option<Box<dyn CaptureHandle>> {
    if let Some(handle) = connector.open(device, backend) {
        return Some(handle);
    }
    // Index-based opens can go stale after enumeration changes; a known
    // display name gives the backend a second way in.
    let name = device_name?;
    debug!(name, "retrying open by device name");
    connector.open(&DeviceRef::Path(name.to_string()), backend)
}

/// Attempt to open `device` with each backend and pixel-format candidate in
/// order; the first combination that survives a probe wins.
///
/// Exhausting every candidate is [`CaptureError::OpenFailed`], terminal for
/// this invocation.
pub fn acquire(
    connector: &dyn CaptureConnector,
    device: &DeviceRef,
    device_name: Option<&str>,
    request: &CaptureRequest,
    backends: &[BackendKind],
    probe: &ProbeConfig,
) -> CaptureResult<Acquired> {
    let candidates = fourcc_candidates(request);

    for &backend in backends {
        if backend.api().is_none() {
            // Push-style path: needs a numeric index and validates itself
            // with a single bounded pull.
            let DeviceRef::Index(index) = device else {
                debug!(%device, %backend, "push backend requires a numeric device index");
                continue;
            };
            info!(%device, %backend, "attempting to open capture device");
            match connector.open_push(*index, request, probe.pull_timeout) {
                Ok((handle, primed)) => {
                    info!(mode = %handle.negotiated(), "active mode");
                    return Ok(Acquired {
                        handle,
                        backend,
                        encoding: None,
                        primed,
                    });
                }
                Err(error) => {
                    debug!(%error, %backend, "push backend produced no stream");
                    continue;
                }
            }
        }

        for &encoding in &candidates {
            let format_label = encoding
                .map(|code| code.to_string())
                .unwrap_or_else(|| "driver default".to_string());
            info!(%device, %backend, format = %format_label, "attempting to open capture device");

            let Some(mut handle) = open_with_name_retry(connector, device, device_name, backend)
            else {
                debug!("unable to open device with this setting");
                continue;
            };
            handle.configure(request, encoding);

            match probe_stream(handle.as_mut(), probe) {
                Some(primed) => {
                    info!(mode = %handle.negotiated(), "active mode");
                    return Ok(Acquired {
                        handle,
                        backend,
                        encoding,
                        primed,
                    });
                }
                None => {
                    debug!("stream produced no frames during probe, trying next option");
                    // Handle drops here, releasing the device for the next
                    // candidate.
                }
            }
        }
    }

    Err(CaptureError::OpenFailed {
        device: device.to_string(),
    })
}
