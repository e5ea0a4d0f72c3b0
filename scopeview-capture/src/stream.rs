//! Resilient streaming session
//!
//! Owns the live capture handle and keeps the stream alive across transient
//! read failures and full device loss. Isolated failures retry with a short
//! backoff; sustained failure triggers a bounded release-wait-reacquire
//! cycle that prefers the backend that most recently worked.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::acquire::{acquire, ProbeConfig};
use crate::backend::{replan, BackendKind};
use crate::capture::{CaptureConnector, CaptureHandle};
use crate::devices::DeviceRef;
use crate::error::{CaptureError, CaptureResult};
use crate::format::CaptureRequest;
use crate::frame::{Frame, NegotiatedMode};

/// Tuning for the failure-retry-reconnect behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Consecutive failed reads tolerated before reconnecting
    pub max_empty: u32,
    /// Reconnect attempts permitted per failure episode
    pub max_reconnects: u32,
    /// Wait before each reconnect attempt
    pub retry_delay: Duration,
    /// Yield between failed reads to avoid busy-spinning
    pub idle_backoff: Duration,
    /// Whether sustained failure triggers reconnection at all
    pub auto_retry: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_empty: 60,
            max_reconnects: 5,
            retry_delay: Duration::from_secs(1),
            idle_backoff: Duration::from_millis(10),
            auto_retry: true,
        }
    }
}

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Frames are flowing (or transient failures are being retried)
    Streaming,
    /// Terminal; the capture resource has been released
    Stopped,
}

/// A live stream bound to one device, exclusively owning its capture handle
pub struct StreamSession<'a> {
    connector: &'a dyn CaptureConnector,
    device: DeviceRef,
    device_name: Option<String>,
    request: CaptureRequest,
    plan: Vec<BackendKind>,
    policy: RetryPolicy,
    probe: ProbeConfig,
    handle: Option<Box<dyn CaptureHandle>>,
    pending: Option<Frame>,
    active_backend: BackendKind,
    consecutive_failures: u32,
    reconnects: u32,
}

impl<'a> StreamSession<'a> {
    /// Run the initial acquisition and enter the streaming state.
    ///
    /// Fails with [`CaptureError::OpenFailed`] when no backend/format
    /// candidate yields a live stream.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        connector: &'a dyn CaptureConnector,
        device: DeviceRef,
        device_name: Option<String>,
        request: CaptureRequest,
        plan: Vec<BackendKind>,
        policy: RetryPolicy,
        probe: ProbeConfig,
    ) -> CaptureResult<Self> {
        let acquired = acquire(
            connector,
            &device,
            device_name.as_deref(),
            &request,
            &plan,
            &probe,
        )?;
        info!(backend = %acquired.backend, "capture session established");
        Ok(Self {
            connector,
            device,
            device_name,
            request,
            plan,
            policy,
            probe,
            handle: Some(acquired.handle),
            pending: Some(acquired.primed),
            active_backend: acquired.backend,
            consecutive_failures: 0,
            reconnects: 0,
        })
    }

    /// Backend the current handle was opened through
    pub fn backend(&self) -> BackendKind {
        self.active_backend
    }

    /// Mode reported by the current handle, if one is open
    pub fn negotiated(&self) -> Option<NegotiatedMode> {
        self.handle.as_ref().map(|handle| handle.negotiated())
    }

    /// Reconnects performed in the current failure episode
    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    /// Failed reads since the last good frame
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn phase(&self) -> StreamPhase {
        if self.handle.is_some() {
            StreamPhase::Streaming
        } else {
            StreamPhase::Stopped
        }
    }

    /// Blocking read of the next frame.
    ///
    /// Retries transient failures and reconnects on sustained ones; an
    /// error is terminal for the session and is only returned after the
    /// capture resource has been released.
    pub fn next_frame(&mut self) -> CaptureResult<Frame> {
        loop {
            // A frame consumed while probing (initial open or reconnect) is
            // handed out before the device is read again. It counts as a
            // good frame for the failure counter but not for the reconnect
            // budget, which bounds attempts across the failure episode.
            if let Some(frame) = self.pending.take() {
                self.consecutive_failures = 0;
                return Ok(frame);
            }

            let Some(handle) = self.handle.as_mut() else {
                return Err(CaptureError::StreamLost {
                    failures: self.consecutive_failures,
                });
            };

            if let Some(frame) = handle.read() {
                self.consecutive_failures = 0;
                self.reconnects = 0;
                return Ok(frame);
            }

            self.consecutive_failures += 1;
            if self.consecutive_failures < self.policy.max_empty {
                std::thread::sleep(self.policy.idle_backoff);
                continue;
            }

            if !self.policy.auto_retry || self.reconnects >= self.policy.max_reconnects {
                let failures = self.consecutive_failures;
                self.release();
                warn!(failures, "no frame received from the camera");
                return Err(CaptureError::StreamLost { failures });
            }

            self.recover()?;
        }
    }

    /// Release-wait-reacquire, preferring the backend that last worked
    fn recover(&mut self) -> CaptureResult<()> {
        warn!(backend = %self.active_backend, "lost camera signal, attempting to reopen");
        self.release();
        std::thread::sleep(self.policy.retry_delay);

        let plan = replan(&self.plan, Some(self.active_backend));
        match acquire(
            self.connector,
            &self.device,
            self.device_name.as_deref(),
            &self.request,
            &plan,
            &self.probe,
        ) {
            Ok(acquired) => {
                self.handle = Some(acquired.handle);
                self.pending = Some(acquired.primed);
                self.active_backend = acquired.backend;
                self.consecutive_failures = 0;
                self.reconnects += 1;
                info!(
                    backend = %self.active_backend,
                    reconnects = self.reconnects,
                    "capture stream recovered"
                );
                Ok(())
            }
            Err(error) => {
                debug!(%error, "re-acquisition failed");
                let reconnects = self.reconnects;
                warn!(reconnects, "unable to recover the camera stream");
                Err(CaptureError::ReconnectExhausted { reconnects })
            }
        }
    }

    fn release(&mut self) {
        self.pending = None;
        self.handle = None;
    }
}
