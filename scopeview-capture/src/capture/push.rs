//! Push-style capture bridged into the synchronous pull contract
//!
//! Some capture paths deliver frames through an asynchronous callback
//! instead of a pollable handle. A single-slot, overwrite-on-arrival signal
//! turns that into the same bounded-wait `read` the rest of the engine
//! expects: at most one pull is outstanding at a time, and a pull that
//! times out means "no frame", not a torn-down resource.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::CallbackCamera;
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::{frame_from_buffer, from_frame_format, CaptureHandle};
use crate::error::{CaptureError, CaptureResult};
use crate::format::CaptureRequest;
use crate::frame::{FourCc, Frame, NegotiatedMode};

/// Single-slot frame signal; a new arrival overwrites an unconsumed one
#[derive(Default)]
pub struct FrameSlot {
    slot: Mutex<Option<Frame>>,
    arrived: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a frame, replacing whatever is already waiting
    pub fn publish(&self, frame: Frame) {
        *self.slot.lock() = Some(frame);
        self.arrived.notify_one();
    }

    /// Wait up to `timeout` for a frame and take it
    pub fn take(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while slot.is_none() {
            if self.arrived.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.take()
    }
}

/// A live push-style stream behind the pull contract
pub struct PushHandle {
    camera: CallbackCamera,
    slot: Arc<FrameSlot>,
    pull_timeout: Duration,
    mode: NegotiatedMode,
}

/// Open the push-style path and validate it with one bounded pull.
///
/// Returns the handle together with the pulled frame so the caller does not
/// lose it.
pub(crate) fn open_push(
    index: u32,
    request: &CaptureRequest,
    pull_timeout: Duration,
) -> CaptureResult<(Box<dyn CaptureHandle>, Frame)> {
    let slot = Arc::new(FrameSlot::new());
    let publisher = Arc::clone(&slot);

    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
    let mut camera = CallbackCamera::new(CameraIndex::Index(index), requested, move |buffer| {
        publisher.publish(frame_from_buffer(&buffer));
    })
    .map_err(|error| CaptureError::Backend {
        message: error.to_string(),
    })?;

    // Configuration happens before the graph runs, as best-effort sets. An
    // encoding this path cannot honor is left to the driver; the negotiated
    // mode read back below is the source of truth.
    if let Some(format) = request.fourcc.and_then(super::to_frame_format) {
        if let Err(error) = camera.set_frame_format(format) {
            debug!(%error, "pixel format not accepted; leaving driver default");
        }
    } else if let Some(code) = request.fourcc {
        debug!(%code, "encoding has no native equivalent on this path; leaving driver default");
    }
    if let Ok(current) = camera.resolution() {
        if let Some(resolution) =
            super::pollable::requested_resolution((current.width(), current.height()), request)
        {
            if let Err(error) = camera.set_resolution(resolution) {
                debug!(%error, "resolution not accepted");
            }
        }
    } else if let (Some(width), Some(height)) = (request.width, request.height) {
        if let Err(error) = camera.set_resolution(Resolution::new(width, height)) {
            debug!(%error, "resolution not accepted");
        }
    }
    if let Some(fps) = request.fps {
        if let Err(error) = camera.set_frame_rate(fps.round() as u32) {
            debug!(%error, "frame rate not accepted");
        }
    }

    camera.open_stream().map_err(|error| CaptureError::Backend {
        message: error.to_string(),
    })?;

    let Some(primed) = slot.take(pull_timeout) else {
        // Dropping the camera stops the graph before we report the skip.
        return Err(CaptureError::ProbeTimedOut { wait: pull_timeout });
    };

    let mode = match camera.camera_format() {
        Ok(format) => NegotiatedMode {
            width: format.resolution().width(),
            height: format.resolution().height(),
            fps: format.frame_rate() as f64,
            encoding: from_frame_format(format.format()),
        },
        Err(_) => NegotiatedMode {
            width: primed.width,
            height: primed.height,
            fps: request.fps.unwrap_or(0.0),
            encoding: primed.encoding,
        },
    };

    let handle = PushHandle {
        camera,
        slot,
        pull_timeout,
        mode,
    };
    Ok((Box::new(handle), primed))
}

impl CaptureHandle for PushHandle {
    fn configure(&mut self, _request: &CaptureRequest, encoding: Option<FourCc>) {
        // Configuration is fixed when the graph is built; a late encoding
        // request cannot be honored and is ignored.
        if let Some(code) = encoding {
            debug!(%code, "push path cannot change encoding after open; request ignored");
        }
    }

    fn read(&mut self) -> Option<Frame> {
        self.slot.take(self.pull_timeout)
    }

    fn negotiated(&self) -> NegotiatedMode {
        self.mode
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        if let Err(error) = self.camera.stop_stream() {
            debug!(%error, "push stream did not stop cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frame(tag: u8) -> Frame {
        Frame {
            width: 2,
            height: 2,
            encoding: FourCc::YUYV,
            data: vec![tag; 8],
        }
    }

    #[test]
    fn test_slot_times_out_without_a_frame() {
        let slot = FrameSlot::new();
        assert!(slot.take(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_slot_overwrites_unconsumed_frame() {
        let slot = FrameSlot::new();
        slot.publish(frame(1));
        slot.publish(frame(2));
        let taken = slot.take(Duration::from_millis(5)).unwrap();
        assert_eq!(taken.data[0], 2);
        // The slot holds one frame at a time.
        assert!(slot.take(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_slot_wakes_a_waiting_pull() {
        let slot = Arc::new(FrameSlot::new());
        let publisher = Arc::clone(&slot);
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            publisher.publish(frame(7));
        });
        let taken = slot.take(Duration::from_secs(1)).unwrap();
        assert_eq!(taken.data[0], 7);
        worker.join().unwrap();
    }
}
