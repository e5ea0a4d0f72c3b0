//! Capture backend collaborators
//!
//! The engine talks to native capture APIs through two small traits:
//! [`CaptureConnector`] opens devices, [`CaptureHandle`] owns one live
//! stream. Handles release their underlying resource on drop, so every
//! exit path (probe failure, reconnect, shutdown) releases exactly once.
//!
//! Two real implementations exist: a pollable one backed by the native
//! capture APIs, and a push-style one that bridges an asynchronous frame
//! callback into the same synchronous read contract. Downstream code never
//! needs to know which style underlies the active backend.

pub mod pollable;
pub mod push;

use std::time::Duration;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{FrameFormat, Resolution};
use nokhwa::Buffer;

use crate::backend::BackendKind;
use crate::devices::DeviceRef;
use crate::error::CaptureResult;
use crate::format::CaptureRequest;
use crate::frame::{FourCc, Frame, NegotiatedMode};

/// One live capture stream bound to a device, backend and negotiated mode
pub trait CaptureHandle {
    /// Apply the requested configuration as a best-effort set.
    ///
    /// The device is not required to honor it; callers read the
    /// post-condition state back through [`CaptureHandle::negotiated`].
    fn configure(&mut self, request: &CaptureRequest, encoding: Option<FourCc>);

    /// Blocking read of the next frame; `None` means "no frame", not a
    /// torn-down resource
    fn read(&mut self) -> Option<Frame>;

    /// Mode actually reported by the device after configuration
    fn negotiated(&self) -> NegotiatedMode;
}

/// Opens capture handles for the acquisition engine
pub trait CaptureConnector {
    /// Open a pollable handle for the given device and backend; `None`
    /// when the device cannot be opened this way
    fn open(&self, device: &DeviceRef, backend: BackendKind) -> Option<Box<dyn CaptureHandle>>;

    /// Open through the push-style path and validate it with a single
    /// bounded pull, returning the handle together with the pulled frame.
    ///
    /// Fails with [`crate::CaptureError::ProbeTimedOut`] when no frame
    /// arrives within `pull_timeout`.
    fn open_push(
        &self,
        index: u32,
        request: &CaptureRequest,
        pull_timeout: Duration,
    ) -> CaptureResult<(Box<dyn CaptureHandle>, Frame)>;
}

/// Connector backed by the platform's native capture APIs
pub struct NativeConnector;

impl CaptureConnector for NativeConnector {
    fn open(&self, device: &DeviceRef, backend: BackendKind) -> Option<Box<dyn CaptureHandle>> {
        let api = backend.api()?;
        pollable::open_pollable(device, api)
    }

    fn open_push(
        &self,
        index: u32,
        request: &CaptureRequest,
        pull_timeout: Duration,
    ) -> CaptureResult<(Box<dyn CaptureHandle>, Frame)> {
        push::open_push(index, request, pull_timeout)
    }
}

/// Map a user-facing FOURCC onto the native frame format, when one exists
pub(crate) fn to_frame_format(code: FourCc) -> Option<FrameFormat> {
    if code == FourCc::MJPG {
        Some(FrameFormat::MJPEG)
    } else if code.matches(FourCc::YUYV) {
        Some(FrameFormat::YUYV)
    } else if code == FourCc::NV12 {
        Some(FrameFormat::NV12)
    } else if code == FourCc::GRAY {
        Some(FrameFormat::GRAY)
    } else if code == FourCc::RGB3 {
        Some(FrameFormat::RAWRGB)
    } else {
        None
    }
}

/// FOURCC tag for a native frame format
pub(crate) fn from_frame_format(format: FrameFormat) -> FourCc {
    match format {
        FrameFormat::MJPEG => FourCc::MJPG,
        FrameFormat::YUYV => FourCc::YUYV,
        FrameFormat::NV12 => FourCc::NV12,
        FrameFormat::GRAY => FourCc::GRAY,
        _ => FourCc::RGB3,
    }
}

/// Decode a tagged frame into packed 8-bit RGB for display.
///
/// Returns the decoded dimensions together with the pixel bytes, or `None`
/// when the encoding has no native decoder or the payload is malformed.
pub fn decode_rgb(frame: &Frame) -> Option<(u32, u32, Vec<u8>)> {
    let format = to_frame_format(frame.encoding)?;
    let buffer = Buffer::new(
        Resolution::new(frame.width, frame.height),
        &frame.data,
        format,
    );
    let image = buffer.decode_image::<RgbFormat>().ok()?;
    let (width, height) = image.dimensions();
    Some((width, height, image.into_raw()))
}

/// Tagged frame from a native buffer, no colour conversion applied
pub(crate) fn frame_from_buffer(buffer: &Buffer) -> Frame {
    Frame {
        width: buffer.resolution().width(),
        height: buffer.resolution().height(),
        encoding: from_frame_format(buffer.source_frame_format()),
        data: buffer.buffer().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_frame_format_mapping() {
        assert_eq!(to_frame_format(FourCc::MJPG), Some(FrameFormat::MJPEG));
        // Both spellings of packed 4:2:2 land on the same native format.
        assert_eq!(to_frame_format(FourCc::YUYV), Some(FrameFormat::YUYV));
        assert_eq!(to_frame_format(FourCc::YUY2), Some(FrameFormat::YUYV));
        assert_eq!(to_frame_format(FourCc::parse("H264").unwrap()), None);
        assert_eq!(from_frame_format(FrameFormat::YUYV), FourCc::YUYV);
    }

    #[test]
    fn test_decode_rgb_produces_packed_pixels() {
        let frame = Frame {
            width: 4,
            height: 2,
            encoding: FourCc::YUYV,
            data: vec![0x80; 4 * 2 * 2],
        };
        let (width, height, pixels) = decode_rgb(&frame).unwrap();
        assert_eq!((width, height), (4, 2));
        assert_eq!(pixels.len(), 4 * 2 * 3);
    }

    #[test]
    fn test_decode_rgb_rejects_unknown_encodings() {
        let frame = Frame {
            width: 2,
            height: 2,
            encoding: FourCc::parse("H264").unwrap(),
            data: vec![0; 16],
        };
        assert!(decode_rgb(&frame).is_none());
    }
}
