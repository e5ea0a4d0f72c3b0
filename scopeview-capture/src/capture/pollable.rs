//! Pollable capture handles backed by the native camera APIs
//!
//! Open reports success before many drivers actually start streaming, so a
//! handle opened here is only trusted after the acquisition engine has
//! probed it for a real frame.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use tracing::debug;

use super::{frame_from_buffer, from_frame_format, to_frame_format, CaptureHandle};
use crate::devices::DeviceRef;
use crate::format::{select_format, CaptureRequest, FormatDescriptor};
use crate::frame::{FourCc, Frame, NegotiatedMode};

pub(crate) fn camera_index(device: &DeviceRef) -> CameraIndex {
    match device {
        DeviceRef::Index(index) => CameraIndex::Index(*index),
        // V4L devices open by node number; a by-id path has to be followed
        // to its /dev/videoN target first.
        DeviceRef::Path(path) => match crate::devices::v4l_node_index(path) {
            Some(node) => CameraIndex::Index(node),
            None => CameraIndex::String(path.clone()),
        },
    }
}

/// Format descriptors for the modes a camera advertises natively.
///
/// The native API reports a single rate per mode, so `min_fps == max_fps`.
pub(crate) fn advertised_formats(
    native: &[nokhwa::utils::CameraFormat],
) -> Vec<FormatDescriptor> {
    native
        .iter()
        .enumerate()
        .map(|(native_index, format)| FormatDescriptor {
            width: format.resolution().width(),
            height: format.resolution().height(),
            min_fps: format.frame_rate() as f64,
            max_fps: format.frame_rate() as f64,
            encoding: from_frame_format(format.format()),
            native_index,
        })
        .collect()
}

/// Resolution to apply for a partially constrained request.
///
/// A request may carry only one dimension; the other is filled in from the
/// camera's current mode so the constrained axis still takes effect.
pub(crate) fn requested_resolution(
    current: (u32, u32),
    request: &CaptureRequest,
) -> Option<Resolution> {
    if request.width.is_none() && request.height.is_none() {
        return None;
    }
    Some(Resolution::new(
        request.width.unwrap_or(current.0),
        request.height.unwrap_or(current.1),
    ))
}

/// A live pollable camera stream
pub struct PollableHandle {
    camera: Camera,
}

pub(crate) fn open_pollable(
    device: &DeviceRef,
    api: ApiBackend,
) -> Option<Box<dyn CaptureHandle>> {
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
    match Camera::with_backend(camera_index(device), requested, api) {
        Ok(camera) => Some(Box::new(PollableHandle { camera })),
        Err(error) => {
            debug!(%device, %error, "unable to open device with this backend");
            None
        }
    }
}

impl CaptureHandle for PollableHandle {
    fn configure(&mut self, request: &CaptureRequest, encoding: Option<FourCc>) {
        let effective = request.with_fourcc(encoding);

        // Prefer an exact advertised mode when the device enumerates them.
        let mut mode_applied = false;
        if let Ok(native) = self.camera.compatible_camera_formats() {
            let descriptors = advertised_formats(&native);
            if let Some(selected) = select_format(&descriptors, &effective) {
                let chosen = native[selected.native_index];
                match self.camera.set_camera_format(chosen) {
                    Ok(()) => mode_applied = true,
                    Err(error) => debug!(%error, "device refused the selected format"),
                }
            }
        }

        // Otherwise apply the raw constraints one by one; the device may
        // honor any subset of them.
        if !mode_applied {
            if let Some(format) = effective.fourcc.and_then(to_frame_format) {
                if let Err(error) = self.camera.set_frame_format(format) {
                    debug!(%error, "pixel format not accepted");
                }
            }
            let current = self.camera.resolution();
            if let Some(resolution) =
                requested_resolution((current.width(), current.height()), &effective)
            {
                if let Err(error) = self.camera.set_resolution(resolution) {
                    debug!(%error, "resolution not accepted");
                }
            }
            if let Some(fps) = effective.fps {
                if let Err(error) = self.camera.set_frame_rate(fps.round() as u32) {
                    debug!(%error, "frame rate not accepted");
                }
            }
        }
        if let Some(depth) = effective.buffer_count {
            // The native layer manages its own queue depth.
            debug!(depth, "driver buffer depth request left to the backend");
        }

        if let Err(error) = self.camera.open_stream() {
            debug!(%error, "stream did not start; reads will re-attempt");
        }
    }

    fn read(&mut self) -> Option<Frame> {
        if !self.camera.is_stream_open() {
            self.camera.open_stream().ok()?;
        }
        match self.camera.frame() {
            Ok(buffer) => Some(frame_from_buffer(&buffer)),
            Err(error) => {
                debug!(%error, "frame read failed");
                None
            }
        }
    }

    fn negotiated(&self) -> NegotiatedMode {
        let resolution = self.camera.resolution();
        NegotiatedMode {
            width: resolution.width(),
            height: resolution.height(),
            fps: self.camera.frame_rate() as f64,
            encoding: from_frame_format(self.camera.frame_format()),
        }
    }
}

impl Drop for PollableHandle {
    fn drop(&mut self) {
        if self.camera.is_stream_open() {
            if let Err(error) = self.camera.stop_stream() {
                debug!(%error, "stream did not stop cleanly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_index_opens_path_devices_by_node_number() {
        assert_eq!(camera_index(&DeviceRef::Index(2)), CameraIndex::Index(2));
        assert_eq!(
            camera_index(&DeviceRef::Path("/dev/video3".to_string())),
            CameraIndex::Index(3)
        );
        // Paths with no video node behind them stay opaque strings.
        assert_eq!(
            camera_index(&DeviceRef::Path("front-cam".to_string())),
            CameraIndex::String("front-cam".to_string())
        );
    }

    #[test]
    fn test_requested_resolution_fills_missing_dimension_from_current_mode() {
        let current = (1920, 1080);
        let request = CaptureRequest {
            width: Some(1280),
            ..Default::default()
        };
        assert_eq!(
            requested_resolution(current, &request),
            Some(Resolution::new(1280, 1080))
        );

        let request = CaptureRequest {
            height: Some(720),
            ..Default::default()
        };
        assert_eq!(
            requested_resolution(current, &request),
            Some(Resolution::new(1920, 720))
        );

        let request = CaptureRequest {
            width: Some(1280),
            height: Some(720),
            ..Default::default()
        };
        assert_eq!(
            requested_resolution(current, &request),
            Some(Resolution::new(1280, 720))
        );

        assert_eq!(requested_resolution(current, &CaptureRequest::default()), None);
    }
}
