//! # ScopeView Capture
//!
//! Capture acquisition and resilient streaming for USB microscope cameras
//! (or any generic video capture device) across heterogeneous platforms
//! and capture APIs.
//!
//! The crate resolves a physical device from a name/index, negotiates a
//! working combination of backend, pixel format, resolution and frame rate
//! by probing candidates in priority order, and keeps a live stream alive
//! across transient read failures and full device loss via bounded,
//! backend-aware reconnection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scopeview_capture::{
//!     plan_backends, resolve_device, BackendChoice, CaptureRequest, NativeConnector,
//!     ProbeConfig, RetryPolicy, StreamSession,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (device, _devices) = resolve_device(None, "MikrOkularHD")?;
//!     let connector = NativeConnector;
//!     let mut session = StreamSession::open(
//!         &connector,
//!         device,
//!         None,
//!         CaptureRequest::default(),
//!         plan_backends(BackendChoice::Auto),
//!         RetryPolicy::default(),
//!         ProbeConfig::default(),
//!     )?;
//!     let frame = session.next_frame()?;
//!     println!("{}x{} {}", frame.width, frame.height, frame.encoding);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod acquire;
pub mod backend;
pub mod capture;
pub mod devices;
pub mod error;
pub mod format;
pub mod frame;
pub mod stream;

// Re-export main types
pub use acquire::{acquire, Acquired, ProbeConfig};
pub use backend::{plan_backends, replan, BackendChoice, BackendKind};
pub use capture::push::FrameSlot;
pub use capture::{decode_rgb, CaptureConnector, CaptureHandle, NativeConnector};
pub use devices::{
    format_device_list, list_devices, resolve_device, resolve_indexed, resolve_path_based,
    v4l_node_index, DeviceLister, DeviceRef,
};
pub use error::{CaptureError, CaptureResult};
pub use format::{fourcc_candidates, select_format, CaptureRequest, FormatDescriptor};
pub use frame::{FourCc, Frame, NegotiatedMode};
pub use stream::{RetryPolicy, StreamPhase, StreamSession};
