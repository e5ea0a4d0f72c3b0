//! Live viewer for USB microscope cameras.
//!
//! Resolves the device, walks the backend/format candidates until a live
//! stream is found, then presents frames until Ctrl-C or an unrecoverable
//! stream loss.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use scopeview::display::DisplayContext;
use scopeview::{init_tracing, DEFAULT_DEVICE_HINT};
use scopeview_capture::{
    format_device_list, list_devices, plan_backends, resolve_device, BackendChoice,
    CaptureRequest, DeviceRef, FourCc, NativeConnector, ProbeConfig, RetryPolicy, StreamSession,
};

#[derive(Debug, Parser)]
#[command(name = "scopeview")]
#[command(about = "Display the live feed from a USB microscope camera")]
#[command(version)]
struct Args {
    /// Device index, name substring, or path (default: auto-detected)
    #[arg(long)]
    device: Option<String>,

    /// List available capture devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Request a specific frame width (pixels)
    #[arg(long)]
    width: Option<u32>,

    /// Request a specific frame height (pixels)
    #[arg(long)]
    height: Option<u32>,

    /// Request a specific frame rate
    #[arg(long)]
    fps: Option<f64>,

    /// Preferred pixel format (e.g. MJPG, YUYV). Use 'auto' to leave it up
    /// to the driver.
    #[arg(long, default_value = "MJPG")]
    fourcc: String,

    /// Fallback pixel format if the preferred one fails. Use 'auto' to
    /// disable.
    #[arg(long, default_value = "YUYV")]
    fallback_fourcc: String,

    /// Request a specific driver buffer queue size
    #[arg(long)]
    buffer_count: Option<u32>,

    /// Capture backend: auto, msmf, v4l2, avfoundation, any, grabber
    #[arg(long, default_value = "auto")]
    capture_backend: String,

    /// How many frames to probe when validating a capture
    #[arg(long, default_value_t = 5)]
    probe_frames: u32,

    /// Consecutive failed frame reads before reconnecting
    #[arg(long, default_value_t = 60)]
    max_empty: u32,

    /// Maximum number of automatic reconnect attempts
    #[arg(long, default_value_t = 5)]
    max_reconnects: u32,

    /// Seconds to wait before a reconnect attempt
    #[arg(long, default_value_t = 1.0)]
    retry_delay: f64,

    /// Disable automatic reconnect attempts
    #[arg(long)]
    no_retry: bool,

    /// Title of the preview window
    #[arg(long, default_value = "ScopeView Live")]
    window_title: String,

    /// Initial width of the preview window (pixels)
    #[arg(long, default_value_t = 1920)]
    window_width: u32,

    /// Initial height of the preview window (pixels)
    #[arg(long, default_value_t = 1080)]
    window_height: u32,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    if args.list_devices {
        let devices = list_devices()?;
        println!("{}", format_device_list(&devices));
        return Ok(ExitCode::SUCCESS);
    }

    let fourcc = FourCc::normalize(Some(args.fourcc.as_str()))?;
    let fallback_fourcc = FourCc::normalize(Some(args.fallback_fourcc.as_str()))?;
    let choice: BackendChoice = args.capture_backend.parse()?;

    let (device, devices) = resolve_device(args.device.as_deref(), DEFAULT_DEVICE_HINT)?;
    // A display name gives the acquisition engine a second way to open an
    // index that went stale between enumeration and open.
    let device_name = match &device {
        DeviceRef::Index(index) => devices.get(*index as usize).cloned(),
        DeviceRef::Path(_) => None,
    };

    let request = CaptureRequest {
        width: args.width,
        height: args.height,
        fps: args.fps,
        fourcc,
        fallback_fourcc,
        buffer_count: args.buffer_count,
    };
    let policy = RetryPolicy {
        max_empty: args.max_empty,
        max_reconnects: args.max_reconnects,
        retry_delay: Duration::from_secs_f64(args.retry_delay.max(0.0)),
        auto_retry: !args.no_retry,
        ..RetryPolicy::default()
    };
    let probe = ProbeConfig {
        probe_frames: args.probe_frames,
        ..ProbeConfig::default()
    };

    println!("Opening camera device: {device}");
    let connector = NativeConnector;
    let mut session = match StreamSession::open(
        &connector,
        device,
        device_name,
        request,
        plan_backends(choice),
        policy,
        probe,
    ) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("Failed to open the camera: {err}");
            eprintln!(
                "Use --list-devices or --device to select a camera, \
                 and try --capture-backend (msmf/v4l2) if needed."
            );
            return Ok(ExitCode::from(1));
        }
    };

    if let Some(mode) = session.negotiated() {
        println!("Active capture mode: {mode}");
    }
    println!("Press Ctrl-C, Escape or Q to quit the viewer.");

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = Arc::clone(&quit);
        ctrlc::set_handler(move || quit.store(true, Ordering::SeqCst))
            .context("failed to install the Ctrl-C handler")?;
    }

    let mut display = DisplayContext::open(
        &args.window_title,
        args.window_width,
        args.window_height,
        quit,
    )?;
    loop {
        match session.next_frame() {
            Ok(frame) => {
                if !display.present(&frame) {
                    break;
                }
            }
            Err(err) => {
                // The session has already released the capture resource;
                // stream loss ends the viewer but is not a process failure.
                eprintln!("{err}");
                break;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
