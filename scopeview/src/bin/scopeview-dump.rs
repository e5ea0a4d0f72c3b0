//! Raw frame dumper for USB microscope cameras.
//!
//! Captures frames without colour conversion and writes the payloads back
//! to back to a file or stdout, with an optional JSON metadata record
//! describing how to slice them apart.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use scopeview::metadata::DumpMetadata;
use scopeview::sink::RawDumpSink;
use scopeview::{init_tracing, DEFAULT_DEVICE_HINT};
use scopeview_capture::{
    acquire, format_device_list, list_devices, plan_backends, resolve_device, BackendChoice,
    CaptureRequest, DeviceRef, FourCc, NativeConnector, ProbeConfig,
};

#[derive(Debug, Parser)]
#[command(name = "scopeview-dump")]
#[command(about = "Dump raw frames from a capture device (no colour conversion)")]
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

    /// Desired pixel format (e.g. YUYV, MJPG). Use 'auto' to skip forcing.
    #[arg(long, default_value = "YUYV")]
    fourcc: String,

    /// Capture backend: auto, msmf, v4l2, avfoundation, any, grabber
    #[arg(long, default_value = "auto")]
    capture_backend: String,

    /// How many frames to probe when validating a capture
    #[arg(long, default_value_t = 5)]
    probe_frames: u32,

    /// How many frames to capture
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Binary output file path (use '-' for stdout)
    #[arg(long, default_value = "frame.raw")]
    output: String,

    /// Optional path to write JSON metadata about the capture
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Suppress progress output (useful when piping raw data)
    #[arg(long)]
    silent: bool,
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
    let choice: BackendChoice = args.capture_backend.parse()?;

    let (device, devices) = resolve_device(args.device.as_deref(), DEFAULT_DEVICE_HINT)?;
    let device_name = match &device {
        DeviceRef::Index(index) => devices.get(*index as usize).cloned(),
        DeviceRef::Path(_) => None,
    };

    let request = CaptureRequest {
        width: args.width,
        height: args.height,
        fps: args.fps,
        fourcc,
        fallback_fourcc: None,
        buffer_count: None,
    };
    let probe = ProbeConfig {
        probe_frames: args.probe_frames,
        ..ProbeConfig::default()
    };

    let connector = NativeConnector;
    let acquired = match acquire(
        &connector,
        &device,
        device_name.as_deref(),
        &request,
        &plan_backends(choice),
        &probe,
    ) {
        Ok(acquired) => acquired,
        Err(err) => {
            eprintln!("Failed to open the camera: {err}");
            eprintln!("Use --list-devices or --device to select the capture device.");
            return Ok(ExitCode::from(1));
        }
    };

    let mut handle = acquired.handle;
    let mut metadata = DumpMetadata::new(device.to_string(), &request);
    let mut sink = RawDumpSink::create(&args.output)
        .with_context(|| format!("failed to open output '{}'", args.output))?;

    // The probe already pulled one good frame; it is the first one dumped.
    let mut primed = Some(acquired.primed);
    for index in 0..args.frames {
        let frame = match primed.take().or_else(|| handle.read()) {
            Some(frame) => frame,
            None => {
                eprintln!("Failed to read frame from camera.");
                return Ok(ExitCode::from(3));
            }
        };
        let bytes = sink
            .write_frame(&frame)
            .context("failed to write frame payload")?;
        metadata.record_frame(index, &frame);
        if !args.silent {
            println!(
                "Captured frame {}/{}: {}x{} {}, {} bytes",
                index + 1,
                args.frames,
                frame.width,
                frame.height,
                frame.encoding,
                bytes
            );
        }
    }

    metadata.set_captured(&handle.negotiated());
    drop(handle);

    let to_stdout = sink.to_stdout();
    let (bytes_written, _) = sink.finish().context("failed to flush output")?;

    if let Some(path) = &args.metadata {
        fs::write(path, metadata.to_json()?)
            .with_context(|| format!("failed to write metadata to '{}'", path.display()))?;
        if !args.silent {
            println!("Metadata written to {}", path.display());
        }
    }

    if !args.silent && !to_stdout {
        println!("Wrote {bytes_written} bytes to {}", args.output);
    }

    Ok(ExitCode::SUCCESS)
}
