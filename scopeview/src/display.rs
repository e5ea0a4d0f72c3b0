//! Viewer presentation loop
//!
//! Decodes each captured frame to RGB and pushes it to a preview window.
//! There is exactly one display context per viewer process; it is created
//! after the first successful acquisition and torn down once on drop. The
//! window itself sits behind [`PresentSurface`] so the pacing and shutdown
//! logic stays testable without a display server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use minifb::{Key, ScaleMode, Window, WindowOptions};
use scopeview_capture::{decode_rgb, Frame};
use tracing::{info, warn};

/// How often the measured frame rate is reported
const PACING_WINDOW: Duration = Duration::from_secs(5);

/// Where decoded frames end up on screen
pub trait PresentSurface {
    /// False once the user has closed the window or asked to quit
    fn is_open(&self) -> bool;

    /// Push one decoded frame, packed as 0RGB, one `u32` per pixel
    fn present(&mut self, width: usize, height: usize, pixels: &[u32]) -> anyhow::Result<()>;
}

/// Preview window surface
pub struct WindowSurface {
    window: Window,
}

impl WindowSurface {
    pub fn open(title: &str, width: usize, height: usize) -> anyhow::Result<Self> {
        let options = WindowOptions {
            resize: true,
            scale_mode: ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        };
        let window = Window::new(title, width, height, options)
            .context("unable to open the preview window")?;
        Ok(Self { window })
    }
}

impl PresentSurface for WindowSurface {
    fn is_open(&self) -> bool {
        self.window.is_open()
            && !self.window.is_key_down(Key::Escape)
            && !self.window.is_key_down(Key::Q)
    }

    fn present(&mut self, width: usize, height: usize, pixels: &[u32]) -> anyhow::Result<()> {
        self.window
            .update_with_buffer(pixels, width, height)
            .context("unable to draw to the preview window")
    }
}

/// Pack tightly packed 8-bit RGB into the 0RGB `u32` layout the window wants
pub(crate) fn pack_0rgb(rgb: &[u8]) -> Vec<u32> {
    rgb.chunks_exact(3)
        .map(|px| (u32::from(px[0]) << 16) | (u32::from(px[1]) << 8) | u32::from(px[2]))
        .collect()
}

/// Single-owner presentation context for the live viewer.
///
/// `present` consumes one frame per call and returns `false` when the loop
/// should stop: the shared quit flag has been raised (Ctrl-C), the window
/// was closed, or Escape/Q was pressed. Frame pacing is measured over a
/// fixed window and logged.
pub struct DisplayContext {
    surface: Box<dyn PresentSurface>,
    quit: Arc<AtomicBool>,
    frames_presented: u64,
    window_start: Instant,
    window_frames: u32,
    last_mode: Option<(u32, u32)>,
    decode_warned: bool,
}

impl DisplayContext {
    /// Open a preview window and wrap it in a display context
    pub fn open(
        title: &str,
        width: u32,
        height: u32,
        quit: Arc<AtomicBool>,
    ) -> anyhow::Result<Self> {
        let surface = WindowSurface::open(title, width as usize, height as usize)?;
        Ok(Self::with_surface(Box::new(surface), quit))
    }

    pub fn with_surface(surface: Box<dyn PresentSurface>, quit: Arc<AtomicBool>) -> Self {
        Self {
            surface,
            quit,
            frames_presented: 0,
            window_start: Instant::now(),
            window_frames: 0,
            last_mode: None,
            decode_warned: false,
        }
    }

    /// Present one frame. Returns `false` when the viewer should exit.
    pub fn present(&mut self, frame: &Frame) -> bool {
        if self.quit.load(Ordering::SeqCst) || !self.surface.is_open() {
            return false;
        }

        // A frame the decoder cannot handle is skipped, not fatal; the
        // stream may still recover or renegotiate.
        let Some((width, height, rgb)) = decode_rgb(frame) else {
            if !self.decode_warned {
                warn!(encoding = %frame.encoding, "frame could not be decoded for display");
                self.decode_warned = true;
            }
            return true;
        };

        let mode = (width, height);
        if self.last_mode != Some(mode) {
            info!(width, height, encoding = %frame.encoding, "display mode");
            self.last_mode = Some(mode);
        }

        let pixels = pack_0rgb(&rgb);
        if let Err(error) = self
            .surface
            .present(width as usize, height as usize, &pixels)
        {
            warn!(%error, "presentation failed; closing the viewer");
            return false;
        }

        self.frames_presented += 1;
        self.window_frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= PACING_WINDOW {
            let fps = f64::from(self.window_frames) / elapsed.as_secs_f64();
            info!(fps = format_args!("{fps:.1}"), "frame pacing");
            self.window_start = Instant::now();
            self.window_frames = 0;
        }

        true
    }

    /// Total frames presented over the context's lifetime
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl Drop for DisplayContext {
    fn drop(&mut self) {
        info!(frames = self.frames_presented, "viewer display closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopeview_capture::FourCc;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records presented frames; `open_for` bounds how many calls keep the
    /// surface alive.
    #[derive(Default)]
    struct FakeSurface {
        presented: Rc<RefCell<Vec<(usize, usize, usize)>>>,
        open_for: Option<usize>,
        checks: RefCell<usize>,
    }

    impl PresentSurface for FakeSurface {
        fn is_open(&self) -> bool {
            let mut checks = self.checks.borrow_mut();
            *checks += 1;
            self.open_for.map_or(true, |limit| *checks <= limit)
        }

        fn present(&mut self, width: usize, height: usize, pixels: &[u32]) -> anyhow::Result<()> {
            self.presented.borrow_mut().push((width, height, pixels.len()));
            Ok(())
        }
    }

    fn yuyv_frame(width: u32, height: u32) -> Frame {
        Frame {
            width,
            height,
            encoding: FourCc::YUYV,
            data: vec![0x80; (width * height * 2) as usize],
        }
    }

    #[test]
    fn test_present_decodes_and_counts_frames_until_quit() {
        let quit = Arc::new(AtomicBool::new(false));
        let presented = Rc::new(RefCell::new(Vec::new()));
        let surface = FakeSurface {
            presented: Rc::clone(&presented),
            ..Default::default()
        };
        let mut display = DisplayContext::with_surface(Box::new(surface), Arc::clone(&quit));

        assert!(display.present(&yuyv_frame(640, 480)));
        assert!(display.present(&yuyv_frame(640, 480)));
        assert_eq!(display.frames_presented(), 2);
        assert_eq!(&*presented.borrow(), &[(640, 480, 640 * 480), (640, 480, 640 * 480)]);

        quit.store(true, Ordering::SeqCst);
        assert!(!display.present(&yuyv_frame(640, 480)));
        // A refused frame is not counted.
        assert_eq!(display.frames_presented(), 2);
    }

    #[test]
    fn test_quit_flag_checked_before_first_frame() {
        let quit = Arc::new(AtomicBool::new(true));
        let mut display = DisplayContext::with_surface(Box::new(FakeSurface::default()), quit);
        assert!(!display.present(&yuyv_frame(640, 480)));
        assert_eq!(display.frames_presented(), 0);
    }

    #[test]
    fn test_closed_window_stops_the_loop() {
        let quit = Arc::new(AtomicBool::new(false));
        let surface = FakeSurface {
            open_for: Some(1),
            ..Default::default()
        };
        let mut display = DisplayContext::with_surface(Box::new(surface), quit);

        assert!(display.present(&yuyv_frame(640, 480)));
        assert!(!display.present(&yuyv_frame(640, 480)));
        assert_eq!(display.frames_presented(), 1);
    }

    #[test]
    fn test_undecodable_frame_is_skipped_not_fatal() {
        let quit = Arc::new(AtomicBool::new(false));
        let presented = Rc::new(RefCell::new(Vec::new()));
        let surface = FakeSurface {
            presented: Rc::clone(&presented),
            ..Default::default()
        };
        let mut display = DisplayContext::with_surface(Box::new(surface), quit);

        let frame = Frame {
            width: 2,
            height: 2,
            encoding: FourCc::parse("H264").unwrap(),
            data: vec![0; 16],
        };
        assert!(display.present(&frame));
        assert_eq!(display.frames_presented(), 0);
        assert!(presented.borrow().is_empty());
    }

    #[test]
    fn test_pack_0rgb_pixel_layout() {
        let pixels = pack_0rgb(&[0xff, 0x00, 0x00, 0x12, 0x34, 0x56]);
        assert_eq!(pixels, vec![0x00ff_0000, 0x0012_3456]);
    }
}
