//! Binary sink for raw frame payloads
//!
//! Frames are written back to back with no container or colour conversion;
//! the JSON metadata record carries the shape needed to slice them apart.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use scopeview_capture::Frame;

/// Destination for raw frame bytes, either a file or stdout (`-`)
pub struct RawDumpSink {
    writer: Box<dyn Write>,
    to_stdout: bool,
    bytes_written: u64,
    frames_written: u32,
}

impl RawDumpSink {
    /// Open the sink. The path `-` selects stdout.
    pub fn create(path: &str) -> io::Result<Self> {
        if path == "-" {
            Ok(Self::from_writer(Box::new(io::stdout()), true))
        } else {
            let file = File::create(path)?;
            Ok(Self::from_writer(Box::new(BufWriter::new(file)), false))
        }
    }

    pub fn from_writer(writer: Box<dyn Write>, to_stdout: bool) -> Self {
        Self {
            writer,
            to_stdout,
            bytes_written: 0,
            frames_written: 0,
        }
    }

    /// Append one frame's payload. Returns the number of bytes written.
    pub fn write_frame(&mut self, frame: &Frame) -> io::Result<usize> {
        self.writer.write_all(&frame.data)?;
        self.bytes_written += frame.data.len() as u64;
        self.frames_written += 1;
        Ok(frame.data.len())
    }

    pub fn to_stdout(&self) -> bool {
        self.to_stdout
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and close the sink. Stdout is flushed but never closed.
    pub fn finish(mut self) -> io::Result<(u64, u32)> {
        self.writer.flush()?;
        Ok((self.bytes_written, self.frames_written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopeview_capture::FourCc;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frame(payload: &[u8]) -> Frame {
        Frame {
            width: payload.len() as u32 / 2,
            height: 1,
            encoding: FourCc::YUYV,
            data: payload.to_vec(),
        }
    }

    #[test]
    fn test_frames_are_concatenated_in_order() {
        let buffer = SharedBuffer::default();
        let mut sink = RawDumpSink::from_writer(Box::new(buffer.clone()), false);

        assert_eq!(sink.write_frame(&frame(&[1, 2, 3, 4])).unwrap(), 4);
        assert_eq!(sink.write_frame(&frame(&[5, 6])).unwrap(), 2);

        let (bytes, frames) = sink.finish().unwrap();
        assert_eq!(bytes, 6);
        assert_eq!(frames, 2);
        assert_eq!(*buffer.0.lock().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_stdout_selection() {
        let sink = RawDumpSink::create("-").unwrap();
        assert!(sink.to_stdout());
    }
}
