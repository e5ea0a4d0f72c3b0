//! JSON metadata side artifact for dump mode
//!
//! Records the device, the requested constraints, the mode the device
//! actually negotiated, and the shape of every captured frame, so a raw
//! payload file can be interpreted offline.

use serde::Serialize;

use scopeview_capture::{CaptureRequest, Frame, NegotiatedMode};

/// Constraints the user asked for; `None` fields were left to the driver
#[derive(Debug, Serialize)]
pub struct RequestedMode {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub fourcc: Option<String>,
}

/// The mode read back from the device after configuration
#[derive(Debug, Serialize)]
pub struct CapturedMode {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub fourcc: String,
}

impl From<&NegotiatedMode> for CapturedMode {
    fn from(mode: &NegotiatedMode) -> Self {
        Self {
            width: mode.width,
            height: mode.height,
            fps: mode.fps,
            fourcc: mode.encoding.to_string(),
        }
    }
}

/// Shape and size of one captured frame
#[derive(Debug, Serialize)]
pub struct FrameRecord {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub bytes: usize,
}

/// Top-level metadata record written next to the raw payload
#[derive(Debug, Serialize)]
pub struct DumpMetadata {
    pub device: String,
    pub requested: RequestedMode,
    pub captured: Option<CapturedMode>,
    pub frames: Vec<FrameRecord>,
}

impl DumpMetadata {
    pub fn new(device: impl Into<String>, request: &CaptureRequest) -> Self {
        Self {
            device: device.into(),
            requested: RequestedMode {
                width: request.width,
                height: request.height,
                fps: request.fps,
                fourcc: request.fourcc.map(|fourcc| fourcc.to_string()),
            },
            captured: None,
            frames: Vec::new(),
        }
    }

    pub fn record_frame(&mut self, index: u32, frame: &Frame) {
        self.frames.push(FrameRecord {
            index,
            width: frame.width,
            height: frame.height,
            encoding: frame.encoding.to_string(),
            bytes: frame.data.len(),
        });
    }

    pub fn set_captured(&mut self, mode: &NegotiatedMode) {
        self.captured = Some(mode.into());
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopeview_capture::FourCc;

    #[test]
    fn test_metadata_layout() {
        let request = CaptureRequest {
            width: Some(1280),
            height: Some(720),
            fps: None,
            fourcc: Some(FourCc::YUYV),
            fallback_fourcc: None,
            buffer_count: None,
        };
        let mut metadata = DumpMetadata::new("/dev/video0", &request);
        metadata.record_frame(
            0,
            &Frame {
                width: 1280,
                height: 720,
                encoding: FourCc::YUYV,
                data: vec![0u8; 1280 * 720 * 2],
            },
        );
        metadata.set_captured(&NegotiatedMode {
            width: 1280,
            height: 720,
            fps: 30.0,
            encoding: FourCc::YUYV,
        });

        let value: serde_json::Value =
            serde_json::from_str(&metadata.to_json().unwrap()).unwrap();
        assert_eq!(value["device"], "/dev/video0");
        assert_eq!(value["requested"]["width"], 1280);
        assert_eq!(value["requested"]["fps"], serde_json::Value::Null);
        assert_eq!(value["requested"]["fourcc"], "YUYV");
        assert_eq!(value["captured"]["fps"], 30.0);
        assert_eq!(value["frames"][0]["index"], 0);
        assert_eq!(value["frames"][0]["bytes"], 1280 * 720 * 2);
    }

    #[test]
    fn test_unconstrained_request_serializes_nulls() {
        let metadata = DumpMetadata::new("0", &CaptureRequest::default());
        let value: serde_json::Value =
            serde_json::from_str(&metadata.to_json().unwrap()).unwrap();
        assert_eq!(value["requested"]["width"], serde_json::Value::Null);
        assert_eq!(value["requested"]["fourcc"], serde_json::Value::Null);
        assert_eq!(value["captured"], serde_json::Value::Null);
        assert_eq!(value["frames"].as_array().unwrap().len(), 0);
    }
}
