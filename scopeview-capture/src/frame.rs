//! Frame and pixel-encoding types
//!
//! Frames are tagged values constructed uniformly regardless of which
//! backend produced them, so downstream consumers never branch on backend
//! identity.

use std::fmt;

use crate::error::{CaptureError, CaptureResult};

/// Four-character pixel-encoding code negotiated with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// MJPEG compressed frames
    pub const MJPG: Self = Self(*b"MJPG");
    /// Packed YUV 4:2:2
    pub const YUYV: Self = Self(*b"YUYV");
    /// DirectShow spelling of packed YUV 4:2:2
    pub const YUY2: Self = Self(*b"YUY2");
    /// Semi-planar YUV 4:2:0
    pub const NV12: Self = Self(*b"NV12");
    /// 8-bit greyscale
    pub const GRAY: Self = Self(*b"GRAY");
    /// Packed 24-bit RGB
    pub const RGB3: Self = Self(*b"RGB3");

    /// Parse a user-supplied token into an uppercased code.
    ///
    /// Anything that is not exactly 4 characters is rejected.
    pub fn parse(token: &str) -> CaptureResult<Self> {
        let trimmed = token.trim();
        if trimmed.len() != 4 || !trimmed.is_ascii() {
            return Err(CaptureError::InvalidFormatSpec {
                token: token.to_string(),
                reason: "FOURCC codes must be exactly 4 ASCII characters".to_string(),
            });
        }
        let upper = trimmed.to_ascii_uppercase();
        let bytes = upper.as_bytes();
        Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Normalize a user token, allowing the unforced sentinels.
    ///
    /// `auto`, `default`, `none` and the empty string mean "leave the
    /// driver default alone" and normalize to `None`.
    pub fn normalize(token: Option<&str>) -> CaptureResult<Option<Self>> {
        let Some(token) = token else {
            return Ok(None);
        };
        let trimmed = token.trim();
        if trimmed.is_empty() || matches!(trimmed.to_ascii_lowercase().as_str(), "auto" | "default" | "none") {
            return Ok(None);
        }
        Self::parse(trimmed).map(Some)
    }

    /// True when two codes describe the same pixel layout.
    ///
    /// `YUYV` and `YUY2` are two conventions for the same encoding and are
    /// treated as synonymous.
    pub fn matches(&self, other: FourCc) -> bool {
        if *self == other {
            return true;
        }
        let pair = (*self, other);
        pair == (Self::YUYV, Self::YUY2) || pair == (Self::YUY2, Self::YUYV)
    }

    /// Raw code bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{}", byte as char)?;
        }
        Ok(())
    }
}

/// One captured frame, tagged with the geometry and encoding it arrived in
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel encoding the bytes are laid out in
    pub encoding: FourCc,
    /// Raw frame bytes, no colour conversion applied
    pub data: Vec<u8>,
}

impl Frame {
    /// Size of the frame payload in bytes
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// The mode actually reported by an opened device after configuration
///
/// Read back from the handle, never echoed from the request; it may differ
/// from what was asked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegotiatedMode {
    /// Active frame width in pixels
    pub width: u32,
    /// Active frame height in pixels
    pub height: u32,
    /// Active frame rate
    pub fps: f64,
    /// Active pixel encoding
    pub encoding: FourCc,
}

impl fmt::Display for NegotiatedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} @ {:.2} fps, format {}",
            self.width, self.height, self.fps, self.encoding
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uppercases() {
        let code = FourCc::parse("mjpg").unwrap();
        assert_eq!(code, FourCc::MJPG);
        assert_eq!(code.to_string(), "MJPG");
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(FourCc::parse("YU").is_err());
        assert!(FourCc::parse("YUYV2").is_err());
    }

    #[test]
    fn test_normalize_sentinels() {
        assert_eq!(FourCc::normalize(None).unwrap(), None);
        assert_eq!(FourCc::normalize(Some("auto")).unwrap(), None);
        assert_eq!(FourCc::normalize(Some("Default")).unwrap(), None);
        assert_eq!(FourCc::normalize(Some("none")).unwrap(), None);
        assert_eq!(FourCc::normalize(Some("  ")).unwrap(), None);
        assert_eq!(
            FourCc::normalize(Some("yuyv")).unwrap(),
            Some(FourCc::YUYV)
        );
    }

    #[test]
    fn test_yuyv_yuy2_synonym() {
        assert!(FourCc::YUYV.matches(FourCc::YUY2));
        assert!(FourCc::YUY2.matches(FourCc::YUYV));
        assert!(!FourCc::MJPG.matches(FourCc::YUYV));
    }
}
