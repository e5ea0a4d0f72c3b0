//! Format matching against natively advertised capture modes
//!
//! Backends that enumerate their supported modes hand the engine a list of
//! [`FormatDescriptor`]s; the matcher picks the one that best satisfies the
//! user's constraints, or signals that no format should be forced at all.

use crate::frame::FourCc;

/// One capture mode a device advertises natively
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    /// Mode width in pixels
    pub width: u32,
    /// Mode height in pixels
    pub height: u32,
    /// Lowest frame rate the mode supports
    pub min_fps: f64,
    /// Highest frame rate the mode supports
    pub max_fps: f64,
    /// Pixel encoding of the mode
    pub encoding: FourCc,
    /// Index of the mode in the device's native enumeration
    pub native_index: usize,
}

/// User-declared capture constraints; absence means "no constraint"
#[derive(Debug, Clone, Default)]
pub struct CaptureRequest {
    /// Requested frame width in pixels
    pub width: Option<u32>,
    /// Requested frame height in pixels
    pub height: Option<u32>,
    /// Requested frame rate
    pub fps: Option<f64>,
    /// Preferred pixel encoding
    pub fourcc: Option<FourCc>,
    /// Fallback pixel encoding tried when the preferred one fails
    pub fallback_fourcc: Option<FourCc>,
    /// Requested driver buffer queue depth
    pub buffer_count: Option<u32>,
}

impl CaptureRequest {
    /// True when no format-relevant constraint is set
    pub fn is_unconstrained(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.fps.is_none() && self.fourcc.is_none()
    }

    /// Copy of this request with the preferred encoding replaced.
    ///
    /// Used by the acquisition engine while cascading through encoding
    /// candidates.
    pub fn with_fourcc(&self, fourcc: Option<FourCc>) -> Self {
        Self {
            fourcc,
            ..self.clone()
        }
    }
}

fn descriptor_matches(descriptor: &FormatDescriptor, request: &CaptureRequest) -> bool {
    if let Some(width) = request.width {
        if descriptor.width != width {
            return false;
        }
    }
    if let Some(height) = request.height {
        if descriptor.height != height {
            return false;
        }
    }
    if let Some(fps) = request.fps {
        if !(descriptor.min_fps <= fps && fps <= descriptor.max_fps) {
            return false;
        }
    }
    if let Some(requested) = request.fourcc {
        if !requested.matches(descriptor.encoding) {
            return false;
        }
    }
    true
}

/// Distance between the requested fps and the closest rate the mode offers
fn fps_distance(descriptor: &FormatDescriptor, fps: f64) -> f64 {
    (fps - fps.clamp(descriptor.min_fps, descriptor.max_fps)).abs()
}

/// Select the advertised mode that best satisfies the request.
///
/// Returns `None` when the request carries no constraints (let the driver
/// default stand) or when nothing matches (the caller proceeds without
/// forcing a format; not an error). A requested fps only matches modes
/// whose rate range contains it; ties break by enumeration order.
pub fn select_format<'a>(
    available: &'a [FormatDescriptor],
    request: &CaptureRequest,
) -> Option<&'a FormatDescriptor> {
    if request.is_unconstrained() {
        return None;
    }
    let matches = available
        .iter()
        .filter(|descriptor| descriptor_matches(descriptor, request));
    match request.fps {
        Some(fps) => matches.min_by(|a, b| {
            fps_distance(a, fps)
                .total_cmp(&fps_distance(b, fps))
                .then(a.native_index.cmp(&b.native_index))
        }),
        None => matches.min_by_key(|descriptor| descriptor.native_index),
    }
}

/// Ordered encoding candidates the acquisition engine will cascade through:
/// the preferred encoding, the fallback when distinct, then the driver
/// default as a last resort.
pub fn fourcc_candidates(request: &CaptureRequest) -> Vec<Option<FourCc>> {
    let mut candidates = Vec::new();
    if let Some(preferred) = request.fourcc {
        candidates.push(Some(preferred));
    }
    if let Some(fallback) = request.fallback_fourcc {
        if !candidates.contains(&Some(fallback)) {
            candidates.push(Some(fallback));
        }
    }
    candidates.push(None);
    candidates
}
