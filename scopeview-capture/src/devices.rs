//! Device enumeration and resolution across platforms
//!
//! A user-supplied token (index, name substring, or path) is resolved into
//! a concrete [`DeviceRef`] exactly once per run. Platforms with indexed
//! enumeration (Windows, macOS) match name substrings against the
//! enumerated list; Linux resolves against filesystem-exposed device paths
//! and never needs enumeration to pick a default.

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::error::{CaptureError, CaptureResult};

/// A resolved capture device: a platform index or an opaque device path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRef {
    /// Platform-assigned enumeration index
    Index(u32),
    /// Filesystem path or opaque device name
    Path(String),
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRef::Index(index) => write!(f, "{index}"),
            DeviceRef::Path(path) => write!(f, "{path}"),
        }
    }
}

/// Device enumeration collaborator
pub trait DeviceLister {
    /// Ordered list of device display names or paths
    fn list(&self) -> CaptureResult<Vec<String>>;
}

/// Lister backed by the native capture API's device query
pub struct NokhwaLister;

impl DeviceLister for NokhwaLister {
    fn list(&self) -> CaptureResult<Vec<String>> {
        let cameras = nokhwa::query(nokhwa::utils::ApiBackend::Auto).map_err(|error| {
            CaptureError::EnumerationUnavailable {
                reason: error.to_string(),
            }
        })?;
        Ok(cameras.into_iter().map(|info| info.human_name()).collect())
    }
}

/// Lister that scans the V4L device directories
///
/// Prefers `/dev/v4l/by-id` because those names carry the camera model;
/// falls back to `/dev/video*`.
pub struct V4lLister;

impl DeviceLister for V4lLister {
    fn list(&self) -> CaptureResult<Vec<String>> {
        let by_id = Path::new("/dev/v4l/by-id");
        if by_id.is_dir() {
            let mut paths: Vec<String> = std::fs::read_dir(by_id)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path().to_string_lossy().into_owned())
                .collect();
            paths.sort();
            return Ok(paths);
        }
        let mut paths: Vec<String> = std::fs::read_dir("/dev")?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("video")
            })
            .map(|entry| entry.path().to_string_lossy().into_owned())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// Index of the video node a device path points at.
///
/// `/dev/v4l/by-id` entries are symlinks to `/dev/videoN`; the native
/// capture API opens V4L devices by that `N`, not by path, so the link is
/// followed and the node number extracted. Paths that do not lead to a
/// `videoN` node yield `None`.
pub fn v4l_node_index(path: &str) -> Option<u32> {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| Path::new(path).to_path_buf());
    let name = resolved.file_name()?.to_str()?;
    name.strip_prefix("video")?.parse().ok()
}

fn parse_index(token: &str) -> Option<u32> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn find_by_substring(needle: &str, devices: &[String]) -> Option<usize> {
    let needle = needle.to_lowercase();
    devices
        .iter()
        .position(|name| name.to_lowercase().contains(&needle))
}

/// Resolve on platforms where devices are selected by enumeration index.
///
/// A plain non-negative integer token is taken as a direct index without
/// enumerating (existence checks are deferred to open time). Anything else
/// needs the enumerated list, and a miss is a hard [`CaptureError::DeviceNotFound`]
/// carrying whatever enumeration error was observed.
pub fn resolve_indexed(
    token: Option<&str>,
    hint: &str,
    lister: &dyn DeviceLister,
) -> CaptureResult<(DeviceRef, Vec<String>)> {
    if let Some(index) = token.map(str::trim).and_then(parse_index) {
        return Ok((DeviceRef::Index(index), Vec::new()));
    }

    let (devices, list_error) = match lister.list() {
        Ok(devices) => (devices, None),
        Err(error) => (Vec::new(), Some(error.to_string())),
    };

    match token.map(str::trim) {
        Some(token) => match find_by_substring(token, &devices) {
            Some(index) => Ok((DeviceRef::Index(index as u32), devices)),
            None => Err(CaptureError::DeviceNotFound {
                token: token.to_string(),
                detail: list_error,
            }),
        },
        None => {
            let index = find_by_substring(hint, &devices).unwrap_or(0);
            debug!(index, hint, "no device token given, using default index");
            Ok((DeviceRef::Index(index as u32), devices))
        }
    }
}

/// Resolve on platforms where devices are filesystem paths.
///
/// A path token is passed through untouched (existence is deferred to open
/// time) and enumeration failures never block selection: the deterministic
/// default is the first scanned path, or index 0 when nothing was found.
pub fn resolve_path_based(
    token: Option<&str>,
    hint: &str,
    lister: &dyn DeviceLister,
) -> CaptureResult<(DeviceRef, Vec<String>)> {
    if let Some(index) = token.map(str::trim).and_then(parse_index) {
        return Ok((DeviceRef::Index(index), Vec::new()));
    }
    if let Some(token) = token.map(str::trim) {
        return Ok((DeviceRef::Path(token.to_string()), lister.list().unwrap_or_default()));
    }

    let devices = lister.list().unwrap_or_default();
    let hint_lower = hint.to_lowercase();
    for path in &devices {
        if path.to_lowercase().contains(&hint_lower) {
            return Ok((DeviceRef::Path(path.clone()), devices.clone()));
        }
    }
    match devices.first() {
        Some(first) => Ok((DeviceRef::Path(first.clone()), devices.clone())),
        None => Ok((DeviceRef::Index(0), devices)),
    }
}

/// Resolve a device token for the current platform
pub fn resolve_device(token: Option<&str>, hint: &str) -> CaptureResult<(DeviceRef, Vec<String>)> {
    #[cfg(target_os = "linux")]
    {
        resolve_path_based(token, hint, &V4lLister)
    }
    #[cfg(not(target_os = "linux"))]
    {
        resolve_indexed(token, hint, &NokhwaLister)
    }
}

/// Enumerate devices for the current platform
pub fn list_devices() -> CaptureResult<Vec<String>> {
    #[cfg(target_os = "linux")]
    {
        V4lLister.list()
    }
    #[cfg(not(target_os = "linux"))]
    {
        NokhwaLister.list()
    }
}

/// Render a device list as `[index] name` lines
pub fn format_device_list(devices: &[String]) -> String {
    if devices.is_empty() {
        return "No capture devices found.".to_string();
    }
    devices
        .iter()
        .enumerate()
        .map(|(index, name)| format!("[{index}] {name}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLister(Vec<String>);

    impl DeviceLister for FixedLister {
        fn list(&self) -> CaptureResult<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    /// Lister that fails, and panics the test if it is consulted at all.
    struct UnreachableLister;

    impl DeviceLister for UnreachableLister {
        fn list(&self) -> CaptureResult<Vec<String>> {
            panic!("enumeration must not run for integer tokens");
        }
    }

    struct BrokenLister;

    impl DeviceLister for BrokenLister {
        fn list(&self) -> CaptureResult<Vec<String>> {
            Err(CaptureError::EnumerationUnavailable {
                reason: "no enumeration API".to_string(),
            })
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_integer_token_skips_enumeration() {
        let (device, _) = resolve_indexed(Some("0"), "MikrOkularHD", &UnreachableLister).unwrap();
        assert_eq!(device, DeviceRef::Index(0));

        let (device, _) =
            resolve_path_based(Some("2"), "MikrOkularHD", &UnreachableLister).unwrap();
        assert_eq!(device, DeviceRef::Index(2));
    }

    #[test]
    fn test_name_substring_match_is_case_insensitive() {
        let lister = FixedLister(names(&["Integrated Cam", "MikrOkularHD"]));
        let (device, devices) = resolve_indexed(Some("Mikro"), "whatever", &lister).unwrap();
        assert_eq!(device, DeviceRef::Index(1));
        assert_eq!(devices.len(), 2);

        let (device, _) = resolve_indexed(Some("mikrokularhd"), "whatever", &lister).unwrap();
        assert_eq!(device, DeviceRef::Index(1));
    }

    #[test]
    fn test_missing_name_carries_enumeration_error() {
        let error = resolve_indexed(Some("Mikro"), "whatever", &BrokenLister).unwrap_err();
        match error {
            CaptureError::DeviceNotFound { token, detail } => {
                assert_eq!(token, "Mikro");
                assert!(detail.unwrap().contains("no enumeration API"));
            }
            other => panic!("expected DeviceNotFound, got {other}"),
        }
    }

    #[test]
    fn test_default_prefers_hint_then_first() {
        let lister = FixedLister(names(&["Integrated Cam", "MikrOkularHD"]));
        let (device, _) = resolve_indexed(None, "MikrOkularHD", &lister).unwrap();
        assert_eq!(device, DeviceRef::Index(1));

        let (device, _) = resolve_indexed(None, "nonexistent", &lister).unwrap();
        assert_eq!(device, DeviceRef::Index(0));
    }

    #[test]
    fn test_path_token_passes_through() {
        let lister = FixedLister(names(&["/dev/video0"]));
        let (device, _) = resolve_path_based(Some("/dev/video7"), "hint", &lister).unwrap();
        assert_eq!(device, DeviceRef::Path("/dev/video7".to_string()));
    }

    #[test]
    fn test_path_default_matches_hint_then_first_then_index_zero() {
        let lister = FixedLister(names(&[
            "/dev/v4l/by-id/usb-Generic_Webcam-video-index0",
            "/dev/v4l/by-id/usb-MikrOkularHD-video-index0",
        ]));
        let (device, _) = resolve_path_based(None, "MikrOkularHD", &lister).unwrap();
        assert_eq!(
            device,
            DeviceRef::Path("/dev/v4l/by-id/usb-MikrOkularHD-video-index0".to_string())
        );

        let (device, _) = resolve_path_based(None, "nonexistent", &lister).unwrap();
        assert_eq!(
            device,
            DeviceRef::Path("/dev/v4l/by-id/usb-Generic_Webcam-video-index0".to_string())
        );

        let empty = FixedLister(Vec::new());
        let (device, _) = resolve_path_based(None, "anything", &empty).unwrap();
        assert_eq!(device, DeviceRef::Index(0));

        // Enumeration failure falls back rather than failing on path platforms.
        let (device, _) = resolve_path_based(None, "anything", &BrokenLister).unwrap();
        assert_eq!(device, DeviceRef::Index(0));
    }

    #[test]
    fn test_v4l_node_index_parses_video_nodes() {
        assert_eq!(v4l_node_index("/dev/video0"), Some(0));
        assert_eq!(v4l_node_index("/dev/video12"), Some(12));
        assert_eq!(v4l_node_index("/dev/null"), None);
        // A by-id name is not a node by itself; it has to be followed.
        assert_eq!(v4l_node_index("usb-MikrOkularHD-video-index0"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_v4l_node_index_follows_by_id_symlinks() {
        let dir = std::env::temp_dir().join(format!("v4l-nodes-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let node = dir.join("video5");
        std::fs::write(&node, []).unwrap();
        let link = dir.join("usb-MikrOkularHD-video-index0");
        let _ = std::fs::remove_file(&link);
        std::os::unix::fs::symlink(&node, &link).unwrap();

        assert_eq!(v4l_node_index(link.to_str().unwrap()), Some(5));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_format_device_list() {
        assert_eq!(format_device_list(&[]), "No capture devices found.");
        let rendered = format_device_list(&names(&["Integrated Cam", "MikrOkularHD"]));
        assert_eq!(rendered, "[0] Integrated Cam\n[1] MikrOkularHD");
    }
}
