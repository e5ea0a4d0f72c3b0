//! Backend candidate planning
//!
//! Produces the ordered list of capture APIs to attempt for the current
//! platform, and reorders it on reconnect so the backend that most recently
//! worked is tried first.

use std::fmt;
use std::str::FromStr;

use nokhwa::utils::ApiBackend;

use crate::error::CaptureError;

/// One capture API the acquisition engine can attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Windows Media Foundation
    MediaFoundation,
    /// Video4Linux2
    V4l2,
    /// macOS AVFoundation
    AvFoundation,
    /// Let the capture library pick whatever works
    Any,
    /// Push-style frame-grabber path; delivers frames via callback and has
    /// no pollable API id
    Grabber,
}

impl BackendKind {
    /// Short label used in logs and CLI values
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::MediaFoundation => "msmf",
            BackendKind::V4l2 => "v4l2",
            BackendKind::AvFoundation => "avfoundation",
            BackendKind::Any => "any",
            BackendKind::Grabber => "grabber",
        }
    }

    /// The pollable capture API behind this backend, if it has one.
    ///
    /// `None` marks the push-style path that must be opened through the
    /// frame-grabber bridge instead.
    pub fn api(&self) -> Option<ApiBackend> {
        match self {
            BackendKind::MediaFoundation => Some(ApiBackend::MediaFoundation),
            BackendKind::V4l2 => Some(ApiBackend::Video4Linux),
            BackendKind::AvFoundation => Some(ApiBackend::AVFoundation),
            BackendKind::Any => Some(ApiBackend::Auto),
            BackendKind::Grabber => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User's backend selection: a fixed backend or platform-order auto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendChoice {
    /// Platform-specific priority order
    #[default]
    Auto,
    /// Exactly this backend, nothing else
    Fixed(BackendKind),
}

impl FromStr for BackendChoice {
    type Err = CaptureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendChoice::Auto),
            "msmf" => Ok(BackendChoice::Fixed(BackendKind::MediaFoundation)),
            "v4l2" => Ok(BackendChoice::Fixed(BackendKind::V4l2)),
            "avfoundation" => Ok(BackendChoice::Fixed(BackendKind::AvFoundation)),
            "any" => Ok(BackendChoice::Fixed(BackendKind::Any)),
            "grabber" => Ok(BackendChoice::Fixed(BackendKind::Grabber)),
            other => Err(CaptureError::InvalidConfiguration {
                token: other.to_string(),
                reason: "expected one of auto, msmf, v4l2, avfoundation, any, grabber".to_string(),
            }),
        }
    }
}

/// Ordered backends to attempt for this platform and user choice
pub fn plan_backends(choice: BackendChoice) -> Vec<BackendKind> {
    match choice {
        BackendChoice::Fixed(backend) => vec![backend],
        BackendChoice::Auto => {
            if cfg!(target_os = "windows") {
                vec![BackendKind::MediaFoundation, BackendKind::Any, BackendKind::Grabber]
            } else if cfg!(target_os = "linux") {
                vec![BackendKind::V4l2, BackendKind::Any]
            } else if cfg!(target_os = "macos") {
                vec![BackendKind::AvFoundation, BackendKind::Any]
            } else {
                vec![BackendKind::Any]
            }
        }
    }
}

/// Reorder a plan for a reconnect attempt.
///
/// The last-known-good backend moves to the front; the rest keeps its
/// original relative order with no duplicates.
pub fn replan(base: &[BackendKind], last_good: Option<BackendKind>) -> Vec<BackendKind> {
    let Some(preferred) = last_good else {
        return base.to_vec();
    };
    let mut plan = vec![preferred];
    plan.extend(base.iter().copied().filter(|backend| *backend != preferred));
    plan
}
