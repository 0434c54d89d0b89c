//! Detection status surface: status, failure classification, and the
//! orchestrator-owned `DetectionState`.
//!
//! Collaborators read these values to drive their own messaging; nothing
//! here renders text for users beyond a diagnostic s-expression.

use std::fmt;

// ── Status ─────────────────────────────────────────────────

/// Lifecycle status of the detection engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DetectionStatus {
    #[default]
    NotStarted,
    Starting,
    Running,
    Error,
}

impl DetectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Failure codes ──────────────────────────────────────────

/// Failure classification reported across the native boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FailureCode {
    #[default]
    None,
    /// GPU compute backend required by the native detector is missing.
    OpenClUnavailable,
    /// Camera could not be started (possibly still warming up).
    CameraStart,
    /// Native call failed, bridge never produced a result, or the native
    /// detection loop died.
    Internal,
    /// Backend or feature not available on this platform.
    Unsupported,
}

impl FailureCode {
    /// Map a native integer failure code.  Unknown codes are `Internal`.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::OpenClUnavailable,
            2 => Self::CameraStart,
            3 => Self::Internal,
            4 => Self::Unsupported,
            _ => Self::Internal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OpenClUnavailable => "opencl-unavailable",
            Self::CameraStart => "camera-start",
            Self::Internal => "internal",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Detection state ────────────────────────────────────────

/// Everything the lifecycle orchestrator tracks about the current session.
///
/// Mutated only from the frame loop.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionState {
    pub status: DetectionStatus,
    pub error: FailureCode,
    /// Index of the adopted backend in priority order.
    pub active_backend: Option<usize>,
    /// Diagnostic description of the adopted backend.
    pub backend_description: &'static str,
    pub max_fps: u32,
    /// Last frame index accepted from the active backend (-1 before any).
    pub last_frame_index: i64,
    /// StartDetection attempts made on the active backend.
    pub start_attempts: u32,
}

impl DetectionState {
    pub fn new(max_fps: u32) -> Self {
        Self {
            status: DetectionStatus::NotStarted,
            error: FailureCode::None,
            active_backend: None,
            backend_description: "none",
            max_fps,
            last_frame_index: -1,
            start_attempts: 0,
        }
    }

    /// Clear per-session fields ahead of a new activation.
    pub fn reset_session(&mut self) {
        self.error = FailureCode::None;
        self.active_backend = None;
        self.backend_description = "none";
        self.last_frame_index = -1;
        self.start_attempts = 0;
    }

    /// Diagnostic s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:status :{} :error :{} :backend \"{}\" :backend-index {} :max-fps {} :last-frame {} :attempts {})",
            self.status.as_str(),
            self.error.as_str(),
            self.backend_description,
            self.active_backend
                .map(|i| i.to_string())
                .unwrap_or_else(|| "nil".to_string()),
            self.max_fps,
            self.last_frame_index,
            self.start_attempts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state() {
        let state = DetectionState::new(30);
        assert_eq!(state.status, DetectionStatus::NotStarted);
        assert_eq!(state.error, FailureCode::None);
        assert_eq!(state.last_frame_index, -1);
        assert!(state.active_backend.is_none());
    }

    #[test]
    fn test_failure_code_from_raw() {
        assert_eq!(FailureCode::from_raw(0), FailureCode::None);
        assert_eq!(FailureCode::from_raw(1), FailureCode::OpenClUnavailable);
        assert_eq!(FailureCode::from_raw(2), FailureCode::CameraStart);
        assert_eq!(FailureCode::from_raw(4), FailureCode::Unsupported);
        assert_eq!(FailureCode::from_raw(-7), FailureCode::Internal);
        assert!(!FailureCode::None.is_failure());
        assert!(FailureCode::CameraStart.is_failure());
    }

    #[test]
    fn test_reset_session() {
        let mut state = DetectionState::new(60);
        state.error = FailureCode::Internal;
        state.active_backend = Some(2);
        state.last_frame_index = 40;
        state.start_attempts = 3;
        state.reset_session();
        assert_eq!(state.error, FailureCode::None);
        assert_eq!(state.active_backend, None);
        assert_eq!(state.last_frame_index, -1);
        assert_eq!(state.start_attempts, 0);
        assert_eq!(state.max_fps, 60);
    }

    #[test]
    fn test_status_sexp() {
        let mut state = DetectionState::new(30);
        state.status = DetectionStatus::Running;
        state.active_backend = Some(1);
        state.backend_description = "generic native detector";
        state.last_frame_index = 12;
        let sexp = state.status_sexp();
        assert!(sexp.contains(":status :running"));
        assert!(sexp.contains(":error :none"));
        assert!(sexp.contains(":backend-index 1"));
        assert!(sexp.contains(":last-frame 12"));
        assert!(lexpr::from_str(&sexp).is_ok(), "unparseable: {}", sexp);
    }

    #[test]
    fn test_status_sexp_without_backend() {
        let sexp = DetectionState::new(30).status_sexp();
        assert!(sexp.contains(":backend-index nil"));
        assert!(lexpr::from_str(&sexp).is_ok());
    }
}
