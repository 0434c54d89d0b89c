//! Detection backends.
//!
//! The engine owns a priority-ordered list of [`Backend`] variants and
//! adopts the first whose `is_supported` probe passes.  Every variant
//! follows the same contract:
//!
//! - `setup` and `start_detection` return a [`NativeCall`] that the frame
//!   loop polls; neither blocks the caller.
//! - `update_result` runs once per frame on the frame loop and never
//!   blocks.
//! - `stop_detection` is synchronous and safe to call more than once.

pub mod native;
pub mod null;
pub mod skeleton;
pub mod synthetic;

#[cfg(test)]
pub(crate) mod testing;

pub use native::{NativeBackend, NativeDetector, NativePoll, RawHandRecord};
pub use null::NullBackend;
pub use skeleton::{PlatformHandApi, SkeletonBackend, SkeletonFrame};
pub use synthetic::SyntheticDetector;

use crate::bridge::NativeCall;
use crate::config::DetectionOptions;
use crate::error::EngineError;
use crate::publisher::ResultPublisher;
use crate::reconstruction::TrackingOrigin;
use crate::state::FailureCode;

// ── Poll outcome ───────────────────────────────────────────

/// What one `update_result` call observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing to poll (no buffer, or detection not running).
    Idle,
    /// Frame index not newer than the last accepted one; publisher untouched.
    Stale { frame_index: i64 },
    /// Batch accepted and published.  `first` marks the first accepted
    /// batch since setup.
    Published { frame_index: i64, first: bool },
    /// The native detection loop reported a fatal condition.
    Fatal(FailureCode),
}

// ── Frame dedup ────────────────────────────────────────────

/// Result of offering a native frame index to a [`FrameCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted { first: bool },
    Stale,
    /// Negative index: the native loop died.
    Fatal,
}

/// Monotonic frame-index filter.  Reset to -1 on every setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounter {
    last: i64,
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self { last: -1 }
    }
}

impl FrameCounter {
    pub fn reset(&mut self) {
        self.last = -1;
    }

    pub fn last(&self) -> i64 {
        self.last
    }

    /// Accept `frame_index` only if strictly newer than the last one.
    pub fn admit(&mut self, frame_index: i64) -> Admission {
        if frame_index < 0 {
            return Admission::Fatal;
        }
        if frame_index <= self.last {
            return Admission::Stale;
        }
        // Native counters normally start at 0, but any first index counts.
        let first = self.last < 0;
        self.last = frame_index;
        Admission::Accepted { first }
    }
}

// ── Backend trait ──────────────────────────────────────────

/// Contract shared by every detection backend variant.
pub trait HandBackend {
    /// Pure capability probe.  No side effects.
    fn is_supported(&self) -> bool;

    /// Short diagnostic name.
    fn description(&self) -> &'static str;

    /// Total StartDetection attempts allowed while the camera reports
    /// `CameraStart`.
    fn camera_attempts(&self) -> u32;

    /// Acquire permissions and resources.  Resets frame dedup state.
    /// `Unsupported` asks the orchestrator to fall back to the next variant.
    fn setup(&mut self) -> Result<NativeCall<FailureCode>, EngineError>;

    /// Begin native detection.
    fn start_detection(
        &mut self,
        options: &DetectionOptions,
    ) -> Result<NativeCall<FailureCode>, EngineError>;

    /// Poll the native layer and publish the newest frame, if any.
    fn update_result(
        &mut self,
        publisher: &mut ResultPublisher,
        origin: &TrackingOrigin,
        dt_s: f32,
    ) -> PollOutcome;

    /// Stop detection and release native resources.
    fn stop_detection(&mut self);
}

// ── Variant set ────────────────────────────────────────────

/// The closed set of backend variants.
pub enum Backend {
    Native(NativeBackend),
    Skeleton(SkeletonBackend),
    Null(NullBackend),
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Native(_) => "native",
            Self::Skeleton(_) => "skeleton",
            Self::Null(_) => "null",
        }
    }

    fn inner(&self) -> &dyn HandBackend {
        match self {
            Self::Native(b) => b,
            Self::Skeleton(b) => b,
            Self::Null(b) => b,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn HandBackend {
        match self {
            Self::Native(b) => b,
            Self::Skeleton(b) => b,
            Self::Null(b) => b,
        }
    }
}

impl HandBackend for Backend {
    fn is_supported(&self) -> bool {
        self.inner().is_supported()
    }

    fn description(&self) -> &'static str {
        self.inner().description()
    }

    fn camera_attempts(&self) -> u32 {
        self.inner().camera_attempts()
    }

    fn setup(&mut self) -> Result<NativeCall<FailureCode>, EngineError> {
        self.inner_mut().setup()
    }

    fn start_detection(
        &mut self,
        options: &DetectionOptions,
    ) -> Result<NativeCall<FailureCode>, EngineError> {
        self.inner_mut().start_detection(options)
    }

    fn update_result(
        &mut self,
        publisher: &mut ResultPublisher,
        origin: &TrackingOrigin,
        dt_s: f32,
    ) -> PollOutcome {
        self.inner_mut().update_result(publisher, origin, dt_s)
    }

    fn stop_detection(&mut self) {
        self.inner_mut().stop_detection()
    }
}

/// Index of the first supported variant at or after `from`.
pub fn select_backend(backends: &[Backend], from: usize) -> Option<usize> {
    backends
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, b)| b.is_supported())
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedDetector;
    use super::*;

    #[test]
    fn test_frame_counter_monotonic() {
        let mut counter = FrameCounter::default();
        assert_eq!(counter.admit(0), Admission::Accepted { first: true });
        assert_eq!(counter.admit(1), Admission::Accepted { first: false });
        assert_eq!(counter.admit(1), Admission::Stale);
        assert_eq!(counter.admit(0), Admission::Stale);
        assert_eq!(counter.admit(5), Admission::Accepted { first: false });
        assert_eq!(counter.admit(3), Admission::Stale);
        assert_eq!(counter.last(), 5);
    }

    #[test]
    fn test_frame_counter_negative_is_fatal() {
        let mut counter = FrameCounter::default();
        assert_eq!(counter.admit(-1), Admission::Fatal);
        assert_eq!(counter.admit(4), Admission::Accepted { first: true });
        assert_eq!(counter.admit(-3), Admission::Fatal);
        assert_eq!(counter.last(), 4);
    }

    #[test]
    fn test_frame_counter_reset() {
        let mut counter = FrameCounter::default();
        counter.admit(10);
        counter.reset();
        assert_eq!(counter.last(), -1);
        assert_eq!(counter.admit(0), Admission::Accepted { first: true });
    }

    #[test]
    fn test_select_backend_skips_unsupported() {
        let off_a = ScriptedDetector::unavailable();
        let off_b = ScriptedDetector::unavailable();
        let backends = vec![
            Backend::Native(NativeBackend::new(off_a.clone())),
            Backend::Native(NativeBackend::new(off_b.clone())),
            Backend::Null(NullBackend::new()),
        ];
        assert_eq!(select_backend(&backends, 0), Some(2));
        assert_eq!(select_backend(&backends, 1), Some(2));
        assert_eq!(select_backend(&backends, 3), None);

        let none = vec![Backend::Native(NativeBackend::new(ScriptedDetector::unavailable()))];
        assert_eq!(select_backend(&none, 0), None);
    }

    #[test]
    fn test_backend_dispatch() {
        let detector = ScriptedDetector::new();
        let native = Backend::Native(NativeBackend::new(detector));
        assert_eq!(native.kind(), "native");
        assert_eq!(native.camera_attempts(), 1);
        assert!(native.is_supported());

        let null = Backend::Null(NullBackend::new());
        assert_eq!(null.kind(), "null");
        assert!(null.is_supported());
    }
}
