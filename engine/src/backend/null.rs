//! Null backend, used when no real hand tracking is available.
//!
//! Always supported, never fails, and never reports a hand.  Detection
//! still reaches `Running` so callers see a live engine with both result
//! slots empty.

use tracing::info;

use super::{HandBackend, PollOutcome};
use crate::bridge::NativeCall;
use crate::config::DetectionOptions;
use crate::error::EngineError;
use crate::joints::SampleBatch;
use crate::publisher::ResultPublisher;
use crate::reconstruction::TrackingOrigin;
use crate::state::FailureCode;

/// No-op backend.
#[derive(Debug, Default)]
pub struct NullBackend {
    started: bool,
    announced: bool,
    batch: SampleBatch,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HandBackend for NullBackend {
    fn is_supported(&self) -> bool {
        true
    }

    fn description(&self) -> &'static str {
        "null (no hand tracking)"
    }

    fn camera_attempts(&self) -> u32 {
        1
    }

    fn setup(&mut self) -> Result<NativeCall<FailureCode>, EngineError> {
        self.started = false;
        self.announced = false;
        Ok(NativeCall::resolved("null-setup", FailureCode::None))
    }

    fn start_detection(
        &mut self,
        _options: &DetectionOptions,
    ) -> Result<NativeCall<FailureCode>, EngineError> {
        info!("null: hand tracking disabled, publishing no hands");
        self.started = true;
        Ok(NativeCall::resolved("null-start", FailureCode::None))
    }

    fn update_result(
        &mut self,
        publisher: &mut ResultPublisher,
        origin: &TrackingOrigin,
        dt_s: f32,
    ) -> PollOutcome {
        if !self.started || self.announced {
            return PollOutcome::Idle;
        }
        self.announced = true;
        self.batch.clear();
        self.batch.frame_index = 0;
        publisher.publish(&mut self.batch, origin, dt_s);
        PollOutcome::Published {
            frame_index: 0,
            first: true,
        }
    }

    fn stop_detection(&mut self) {
        self.started = false;
        self.announced = false;
    }
}
