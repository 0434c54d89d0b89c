//! Detection lifecycle orchestration.
//!
//! [`DetectionEngine`] is the only place that moves [`DetectionStatus`].
//! It adopts the first supported backend, drives setup and start through
//! the async bridge, retries camera start within the backend's budget,
//! and polls the active backend once per frame.  Nothing here blocks
//! except [`DetectionEngine::stop_blocking`], which is for teardown and
//! also runs when the engine is dropped.

use nalgebra::{UnitQuaternion, Vector3};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::backend::{select_backend, Backend, HandBackend, PollOutcome};
use crate::bridge::NativeCall;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::joints::Hand;
use crate::publisher::{GestureResult, ResultPublisher};
use crate::reconstruction::TrackingOrigin;
use crate::state::{DetectionState, DetectionStatus, FailureCode};

// ── Transition table ───────────────────────────────────────

/// Events that move the detection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Start,
    FirstSample,
    Failure,
    Stop,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 4] = [Self::Start, Self::FirstSample, Self::Failure, Self::Stop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::FirstSample => "first-sample",
            Self::Failure => "failure",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Next status for `event` in `from`, or `None` if the pair is undefined.
///
/// Stop is accepted everywhere; from `NotStarted` it is a no-op.
pub fn transition(from: DetectionStatus, event: LifecycleEvent) -> Option<DetectionStatus> {
    use DetectionStatus::*;
    use LifecycleEvent::*;
    match (from, event) {
        (NotStarted, Start) => Some(Starting),
        (Starting, FirstSample) => Some(Running),
        (Starting, Failure) | (Running, Failure) => Some(Error),
        (_, Stop) => Some(NotStarted),
        _ => None,
    }
}

// ── Engine events ──────────────────────────────────────────

/// Observable lifecycle events returned from [`DetectionEngine::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionEvent {
    StatusChanged {
        from: DetectionStatus,
        to: DetectionStatus,
        error: FailureCode,
    },
    BackendSelected {
        index: usize,
        description: &'static str,
    },
    CameraRetry {
        attempt: u32,
        budget: u32,
    },
}

/// How a stop request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// Already `NotStarted`.
    AlreadyStopped,
    /// A native call is outstanding; the stop completes when it resolves.
    Deferred,
}

// ── Startup phases ─────────────────────────────────────────

enum Phase {
    Idle,
    SettingUp {
        call: NativeCall<FailureCode>,
    },
    Starting {
        call: NativeCall<FailureCode>,
        attempt: u32,
    },
    RetryWait {
        remaining_s: f32,
        attempt: u32,
    },
    /// Native detection running; the first accepted frame promotes the
    /// status to `Running`.
    Polling,
}

impl Phase {
    fn has_outstanding_call(&self) -> bool {
        matches!(self, Phase::SettingUp { .. } | Phase::Starting { .. })
    }

    fn into_call(self) -> Option<NativeCall<FailureCode>> {
        match self {
            Phase::SettingUp { call } | Phase::Starting { call, .. } => Some(call),
            _ => None,
        }
    }
}

// ── Engine ─────────────────────────────────────────────────

/// Owns the backends, the detection state, and the result publisher.
pub struct DetectionEngine {
    config: EngineConfig,
    backends: Vec<Backend>,
    state: DetectionState,
    phase: Phase,
    publisher: ResultPublisher,
    origin: TrackingOrigin,
    stop_requested: bool,
    events: Vec<DetectionEvent>,
}

impl DetectionEngine {
    /// `backends` are in priority order.
    pub fn new(config: EngineConfig, backends: Vec<Backend>) -> Result<Self, EngineError> {
        config.validate()?;
        if backends.is_empty() {
            return Err(EngineError::NoBackends);
        }
        Ok(Self {
            state: DetectionState::new(config.max_fps),
            publisher: ResultPublisher::new(&config),
            config,
            backends,
            phase: Phase::Idle,
            origin: TrackingOrigin::default(),
            stop_requested: false,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn status(&self) -> DetectionStatus {
        self.state.status
    }

    pub fn error(&self) -> FailureCode {
        self.state.error
    }

    pub fn publisher(&self) -> &ResultPublisher {
        &self.publisher
    }

    pub fn result(&self, hand: Hand) -> Option<&GestureResult> {
        self.publisher.get(hand)
    }

    pub fn left(&self) -> Option<&GestureResult> {
        self.publisher.left()
    }

    pub fn right(&self) -> Option<&GestureResult> {
        self.publisher.right()
    }

    pub fn origin(&self) -> &TrackingOrigin {
        &self.origin
    }

    /// Whether a stop is waiting on an outstanding native call.
    pub fn stop_pending(&self) -> bool {
        self.stop_requested
    }

    /// Update the tracking-space origin used for reconstruction and pinch
    /// rays.  Forwarded to the native layer on the next poll.
    pub fn set_camera_transform(&mut self, position: Vector3<f32>, rotation: UnitQuaternion<f32>) {
        self.origin = TrackingOrigin { position, rotation };
    }

    /// Begin detection.  Only valid from `NotStarted`.
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.config.validate()?;
        self.apply(LifecycleEvent::Start, FailureCode::None)?;
        self.state.reset_session();
        self.publisher.clear();
        self.stop_requested = false;
        self.phase = self.select_from(0);
        Ok(())
    }

    /// Request detection stop.
    ///
    /// Synchronous unless a native call is outstanding, in which case the
    /// stop is deferred until the call resolves on a later tick.
    pub fn stop(&mut self) -> StopOutcome {
        if self.state.status == DetectionStatus::NotStarted {
            return StopOutcome::AlreadyStopped;
        }
        if self.phase.has_outstanding_call() {
            if !self.stop_requested {
                info!("detection: stop deferred until native call resolves");
            }
            self.stop_requested = true;
            return StopOutcome::Deferred;
        }
        self.stop_now();
        StopOutcome::Stopped
    }

    /// Stop, waiting for any outstanding native call first.  Teardown only.
    pub fn stop_blocking(&mut self) {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        if let Some(call) = phase.into_call() {
            debug!("detection: waiting for {} before teardown", call.label());
            call.wait();
        }
        if self.state.status != DetectionStatus::NotStarted {
            self.stop_now();
        }
    }

    /// Advance the lifecycle by one frame.  Never blocks.
    pub fn tick(&mut self, dt_s: f32) -> Vec<DetectionEvent> {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        self.phase = match phase {
            Phase::Idle => Phase::Idle,
            Phase::SettingUp { call } => self.on_setup(call),
            Phase::Starting { call, attempt } => self.on_start(call, attempt),
            Phase::RetryWait {
                remaining_s,
                attempt,
            } => {
                let remaining_s = remaining_s - dt_s;
                if remaining_s <= 0.0 {
                    self.issue_start(attempt + 1)
                } else {
                    Phase::RetryWait {
                        remaining_s,
                        attempt,
                    }
                }
            }
            Phase::Polling => self.poll(dt_s),
        };
        std::mem::take(&mut self.events)
    }

    /// Diagnostic s-expression of the current state.
    pub fn status_sexp(&self) -> String {
        self.state.status_sexp()
    }

    // ── Internals ──────────────────────────────────────────

    fn apply(&mut self, event: LifecycleEvent, error: FailureCode) -> Result<(), EngineError> {
        let from = self.state.status;
        let to = transition(from, event).ok_or(EngineError::InvalidTransition { from, event })?;
        self.state.status = to;
        self.state.error = error;
        if from != to {
            info!("detection: {} -> {} (error: {})", from, to, error);
            self.events.push(DetectionEvent::StatusChanged { from, to, error });
        }
        Ok(())
    }

    fn active_index(&self) -> Option<usize> {
        self.state.active_backend
    }

    fn fail(&mut self, code: FailureCode) -> Phase {
        let code = if code.is_failure() { code } else { FailureCode::Internal };
        error!("detection: failed with {}", code);
        if let Err(e) = self.apply(LifecycleEvent::Failure, code) {
            warn!("detection: {}", e);
        }
        self.publisher.clear();
        Phase::Idle
    }

    /// Adopt the first supported backend at or after `from`.
    fn select_from(&mut self, from: usize) -> Phase {
        let Some(index) = select_backend(&self.backends, from) else {
            warn!("detection: no supported backend available");
            return self.fail(FailureCode::Unsupported);
        };
        let backend = &mut self.backends[index];
        let description = backend.description();
        info!("detection: using backend {} ({})", index, description);
        self.state.active_backend = Some(index);
        self.state.backend_description = description;
        self.state.last_frame_index = -1;
        self.state.start_attempts = 0;
        self.events
            .push(DetectionEvent::BackendSelected { index, description });

        match backend.setup() {
            Ok(call) => Phase::SettingUp { call },
            Err(e) => {
                error!("detection: setup could not be issued: {}", e);
                self.fail(FailureCode::Internal)
            }
        }
    }

    fn on_setup(&mut self, mut call: NativeCall<FailureCode>) -> Phase {
        if !call.is_complete() {
            return Phase::SettingUp { call };
        }
        let result = call.take_result();
        if self.stop_requested {
            self.stop_now();
            return Phase::Idle;
        }
        let Some(index) = self.active_index() else {
            return self.fail(FailureCode::Internal);
        };
        match result {
            Some(FailureCode::None) => self.issue_start(1),
            Some(FailureCode::Unsupported) => {
                info!("detection: backend {} unsupported at setup, falling back", index);
                self.backends[index].stop_detection();
                self.select_from(index + 1)
            }
            Some(code) => self.fail(code),
            None => self.fail(FailureCode::Internal),
        }
    }

    fn issue_start(&mut self, attempt: u32) -> Phase {
        let Some(index) = self.active_index() else {
            return self.fail(FailureCode::Internal);
        };
        let options = self.config.detection_options();
        self.state.start_attempts = attempt;
        debug!("detection: start attempt {}", attempt);
        match self.backends[index].start_detection(&options) {
            Ok(call) => Phase::Starting { call, attempt },
            Err(e) => {
                error!("detection: start could not be issued: {}", e);
                self.fail(FailureCode::Internal)
            }
        }
    }

    fn on_start(&mut self, mut call: NativeCall<FailureCode>, attempt: u32) -> Phase {
        if !call.is_complete() {
            return Phase::Starting { call, attempt };
        }
        let result = call.take_result();
        if self.stop_requested {
            self.stop_now();
            return Phase::Idle;
        }
        let budget = self
            .active_index()
            .map(|i| self.backends[i].camera_attempts())
            .unwrap_or(1);
        match result {
            Some(FailureCode::None) => {
                info!("detection: native detection started, awaiting first sample");
                Phase::Polling
            }
            Some(FailureCode::CameraStart) if attempt < budget => {
                warn!("detection: camera not ready (attempt {}/{})", attempt, budget);
                self.events
                    .push(DetectionEvent::CameraRetry { attempt, budget });
                Phase::RetryWait {
                    remaining_s: self.config.camera_retry_delay_s,
                    attempt,
                }
            }
            Some(code) => self.fail(code),
            None => self.fail(FailureCode::Internal),
        }
    }

    fn poll(&mut self, dt_s: f32) -> Phase {
        let Some(index) = self.active_index() else {
            return self.fail(FailureCode::Internal);
        };
        let outcome =
            self.backends[index].update_result(&mut self.publisher, &self.origin, dt_s);
        match outcome {
            PollOutcome::Published { frame_index, first } => {
                self.state.last_frame_index = frame_index;
                if first {
                    if let Err(e) = self.apply(LifecycleEvent::FirstSample, FailureCode::None) {
                        warn!("detection: {}", e);
                    }
                }
                Phase::Polling
            }
            PollOutcome::Stale { .. } | PollOutcome::Idle => Phase::Polling,
            PollOutcome::Fatal(code) => self.fail(code),
        }
    }

    fn stop_now(&mut self) {
        if let Some(index) = self.active_index() {
            self.backends[index].stop_detection();
        }
        self.publisher.clear();
        self.stop_requested = false;
        self.phase = Phase::Idle;
        if let Err(e) = self.apply(LifecycleEvent::Stop, FailureCode::None) {
            warn!("detection: {}", e);
        }
        self.state.active_backend = None;
    }
}

impl Drop for DetectionEngine {
    fn drop(&mut self) {
        self.stop_blocking();
    }
}

impl fmt::Debug for DetectionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionEngine")
            .field("state", &self.state)
            .field("backends", &self.backends.len())
            .field("stop_requested", &self.stop_requested)
            .finish()
    }
}
