//! Process-wide tracking session.
//!
//! The camera is a single shared device, so only one session may be
//! active per process.  Activating claims the slot and starts detection;
//! deactivating (or dropping) the session stops detection, waiting for
//! any outstanding native call, and frees the slot.

use nalgebra::{UnitQuaternion, Vector3};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use crate::backend::Backend;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::joints::Hand;
use crate::lifecycle::{DetectionEngine, DetectionEvent};
use crate::publisher::GestureResult;
use crate::state::{DetectionStatus, FailureCode};

/// Set while a [`TrackingSession`] holds the camera.
static CAMERA_SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Whether a session currently holds the camera.
pub fn is_session_active() -> bool {
    CAMERA_SESSION_ACTIVE.load(Ordering::SeqCst)
}

/// An active detection session.
#[derive(Debug)]
pub struct TrackingSession {
    engine: DetectionEngine,
    released: bool,
}

impl TrackingSession {
    /// Claim the camera and start detection with `backends` in priority
    /// order.
    pub fn activate(config: EngineConfig, backends: Vec<Backend>) -> Result<Self, EngineError> {
        config.validate()?;
        if CAMERA_SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::SessionAlreadyActive);
        }

        let engine = match DetectionEngine::new(config, backends) {
            Ok(engine) => engine,
            Err(e) => {
                CAMERA_SESSION_ACTIVE.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let mut session = Self {
            engine,
            released: false,
        };
        // Drop releases the slot if start is rejected.
        session.engine.start()?;
        info!("session: activated at {} fps", session.engine.config().max_fps);
        Ok(session)
    }

    /// Advance detection by one frame.
    pub fn tick(&mut self, dt_s: f32) -> Vec<DetectionEvent> {
        self.engine.tick(dt_s)
    }

    pub fn engine(&self) -> &DetectionEngine {
        &self.engine
    }

    pub fn status(&self) -> DetectionStatus {
        self.engine.status()
    }

    pub fn error(&self) -> FailureCode {
        self.engine.error()
    }

    pub fn result(&self, hand: Hand) -> Option<&GestureResult> {
        self.engine.result(hand)
    }

    pub fn set_camera_transform(&mut self, position: Vector3<f32>, rotation: UnitQuaternion<f32>) {
        self.engine.set_camera_transform(position, rotation);
    }

    /// Stop and start again.  The only way out of `Error`.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        info!("session: restarting detection");
        self.engine.stop_blocking();
        self.engine.start()
    }

    /// Stop detection and release the camera.
    pub fn deactivate(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.engine.stop_blocking();
        self.released = true;
        CAMERA_SESSION_ACTIVE.store(false, Ordering::SeqCst);
        info!("session: deactivated");
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.release();
    }
}
