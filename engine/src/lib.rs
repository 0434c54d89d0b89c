//! Hand-pose detection engine.
//!
//! Polls a native or platform hand detector, reconstructs per-joint
//! orientations from raw joint positions, and publishes smoothed per-hand
//! gesture results under an explicit detection lifecycle.

pub mod backend;
pub mod bridge;
pub mod config;
pub mod error;
pub mod headless;
pub mod joints;
pub mod lifecycle;
pub mod publisher;
pub mod reconstruction;
pub mod session;
pub mod state;

pub use config::{DetectionOptions, EngineConfig, LegacyModeHint};
pub use error::EngineError;
pub use joints::{Classification, Hand, HandJoint, JointSample, SampleBatch};
pub use lifecycle::{DetectionEngine, DetectionEvent, LifecycleEvent, StopOutcome};
pub use publisher::{GestureResult, PinchState, ResultPublisher};
pub use session::TrackingSession;
pub use state::{DetectionState, DetectionStatus, FailureCode};
