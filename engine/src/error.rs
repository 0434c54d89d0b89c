//! Error types for engine configuration and lifecycle misuse.
//!
//! Native failures never show up here: they travel as [`FailureCode`]
//! values and only the lifecycle orchestrator turns them into state.
//!
//! [`FailureCode`]: crate::state::FailureCode

use thiserror::Error;

use crate::lifecycle::LifecycleEvent;
use crate::state::DetectionStatus;

/// Errors raised before or around activation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Requested detection rate is outside the supported window.
    #[error("max fps {value} outside supported range [{min}, {max}]")]
    InvalidMaxFps {
        /// Requested rate.
        value: u32,
        /// Lowest accepted rate.
        min: u32,
        /// Highest accepted rate.
        max: u32,
    },

    /// Lifecycle event not defined for the current status.
    #[error("invalid transition: {event} while {from}")]
    InvalidTransition {
        /// Status the engine was in.
        from: DetectionStatus,
        /// Rejected event.
        event: LifecycleEvent,
    },

    /// A backend tried to issue a native call before the previous one resolved.
    #[error("native call `{0}` issued while a previous call is outstanding")]
    CallOutstanding(&'static str),

    /// Only one camera/tracking session may be active per process.
    #[error("a tracking session is already active")]
    SessionAlreadyActive,

    /// The engine was built without any backend variants.
    #[error("no detection backends configured")]
    NoBackends,

    /// A named option did not match any known value.
    #[error("unknown {kind}: {value}")]
    UnknownChoice {
        /// Which option was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}
