//! Headless runner: drives a tracking session from a fixed-rate frame
//! loop with graceful signal handling and periodic status logging.
//!
//! Hands come from the synthetic source, so the whole lifecycle
//! (fallback, camera retry, publishing) can run without hardware.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backend::synthetic::SyntheticConfig;
use crate::backend::{Backend, NativeBackend, NullBackend, SkeletonBackend, SyntheticDetector};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::joints::Hand;
use crate::lifecycle::DetectionEvent;
use crate::session::TrackingSession;

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Backend selection for the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    /// Platform skeleton, then generic native, then null.
    Auto,
    Native,
    Skeleton,
    Null,
}

impl BackendChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Native => "native",
            Self::Skeleton => "skeleton",
            Self::Null => "null",
        }
    }

}

impl FromStr for BackendChoice {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "native" => Ok(Self::Native),
            "skeleton" => Ok(Self::Skeleton),
            "null" => Ok(Self::Null),
            _ => Err(EngineError::UnknownChoice {
                kind: "backend",
                value: s.to_string(),
            }),
        }
    }
}

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub backend: BackendChoice,
    /// Frame loop rate in Hz.
    pub tick_hz: u32,
    /// Exit after this long (CI runs).
    pub exit_after: Option<Duration>,
    /// Interval between status log lines.
    pub status_interval: Duration,
    /// Camera warm-up failures injected into the synthetic source.
    pub camera_failures: u32,
    /// Hide the synthetic platform skeleton API so `auto` falls back.
    pub disable_skeleton: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            tick_hz: 60,
            exit_after: None,
            status_interval: Duration::from_secs(5),
            camera_failures: 0,
            disable_skeleton: false,
        }
    }
}

/// Build the priority-ordered backend list for `config`.
pub fn build_backends(config: &HeadlessConfig) -> Vec<Backend> {
    let source = SyntheticDetector::new(SyntheticConfig {
        camera_failures: config.camera_failures,
        platform_skeleton: !config.disable_skeleton,
        ..SyntheticConfig::default()
    });
    let skeleton = || Backend::Skeleton(SkeletonBackend::new(source.clone()));
    let native = || Backend::Native(NativeBackend::new(source.clone()));
    match config.backend {
        BackendChoice::Auto => vec![skeleton(), native(), Backend::Null(NullBackend::new())],
        BackendChoice::Native => vec![native()],
        BackendChoice::Skeleton => vec![skeleton()],
        BackendChoice::Null => vec![Backend::Null(NullBackend::new())],
    }
}

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

fn log_event(event: &DetectionEvent) {
    match event {
        DetectionEvent::StatusChanged { from, to, error } => {
            info!("status: {} -> {} (error: {})", from, to, error)
        }
        DetectionEvent::BackendSelected { index, description } => {
            info!("backend {} selected: {}", index, description)
        }
        DetectionEvent::CameraRetry { attempt, budget } => {
            warn!("camera retry after attempt {}/{}", attempt, budget)
        }
    }
}

/// Run detection until a signal arrives or the exit timer fires.
pub fn run(engine_config: EngineConfig, config: HeadlessConfig) -> anyhow::Result<()> {
    let backends = build_backends(&config);
    let mut session = TrackingSession::activate(engine_config, backends)?;

    install_signal_handlers();

    let tick_interval = Duration::from_secs_f64(1.0 / f64::from(config.tick_hz.max(1)));
    let start_time = Instant::now();
    let mut last_tick = Instant::now();
    let mut last_status_log = Instant::now();
    info!(
        "headless runner started (backend: {}, tick: {}Hz)",
        config.backend.as_str(),
        config.tick_hz
    );

    loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("Shutdown signal received, exiting");
            break;
        }
        if let Some(dur) = config.exit_after {
            if start_time.elapsed() >= dur {
                info!("exit timer fired after {}s", dur.as_secs());
                break;
            }
        }

        let dt = last_tick.elapsed().as_secs_f32();
        last_tick = Instant::now();
        for event in session.tick(dt) {
            log_event(&event);
        }

        if last_status_log.elapsed() >= config.status_interval {
            info!("{}", session.engine().status_sexp());
            for hand in [Hand::Left, Hand::Right] {
                match session.result(hand) {
                    Some(result) => info!("{}", result.summary_sexp()),
                    None => debug!("{} hand not tracked", hand.as_str()),
                }
            }
            last_status_log = Instant::now();
        }

        thread::sleep(tick_interval);
    }

    session.deactivate();
    info!("headless runner shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HandBackend;

    #[test]
    fn test_backend_choice_parse() {
        for choice in [
            BackendChoice::Auto,
            BackendChoice::Native,
            BackendChoice::Skeleton,
            BackendChoice::Null,
        ] {
            assert_eq!(choice.as_str().parse::<BackendChoice>(), Ok(choice));
        }
        assert!("opencv".parse::<BackendChoice>().is_err());
    }

    #[test]
    fn test_auto_backend_priority() {
        let backends = build_backends(&HeadlessConfig::default());
        let kinds: Vec<&str> = backends.iter().map(|b| b.kind()).collect();
        assert_eq!(kinds, vec!["skeleton", "native", "null"]);
        assert!(backends.iter().all(|b| b.is_supported()));
    }

    #[test]
    fn test_disabled_skeleton_unsupported() {
        let config = HeadlessConfig {
            disable_skeleton: true,
            ..HeadlessConfig::default()
        };
        let backends = build_backends(&config);
        assert!(!backends[0].is_supported());
        assert!(backends[1].is_supported());
    }

    #[test]
    fn test_single_backend_choices() {
        for (choice, kind) in [
            (BackendChoice::Native, "native"),
            (BackendChoice::Skeleton, "skeleton"),
            (BackendChoice::Null, "null"),
        ] {
            let config = HeadlessConfig {
                backend: choice,
                ..HeadlessConfig::default()
            };
            let backends = build_backends(&config);
            assert_eq!(backends.len(), 1);
            assert_eq!(backends[0].kind(), kind);
        }
    }
}
