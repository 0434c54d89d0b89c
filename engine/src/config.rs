//! Activation configuration and engine tuning.

use std::str::FromStr;

use crate::error::EngineError;

/// Lowest accepted detection rate.
pub const MIN_MAX_FPS: u32 = 15;
/// Highest accepted detection rate.
pub const MAX_MAX_FPS: u32 = 90;

/// Detection mode hint kept for older callers.  Ignored by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegacyModeHint {
    #[default]
    Auto,
    Legacy,
    Modern,
}

impl LegacyModeHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Legacy => "legacy",
            Self::Modern => "modern",
        }
    }

}

impl FromStr for LegacyModeHint {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "legacy" => Ok(Self::Legacy),
            "modern" => Ok(Self::Modern),
            _ => Err(EngineError::UnknownChoice {
                kind: "legacy mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Options handed to a backend's StartDetection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionOptions {
    pub max_fps: u32,
    pub legacy_mode_hint: LegacyModeHint,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Target native detection rate (15-90).
    pub max_fps: u32,
    /// Deprecated, passed through untouched.
    pub legacy_mode_hint: LegacyModeHint,
    /// Pinch level strictly above this counts as pinching.
    pub pinch_threshold: f32,
    /// Pinch direction blend rate per second.
    pub pinch_smoothing_rate: f32,
    /// Delay between camera-start attempts in seconds.
    pub camera_retry_delay_s: f32,
    /// Samples below this confidence are treated as untracked.
    pub min_confidence: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_fps: 30,
            legacy_mode_hint: LegacyModeHint::Auto,
            pinch_threshold: 0.7,
            pinch_smoothing_rate: 5.0,
            camera_retry_delay_s: 0.5,
            min_confidence: 0.0,
        }
    }
}

impl EngineConfig {
    /// Reject configurations that must never reach a backend.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(MIN_MAX_FPS..=MAX_MAX_FPS).contains(&self.max_fps) {
            return Err(EngineError::InvalidMaxFps {
                value: self.max_fps,
                min: MIN_MAX_FPS,
                max: MAX_MAX_FPS,
            });
        }
        Ok(())
    }

    pub fn detection_options(&self) -> DetectionOptions {
        DetectionOptions {
            max_fps: self.max_fps,
            legacy_mode_hint: self.legacy_mode_hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_fps, 30);
        assert!((config.pinch_threshold - 0.7).abs() < f32::EPSILON);
        assert!((config.camera_retry_delay_s - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_max_fps_bounds() {
        for fps in [15, 30, 60, 90] {
            let config = EngineConfig {
                max_fps: fps,
                ..EngineConfig::default()
            };
            assert!(config.validate().is_ok(), "{} should be accepted", fps);
        }
        for fps in [0, 14, 91, 240] {
            let config = EngineConfig {
                max_fps: fps,
                ..EngineConfig::default()
            };
            assert_eq!(
                config.validate(),
                Err(EngineError::InvalidMaxFps {
                    value: fps,
                    min: MIN_MAX_FPS,
                    max: MAX_MAX_FPS
                })
            );
        }
    }

    #[test]
    fn test_detection_options() {
        let config = EngineConfig {
            max_fps: 45,
            legacy_mode_hint: LegacyModeHint::Legacy,
            ..EngineConfig::default()
        };
        let options = config.detection_options();
        assert_eq!(options.max_fps, 45);
        assert_eq!(options.legacy_mode_hint, LegacyModeHint::Legacy);
    }

    #[test]
    fn test_legacy_hint_parse() {
        assert_eq!("modern".parse::<LegacyModeHint>(), Ok(LegacyModeHint::Modern));
        assert!(matches!(
            "bogus".parse::<LegacyModeHint>(),
            Err(EngineError::UnknownChoice { kind: "legacy mode", .. })
        ));
        assert_eq!(LegacyModeHint::Auto.as_str(), "auto");
    }
}
