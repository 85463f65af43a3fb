//! Configuration file and command-line overrides.
//!
//! The file is TOML and every key is optional:
//!
//! ```toml
//! exp = 0.8
//! multiplier = 1.5
//! verbose = false
//!
//! [estimator]
//! idle_window_ms = 400
//! min_elapsed_ms = 1
//! max_speed = 10000.0
//! reset_on_reversal = true
//!
//! [synth]
//! max_delta = 100.0
//! reset_accumulator_on_gesture = false
//!
//! [evdev]
//! devices = ["/dev/input/by-id/usb-Logitech_USB_Receiver-if02-event-mouse"]
//! hi_res = false
//! ```
//!
//! Precedence is command line, then file, then built-in defaults. The result is
//! validated once into an [`AppConfig`]; invalid values never reach the controller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::estimator::EstimatorConfig;
use crate::settings::{positive_finite, Settings};
use crate::synthesizer::SynthConfig;

/// Directory name under the platform config dir.
pub const APP_DIR: &str = "scroll-accel";
/// File name inside [`APP_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Raw contents of the TOML file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub exp: Option<f64>,
    pub multiplier: Option<f64>,
    pub verbose: Option<bool>,
    pub estimator: EstimatorConfig,
    pub synth: SynthConfig,
    pub evdev: EvdevConfig,
}

/// Linux-specific device selection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvdevConfig {
    /// Explicit device nodes. Empty means "every device with a scroll wheel".
    pub devices: Vec<PathBuf>,
    /// Emit `REL_WHEEL_HI_RES` (1/120 notch) instead of whole notches.
    pub hi_res: bool,
}

impl FileConfig {
    /// Read and parse `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse TOML text; `origin` is only used in error messages.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }
}

/// `$XDG_CONFIG_HOME/scroll-accel/config.toml` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Load the config file.
///
/// An explicit path must exist. The default path is optional: if it is missing the
/// built-in defaults are used and a warning is logged.
pub fn load_file(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    if let Some(path) = explicit {
        let cfg = FileConfig::load(path)?;
        info!("Loaded config {}", path.display());
        return Ok(cfg);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let cfg = FileConfig::load(&path)?;
            info!("Loaded config {}", path.display());
            Ok(cfg)
        }
        Some(path) => {
            warn!("Config {} not found, using defaults", path.display());
            Ok(FileConfig::default())
        }
        None => {
            warn!("No config directory on this platform, using defaults");
            Ok(FileConfig::default())
        }
    }
}

/// Values given on the command line. `None` means "not given".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overrides {
    pub exp: Option<f64>,
    pub multiplier: Option<f64>,
    pub verbose: bool,
    pub idle_window: Option<Duration>,
    pub max_delta: Option<f64>,
    pub devices: Vec<PathBuf>,
    pub hi_res: bool,
}

/// Fully resolved and validated configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub settings: Settings,
    pub estimator: EstimatorConfig,
    pub synth: SynthConfig,
    pub devices: Vec<PathBuf>,
    pub hi_res: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            estimator: EstimatorConfig::default(),
            synth: SynthConfig::default(),
            devices: Vec::new(),
            hi_res: false,
        }
    }
}

impl AppConfig {
    /// Merge `overrides` over `file` over defaults, then validate.
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let settings = Settings {
            exp: overrides.exp.or(file.exp).unwrap_or(defaults.exp),
            multiplier: overrides
                .multiplier
                .or(file.multiplier)
                .unwrap_or(defaults.multiplier),
            verbose: overrides.verbose || file.verbose.unwrap_or(defaults.verbose),
        };

        let mut estimator = file.estimator;
        if let Some(window) = overrides.idle_window {
            estimator.idle_window = window;
        }

        let mut synth = file.synth;
        if let Some(max_delta) = overrides.max_delta {
            synth.max_delta = max_delta;
        }

        let devices = if overrides.devices.is_empty() {
            file.evdev.devices
        } else {
            overrides.devices
        };

        let config = Self {
            settings,
            estimator,
            synth,
            devices,
            hi_res: overrides.hi_res || file.evdev.hi_res,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;
        positive_finite("estimator.max_speed", self.estimator.max_speed)?;
        positive_finite(
            "estimator.idle_window_ms",
            self.estimator.idle_window.as_secs_f64() * 1000.0,
        )?;
        positive_finite(
            "estimator.min_elapsed_ms",
            self.estimator.min_elapsed.as_secs_f64() * 1000.0,
        )?;
        positive_finite("synth.max_delta", self.synth.max_delta)?;
        Ok(())
    }

    /// Render back to the file format (used by `--print-config`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let file = FileConfig {
            exp: Some(self.settings.exp),
            multiplier: Some(self.settings.multiplier),
            verbose: Some(self.settings.verbose),
            estimator: self.estimator,
            synth: self.synth,
            evdev: EvdevConfig {
                devices: self.devices.clone(),
                hi_res: self.hi_res,
            },
        };
        Ok(toml::to_string_pretty(&file)?)
    }
}
