//! Grid trading configuration

use serde::{Deserialize, Serialize};

use super::errors::{GridError, GridResult};
use super::types::Direction;

/// Tradable properties of an instrument, as reported by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Instrument code (e.g., "EURUSD")
    pub symbol: String,
    /// Size of one pip in price units (e.g., 0.0001)
    pub pip_size: f64,
    /// Smallest volume increment
    #[serde(default = "default_volume_step")]
    pub volume_step: f64,
    /// Minimum tradable volume
    #[serde(default = "default_volume_step")]
    pub min_volume: f64,
    /// Maximum tradable volume
    #[serde(default = "default_max_volume")]
    pub max_volume: f64,
}

fn default_volume_step() -> f64 {
    1000.0
}

fn default_max_volume() -> f64 {
    100_000_000.0
}

impl InstrumentSpec {
    /// Create an instrument with a 1000-unit step, typical of FX brokers
    pub fn new(symbol: impl Into<String>, pip_size: f64) -> Self {
        Self {
            symbol: symbol.into(),
            pip_size,
            volume_step: default_volume_step(),
            min_volume: default_volume_step(),
            max_volume: default_max_volume(),
        }
    }

    /// Builder: set volume granularity
    pub fn with_volume_limits(mut self, step: f64, min: f64, max: f64) -> Self {
        self.volume_step = step;
        self.min_volume = min;
        self.max_volume = max;
        self
    }

    /// Round a requested volume to the nearest tradable volume.
    ///
    /// Rounds to the nearest multiple of `volume_step`, then clamps into
    /// `[min_volume, max_volume]`.
    pub fn normalize_volume(&self, raw: f64) -> f64 {
        let stepped = (raw / self.volume_step).round() * self.volume_step;
        let clamped = stepped.clamp(self.min_volume, self.max_volume);
        round_to_step_precision(clamped, self.volume_step)
    }

    /// Whether `volume` is already a tradable volume
    pub fn is_tradable_volume(&self, volume: f64) -> bool {
        (self.normalize_volume(volume) - volume).abs() <= self.volume_step * 1e-9
    }

    /// Convert a distance in pips to a price distance
    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.symbol.is_empty() {
            return Err(GridError::InvalidConfig("instrument symbol cannot be empty".into()));
        }
        if self.pip_size <= 0.0 {
            return Err(GridError::InvalidConfig("pip_size must be positive".into()));
        }
        if self.volume_step <= 0.0 || self.min_volume <= 0.0 {
            return Err(GridError::InvalidConfig(
                "volume_step and min_volume must be positive".into(),
            ));
        }
        if self.max_volume < self.min_volume {
            return Err(GridError::InvalidConfig(
                "max_volume must be at least min_volume".into(),
            ));
        }
        Ok(())
    }
}

/// Strip floating point noise left by step multiplication (0.1 * 3 etc.)
fn round_to_step_precision(value: f64, step: f64) -> f64 {
    let decimals = (-step.log10()).ceil().max(0.0) as i32 + 2;
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Grid ladder strategy configuration.
///
/// Immutable once the bot has started. Every field has a default so a
/// partial `[strategy]` section deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Instrument to trade
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Strategy tag stamped on every position this bot opens
    #[serde(default = "default_label")]
    pub label: String,

    /// Maximum depth of the long ladder
    #[serde(default = "default_max_open")]
    pub max_open_long: u32,

    /// Maximum depth of the short ladder
    #[serde(default = "default_max_open")]
    pub max_open_short: u32,

    /// Minimum adverse move, in pips, before adding a rung
    #[serde(default = "default_pip_step")]
    pub pip_step: u32,

    /// Protective stop distance in pips, applied to every position
    #[serde(default = "default_stop_loss_pips")]
    pub stop_loss_pips: f64,

    /// Volume of the first rung of a ladder
    #[serde(default = "default_first_volume")]
    pub first_volume: f64,

    /// Maximum spread, in pips, at which new positions may be opened
    #[serde(default = "default_max_spread")]
    pub max_spread: f64,

    /// Multiplier defining the ladder's profit target
    #[serde(default = "default_average_take_profit")]
    pub average_take_profit: f64,

    /// Growth factor applied per additional rung
    #[serde(default = "default_volume_exponent")]
    pub volume_exponent: f64,

    /// Close every ladder position when the bot is stopped
    #[serde(default)]
    pub close_all_on_stop: bool,
}

fn default_symbol() -> String {
    "EURUSD".to_string()
}

fn default_label() -> String {
    "GridLadderBot".to_string()
}

fn default_max_open() -> u32 {
    8
}

fn default_pip_step() -> u32 {
    10
}

fn default_stop_loss_pips() -> f64 {
    100.0
}

fn default_first_volume() -> f64 {
    1000.0
}

fn default_max_spread() -> f64 {
    3.0
}

fn default_average_take_profit() -> f64 {
    3.0
}

fn default_volume_exponent() -> f64 {
    1.0
}

const MIN_VOLUME_EXPONENT: f64 = 0.1;
const MAX_VOLUME_EXPONENT: f64 = 5.0;

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            label: default_label(),
            max_open_long: default_max_open(),
            max_open_short: default_max_open(),
            pip_step: default_pip_step(),
            stop_loss_pips: default_stop_loss_pips(),
            first_volume: default_first_volume(),
            max_spread: default_max_spread(),
            average_take_profit: default_average_take_profit(),
            volume_exponent: default_volume_exponent(),
            close_all_on_stop: false,
        }
    }
}

impl GridConfig {
    /// Create a configuration with default parameters for the given instrument
    pub fn new(symbol: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            label: label.into(),
            ..Self::default()
        }
    }

    /// Builder: set ladder depth caps
    pub fn with_max_open(mut self, long: u32, short: u32) -> Self {
        self.max_open_long = long;
        self.max_open_short = short;
        self
    }

    /// Builder: set grid step in pips
    pub fn with_pip_step(mut self, pip_step: u32) -> Self {
        self.pip_step = pip_step;
        self
    }

    /// Builder: set stop loss distance in pips
    pub fn with_stop_loss_pips(mut self, pips: f64) -> Self {
        self.stop_loss_pips = pips;
        self
    }

    /// Builder: set first rung volume
    pub fn with_first_volume(mut self, volume: f64) -> Self {
        self.first_volume = volume;
        self
    }

    /// Builder: set spread limit in pips
    pub fn with_max_spread(mut self, pips: f64) -> Self {
        self.max_spread = pips;
        self
    }

    /// Builder: set profit target multiplier
    pub fn with_average_take_profit(mut self, factor: f64) -> Self {
        self.average_take_profit = factor;
        self
    }

    /// Builder: set rung volume growth factor
    pub fn with_volume_exponent(mut self, exponent: f64) -> Self {
        self.volume_exponent = exponent;
        self
    }

    /// Builder: close all positions on stop
    pub fn with_close_all_on_stop(mut self, close_all: bool) -> Self {
        self.close_all_on_stop = close_all;
        self
    }

    /// Depth cap for a direction
    pub fn max_open(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Long => self.max_open_long,
            Direction::Short => self.max_open_short,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> GridResult<()> {
        if self.symbol.is_empty() {
            return Err(GridError::InvalidConfig("symbol cannot be empty".into()));
        }

        if self.label.is_empty() {
            return Err(GridError::InvalidConfig("label cannot be empty".into()));
        }

        if self.pip_step < 1 {
            return Err(GridError::InvalidConfig("pip_step must be at least 1".into()));
        }

        if self.stop_loss_pips <= 0.0 {
            return Err(GridError::InvalidConfig(
                "stop_loss_pips must be positive".into(),
            ));
        }

        if self.first_volume <= 0.0 {
            return Err(GridError::InvalidConfig("first_volume must be positive".into()));
        }

        if self.max_spread < 0.0 {
            return Err(GridError::InvalidConfig(
                "max_spread must be non-negative".into(),
            ));
        }

        if self.average_take_profit <= 0.0 {
            return Err(GridError::InvalidConfig(
                "average_take_profit must be positive".into(),
            ));
        }

        if !(MIN_VOLUME_EXPONENT..=MAX_VOLUME_EXPONENT).contains(&self.volume_exponent) {
            return Err(GridError::InvalidConfig(format!(
                "volume_exponent must be between {} and {}",
                MIN_VOLUME_EXPONENT, MAX_VOLUME_EXPONENT
            )));
        }

        Ok(())
    }

    /// Load a standalone strategy file (JSON)
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> GridResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}
