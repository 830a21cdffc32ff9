use config::{Config, File};
pub use config::ConfigError;
use serde::Deserialize;

use crate::grid::{GridConfig, InstrumentSpec, RunnerConfig};

/// Main configuration struct
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Strategy parameters
    #[serde(default)]
    pub strategy: GridConfig,
    /// JSON strategy file that replaces `[strategy]` when set
    #[serde(default)]
    pub strategy_file: Option<String>,
    /// Instrument traded by the strategy
    pub instrument: InstrumentSpec,
    /// Quote source
    pub feed: FeedConfig,
    /// Paper broker account
    #[serde(default)]
    pub paper: PaperConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Event loop configuration
    #[serde(default)]
    pub runner: RunnerSettings,
}

/// How quotes are replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Replay as fast as possible, close everything at the end
    #[default]
    Backtest,
    /// Replay at `pace_ms` per quote, keep positions on stop unless configured
    Paper,
}

#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    /// CSV file with a `time,bid,ask` header
    pub path: String,
    #[serde(default)]
    pub mode: RunMode,
    /// Bar time frame in seconds
    #[serde(default = "default_timeframe_secs")]
    pub timeframe_secs: u64,
    /// Delay between quotes in paper mode
    #[serde(default)]
    pub pace_ms: u64,
}

fn default_timeframe_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,
    /// One-way commission as a fraction of notional
    #[serde(default)]
    pub fee_rate: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_balance: default_initial_balance(),
            fee_rate: 0.0,
        }
    }
}

fn default_initial_balance() -> f64 {
    10_000.0
}

#[derive(Debug, Deserialize, Default)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct RunnerSettings {
    /// Seconds between status lines
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

fn default_status_interval_secs() -> u64 {
    30
}

impl Settings {
    /// Load settings from a configuration file
    pub fn new(config_path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(config_path))
            // Environment variables override the file,
            // e.g. APP_STRATEGY__PIP_STEP=20
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mut settings: Settings = s.try_deserialize()?;
        if let Some(path) = &settings.strategy_file {
            settings.strategy = GridConfig::load_from_file(path)
                .map_err(|e| ConfigError::Message(format!("strategy file {}: {}", path, e)))?;
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Cross-section checks the individual sections cannot do
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy.symbol != self.instrument.symbol {
            return Err(ConfigError::Message(format!(
                "strategy symbol {} does not match instrument {}",
                self.strategy.symbol, self.instrument.symbol
            )));
        }
        if self.feed.timeframe_secs == 0 {
            return Err(ConfigError::Message("feed.timeframe_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            status_interval_secs: self.runner.status_interval_secs,
            backtest: self.feed.mode == RunMode::Backtest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_full_settings() {
        let file = write_config(
            r#"
[strategy]
symbol = "GBPUSD"
label = "ladder"
max_open_long = 4
pip_step = 20
volume_exponent = 1.5
close_all_on_stop = true

[instrument]
symbol = "GBPUSD"
pip_size = 0.0001
volume_step = 1000.0

[feed]
path = "data/gbpusd.csv"
mode = "paper"
timeframe_secs = 900
pace_ms = 5

[paper]
initial_balance = 5000.0
fee_rate = 0.00002

[log]
level = "debug"

[runner]
status_interval_secs = 10
"#,
        );

        let settings = Settings::new(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.strategy.label, "ladder");
        assert_eq!(settings.strategy.max_open_long, 4);
        assert_eq!(settings.strategy.max_open_short, 8);
        assert_eq!(settings.strategy.pip_step, 20);
        assert_eq!(settings.strategy.volume_exponent, 1.5);
        assert!(settings.strategy.close_all_on_stop);
        assert_eq!(settings.instrument.max_volume, 100_000_000.0);
        assert_eq!(settings.feed.mode, RunMode::Paper);
        assert_eq!(settings.feed.timeframe_secs, 900);
        assert_eq!(settings.paper.initial_balance, 5000.0);
        assert_eq!(settings.log.level, "debug");

        let runner = settings.runner_config();
        assert_eq!(runner.status_interval_secs, 10);
        assert!(!runner.backtest);
    }

    #[test]
    fn test_defaults() {
        let file = write_config(
            r#"
[instrument]
symbol = "EURUSD"
pip_size = 0.0001

[feed]
path = "quotes.csv"
"#,
        );

        let settings = Settings::new(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.strategy, GridConfig::default());
        assert_eq!(settings.feed.mode, RunMode::Backtest);
        assert_eq!(settings.feed.timeframe_secs, 3600);
        assert_eq!(settings.feed.pace_ms, 0);
        assert_eq!(settings.paper.initial_balance, 10_000.0);
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.runner.status_interval_secs, 30);
        assert!(settings.runner_config().backtest);
    }

    #[test]
    fn test_strategy_file_replaces_section() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = dir.path().join("ladder.json");
        std::fs::write(&strategy, r#"{"symbol": "EURUSD", "label": "from-file", "pip_step": 25}"#)
            .unwrap();

        let file = write_config(&format!(
            r#"
strategy_file = "{}"

[strategy]
label = "inline"

[instrument]
symbol = "EURUSD"
pip_size = 0.0001

[feed]
path = "quotes.csv"
"#,
            strategy.display()
        ));

        let settings = Settings::new(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.strategy.label, "from-file");
        assert_eq!(settings.strategy.pip_step, 25);
    }

    #[test]
    fn test_missing_strategy_file_rejected() {
        let file = write_config(
            r#"
strategy_file = "does/not/exist.json"

[instrument]
symbol = "EURUSD"
pip_size = 0.0001

[feed]
path = "quotes.csv"
"#,
        );

        assert!(Settings::new(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_symbol_mismatch_rejected() {
        let file = write_config(
            r#"
[strategy]
symbol = "EURUSD"

[instrument]
symbol = "USDJPY"
pip_size = 0.01

[feed]
path = "quotes.csv"
"#,
        );

        assert!(Settings::new(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_missing_feed_section() {
        let file = write_config(
            r#"
[instrument]
symbol = "EURUSD"
pip_size = 0.0001
"#,
        );

        assert!(Settings::new(file.path().to_str().unwrap()).is_err());
    }
}
