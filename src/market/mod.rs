//! Market data module
//!
//! Quotes come in through a [`PriceFeed`], are aggregated into time-frame
//! bars by [`BarSeries`], and are handed to the grid engine as a
//! [`MarketSnapshot`] that stays fixed for one tick.
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use grid_ladder_bot::market::{BarSeries, Quote};
//!
//! let mut bars = BarSeries::new(60);
//! let quote = Quote::new(Utc.timestamp_opt(30, 0).unwrap(), 1.1000, 1.1002);
//! bars.on_quote(&quote);
//!
//! let snapshot = bars.snapshot(&quote, 0.0001);
//! assert!((snapshot.spread_in_pips() - 2.0).abs() < 1e-6);
//! assert!(snapshot.last_close(1).is_err());
//! ```

pub mod bars;
pub mod feed;
pub mod snapshot;
pub mod types;

pub use bars::BarSeries;
pub use feed::{PriceFeed, ReplayFeed};
pub use snapshot::MarketSnapshot;
pub use types::{Bar, Quote};
