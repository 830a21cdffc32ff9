#![deny(unreachable_pub)]
pub mod config;
pub mod grid;
pub mod market;
pub mod runner;

pub use grid::{
    Direction, GridCommand, GridConfig, GridEngine, GridError, GridExchange, GridManager,
    GridResult, GridRunner, InstrumentSpec, LedgerView, PaperExchange, Position,
};
pub use market::{MarketSnapshot, PriceFeed, Quote, ReplayFeed};
