//! Grid decision engine - per-tick ladder state machine
//!
//! The engine owns no positions. Every tick it reads a [`MarketSnapshot`]
//! and a [`LedgerView`] and returns the commands that move each ladder from
//! one state to the next:
//!
//! ```text
//! Flat --open-initial--> Active(1) --open-additional--> Active(n+1)
//!   ^                                                        |
//!   +------------------- profit-target close ----------------+
//! ```
//!
//! The only state carried between ticks is the per-direction [`TradeGuard`].

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::config::{GridConfig, InstrumentSpec};
use super::errors::GridResult;
use super::ledger::LedgerView;
use super::types::{CloseReason, Direction, GridCommand, LadderState, OpenRequest};
use crate::market::MarketSnapshot;

/// Money tolerance when comparing an average profit against its target
const PROFIT_TOLERANCE: f64 = 1e-9;

/// Remembers the bar in which each direction last opened a position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeGuard {
    last_trade_bar: [Option<DateTime<Utc>>; 2],
}

impl TradeGuard {
    pub fn stamp(&mut self, direction: Direction, bar_open: DateTime<Utc>) {
        self.last_trade_bar[direction.index()] = Some(bar_open);
    }

    /// Whether `direction` already opened a position in the bar at `bar_open`
    pub fn traded_in(&self, direction: Direction, bar_open: DateTime<Utc>) -> bool {
        self.last_trade_bar[direction.index()] == Some(bar_open)
    }
}

/// Decides ladder transitions for one instrument and one strategy label
#[derive(Debug, Clone)]
pub struct GridEngine {
    config: GridConfig,
    instrument: InstrumentSpec,
    /// `config.first_volume` rounded to a tradable volume
    first_volume: f64,
    guard: TradeGuard,
}

impl GridEngine {
    /// Build an engine. The first volume is normalized once here and the
    /// normalized value is used for sizing and the profit target.
    pub fn new(config: GridConfig, instrument: InstrumentSpec) -> Self {
        let first_volume = instrument.normalize_volume(config.first_volume);
        if (first_volume - config.first_volume).abs() > f64::EPSILON {
            warn!(
                "Volume entered incorrectly, volume has been changed to {}",
                first_volume
            );
        }

        Self {
            config,
            instrument,
            first_volume,
            guard: TradeGuard::default(),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn instrument(&self) -> &InstrumentSpec {
        &self.instrument
    }

    pub fn first_volume(&self) -> f64 {
        self.first_volume
    }

    pub fn guard(&self) -> &TradeGuard {
        &self.guard
    }

    /// Average net profit a ladder must reach before it is flushed.
    ///
    /// Compares money against `volume * factor * pip_size` as the strategy
    /// has always done.
    pub fn profit_target(&self, pip_size: f64) -> f64 {
        self.first_volume * self.config.average_take_profit * pip_size
    }

    /// Volume requested for the rung opened on top of a ladder of `depth`
    /// positions, before normalization
    pub fn requested_volume(&self, depth: usize) -> f64 {
        self.first_volume * self.config.volume_exponent.powi(depth as i32)
    }

    /// Tradable volume for the rung opened on top of a ladder of `depth`
    pub fn rung_volume(&self, depth: usize) -> f64 {
        self.instrument.normalize_volume(self.requested_volume(depth))
    }

    /// Run one tick and return the commands to execute, closes first
    pub fn on_tick(
        &mut self,
        market: &MarketSnapshot,
        ledger: &LedgerView<'_>,
    ) -> GridResult<Vec<GridCommand>> {
        let mut commands = Vec::new();
        let mut flushed = [false; 2];

        for direction in Direction::ALL {
            let closes = self.check_profit_target(direction, market, ledger)?;
            if !closes.is_empty() {
                flushed[direction.index()] = true;
                commands.extend(closes);
            }
        }

        let spread = market.spread_in_pips();
        if spread > self.config.max_spread {
            debug!(
                "Spread {:.1} pips above max {:.1}, no new positions",
                spread, self.config.max_spread
            );
            return Ok(commands);
        }

        let (last_close, previous_close) = match (market.last_close(1), market.last_close(2)) {
            (Ok(last), Ok(previous)) => (last, previous),
            (Err(e), _) | (_, Err(e)) => {
                debug!("No new positions this tick: {}", e);
                return Ok(commands);
            }
        };

        for direction in Direction::ALL {
            // A ladder flushed above is flat for the rest of the tick
            let state = if flushed[direction.index()] {
                LadderState::Flat
            } else {
                ledger.ladder_state(direction)
            };
            if state.depth() >= self.config.max_open(direction) {
                continue;
            }

            if let Some(command) =
                self.process_direction(direction, state, market, ledger, last_close, previous_close)?
            {
                commands.push(command);
            }
        }

        Ok(commands)
    }

    /// Close commands for a whole ladder if its average net profit reached
    /// the target. Empty when the ladder is flat or below target.
    pub fn check_profit_target(
        &self,
        direction: Direction,
        market: &MarketSnapshot,
        ledger: &LedgerView<'_>,
    ) -> GridResult<Vec<GridCommand>> {
        if ledger.count(direction) == 0 {
            return Ok(Vec::new());
        }

        let average = ledger.average_net_profit(direction)?;
        let target = self.profit_target(market.pip_size);
        if average < target - PROFIT_TOLERANCE {
            return Ok(Vec::new());
        }

        info!(
            "Closing {} ladder of {}: average net profit {:.2} reached target {:.2}",
            direction,
            ledger.count(direction),
            average,
            target
        );
        Ok(ledger
            .positions_of(direction)
            .map(|p| GridCommand::Close {
                position_id: p.id,
                direction,
                reason: CloseReason::ProfitTarget,
            })
            .collect())
    }

    /// Close commands for every position of both ladders
    pub fn close_all(&self, ledger: &LedgerView<'_>) -> Vec<GridCommand> {
        ledger
            .all()
            .map(|p| GridCommand::Close {
                position_id: p.id,
                direction: p.direction,
                reason: CloseReason::Shutdown,
            })
            .collect()
    }

    fn process_direction(
        &mut self,
        direction: Direction,
        state: LadderState,
        market: &MarketSnapshot,
        ledger: &LedgerView<'_>,
        last_close: f64,
        previous_close: f64,
    ) -> GridResult<Option<GridCommand>> {
        let bar_open = market.current_bar_open();

        let depth = match state {
            LadderState::Flat => {
                if !direction.momentum_holds(last_close, previous_close) {
                    return Ok(None);
                }
                return Ok(Some(self.open(direction, 0, bar_open)));
            }
            LadderState::Active(depth) => depth as usize,
        };

        if self.guard.traded_in(direction, bar_open) {
            debug!("{} ladder already added a rung in bar {}", direction, bar_open);
            return Ok(None);
        }

        let extreme = ledger.extreme_entry_price(direction)?;
        let price = direction.entry_price(market.bid, market.ask);
        let step = market.pips(self.config.pip_step as f64);
        if !direction.beyond_step(price, extreme, step) {
            return Ok(None);
        }

        Ok(Some(self.open(direction, depth, bar_open)))
    }

    /// Build an open command and stamp the guard. The stamp stays even if
    /// the broker later rejects the order.
    fn open(&mut self, direction: Direction, depth: usize, bar_open: DateTime<Utc>) -> GridCommand {
        let volume = if depth == 0 {
            self.first_volume
        } else {
            self.rung_volume(depth)
        };
        self.guard.stamp(direction, bar_open);

        info!(
            "Opening {} rung {} on {}: volume {}",
            direction,
            depth + 1,
            self.config.symbol,
            volume
        );
        GridCommand::Open(OpenRequest {
            direction,
            symbol: self.config.symbol.clone(),
            label: self.config.label.clone(),
            volume,
            stop_loss_pips: self.config.stop_loss_pips,
            rung: depth as u32 + 1,
        })
    }
}
