//! Core data types for grid trading

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction of a position or a ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Both directions, in the order the engine evaluates them
    pub const ALL: [Direction; 2] = [Direction::Long, Direction::Short];

    /// Stable index for per-direction arrays
    pub fn index(&self) -> usize {
        match self {
            Direction::Long => 0,
            Direction::Short => 1,
        }
    }

    /// +1 for long, -1 for short
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Price a market order in this direction fills at
    pub fn entry_price(&self, bid: f64, ask: f64) -> f64 {
        match self {
            Direction::Long => ask,
            Direction::Short => bid,
        }
    }

    /// Price a position in this direction is closed at
    pub fn exit_price(&self, bid: f64, ask: f64) -> f64 {
        match self {
            Direction::Long => bid,
            Direction::Short => ask,
        }
    }

    /// Momentum signal over the last two completed closes.
    ///
    /// Long wants a rising close, short a falling one. A tie is no signal
    /// for either side.
    pub fn momentum_holds(&self, last_close: f64, previous_close: f64) -> bool {
        match self {
            Direction::Long => last_close > previous_close,
            Direction::Short => previous_close > last_close,
        }
    }

    /// Whether `price` has moved more than `distance` past the ladder's
    /// extreme entry, against the ladder
    pub fn beyond_step(&self, price: f64, extreme_entry: f64, distance: f64) -> bool {
        match self {
            Direction::Long => price < extreme_entry - distance,
            Direction::Short => price > extreme_entry + distance,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bot execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotStatus {
    /// Created, `on_start` not yet run
    Initializing,
    /// Processing ticks
    Running,
    /// Shutting down
    Stopping,
    /// Fully stopped
    Stopped,
}

impl BotStatus {
    /// Check if the bot should process ticks
    pub fn is_active(&self) -> bool {
        matches!(self, BotStatus::Running)
    }
}

/// Per-direction ladder state, derived from the ledger every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderState {
    Flat,
    Active(u32),
}

impl LadderState {
    pub fn from_depth(depth: usize) -> Self {
        if depth == 0 {
            LadderState::Flat
        } else {
            LadderState::Active(depth as u32)
        }
    }

    pub fn depth(&self) -> u32 {
        match self {
            LadderState::Flat => 0,
            LadderState::Active(depth) => *depth,
        }
    }
}

/// An open position as reported by the broker ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Broker position id
    pub id: u64,
    pub symbol: String,
    /// Strategy tag the position was opened with
    pub label: String,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    /// Protective stop price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    /// Profit before commissions, in account currency
    pub gross_profit: f64,
    /// One-way commission charged on open
    pub commission: f64,
    /// Profit after round-trip commissions, in account currency
    pub net_profit: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Recompute running profit at the given quote
    pub fn revalue(&mut self, bid: f64, ask: f64) {
        let exit = self.direction.exit_price(bid, ask);
        self.gross_profit = (exit - self.entry_price) * self.volume * self.direction.sign();
        self.net_profit = self.gross_profit - 2.0 * self.commission;
    }

    /// Whether the protective stop is hit at the given quote
    pub fn stop_hit(&self, bid: f64, ask: f64) -> bool {
        match (self.stop_loss, self.direction) {
            (Some(stop), Direction::Long) => bid <= stop,
            (Some(stop), Direction::Short) => ask >= stop,
            (None, _) => false,
        }
    }

    /// Whether this position belongs to the given instrument and strategy tag
    pub fn belongs_to(&self, symbol: &str, label: &str) -> bool {
        self.symbol == symbol && self.label == label
    }
}

/// Request to open a market position
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub direction: Direction,
    pub symbol: String,
    pub label: String,
    pub volume: f64,
    pub stop_loss_pips: f64,
    /// Ladder depth once this position is open (1 = first rung)
    pub rung: u32,
}

/// Why a position is being closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Ladder average profit reached the target
    ProfitTarget,
    /// Strategy stopped with close-all requested
    Shutdown,
}

/// Command issued by the engine for the execution adapter
#[derive(Debug, Clone, PartialEq)]
pub enum GridCommand {
    Open(OpenRequest),
    Close {
        position_id: u64,
        direction: Direction,
        reason: CloseReason,
    },
}

impl GridCommand {
    pub fn direction(&self) -> Direction {
        match self {
            GridCommand::Open(request) => request.direction,
            GridCommand::Close { direction, .. } => *direction,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, GridCommand::Open(_))
    }
}

impl fmt::Display for GridCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridCommand::Open(r) => write!(
                f,
                "open {} {} rung {} volume {}",
                r.direction, r.symbol, r.rung, r.volume
            ),
            GridCommand::Close {
                position_id,
                direction,
                reason,
            } => write!(f, "close {} position {} ({:?})", direction, position_id, reason),
        }
    }
}
