//! Broker abstraction for grid trading - enables mocking for tests

use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use tokio::sync::Mutex;

use super::config::InstrumentSpec;
use super::errors::{GridError, GridResult};
use super::types::{GridCommand, OpenRequest, Position};
use crate::market::Quote;

/// Broker operations trait - can be mocked for testing
#[async_trait]
pub trait GridExchange: Send + Sync {
    /// Open a market position with a protective stop
    async fn open_position(&self, request: &OpenRequest) -> GridResult<Position>;

    /// Close a position at market, returning it as closed
    async fn close_position(&self, position_id: u64) -> GridResult<Position>;

    /// Current position book, in broker order
    async fn positions(&self) -> GridResult<Vec<Position>>;

    /// Tradable properties of an instrument
    async fn instrument(&self, symbol: &str) -> GridResult<InstrumentSpec>;

    /// Revalue open positions at `quote` and apply stop losses.
    ///
    /// Live venues do this themselves; simulated ones return the positions
    /// they closed.
    async fn mark_to_market(&self, _quote: &Quote) -> GridResult<Vec<Position>> {
        Ok(Vec::new())
    }
}

/// Outcome of executing one batch of commands
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub opened: Vec<Position>,
    pub closed: Vec<Position>,
    pub failures: Vec<(GridCommand, GridError)>,
}

impl ExecutionReport {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty() && self.failures.is_empty()
    }

    /// Net profit realized by the closes in this batch
    pub fn realized_profit(&self) -> f64 {
        self.closed.iter().map(|p| p.net_profit).sum()
    }
}

/// Carries engine commands out against a broker.
///
/// Every command is attempted in order. A rejected command is recorded in
/// the report and does not stop the rest of the batch.
pub struct ExecutionAdapter<E: GridExchange> {
    exchange: Arc<E>,
}

impl<E: GridExchange> ExecutionAdapter<E> {
    pub fn new(exchange: Arc<E>) -> Self {
        Self { exchange }
    }

    pub fn exchange(&self) -> &Arc<E> {
        &self.exchange
    }

    pub async fn execute(&self, commands: Vec<GridCommand>) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for command in commands {
            let result = match &command {
                GridCommand::Open(request) => self
                    .exchange
                    .open_position(request)
                    .await
                    .map(|p| (true, p)),
                GridCommand::Close { position_id, .. } => self
                    .exchange
                    .close_position(*position_id)
                    .await
                    .map(|p| (false, p)),
            };

            match result {
                Ok((true, position)) => {
                    info!(
                        "Opened {} position {} at {} (volume {})",
                        position.direction, position.id, position.entry_price, position.volume
                    );
                    report.opened.push(position);
                }
                Ok((false, position)) => {
                    info!(
                        "Closed {} position {}: net profit {:.2}",
                        position.direction, position.id, position.net_profit
                    );
                    report.closed.push(position);
                }
                Err(e) => {
                    error!("Failed to {}: {}", command, e);
                    report.failures.push((command, e));
                }
            }
        }

        report
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// Mock broker for testing grid bots without a venue.
pub mod mock {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Mock broker for testing. Opens fill at `price`.
    pub struct MockExchange {
        pub positions: Arc<Mutex<Vec<Position>>>,
        pub open_requests: Arc<Mutex<Vec<OpenRequest>>>,
        pub closed_ids: Arc<Mutex<Vec<u64>>>,
        pub price: Arc<Mutex<f64>>,
        pub instrument: Arc<Mutex<InstrumentSpec>>,
        next_id: AtomicU64,
        pub should_fail: Arc<Mutex<bool>>,
    }

    impl MockExchange {
        pub fn new(price: f64) -> Self {
            Self {
                positions: Arc::new(Mutex::new(Vec::new())),
                open_requests: Arc::new(Mutex::new(Vec::new())),
                closed_ids: Arc::new(Mutex::new(Vec::new())),
                price: Arc::new(Mutex::new(price)),
                instrument: Arc::new(Mutex::new(InstrumentSpec::new("EURUSD", 0.0001))),
                next_id: AtomicU64::new(1),
                should_fail: Arc::new(Mutex::new(false)),
            }
        }

        pub async fn set_price(&self, price: f64) {
            *self.price.lock().await = price;
        }

        pub async fn set_should_fail(&self, fail: bool) {
            *self.should_fail.lock().await = fail;
        }

        pub async fn set_instrument(&self, instrument: InstrumentSpec) {
            *self.instrument.lock().await = instrument;
        }

        /// Overwrite the running net profit of every open position
        pub async fn set_net_profit(&self, net_profit: f64) {
            for position in self.positions.lock().await.iter_mut() {
                position.gross_profit = net_profit;
                position.net_profit = net_profit;
            }
        }
    }

    #[async_trait]
    impl GridExchange for MockExchange {
        async fn open_position(&self, request: &OpenRequest) -> GridResult<Position> {
            if *self.should_fail.lock().await {
                return Err(GridError::Execution("Mock failure".into()));
            }

            self.open_requests.lock().await.push(request.clone());
            let position = Position {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                symbol: request.symbol.clone(),
                label: request.label.clone(),
                direction: request.direction,
                volume: request.volume,
                entry_price: *self.price.lock().await,
                stop_loss: None,
                gross_profit: 0.0,
                commission: 0.0,
                net_profit: 0.0,
                opened_at: Utc::now(),
            };
            self.positions.lock().await.push(position.clone());
            Ok(position)
        }

        async fn close_position(&self, position_id: u64) -> GridResult<Position> {
            if *self.should_fail.lock().await {
                return Err(GridError::Execution("Mock failure".into()));
            }

            let mut positions = self.positions.lock().await;
            let index = positions
                .iter()
                .position(|p| p.id == position_id)
                .ok_or(GridError::PositionNotFound(position_id))?;
            self.closed_ids.lock().await.push(position_id);
            Ok(positions.remove(index))
        }

        async fn positions(&self) -> GridResult<Vec<Position>> {
            Ok(self.positions.lock().await.clone())
        }

        async fn instrument(&self, _symbol: &str) -> GridResult<InstrumentSpec> {
            Ok(self.instrument.lock().await.clone())
        }
    }
}
