//! In-process paper broker for backtests and dry runs

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::Mutex;

use super::config::InstrumentSpec;
use super::errors::{GridError, GridResult};
use super::executor::GridExchange;
use super::types::{OpenRequest, Position};
use crate::market::Quote;

#[derive(Debug, Default)]
struct PaperBook {
    positions: Vec<Position>,
    next_id: u64,
    last_quote: Option<Quote>,
    balance: f64,
    realized: f64,
    total_fees: f64,
    closed_count: u64,
}

impl PaperBook {
    /// Remove a position from the book and book its profit
    fn settle(&mut self, index: usize) -> Position {
        let position = self.positions.remove(index);
        self.balance += position.net_profit;
        self.realized += position.net_profit;
        self.total_fees += 2.0 * position.commission;
        self.closed_count += 1;
        position
    }
}

/// Simulated broker for a single instrument.
///
/// Market orders fill at the last quote seen by `mark_to_market`: longs at
/// the ask, shorts at the bid. Stops are checked on every quote.
pub struct PaperExchange {
    instrument: InstrumentSpec,
    fee_rate: f64,
    book: Mutex<PaperBook>,
}

impl PaperExchange {
    pub fn new(instrument: InstrumentSpec, initial_balance: f64) -> Self {
        Self {
            instrument,
            fee_rate: 0.0,
            book: Mutex::new(PaperBook {
                next_id: 1,
                balance: initial_balance,
                ..PaperBook::default()
            }),
        }
    }

    /// Builder: one-way commission as a fraction of traded notional
    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub async fn balance(&self) -> f64 {
        self.book.lock().await.balance
    }

    /// Balance plus running net profit of open positions
    pub async fn equity(&self) -> f64 {
        let book = self.book.lock().await;
        book.balance + book.positions.iter().map(|p| p.net_profit).sum::<f64>()
    }

    pub async fn realized_profit(&self) -> f64 {
        self.book.lock().await.realized
    }

    pub async fn total_fees(&self) -> f64 {
        self.book.lock().await.total_fees
    }

    /// Positions closed so far, by request or by stop
    pub async fn closed_count(&self) -> u64 {
        self.book.lock().await.closed_count
    }

    fn check_volume(&self, volume: f64) -> GridResult<()> {
        let spec = &self.instrument;
        if volume < spec.min_volume || volume > spec.max_volume {
            return Err(GridError::Execution(format!(
                "volume {} outside [{}, {}]",
                volume, spec.min_volume, spec.max_volume
            )));
        }
        if !spec.is_tradable_volume(volume) {
            return Err(GridError::Execution(format!(
                "volume {} is not a multiple of {}",
                volume, spec.volume_step
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl GridExchange for PaperExchange {
    async fn open_position(&self, request: &OpenRequest) -> GridResult<Position> {
        if request.symbol != self.instrument.symbol {
            return Err(GridError::Execution(format!("unknown symbol {}", request.symbol)));
        }
        self.check_volume(request.volume)?;

        let mut book = self.book.lock().await;
        let quote = book
            .last_quote
            .ok_or_else(|| GridError::Execution(format!("no quote yet for {}", request.symbol)))?;

        let direction = request.direction;
        let entry_price = direction.entry_price(quote.bid, quote.ask);
        let stop_distance = self.instrument.pips_to_price(request.stop_loss_pips);

        let mut position = Position {
            id: book.next_id,
            symbol: request.symbol.clone(),
            label: request.label.clone(),
            direction,
            volume: request.volume,
            entry_price,
            stop_loss: Some(entry_price - direction.sign() * stop_distance),
            gross_profit: 0.0,
            commission: entry_price * request.volume * self.fee_rate,
            net_profit: 0.0,
            opened_at: quote.time,
        };
        position.revalue(quote.bid, quote.ask);

        book.next_id += 1;
        book.positions.push(position.clone());
        debug!("Paper fill: {} {} at {}", direction, request.volume, entry_price);
        Ok(position)
    }

    async fn close_position(&self, position_id: u64) -> GridResult<Position> {
        let mut book = self.book.lock().await;
        let index = book
            .positions
            .iter()
            .position(|p| p.id == position_id)
            .ok_or(GridError::PositionNotFound(position_id))?;

        if let Some(quote) = book.last_quote {
            book.positions[index].revalue(quote.bid, quote.ask);
        }
        Ok(book.settle(index))
    }

    async fn positions(&self) -> GridResult<Vec<Position>> {
        Ok(self.book.lock().await.positions.clone())
    }

    async fn instrument(&self, symbol: &str) -> GridResult<InstrumentSpec> {
        if symbol != self.instrument.symbol {
            return Err(GridError::Execution(format!("unknown symbol {}", symbol)));
        }
        Ok(self.instrument.clone())
    }

    async fn mark_to_market(&self, quote: &Quote) -> GridResult<Vec<Position>> {
        let mut book = self.book.lock().await;
        book.last_quote = Some(*quote);

        for position in book.positions.iter_mut() {
            position.revalue(quote.bid, quote.ask);
        }

        let mut stopped = Vec::new();
        while let Some(index) = book.positions.iter().position(|p| p.stop_hit(quote.bid, quote.ask)) {
            let position = book.settle(index);
            warn!(
                "Stop loss hit on {} position {}: net profit {:.2}",
                position.direction, position.id, position.net_profit
            );
            stopped.push(position);
        }

        if !stopped.is_empty() {
            info!("Balance after stops: {:.2}", book.balance);
        }
        Ok(stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::types::Direction;
    use chrono::Utc;

    fn exchange() -> PaperExchange {
        PaperExchange::new(InstrumentSpec::new("EURUSD", 0.0001), 10_000.0)
    }

    fn request(direction: Direction, volume: f64, stop_loss_pips: f64) -> OpenRequest {
        OpenRequest {
            direction,
            symbol: "EURUSD".into(),
            label: "grid".into(),
            volume,
            stop_loss_pips,
            rung: 1,
        }
    }

    fn quote(bid: f64, ask: f64) -> Quote {
        Quote::new(Utc::now(), bid, ask)
    }

    #[tokio::test]
    async fn test_open_requires_quote() {
        let exchange = exchange();
        let result = exchange.open_position(&request(Direction::Long, 1000.0, 100.0)).await;
        assert!(matches!(result, Err(GridError::Execution(_))));
    }

    #[tokio::test]
    async fn test_fills_and_stops() {
        let exchange = exchange();
        exchange.mark_to_market(&quote(1.1050, 1.1052)).await.unwrap();

        let long = exchange.open_position(&request(Direction::Long, 1000.0, 100.0)).await.unwrap();
        assert_eq!(long.entry_price, 1.1052);
        assert!((long.stop_loss.unwrap() - 1.0952).abs() < 1e-9);
        // Opening pays the spread
        assert!((long.net_profit + 0.2).abs() < 1e-9);

        let short = exchange.open_position(&request(Direction::Short, 2000.0, 100.0)).await.unwrap();
        assert_eq!(short.entry_price, 1.1050);
        assert!((short.stop_loss.unwrap() - 1.1150).abs() < 1e-9);
        assert_eq!(short.id, long.id + 1);
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let exchange = exchange();
        exchange.mark_to_market(&quote(1.1050, 1.1052)).await.unwrap();

        assert!(exchange.open_position(&request(Direction::Long, 1500.0, 100.0)).await.is_err());
        assert!(exchange.open_position(&request(Direction::Long, 0.0, 100.0)).await.is_err());

        let mut other = request(Direction::Long, 1000.0, 100.0);
        other.symbol = "GBPUSD".into();
        assert!(exchange.open_position(&other).await.is_err());
        assert!(exchange.instrument("GBPUSD").await.is_err());

        assert!(matches!(
            exchange.close_position(99).await,
            Err(GridError::PositionNotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_mark_to_market_revalues() {
        let exchange = exchange();
        exchange.mark_to_market(&quote(1.1050, 1.1052)).await.unwrap();
        exchange.open_position(&request(Direction::Long, 1000.0, 100.0)).await.unwrap();

        let stopped = exchange.mark_to_market(&quote(1.1062, 1.1064)).await.unwrap();
        assert!(stopped.is_empty());

        let positions = exchange.positions().await.unwrap();
        assert!((positions[0].net_profit - 1.0).abs() < 1e-9);
        assert!((exchange.equity().await - 10_001.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stop_loss_closes_position() {
        let exchange = exchange();
        exchange.mark_to_market(&quote(1.1050, 1.1052)).await.unwrap();
        exchange.open_position(&request(Direction::Long, 1000.0, 10.0)).await.unwrap();

        let stopped = exchange.mark_to_market(&quote(1.1040, 1.1042)).await.unwrap();
        assert_eq!(stopped.len(), 1);
        assert!(exchange.positions().await.unwrap().is_empty());
        assert!((exchange.balance().await - (10_000.0 - 1.2)).abs() < 1e-9);
        assert_eq!(exchange.closed_count().await, 1);
    }

    #[tokio::test]
    async fn test_close_settles_with_fees() {
        let exchange = exchange().with_fee_rate(0.00002);
        exchange.mark_to_market(&quote(1.1050, 1.1052)).await.unwrap();
        let position = exchange.open_position(&request(Direction::Long, 1000.0, 100.0)).await.unwrap();
        let commission = 1.1052 * 1000.0 * 0.00002;
        assert!((position.commission - commission).abs() < 1e-12);

        exchange.mark_to_market(&quote(1.1072, 1.1074)).await.unwrap();
        let closed = exchange.close_position(position.id).await.unwrap();

        let expected = 2.0 - 2.0 * commission;
        assert!((closed.net_profit - expected).abs() < 1e-9);
        assert!((exchange.realized_profit().await - expected).abs() < 1e-9);
        assert!((exchange.total_fees().await - 2.0 * commission).abs() < 1e-12);
        assert!((exchange.balance().await - (10_000.0 + expected)).abs() < 1e-9);
    }
}
