//! Read-only view over the broker's position book.
//!
//! The ledger is the single source of truth for ladder state. A view is
//! built fresh every tick, filtered to one instrument and one strategy tag,
//! and never outlives the tick.

use super::errors::{GridError, GridResult};
use super::types::{Direction, LadderState, Position};

/// Positions of one strategy on one instrument, split by direction
#[derive(Debug, Clone)]
pub struct LedgerView<'a> {
    positions: Vec<&'a Position>,
}

impl<'a> LedgerView<'a> {
    /// Filter the broker's book down to `symbol` and `label`
    pub fn new(positions: &'a [Position], symbol: &str, label: &str) -> Self {
        Self {
            positions: positions
                .iter()
                .filter(|p| p.belongs_to(symbol, label))
                .collect(),
        }
    }

    /// All positions of this strategy, in ledger order
    pub fn all(&self) -> impl Iterator<Item = &'a Position> + '_ {
        self.positions.iter().copied()
    }

    /// Positions of one direction, in ledger order
    pub fn positions_of(&self, direction: Direction) -> impl Iterator<Item = &'a Position> + '_ {
        self.all().filter(move |p| p.direction == direction)
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.positions_of(direction).count()
    }

    pub fn ladder_state(&self, direction: Direction) -> LadderState {
        LadderState::from_depth(self.count(direction))
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Mean running net profit of a ladder
    pub fn average_net_profit(&self, direction: Direction) -> GridResult<f64> {
        self.average(direction, |p| p.net_profit)
    }

    /// Mean entry price of a ladder
    pub fn average_entry_price(&self, direction: Direction) -> GridResult<f64> {
        self.average(direction, |p| p.entry_price)
    }

    pub fn min_entry_price(&self, direction: Direction) -> GridResult<f64> {
        self.positions_of(direction)
            .map(|p| p.entry_price)
            .reduce(f64::min)
            .ok_or(GridError::EmptySet(direction))
    }

    pub fn max_entry_price(&self, direction: Direction) -> GridResult<f64> {
        self.positions_of(direction)
            .map(|p| p.entry_price)
            .reduce(f64::max)
            .ok_or(GridError::EmptySet(direction))
    }

    /// Entry price furthest into the adverse side: the lowest long entry or
    /// the highest short entry
    pub fn extreme_entry_price(&self, direction: Direction) -> GridResult<f64> {
        match direction {
            Direction::Long => self.min_entry_price(direction),
            Direction::Short => self.max_entry_price(direction),
        }
    }

    fn average(&self, direction: Direction, value: impl Fn(&Position) -> f64) -> GridResult<f64> {
        let (sum, count) = self
            .positions_of(direction)
            .fold((0.0, 0usize), |(sum, count), p| (sum + value(p), count + 1));

        if count == 0 {
            return Err(GridError::EmptySet(direction));
        }
        Ok(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn position(id: u64, symbol: &str, label: &str, direction: Direction, entry: f64, net: f64) -> Position {
        Position {
            id,
            symbol: symbol.into(),
            label: label.into(),
            direction,
            volume: 1000.0,
            entry_price: entry,
            stop_loss: None,
            gross_profit: net,
            commission: 0.0,
            net_profit: net,
            opened_at: Utc::now(),
        }
    }

    fn book() -> Vec<Position> {
        vec![
            position(1, "EURUSD", "grid", Direction::Long, 1.1050, 0.4),
            position(2, "EURUSD", "grid", Direction::Long, 1.1030, -0.2),
            position(3, "EURUSD", "grid", Direction::Short, 1.1070, 1.0),
            // Other strategy on the same instrument
            position(4, "EURUSD", "manual", Direction::Long, 1.0000, 50.0),
            // Same strategy on another instrument
            position(5, "GBPUSD", "grid", Direction::Short, 1.3000, -9.0),
        ]
    }

    #[test]
    fn test_filters_symbol_and_label() {
        let positions = book();
        let view = LedgerView::new(&positions, "EURUSD", "grid");

        assert_eq!(view.count(Direction::Long), 2);
        assert_eq!(view.count(Direction::Short), 1);
        let ids: Vec<u64> = view.all().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_aggregates() {
        let positions = book();
        let view = LedgerView::new(&positions, "EURUSD", "grid");

        assert!((view.average_net_profit(Direction::Long).unwrap() - 0.1).abs() < 1e-12);
        assert!((view.average_entry_price(Direction::Long).unwrap() - 1.1040).abs() < 1e-12);
        assert_eq!(view.min_entry_price(Direction::Long).unwrap(), 1.1030);
        assert_eq!(view.max_entry_price(Direction::Long).unwrap(), 1.1050);
        assert_eq!(view.extreme_entry_price(Direction::Long).unwrap(), 1.1030);
        assert_eq!(view.extreme_entry_price(Direction::Short).unwrap(), 1.1070);
        assert_eq!(view.ladder_state(Direction::Long), LadderState::Active(2));
    }

    #[test]
    fn test_aggregates_on_empty_ladder_fail() {
        let positions = book();
        let view = LedgerView::new(&positions, "EURUSD", "other");

        assert!(view.is_empty());
        assert_eq!(view.ladder_state(Direction::Short), LadderState::Flat);
        assert!(matches!(
            view.average_net_profit(Direction::Long),
            Err(GridError::EmptySet(Direction::Long))
        ));
        assert!(matches!(
            view.min_entry_price(Direction::Short),
            Err(GridError::EmptySet(Direction::Short))
        ));
        assert!(view.max_entry_price(Direction::Short).is_err());
        assert!(view.average_entry_price(Direction::Short).is_err());
    }
}
