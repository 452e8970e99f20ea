use serde::{Deserialize, Serialize};

use crate::state_machine::PositionState;

/// `price_a - hedge * price_b`.
pub fn spread_value(price_a: f64, price_b: f64, hedge: f64) -> f64 {
    price_a - hedge * price_b
}

/// Result of feeding one tick's prices and hedge estimate into a pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpreadAppend {
    /// A spread value was appended using the hedge estimated `lag` ticks ago.
    Appended { spread: f64, hedge: f64 },
    /// Not enough prior hedge estimates yet; only the hedge was recorded.
    HedgeOnly { available: usize, required: usize },
}

/// Durable per-pair memory: position flags plus append-only spread and hedge
/// histories. The hedge history leads the spread history by the hedge lag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairState {
    in_long: bool,
    in_short: bool,
    spread_history: Vec<f64>,
    hedge_history: Vec<f64>,
}

impl PairState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> PositionState {
        match (self.in_long, self.in_short) {
            (true, false) => PositionState::Long,
            (false, true) => PositionState::Short,
            _ => PositionState::Flat,
        }
    }

    pub(crate) fn set_position(&mut self, position: PositionState) {
        self.in_long = position == PositionState::Long;
        self.in_short = position == PositionState::Short;
    }

    pub fn in_long(&self) -> bool {
        self.in_long
    }

    pub fn in_short(&self) -> bool {
        self.in_short
    }

    pub fn spread_history(&self) -> &[f64] {
        &self.spread_history
    }

    pub fn hedge_history(&self) -> &[f64] {
        &self.hedge_history
    }

    /// Hedge estimated `lag` ticks before the next one, if recorded.
    pub fn lagged_hedge(&self, lag: usize) -> Option<f64> {
        let len = self.hedge_history.len();
        if lag == 0 || len < lag {
            return None;
        }
        Some(self.hedge_history[len - lag])
    }

    /// Records this tick's hedge estimate and, when a hedge from `lag` ticks
    /// earlier exists, appends `price_a - hedge_lagged * price_b`.
    pub fn append(
        &mut self,
        price_a: f64,
        price_b: f64,
        hedge_now: f64,
        lag: usize,
    ) -> SpreadAppend {
        let lagged = self.lagged_hedge(lag);
        let available = self.hedge_history.len();
        self.hedge_history.push(hedge_now);
        match lagged {
            Some(hedge) => {
                let spread = spread_value(price_a, price_b, hedge);
                self.spread_history.push(spread);
                SpreadAppend::Appended { spread, hedge }
            }
            None => SpreadAppend::HedgeOnly {
                available,
                required: lag,
            },
        }
    }

    /// Loaded states never carry both position flags.
    pub fn is_consistent(&self) -> bool {
        !(self.in_long && self.in_short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_ticks_only_record_hedge() {
        let mut state = PairState::new();
        let outcome = state.append(100.0, 50.0, 1.8, 2);
        assert_eq!(
            outcome,
            SpreadAppend::HedgeOnly {
                available: 0,
                required: 2
            }
        );
        let outcome = state.append(101.0, 50.5, 1.9, 2);
        assert!(matches!(outcome, SpreadAppend::HedgeOnly { available: 1, .. }));
        assert!(state.spread_history().is_empty());
        assert_eq!(state.hedge_history(), &[1.8, 1.9]);
    }

    #[test]
    fn spread_uses_hedge_from_lag_ticks_earlier() {
        let mut state = PairState::new();
        state.append(100.0, 50.0, 2.0, 1);
        let outcome = state.append(103.0, 51.0, 5.0, 1);
        assert_eq!(
            outcome,
            SpreadAppend::Appended {
                spread: 103.0 - 2.0 * 51.0,
                hedge: 2.0
            }
        );
        assert_eq!(state.spread_history(), &[1.0]);
        assert_eq!(state.hedge_history().len(), state.spread_history().len() + 1);
    }

    #[test]
    fn hedge_history_leads_by_lag() {
        let mut state = PairState::new();
        for i in 0..10 {
            state.append(100.0 + i as f64, 50.0, 1.0 + i as f64 * 0.1, 3);
        }
        assert_eq!(state.hedge_history().len(), 10);
        assert_eq!(state.spread_history().len(), 7);
        // Fourth tick used the first tick's hedge.
        assert!((state.spread_history()[0] - (103.0 - 1.0 * 50.0)).abs() < 1e-12);
    }

    #[test]
    fn position_flags_are_exclusive() {
        let mut state = PairState::new();
        assert_eq!(state.position(), PositionState::Flat);
        state.set_position(PositionState::Long);
        assert!(state.in_long() && !state.in_short());
        state.set_position(PositionState::Short);
        assert!(!state.in_long() && state.in_short());
        state.set_position(PositionState::Flat);
        assert!(!state.in_long() && !state.in_short());
        assert!(state.is_consistent());
    }

    #[test]
    fn identical_inputs_give_identical_histories() {
        let prices = [(100.0, 50.0, 1.9), (101.0, 50.2, 1.95), (99.5, 49.8, 2.01)];
        let mut first = PairState::new();
        let mut second = PairState::new();
        for (a, b, h) in prices {
            first.append(a, b, h, 1);
            second.append(a, b, h, 1);
        }
        assert_eq!(first, second);
    }

    #[test]
    fn json_reload_keeps_histories_bit_identical() {
        let mut state = PairState::new();
        state.spread_history = vec![10.621733237660225, 0.1 + 0.2, -1e-17, 123456.789012345];
        state.hedge_history = vec![1.405361044750849, 1.0 / 3.0, 2.0f64.sqrt()];
        state.set_position(PositionState::Short);
        let json = serde_json::to_string(&state).unwrap();
        let reloaded: PairState = serde_json::from_str(&json).unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(reloaded.spread_history()), bits(state.spread_history()));
        assert_eq!(bits(reloaded.hedge_history()), bits(state.hedge_history()));
        assert_eq!(reloaded.position(), PositionState::Short);
    }
}
