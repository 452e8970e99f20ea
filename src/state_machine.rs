use serde::{Deserialize, Serialize};

use crate::spread::PairState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    EnterLong,
    EnterShort,
    Exit,
    Hold,
}

/// Aggregate stationarity verdict fed to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stationarity {
    /// At least one test passed.
    Tradeable,
    /// Every test failed.
    UnanimousFail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StationarityLost,
    MeanCrossed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Hold,
    /// Target shares: long is `(+1, -hedge)`, short is `(-1, +hedge)`.
    Enter {
        position: PositionState,
        shares_a: f64,
        shares_b: f64,
    },
    Exit {
        from: PositionState,
        reason: ExitReason,
    },
}

impl Transition {
    pub fn direction(&self) -> Direction {
        match self {
            Transition::Hold => Direction::Hold,
            Transition::Enter {
                position: PositionState::Long,
                ..
            } => Direction::EnterLong,
            Transition::Enter { .. } => Direction::EnterShort,
            Transition::Exit { .. } => Direction::Exit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub z_score: Option<f64>,
    pub direction: Direction,
}

/// FLAT / LONG / SHORT per pair. At most one transition fires per tick.
#[derive(Debug, Clone, Copy)]
pub struct PairPositionStateMachine {
    entry_threshold: f64,
    exit_threshold: f64,
}

impl PairPositionStateMachine {
    pub fn new(entry_threshold: f64, exit_threshold: f64) -> Self {
        Self {
            entry_threshold,
            exit_threshold,
        }
    }

    pub fn entry_threshold(&self) -> f64 {
        self.entry_threshold
    }

    /// Pure decision, in priority order: stationarity exit, short exit, long
    /// exit, long entry, short entry, hold.
    pub fn decide(
        &self,
        position: PositionState,
        stationarity: Stationarity,
        z_score: Option<f64>,
        hedge: f64,
    ) -> Transition {
        if stationarity == Stationarity::UnanimousFail && position != PositionState::Flat {
            return Transition::Exit {
                from: position,
                reason: ExitReason::StationarityLost,
            };
        }
        if stationarity == Stationarity::UnanimousFail {
            return Transition::Hold;
        }
        let Some(z) = z_score else {
            return Transition::Hold;
        };
        match position {
            PositionState::Short if z < -self.exit_threshold => Transition::Exit {
                from: position,
                reason: ExitReason::MeanCrossed,
            },
            PositionState::Long if z > self.exit_threshold => Transition::Exit {
                from: position,
                reason: ExitReason::MeanCrossed,
            },
            PositionState::Flat if z < -self.entry_threshold => Transition::Enter {
                position: PositionState::Long,
                shares_a: 1.0,
                shares_b: -hedge,
            },
            PositionState::Flat if z > self.entry_threshold => Transition::Enter {
                position: PositionState::Short,
                shares_a: -1.0,
                shares_b: hedge,
            },
            _ => Transition::Hold,
        }
    }

    /// Decides and applies the transition to the pair's position flags.
    /// Spread and hedge histories are never touched here.
    pub fn transition(
        &self,
        state: &mut PairState,
        stationarity: Stationarity,
        z_score: Option<f64>,
        hedge: f64,
    ) -> (Transition, Signal) {
        let transition = self.decide(state.position(), stationarity, z_score, hedge);
        match transition {
            Transition::Enter { position, .. } => state.set_position(position),
            Transition::Exit { .. } => state.set_position(PositionState::Flat),
            Transition::Hold => {}
        }
        let signal = Signal {
            z_score,
            direction: transition.direction(),
        };
        (transition, signal)
    }
}
