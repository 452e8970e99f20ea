use crate::error::{SignalError, SignalResult};
use crate::stats::mean_std;

const MIN_STD: f64 = 1e-12;

/// Standardised latest spread value against a trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScore {
    pub value: f64,
    pub mean: f64,
    pub std: f64,
    pub latest: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ZScoreSignal {
    look_back: usize,
}

impl ZScoreSignal {
    pub fn new(look_back: usize) -> Self {
        Self { look_back }
    }

    pub fn look_back(&self) -> usize {
        self.look_back
    }

    /// `(latest - mean) / std` over the trailing `look_back` observations.
    /// A zero-variance window yields `DegenerateWindow`, never a non-finite value.
    pub fn compute(&self, spread_history: &[f64]) -> SignalResult<ZScore> {
        if self.look_back == 0 || spread_history.len() < self.look_back {
            return Err(SignalError::InsufficientHistory {
                required: self.look_back.max(1),
                available: spread_history.len(),
            });
        }
        let window = &spread_history[spread_history.len() - self.look_back..];
        let (mean, std) = mean_std(window).ok_or(SignalError::DegenerateWindow)?;
        let latest = window[window.len() - 1];
        if !(std > MIN_STD * mean.abs().max(1.0)) {
            return Err(SignalError::DegenerateWindow);
        }
        let value = (latest - mean) / std;
        if !value.is_finite() {
            return Err(SignalError::DegenerateWindow);
        }
        Ok(ZScore {
            value,
            mean,
            std,
            latest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_score_of_known_window() {
        let history = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let z = ZScoreSignal::new(5).compute(&history).unwrap();
        assert_eq!(z.mean, 3.0);
        assert_eq!(z.latest, 5.0);
        assert!((z.value - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn z_score_round_trips_to_latest() {
        let history = [1.25, -0.5, 3.75, 2.0, 0.125, 4.5, -1.0];
        let z = ZScoreSignal::new(7).compute(&history).unwrap();
        let back = z.value * z.std + z.mean;
        assert!((back - z.latest).abs() <= 1e-12);
        assert_eq!(z.latest, -1.0);
    }

    #[test]
    fn short_history_is_insufficient() {
        let err = ZScoreSignal::new(20).compute(&[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            SignalError::InsufficientHistory {
                required: 20,
                available: 2
            }
        );
    }

    #[test]
    fn constant_window_is_degenerate() {
        let history = vec![3.3; 30];
        assert_eq!(
            ZScoreSignal::new(20).compute(&history).unwrap_err(),
            SignalError::DegenerateWindow
        );
    }

    #[test]
    fn only_trailing_window_is_used() {
        let mut history = vec![1000.0, -1000.0];
        history.extend([1.0, 2.0, 3.0]);
        let z = ZScoreSignal::new(3).compute(&history).unwrap();
        assert_eq!(z.mean, 2.0);
    }
}
