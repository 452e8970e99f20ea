use std::error::Error;
use std::fmt;

/// Pair-local failures. None of these are fatal: the engine logs them and
/// leaves the pair's state as it was before the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalError {
    /// Singular / ill-conditioned regression.
    Regression(String),
    InsufficientHistory { required: usize, available: usize },
    /// Zero-variance z-score window.
    DegenerateWindow,
    HedgeHistoryTooShort { required: usize, available: usize },
    InvalidInput(String),
}

impl SignalError {
    pub fn regression(detail: impl Into<String>) -> Self {
        SignalError::Regression(detail.into())
    }

    /// Insufficient data and degenerate windows are routine while a pair warms up.
    pub fn is_routine(&self) -> bool {
        matches!(
            self,
            SignalError::InsufficientHistory { .. }
                | SignalError::DegenerateWindow
                | SignalError::HedgeHistoryTooShort { .. }
        )
    }
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignalError::Regression(detail) => write!(f, "Regression error: {}", detail),
            SignalError::InsufficientHistory {
                required,
                available,
            } => write!(
                f,
                "Insufficient history: need {} observations, have {}",
                required, available
            ),
            SignalError::DegenerateWindow => write!(f, "Degenerate window: zero variance"),
            SignalError::HedgeHistoryTooShort {
                required,
                available,
            } => write!(
                f,
                "Hedge history too short: need {} prior estimates, have {}",
                required, available
            ),
            SignalError::InvalidInput(detail) => write!(f, "Invalid input: {}", detail),
        }
    }
}

impl Error for SignalError {}

pub type SignalResult<T> = std::result::Result<T, SignalError>;
