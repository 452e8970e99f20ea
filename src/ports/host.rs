use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum HostError {
    Io(std::io::Error),
    Parse(String),
    MissingSymbol(String),
    Other(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HostError::Io(e) => write!(f, "I/O error: {}", e),
            HostError::Parse(e) => write!(f, "Parse error: {}", e),
            HostError::MissingSymbol(s) => write!(f, "Missing symbol: {}", s),
            HostError::Other(e) => write!(f, "Host error: {}", e),
        }
    }
}

impl Error for HostError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HostError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> HostError {
        HostError::Io(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderTarget {
    Percent(f64),
    Quantity(Decimal),
}

/// The only output that crosses toward the execution side.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub instrument: String,
    pub target: OrderTarget,
}

impl OrderIntent {
    pub fn percent(instrument: &str, percent: f64) -> Self {
        Self {
            instrument: instrument.to_string(),
            target: OrderTarget::Percent(percent),
        }
    }

    pub fn quantity(instrument: &str, qty: Decimal) -> Self {
        Self {
            instrument: instrument.to_string(),
            target: OrderTarget::Quantity(qty),
        }
    }
}

/// Trading-platform collaborator: price history in, order intents and
/// diagnostics out. Order submission is fire-and-forget.
#[async_trait]
pub trait MarketHost {
    /// Trailing prices per instrument, most recent last.
    async fn get_price_history(
        &self,
        instruments: &[String],
        length: usize,
        frequency: &str,
    ) -> Result<HashMap<String, Vec<f64>>, HostError>;

    async fn has_open_orders(&self) -> Result<bool, HostError>;

    async fn submit_target_percent(&self, instrument: &str, percent: f64) -> Result<(), HostError>;

    async fn submit_target_quantity(&self, instrument: &str, qty: Decimal)
        -> Result<(), HostError>;

    async fn record_metric(&self, name: &str, value: f64);
}
