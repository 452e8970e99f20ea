use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use crate::ports::host::{HostError, MarketHost, OrderIntent, OrderTarget};

/// One line of a replay file: a bar close for every listed symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayEntry {
    pub timestamp: i64,
    pub prices: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOrder {
    pub timestamp: i64,
    pub intent: OrderIntent,
}

/// Offline host that replays a JSONL price file one bar per tick. Orders are
/// treated as filled at once and kept for inspection.
#[derive(Debug)]
pub struct ReplayHost {
    data: Vec<ReplayEntry>,
    cursor: AtomicUsize,
    orders: Mutex<Vec<RecordedOrder>>,
    targets: Mutex<HashMap<String, OrderTarget>>,
    metrics: Mutex<HashMap<String, Vec<f64>>>,
}

impl ReplayHost {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, HostError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            HostError::Other(format!(
                "failed to open replay file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, HostError> {
        let mut data = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: ReplayEntry = serde_json::from_str(&line).map_err(|e| {
                HostError::Parse(format!("failed to parse replay entry '{}': {}", line, e))
            })?;
            data.push(entry);
        }
        Self::from_entries(data)
    }

    pub fn from_entries(data: Vec<ReplayEntry>) -> Result<Self, HostError> {
        if data.is_empty() {
            return Err(HostError::Other(
                "replay file is empty or invalid".to_string(),
            ));
        }
        Ok(Self {
            data,
            cursor: AtomicUsize::new(0),
            orders: Mutex::new(Vec::new()),
            targets: Mutex::new(HashMap::new()),
            metrics: Mutex::new(HashMap::new()),
        })
    }

    // Advances the replay by one bar. Returns false once the last bar is current.
    pub fn tick(&self) -> bool {
        let current_cursor = self.cursor.load(AtomicOrdering::SeqCst);
        if current_cursor < self.data.len() - 1 {
            self.cursor.fetch_add(1, AtomicOrdering::SeqCst);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn current_timestamp_secs(&self) -> Option<i64> {
        let current_cursor = self.cursor.load(AtomicOrdering::SeqCst);
        self.data.get(current_cursor).map(|e| e.timestamp / 1000) // stored as ms
    }

    pub fn orders(&self) -> Vec<RecordedOrder> {
        self.orders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn target(&self, instrument: &str) -> Option<OrderTarget> {
        self.targets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(instrument)
            .cloned()
    }

    pub fn metric(&self, name: &str) -> Vec<f64> {
        self.metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn record_order(&self, intent: OrderIntent) {
        let timestamp = self
            .data
            .get(self.cursor.load(AtomicOrdering::SeqCst))
            .map(|e| e.timestamp)
            .unwrap_or_default();
        self.targets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(intent.instrument.clone(), intent.target.clone());
        self.orders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedOrder { timestamp, intent });
    }
}

/// Writes entries in the JSONL layout `ReplayHost` reads.
pub fn write_entries<W: Write>(writer: &mut W, entries: &[ReplayEntry]) -> std::io::Result<()> {
    for entry in entries {
        let line = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}

#[async_trait]
impl MarketHost for ReplayHost {
    async fn get_price_history(
        &self,
        instruments: &[String],
        length: usize,
        frequency: &str,
    ) -> Result<HashMap<String, Vec<f64>>, HostError> {
        let current_cursor = self.cursor.load(AtomicOrdering::SeqCst);
        let visible = self
            .data
            .get(..=current_cursor)
            .ok_or_else(|| HostError::Other("Cursor out of bounds".to_string()))?;
        log::trace!(
            "[REPLAY] history request len={} freq={} cursor={}",
            length,
            frequency,
            current_cursor
        );

        let mut out = HashMap::with_capacity(instruments.len());
        for symbol in instruments {
            let mut prices: Vec<f64> = visible
                .iter()
                .rev()
                .filter_map(|entry| entry.prices.get(symbol).copied())
                .take(length)
                .collect();
            if prices.is_empty() {
                return Err(HostError::MissingSymbol(format!(
                    "'{}' not found up to cursor {}",
                    symbol, current_cursor
                )));
            }
            prices.reverse();
            out.insert(symbol.clone(), prices);
        }
        Ok(out)
    }

    async fn has_open_orders(&self) -> Result<bool, HostError> {
        Ok(false)
    }

    async fn submit_target_percent(&self, instrument: &str, percent: f64) -> Result<(), HostError> {
        log::debug!("[REPLAY] target percent {} -> {:.6}", instrument, percent);
        self.record_order(OrderIntent::percent(instrument, percent));
        Ok(())
    }

    async fn submit_target_quantity(
        &self,
        instrument: &str,
        qty: Decimal,
    ) -> Result<(), HostError> {
        log::debug!("[REPLAY] target quantity {} -> {}", instrument, qty);
        self.record_order(OrderIntent::quantity(instrument, qty));
        Ok(())
    }

    async fn record_metric(&self, name: &str, value: f64) {
        self.metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(name.to_string())
            .or_default()
            .push(value);
    }
}
