use anyhow::{anyhow, Context, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{OrderMode, PairSpec, SignalConfig};
use crate::error::{SignalError, SignalResult};
use crate::ports::host::{HostError, MarketHost, OrderIntent, OrderTarget};
use crate::ports::replay_host::ReplayHost;
use crate::sizing::PositionSizer;
use crate::spread::{PairState, SpreadAppend};
use crate::state_machine::{PairPositionStateMachine, Signal, Stationarity, Transition};
use crate::stationarity::{BatteryReport, StationarityBattery};
use crate::stats::HedgeRatioEstimator;
use crate::zscore::{ZScore, ZScoreSignal};

const METRICS_LOG_EVERY_TICKS: u64 = 20;
const MIN_PRICE_POINTS: usize = 3;

/// Everything computed for one pair on one tick.
#[derive(Debug, Clone)]
pub struct PairEvaluation {
    pub hedge: f64,
    /// Hedge estimated `hedge_lag` ticks ago; used for the spread and sizing.
    pub lagged_hedge: Option<f64>,
    pub spread: Option<f64>,
    pub battery: Option<BatteryReport>,
    pub z_score: Option<ZScore>,
    pub transition: Transition,
    pub signal: Signal,
    /// Why the pair held without reaching the state machine's full input.
    pub hold_reason: Option<SignalError>,
    pub intents: Vec<OrderIntent>,
}

#[derive(Debug, Clone)]
pub enum PairOutcome {
    /// Failed before anything was recorded; the pair state is unchanged.
    Skipped(SignalError),
    Evaluated(PairEvaluation),
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// The host reported pending orders, so nothing was evaluated.
    pub skipped: bool,
    pub outcomes: BTreeMap<String, PairOutcome>,
}

impl TickReport {
    pub fn outcome(&self, key: &str) -> Option<&PairOutcome> {
        self.outcomes.get(key)
    }

    pub fn evaluation(&self, key: &str) -> Option<&PairEvaluation> {
        match self.outcomes.get(key) {
            Some(PairOutcome::Evaluated(eval)) => Some(eval),
            _ => None,
        }
    }

    pub fn intents(&self) -> Vec<OrderIntent> {
        self.outcomes
            .values()
            .filter_map(|outcome| match outcome {
                PairOutcome::Evaluated(eval) => Some(eval.intents.iter().cloned()),
                PairOutcome::Skipped(_) => None,
            })
            .flatten()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PairDiagnostics {
    z: Option<f64>,
    hedge: f64,
    half_life: Option<f64>,
    hurst: Option<f64>,
    adf_p: Option<f64>,
}

pub struct PairTradeEngine {
    cfg: SignalConfig,
    host: Arc<dyn MarketHost + Send + Sync>,
    replay_host: Option<Arc<ReplayHost>>,
    states: BTreeMap<String, PairState>,
    diagnostics: BTreeMap<String, PairDiagnostics>,
    estimator: HedgeRatioEstimator,
    battery: StationarityBattery,
    zscore: ZScoreSignal,
    machine: PairPositionStateMachine,
    sizer: PositionSizer,
    history_path: PathBuf,
    ticks: u64,
}

impl PairTradeEngine {
    pub fn new(cfg: SignalConfig, host: Arc<dyn MarketHost + Send + Sync>) -> Self {
        let states = cfg
            .pairs
            .iter()
            .map(|pair| (pair.key(), PairState::new()))
            .collect();
        let battery = StationarityBattery::new(
            cfg.unit_root.clone(),
            cfg.half_life.clone(),
            cfg.hurst.clone(),
        );
        debug_assert_eq!(battery.look_back(), cfg.battery_look_back());
        Self {
            estimator: HedgeRatioEstimator,
            battery,
            zscore: ZScoreSignal::new(cfg.z_score_lookback),
            machine: PairPositionStateMachine::new(cfg.entry_threshold, cfg.exit_threshold),
            sizer: PositionSizer::new(cfg.sizing),
            history_path: PathBuf::from(&cfg.history_file),
            host,
            replay_host: None,
            states,
            diagnostics: BTreeMap::new(),
            ticks: 0,
            cfg,
        }
    }

    pub fn with_replay(cfg: SignalConfig, replay: Arc<ReplayHost>) -> Self {
        let mut engine = Self::new(cfg, replay.clone());
        engine.replay_host = Some(replay);
        engine
    }

    /// Builds the engine over the replay file named in the config.
    pub fn from_config(cfg: SignalConfig) -> Result<Self> {
        let path = cfg
            .replay_file
            .clone()
            .ok_or_else(|| anyhow!("replay_file (REPLAY_FILE) is required"))?;
        let replay = ReplayHost::new(&path)
            .with_context(|| format!("failed to load replay file {}", path))?;
        log::info!("[REPLAY] loaded {} bars from {}", replay.len(), path);
        Ok(Self::with_replay(cfg, Arc::new(replay)))
    }

    pub fn config(&self) -> &SignalConfig {
        &self.cfg
    }

    pub fn state(&self, key: &str) -> Option<&PairState> {
        self.states.get(key)
    }

    pub fn states(&self) -> &BTreeMap<String, PairState> {
        &self.states
    }

    pub async fn run(&mut self) -> Result<()> {
        log::info!(
            "[CONFIG] pairs={} hedge_lag={} z_look_back={} entry={} exit={} sizing={:?} mode={:?}",
            self.cfg
                .pairs
                .iter()
                .map(PairSpec::key)
                .collect::<Vec<_>>()
                .join(","),
            self.cfg.hedge_lag,
            self.cfg.z_score_lookback,
            self.cfg.entry_threshold,
            self.cfg.exit_threshold,
            self.cfg.sizing,
            self.cfg.order_mode
        );
        log::info!(
            "[CONFIG] battery look_back={} (unit_root={} half_life={} hurst={})",
            self.battery.look_back(),
            self.cfg.unit_root.look_back,
            self.cfg.half_life.look_back,
            self.cfg.hurst.look_back
        );
        self.load_states_from_disk();

        let replay = self
            .replay_host
            .clone()
            .ok_or_else(|| anyhow!("no replay host configured"))?;
        loop {
            if let Err(e) = self.step().await {
                log::error!("[REPLAY] step failed: {:?}", e);
            }
            if !replay.tick() {
                log::info!("[REPLAY] end of data reached after {} ticks", self.ticks);
                break;
            }
        }
        self.log_metrics();
        Ok(())
    }

    /// One scheduler tick over every configured pair.
    pub async fn step(&mut self) -> Result<TickReport> {
        self.ticks += 1;
        if self
            .host
            .has_open_orders()
            .await
            .context("failed to query open orders")?
        {
            log::debug!("[TICK] open orders pending, skipping tick {}", self.ticks);
            return Ok(TickReport {
                skipped: true,
                outcomes: BTreeMap::new(),
            });
        }

        let prices = self.fetch_prices().await?;
        let mut report = TickReport::default();
        for pair in self.cfg.pairs.clone() {
            let key = pair.key();
            let current = self.states.get(&key).cloned().unwrap_or_default();
            match self.evaluate_pair(&pair, &prices, &current) {
                Ok((next, eval)) => {
                    self.log_evaluation(&key, &eval);
                    self.submit_intents(&eval.intents).await;
                    self.record_metrics(&key, &eval).await;
                    self.states.insert(key.clone(), next);
                    report.outcomes.insert(key, PairOutcome::Evaluated(eval));
                }
                Err(e) => {
                    if e.is_routine() {
                        log::debug!("[SIGNAL] {} skipped: {}", key, e);
                    } else {
                        log::warn!("[SIGNAL] {} skipped: {}", key, e);
                    }
                    report.outcomes.insert(key, PairOutcome::Skipped(e));
                }
            }
        }

        self.persist_states_to_disk();
        if self.ticks % METRICS_LOG_EVERY_TICKS == 0 {
            self.log_metrics();
        }
        Ok(report)
    }

    async fn fetch_prices(&self) -> Result<HashMap<String, Vec<f64>>> {
        let length = self.cfg.price_history_length;
        let frequency = self.cfg.frequency.as_str();
        match self
            .host
            .get_price_history(&self.cfg.instruments(), length, frequency)
            .await
        {
            Ok(prices) => Ok(prices),
            Err(HostError::MissingSymbol(detail)) => {
                // Fall back to per-pair requests so one unknown symbol only
                // costs its own pairs.
                log::warn!("[TICK] {}; fetching prices per pair", detail);
                let mut merged = HashMap::new();
                for pair in &self.cfg.pairs {
                    let symbols = [pair.base.clone(), pair.quote.clone()];
                    match self
                        .host
                        .get_price_history(&symbols, length, frequency)
                        .await
                    {
                        Ok(prices) => merged.extend(prices),
                        Err(e) => log::warn!("[TICK] {} prices unavailable: {}", pair.key(), e),
                    }
                }
                Ok(merged)
            }
            Err(e) => Err(e).context("failed to fetch price history"),
        }
    }

    /// Pure evaluation on a copy of the pair state. The caller commits the
    /// returned state only on success.
    fn evaluate_pair(
        &self,
        pair: &PairSpec,
        prices: &HashMap<String, Vec<f64>>,
        current: &PairState,
    ) -> SignalResult<(PairState, PairEvaluation)> {
        let (series_a, series_b) = aligned_series(pair, prices)?;
        let hedge = self.estimator.estimate(series_a, series_b)?;
        let price_a = series_a[series_a.len() - 1];
        let price_b = series_b[series_b.len() - 1];

        let mut next = current.clone();
        let (spread, lagged_hedge) =
            match next.append(price_a, price_b, hedge, self.cfg.hedge_lag) {
                SpreadAppend::Appended { spread, hedge } => (spread, hedge),
                SpreadAppend::HedgeOnly {
                    available,
                    required,
                } => {
                    let eval = held(
                        hedge,
                        None,
                        SignalError::HedgeHistoryTooShort {
                            required,
                            available,
                        },
                    );
                    return Ok((next, eval));
                }
            };

        let battery = match self.battery.evaluate(next.spread_history()) {
            Ok(report) => report,
            Err(e) => {
                let mut eval = held(hedge, Some(lagged_hedge), e);
                eval.spread = Some(spread);
                return Ok((next, eval));
            }
        };

        let stationarity = if battery.unanimous_fail() {
            Stationarity::UnanimousFail
        } else {
            Stationarity::Tradeable
        };
        let mut hold_reason = None;
        let z_score = match stationarity {
            Stationarity::Tradeable => match self.zscore.compute(next.spread_history()) {
                Ok(z) => Some(z),
                Err(e) => {
                    hold_reason = Some(e);
                    None
                }
            },
            Stationarity::UnanimousFail => None,
        };

        let (transition, signal) = self.machine.transition(
            &mut next,
            stationarity,
            z_score.map(|z| z.value),
            lagged_hedge,
        );
        let intents = self.order_intents(pair, &transition, price_a, price_b)?;

        Ok((
            next,
            PairEvaluation {
                hedge,
                lagged_hedge: Some(lagged_hedge),
                spread: Some(spread),
                battery: Some(battery),
                z_score,
                transition,
                signal,
                hold_reason,
                intents,
            },
        ))
    }

    fn order_intents(
        &self,
        pair: &PairSpec,
        transition: &Transition,
        price_a: f64,
        price_b: f64,
    ) -> SignalResult<Vec<OrderIntent>> {
        let intents = match (*transition, self.cfg.order_mode) {
            (Transition::Hold, _) => Vec::new(),
            (Transition::Exit { .. }, OrderMode::Percent) => vec![
                OrderIntent::percent(&pair.base, 0.0),
                OrderIntent::percent(&pair.quote, 0.0),
            ],
            (Transition::Exit { .. }, OrderMode::Quantity) => vec![
                OrderIntent::quantity(&pair.base, Decimal::ZERO),
                OrderIntent::quantity(&pair.quote, Decimal::ZERO),
            ],
            (
                Transition::Enter {
                    shares_a, shares_b, ..
                },
                OrderMode::Percent,
            ) => {
                let (weight_a, weight_b) = self.sizer.weights(shares_a, shares_b, price_a, price_b);
                vec![
                    OrderIntent::percent(&pair.base, weight_a),
                    OrderIntent::percent(&pair.quote, weight_b),
                ]
            }
            (
                Transition::Enter {
                    shares_a, shares_b, ..
                },
                OrderMode::Quantity,
            ) => {
                let qty_a = self.leg_quantity(shares_a)?;
                let qty_b = self.leg_quantity(shares_b)?;
                vec![
                    OrderIntent::quantity(&pair.base, qty_a),
                    OrderIntent::quantity(&pair.quote, qty_b),
                ]
            }
        };
        Ok(intents)
    }

    fn leg_quantity(&self, shares: f64) -> SignalResult<Decimal> {
        let raw = shares * self.cfg.units_per_leg;
        let qty = Decimal::from_f64(raw)
            .ok_or_else(|| SignalError::InvalidInput(format!("unrepresentable quantity {}", raw)))?;
        Ok(quantize_size_by_step(qty, self.cfg.quantity_step))
    }

    async fn submit_intents(&self, intents: &[OrderIntent]) {
        for intent in intents {
            let result = match &intent.target {
                OrderTarget::Percent(percent) => {
                    self.host
                        .submit_target_percent(&intent.instrument, *percent)
                        .await
                }
                OrderTarget::Quantity(qty) => {
                    self.host
                        .submit_target_quantity(&intent.instrument, *qty)
                        .await
                }
            };
            if let Err(e) = result {
                log::warn!("[ORDER] {} submit failed: {}", intent.instrument, e);
            }
        }
    }

    async fn record_metrics(&mut self, key: &str, eval: &PairEvaluation) {
        let mut diag = PairDiagnostics {
            hedge: eval.hedge,
            z: eval.z_score.map(|z| z.value),
            ..Default::default()
        };
        if let Some(report) = &eval.battery {
            diag.adf_p = report.unit_root.p_value;
            diag.half_life = Some(report.half_life.statistic);
            diag.hurst = Some(report.hurst.statistic);
        }

        let values = [
            ("spread", eval.spread),
            ("hedge", Some(eval.hedge)),
            ("z_score", diag.z),
            ("adf_p", diag.adf_p),
            ("half_life", diag.half_life),
            ("hurst", diag.hurst),
        ];
        for (name, value) in values {
            if let Some(v) = value.filter(|v| v.is_finite()) {
                self.host
                    .record_metric(&format!("{}.{}", key, name), v)
                    .await;
            }
        }
        self.diagnostics.insert(key.to_string(), diag);
    }

    fn log_evaluation(&self, key: &str, eval: &PairEvaluation) {
        if let Some(report) = &eval.battery {
            for (test, result) in self.battery.tests().iter().zip(report.results()) {
                log::debug!(
                    "[SIGNAL] {} {} stat={:.4} ref={:.4} p={} pass={}",
                    key,
                    test.name(),
                    result.statistic,
                    result.reference_statistic,
                    result
                        .p_value
                        .map(|p| format!("{:.4}", p))
                        .unwrap_or_else(|| "-".to_string()),
                    result.verdict
                );
            }
        }
        match eval.transition {
            Transition::Hold => {
                if let Some(reason) = &eval.hold_reason {
                    log::trace!("[SIGNAL] {} hold: {}", key, reason);
                }
            }
            Transition::Enter { position, .. } => log::info!(
                "[SIGNAL] {} enter {:?} z={:.3} hedge={:.4}",
                key,
                position,
                eval.z_score.map(|z| z.value).unwrap_or(f64::NAN),
                eval.lagged_hedge.unwrap_or(eval.hedge)
            ),
            Transition::Exit { from, reason } => log::info!(
                "[SIGNAL] {} exit {:?} ({:?}) z={}",
                key,
                from,
                reason,
                eval.z_score
                    .map(|z| format!("{:.3}", z.value))
                    .unwrap_or_else(|| "-".to_string())
            ),
        }
    }

    fn log_metrics(&self) {
        let fmt_opt = |v: Option<f64>, prec: usize| {
            v.map(|x| format!("{:.*}", prec, x))
                .unwrap_or_else(|| "-".to_string())
        };
        let mut lines = Vec::new();
        for (key, state) in &self.states {
            let diag = self.diagnostics.get(key).copied().unwrap_or_default();
            lines.push(format!(
                "{} pos={:?} n={} z={} hedge={:.3} hl={} H={} p={}",
                key,
                state.position(),
                state.spread_history().len(),
                fmt_opt(diag.z, 2),
                diag.hedge,
                fmt_opt(diag.half_life, 1),
                fmt_opt(diag.hurst, 2),
                fmt_opt(diag.adf_p, 3)
            ));
        }
        if !lines.is_empty() {
            log::info!("[METRICS] tick={} {}", self.ticks, lines.join(" | "));
        }
    }

    fn persist_states_to_disk(&self) {
        if self.cfg.disable_history_persist {
            return;
        }
        match serde_json::to_string(&self.states) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.history_path, json) {
                    log::debug!("[STATE] persist failed: {:?}", e);
                }
            }
            Err(e) => log::debug!("[STATE] serialize failed: {:?}", e),
        }
    }

    fn load_states_from_disk(&mut self) {
        if self.cfg.disable_history_persist {
            return;
        }
        let Ok(content) = fs::read_to_string(&self.history_path) else {
            return;
        };
        let loaded: BTreeMap<String, PairState> = match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                log::warn!(
                    "[STATE] ignoring unreadable {}: {}",
                    self.history_path.display(),
                    e
                );
                return;
            }
        };
        let mut restored = 0;
        for (key, state) in loaded {
            if !self.states.contains_key(&key) {
                continue;
            }
            if !state.is_consistent() {
                log::warn!("[STATE] {} has both position flags set, dropping", key);
                continue;
            }
            self.states.insert(key, state);
            restored += 1;
        }
        log::info!(
            "[STATE] restored {} pair state(s) from {}",
            restored,
            self.history_path.display()
        );
    }
}

fn held(hedge: f64, lagged_hedge: Option<f64>, reason: SignalError) -> PairEvaluation {
    PairEvaluation {
        hedge,
        lagged_hedge,
        spread: None,
        battery: None,
        z_score: None,
        transition: Transition::Hold,
        signal: Signal {
            z_score: None,
            direction: Transition::Hold.direction(),
        },
        hold_reason: Some(reason),
        intents: Vec::new(),
    }
}

/// Both legs trimmed to their common trailing length.
fn aligned_series<'a>(
    pair: &PairSpec,
    prices: &'a HashMap<String, Vec<f64>>,
) -> SignalResult<(&'a [f64], &'a [f64])> {
    let lookup = |symbol: &str| {
        prices
            .get(symbol)
            .ok_or_else(|| SignalError::InvalidInput(format!("no prices for {}", symbol)))
    };
    let a = lookup(&pair.base)?;
    let b = lookup(&pair.quote)?;
    let n = a.len().min(b.len());
    if n < MIN_PRICE_POINTS {
        return Err(SignalError::InsufficientHistory {
            required: MIN_PRICE_POINTS,
            available: n,
        });
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];
    if a.iter().chain(b.iter()).any(|p| !p.is_finite()) {
        return Err(SignalError::InvalidInput(format!(
            "non-finite price for {}",
            pair.key()
        )));
    }
    Ok((a, b))
}

/// Truncates toward zero onto the step grid, keeping at least one step for a
/// non-zero size.
fn quantize_size_by_step(size: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO || size.is_zero() {
        return size;
    }
    let multiples = (size.abs() / step).trunc().max(Decimal::ONE);
    let quantized = multiples * step;
    if size.is_sign_negative() {
        -quantized
    } else {
        quantized
    }
}
