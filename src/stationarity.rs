use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{SignalError, SignalResult};
use crate::stats::{mean_std, ols_fit};

const DEFAULT_UNIT_ROOT_LOOK_BACK: usize = 60;
const DEFAULT_UNIT_ROOT_LAGS: usize = 1;
const DEFAULT_P_MIN: f64 = 0.0;
const DEFAULT_P_MAX: f64 = 0.05;
const DEFAULT_HALF_LIFE_LOOK_BACK: usize = 43;
const DEFAULT_HALF_LIFE_MIN: f64 = 1.0;
const DEFAULT_HALF_LIFE_MAX: f64 = 42.0;
const DEFAULT_HURST_LOOK_BACK: usize = 126;
const DEFAULT_HURST_MAX_LAG: usize = 20;
const DEFAULT_HURST_MIN: f64 = 0.0;
const DEFAULT_HURST_MAX: f64 = 0.4;

// MacKinnon (1994) response-surface bounds and coefficients for the
// constant-only Dickey-Fuller statistic with a single series.
const TAU_MAX_C: f64 = 2.74;
const TAU_MIN_C: f64 = -18.83;
const TAU_STAR_C: f64 = -1.61;
const TAU_SMALL_P_C: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P_C: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010) finite-sample critical values, constant-only case:
// crit = b0 + b1/T + b2/T^2 + b3/T^3.
const CRIT_1PCT_C: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5PCT_C: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.04];
const CRIT_10PCT_C: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

/// Outcome of one stationarity test over one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
    pub statistic: f64,
    pub reference_statistic: f64,
    pub p_value: Option<f64>,
    pub verdict: bool,
}

pub trait StationarityTest {
    fn name(&self) -> &'static str;

    /// Trailing observations the test consumes.
    fn look_back(&self) -> usize;

    /// Evaluates the test over the trailing `look_back()` values of `series`.
    fn evaluate(&self, series: &[f64]) -> SignalResult<TestResult>;
}

fn trailing(series: &[f64], len: usize) -> SignalResult<&[f64]> {
    if series.len() < len {
        return Err(SignalError::InsufficientHistory {
            required: len,
            available: series.len(),
        });
    }
    Ok(&series[series.len() - len..])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriticalLevel {
    #[serde(rename = "1%")]
    OnePercent,
    #[serde(rename = "5%")]
    FivePercent,
    #[serde(rename = "10%")]
    TenPercent,
}

impl CriticalLevel {
    fn coefficients(self) -> [f64; 4] {
        match self {
            CriticalLevel::OnePercent => CRIT_1PCT_C,
            CriticalLevel::FivePercent => CRIT_5PCT_C,
            CriticalLevel::TenPercent => CRIT_10PCT_C,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitRootParams {
    pub look_back: usize,
    /// Lagged difference terms in the augmented regression.
    pub lags: usize,
    pub p_min: f64,
    pub p_max: f64,
    pub critical_level: CriticalLevel,
    pub use_p_value: bool,
    pub use_critical_value: bool,
}

impl Default for UnitRootParams {
    fn default() -> Self {
        Self {
            look_back: DEFAULT_UNIT_ROOT_LOOK_BACK,
            lags: DEFAULT_UNIT_ROOT_LAGS,
            p_min: DEFAULT_P_MIN,
            p_max: DEFAULT_P_MAX,
            critical_level: CriticalLevel::FivePercent,
            use_p_value: true,
            use_critical_value: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HalfLifeParams {
    pub look_back: usize,
    pub min: f64,
    pub max: f64,
}

impl Default for HalfLifeParams {
    fn default() -> Self {
        Self {
            look_back: DEFAULT_HALF_LIFE_LOOK_BACK,
            min: DEFAULT_HALF_LIFE_MIN,
            max: DEFAULT_HALF_LIFE_MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HurstParams {
    pub look_back: usize,
    /// Lags run over `2..max_lag`.
    pub max_lag: usize,
    pub min: f64,
    pub max: f64,
}

impl Default for HurstParams {
    fn default() -> Self {
        Self {
            look_back: DEFAULT_HURST_LOOK_BACK,
            max_lag: DEFAULT_HURST_MAX_LAG,
            min: DEFAULT_HURST_MIN,
            max: DEFAULT_HURST_MAX,
        }
    }
}

/// Augmented Dickey-Fuller statistic and the number of regression rows used.
#[derive(Debug, Clone, Copy)]
pub struct AdfStatistic {
    pub t_stat: f64,
    pub nobs: usize,
}

/// Regresses `dy_t` on `[1, y_{t-1}, dy_{t-1}, .., dy_{t-lags}]` and returns
/// the t-statistic of the level coefficient.
pub fn adf_statistic(window: &[f64], lags: usize) -> SignalResult<AdfStatistic> {
    let diff: Vec<f64> = window.windows(2).map(|w| w[1] - w[0]).collect();
    let k = 2 + lags;
    let nobs = diff.len().saturating_sub(lags);
    if nobs <= k + 1 {
        return Err(SignalError::InsufficientHistory {
            required: 2 * lags + 5,
            available: window.len(),
        });
    }
    if let Some((_, std)) = mean_std(window) {
        let scale = window.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if std <= 1e-12 * scale.max(1.0) {
            return Err(SignalError::regression("unit-root window is constant"));
        }
    }

    let mut x_data = Vec::with_capacity(nobs * k);
    let mut y_data = Vec::with_capacity(nobs);
    for t in lags..diff.len() {
        x_data.push(1.0);
        x_data.push(window[t]);
        for i in 1..=lags {
            x_data.push(diff[t - i]);
        }
        y_data.push(diff[t]);
    }
    let x = DMatrix::from_row_slice(nobs, k, &x_data);
    let y = DVector::from_vec(y_data);

    let xtx = x.transpose() * &x;
    let xtx_inv = xtx
        .try_inverse()
        .ok_or_else(|| SignalError::regression("unit-root design matrix is singular"))?;
    let beta = &xtx_inv * (x.transpose() * &y);
    let residuals = &y - &x * &beta;
    let sse: f64 = residuals.iter().map(|r| r * r).sum();
    let mse = sse / (nobs - k) as f64;
    let se = (mse * xtx_inv[(1, 1)]).sqrt();
    if !se.is_finite() || se <= 0.0 {
        return Err(SignalError::regression(format!(
            "unit-root standard error is degenerate ({})",
            se
        )));
    }
    Ok(AdfStatistic {
        t_stat: beta[1] / se,
        nobs,
    })
}

fn polyval(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Approximate p-value of a constant-only Dickey-Fuller statistic.
pub fn mackinnon_p_value(t_stat: f64) -> f64 {
    if t_stat > TAU_MAX_C {
        return 1.0;
    }
    if t_stat < TAU_MIN_C {
        return 0.0;
    }
    let z = if t_stat <= TAU_STAR_C {
        polyval(&TAU_SMALL_P_C, t_stat)
    } else {
        polyval(&TAU_LARGE_P_C, t_stat)
    };
    Normal::new(0.0, 1.0).map_or(f64::NAN, |normal| normal.cdf(z))
}

/// Finite-sample critical value for `nobs` regression rows.
pub fn mackinnon_critical_value(level: CriticalLevel, nobs: usize) -> f64 {
    let c = level.coefficients();
    let inv = 1.0 / nobs.max(1) as f64;
    c[0] + c[1] * inv + c[2] * inv * inv + c[3] * inv * inv * inv
}

#[derive(Debug, Clone)]
pub struct UnitRootTest {
    params: UnitRootParams,
}

impl UnitRootTest {
    pub fn new(params: UnitRootParams) -> Self {
        Self { params }
    }
}

impl StationarityTest for UnitRootTest {
    fn name(&self) -> &'static str {
        "unit_root"
    }

    fn look_back(&self) -> usize {
        self.params.look_back
    }

    fn evaluate(&self, series: &[f64]) -> SignalResult<TestResult> {
        let window = trailing(series, self.params.look_back)?;
        let adf = adf_statistic(window, self.params.lags)?;
        let p_value = mackinnon_p_value(adf.t_stat);
        let critical = mackinnon_critical_value(self.params.critical_level, adf.nobs);

        // Small samples make the p-value alone an unreliable rejection rule,
        // so either enabled rule is enough.
        let p_ok = self.params.use_p_value
            && p_value > self.params.p_min
            && p_value < self.params.p_max;
        let crit_ok = self.params.use_critical_value && adf.t_stat.abs() > critical.abs();
        Ok(TestResult {
            statistic: adf.t_stat,
            reference_statistic: critical,
            p_value: Some(p_value),
            verdict: p_ok || crit_ok,
        })
    }
}

/// Slope of `dy_t` regressed on `y_{t-1}` (with intercept).
pub fn mean_reversion_slope(window: &[f64]) -> SignalResult<f64> {
    if window.len() < 3 {
        return Err(SignalError::InsufficientHistory {
            required: 3,
            available: window.len(),
        });
    }
    let lagged = &window[..window.len() - 1];
    let delta: Vec<f64> = window.windows(2).map(|w| w[1] - w[0]).collect();
    ols_fit(&delta, lagged).map(|fit| fit.slope)
}

/// Ornstein-Uhlenbeck half-life `-ln(2) / slope`. A non-negative slope means
/// the series is not reverting and is reported as a regression error.
pub fn half_life(window: &[f64]) -> SignalResult<f64> {
    let slope = mean_reversion_slope(window)?;
    if slope >= 0.0 {
        return Err(SignalError::regression(format!(
            "non-negative reversion slope {:.6}",
            slope
        )));
    }
    Ok(-(2.0_f64).ln() / slope)
}

#[derive(Debug, Clone)]
pub struct HalfLifeTest {
    params: HalfLifeParams,
}

impl HalfLifeTest {
    pub fn new(params: HalfLifeParams) -> Self {
        Self { params }
    }
}

impl StationarityTest for HalfLifeTest {
    fn name(&self) -> &'static str {
        "half_life"
    }

    fn look_back(&self) -> usize {
        self.params.look_back
    }

    fn evaluate(&self, series: &[f64]) -> SignalResult<TestResult> {
        let window = trailing(series, self.params.look_back)?;
        let slope = mean_reversion_slope(window)?;
        if slope >= 0.0 {
            return Ok(TestResult {
                statistic: f64::INFINITY,
                reference_statistic: self.params.max,
                p_value: None,
                verdict: false,
            });
        }
        let hl = -(2.0_f64).ln() / slope;
        Ok(TestResult {
            statistic: hl,
            reference_statistic: self.params.max,
            p_value: None,
            verdict: hl > self.params.min && hl < self.params.max,
        })
    }
}

/// Twice the log-log slope of `sqrt(std(x[t+lag] - x[t]))` against lag,
/// for lags `2..max_lag`.
pub fn hurst_exponent(window: &[f64], max_lag: usize) -> SignalResult<f64> {
    if max_lag < 4 {
        return Err(SignalError::InvalidInput(format!(
            "hurst max_lag {} leaves fewer than two lags",
            max_lag
        )));
    }
    if window.len() <= max_lag {
        return Err(SignalError::InsufficientHistory {
            required: max_lag + 1,
            available: window.len(),
        });
    }
    let mut log_lags = Vec::with_capacity(max_lag - 2);
    let mut log_tau = Vec::with_capacity(max_lag - 2);
    for lag in 2..max_lag {
        let diffs: Vec<f64> = window[lag..]
            .iter()
            .zip(window.iter())
            .map(|(later, earlier)| later - earlier)
            .collect();
        let (_, std) =
            mean_std(&diffs).ok_or_else(|| SignalError::regression("empty lag difference"))?;
        if std <= 0.0 {
            return Err(SignalError::regression(format!(
                "zero dispersion at lag {}",
                lag
            )));
        }
        log_lags.push((lag as f64).ln());
        log_tau.push(std.sqrt().ln());
    }
    ols_fit(&log_tau, &log_lags).map(|fit| fit.slope * 2.0)
}

#[derive(Debug, Clone)]
pub struct HurstTest {
    params: HurstParams,
}

impl HurstTest {
    pub fn new(params: HurstParams) -> Self {
        Self { params }
    }
}

impl StationarityTest for HurstTest {
    fn name(&self) -> &'static str {
        "hurst"
    }

    fn look_back(&self) -> usize {
        self.params.look_back
    }

    fn evaluate(&self, series: &[f64]) -> SignalResult<TestResult> {
        let window = trailing(series, self.params.look_back)?;
        let h = hurst_exponent(window, self.params.max_lag)?;
        Ok(TestResult {
            statistic: h,
            reference_statistic: 0.5,
            p_value: None,
            verdict: h > self.params.min && h < self.params.max,
        })
    }
}

/// Verdicts of all three tests for one tick.
#[derive(Debug, Clone, Copy)]
pub struct BatteryReport {
    pub unit_root: TestResult,
    pub half_life: TestResult,
    pub hurst: TestResult,
}

impl BatteryReport {
    /// Any single passing test keeps the pair tradeable.
    pub fn is_tradeable(&self) -> bool {
        !self.unanimous_fail()
    }

    pub fn unanimous_fail(&self) -> bool {
        !self.unit_root.verdict && !self.half_life.verdict && !self.hurst.verdict
    }

    /// Results in the same order as `StationarityBattery::tests`.
    pub fn results(&self) -> [TestResult; 3] {
        [self.unit_root, self.half_life, self.hurst]
    }
}

#[derive(Debug, Clone)]
pub struct StationarityBattery {
    unit_root: UnitRootTest,
    half_life: HalfLifeTest,
    hurst: HurstTest,
    look_back: usize,
}

impl StationarityBattery {
    pub fn new(unit_root: UnitRootParams, half_life: HalfLifeParams, hurst: HurstParams) -> Self {
        let unit_root = UnitRootTest::new(unit_root);
        let half_life = HalfLifeTest::new(half_life);
        let hurst = HurstTest::new(hurst);
        let look_back = unit_root
            .look_back()
            .max(half_life.look_back())
            .max(hurst.look_back());
        Self {
            unit_root,
            half_life,
            hurst,
            look_back,
        }
    }

    /// Spread observations required before the battery runs at all.
    pub fn look_back(&self) -> usize {
        self.look_back
    }

    pub fn tests(&self) -> [&dyn StationarityTest; 3] {
        [&self.unit_root, &self.half_life, &self.hurst]
    }

    pub fn evaluate(&self, spread_history: &[f64]) -> SignalResult<BatteryReport> {
        if spread_history.len() < self.look_back {
            return Err(SignalError::InsufficientHistory {
                required: self.look_back,
                available: spread_history.len(),
            });
        }
        Ok(BatteryReport {
            unit_root: self.unit_root.evaluate(spread_history)?,
            half_life: self.half_life.evaluate(spread_history)?,
            hurst: self.hurst.evaluate(spread_history)?,
        })
    }
}

impl Default for StationarityBattery {
    fn default() -> Self {
        Self::new(
            UnitRootParams::default(),
            HalfLifeParams::default(),
            HurstParams::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{ar1, ornstein_uhlenbeck, random_walk};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn unit_root_rejects_stationary_ar1() {
        let test = UnitRootTest::new(UnitRootParams {
            look_back: 120,
            ..UnitRootParams::default()
        });
        let mut passes = 0;
        for seed in 0..50 {
            let series = ar1(&mut StdRng::seed_from_u64(seed), 120, 0.5, 1.0);
            if test.evaluate(&series).unwrap().verdict {
                passes += 1;
            }
        }
        assert!(passes >= 45, "only {} of 50 AR(1) draws passed", passes);
    }

    #[test]
    fn unit_root_keeps_random_walk() {
        let test = UnitRootTest::new(UnitRootParams::default());
        let mut fails = 0;
        for seed in 100..150 {
            let series = random_walk(&mut StdRng::seed_from_u64(seed), 60, 100.0, 1.0);
            if !test.evaluate(&series).unwrap().verdict {
                fails += 1;
            }
        }
        assert!(fails >= 40, "only {} of 50 random walks failed", fails);
    }

    #[test]
    fn unit_root_reports_diagnostics() {
        let series = ar1(&mut StdRng::seed_from_u64(3), 80, 0.5, 1.0);
        let result = UnitRootTest::new(UnitRootParams::default())
            .evaluate(&series)
            .unwrap();
        let p = result.p_value.unwrap();
        assert!((0.0..=1.0).contains(&p));
        // 60-observation window with one lag leaves 58 regression rows.
        let expected = mackinnon_critical_value(CriticalLevel::FivePercent, 58);
        assert!((result.reference_statistic - expected).abs() < 1e-12);
        assert!(result.statistic < 0.0);
    }

    #[test]
    fn unit_root_rules_are_independent() {
        let series = random_walk(&mut StdRng::seed_from_u64(11), 60, 100.0, 1.0);
        let both_off = UnitRootTest::new(UnitRootParams {
            use_p_value: false,
            use_critical_value: false,
            ..UnitRootParams::default()
        });
        assert!(!both_off.evaluate(&series).unwrap().verdict);

        let wide_p = UnitRootTest::new(UnitRootParams {
            p_min: 0.0,
            p_max: 1.0 + 1e-9,
            use_critical_value: false,
            ..UnitRootParams::default()
        });
        let result = wide_p.evaluate(&series).unwrap();
        assert_eq!(result.verdict, result.p_value.unwrap() > 0.0);
    }

    #[test]
    fn unit_root_constant_window_is_regression_error() {
        let series = vec![5.0; 60];
        let err = UnitRootTest::new(UnitRootParams::default())
            .evaluate(&series)
            .unwrap_err();
        assert!(matches!(err, SignalError::Regression(_)));
    }

    #[test]
    fn mackinnon_p_value_matches_reference_points() {
        assert!((mackinnon_p_value(-2.86) - 0.05).abs() < 0.005);
        assert!(mackinnon_p_value(-4.0) < 0.01);
        assert!(mackinnon_p_value(0.0) > 0.9);
        assert_eq!(mackinnon_p_value(3.0), 1.0);
        assert_eq!(mackinnon_p_value(-20.0), 0.0);
    }

    #[test]
    fn mackinnon_p_value_is_continuous_at_tau_star() {
        let below = mackinnon_p_value(TAU_STAR_C - 1e-9);
        let above = mackinnon_p_value(TAU_STAR_C + 1e-9);
        assert!((below - above).abs() < 0.005, "{} vs {}", below, above);
        assert!((below - 0.478).abs() < 0.01);
    }

    #[test]
    fn mackinnon_p_value_tracks_large_p_branch() {
        assert!((mackinnon_p_value(-1.0) - 0.753).abs() < 0.005);
        assert!(mackinnon_p_value(-1.5) < mackinnon_p_value(-1.0));
        assert!(mackinnon_p_value(-1.0) < mackinnon_p_value(0.0));
        assert!(mackinnon_p_value(2.5) > 0.99);
    }

    #[test]
    fn mackinnon_critical_values_tighten_with_sample_size() {
        let small = mackinnon_critical_value(CriticalLevel::FivePercent, 25);
        let large = mackinnon_critical_value(CriticalLevel::FivePercent, 10_000);
        assert!(small < large);
        assert!((large - (-2.86154)).abs() < 1e-3);
        assert!(
            mackinnon_critical_value(CriticalLevel::OnePercent, 100)
                < mackinnon_critical_value(CriticalLevel::TenPercent, 100)
        );
    }

    #[test]
    fn half_life_recovers_ou_speed() {
        let theta = 0.1;
        let series = ornstein_uhlenbeck(&mut StdRng::seed_from_u64(42), 5000, theta, 0.0, 1.0);
        let hl = half_life(&series).unwrap();
        let expected = (2.0_f64).ln() / theta;
        assert!(
            (hl - expected).abs() / expected < 0.25,
            "half-life {} vs expected {}",
            hl,
            expected
        );
    }

    #[test]
    fn half_life_of_explosive_series_fails_verdict() {
        let series: Vec<f64> = (0..60).map(|t| 100.0 * 1.05_f64.powi(t)).collect();
        assert!(matches!(half_life(&series), Err(SignalError::Regression(_))));
        let result = HalfLifeTest::new(HalfLifeParams::default())
            .evaluate(&series)
            .unwrap();
        assert!(!result.verdict);
        assert!(result.statistic.is_infinite());
    }

    #[test]
    fn half_life_band_is_strict() {
        let test = HalfLifeTest::new(HalfLifeParams {
            look_back: 5000,
            min: 1.0,
            max: 42.0,
        });
        let series = ornstein_uhlenbeck(&mut StdRng::seed_from_u64(9), 5000, 0.2, 10.0, 0.5);
        let result = test.evaluate(&series).unwrap();
        assert!(result.verdict);
        assert!(result.statistic > 1.0 && result.statistic < 42.0);
    }

    #[test]
    fn hurst_of_random_walk_is_near_one_half() {
        // sqrt(std) of lag differences scales as lag^0.25 for a random walk,
        // so this estimator lands near 0.5 rather than 1.0.
        let series = random_walk(&mut StdRng::seed_from_u64(2024), 2000, 0.0, 1.0);
        let h = hurst_exponent(&series, 100).unwrap();
        assert!(h > 0.3 && h < 0.7, "hurst {}", h);
    }

    #[test]
    fn hurst_of_ar1_is_mean_reverting() {
        let series = ar1(&mut StdRng::seed_from_u64(5), 2000, 0.5, 1.0);
        let h = hurst_exponent(&series, 20).unwrap();
        assert!(h < 0.25, "hurst {}", h);
    }

    #[test]
    fn hurst_of_trend_is_persistent() {
        let series: Vec<f64> = (0..200).map(|t| t as f64 * 0.5).collect();
        // Pure linear trend: lag differences are constant, so every lag has
        // zero dispersion.
        assert!(matches!(
            hurst_exponent(&series, 20),
            Err(SignalError::Regression(_))
        ));
        let quadratic: Vec<f64> = (0..200).map(|t| (t as f64).powi(2) * 0.01).collect();
        let h = hurst_exponent(&quadratic, 20).unwrap();
        assert!(h > 0.4, "hurst {}", h);
    }

    #[test]
    fn hurst_requires_window_longer_than_max_lag() {
        assert!(matches!(
            hurst_exponent(&[1.0, 2.0, 3.0], 20),
            Err(SignalError::InsufficientHistory { .. })
        ));
        assert!(matches!(
            hurst_exponent(&[1.0; 50], 3),
            Err(SignalError::InvalidInput(_))
        ));
    }

    #[test]
    fn battery_gates_on_longest_look_back() {
        let battery = StationarityBattery::default();
        assert_eq!(battery.look_back(), 126);
        let series = ar1(&mut StdRng::seed_from_u64(1), 100, 0.5, 1.0);
        assert!(matches!(
            battery.evaluate(&series),
            Err(SignalError::InsufficientHistory {
                required: 126,
                available: 100
            })
        ));
        let names: Vec<&str> = battery.tests().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["unit_root", "half_life", "hurst"]);
    }

    #[test]
    fn report_results_line_up_with_tests() {
        let battery = StationarityBattery::default();
        let series = ar1(&mut StdRng::seed_from_u64(21), 200, 0.5, 1.0);
        let report = battery.evaluate(&series).unwrap();
        let results = report.results();
        for (test, result) in battery.tests().iter().zip(results.iter()) {
            assert_eq!(test.evaluate(&series).unwrap(), *result, "{}", test.name());
        }
        assert!(results[0].p_value.is_some());
        assert!(results[1].p_value.is_none());
    }

    #[test]
    fn battery_accepts_stationary_spread() {
        let battery = StationarityBattery::default();
        let series = ar1(&mut StdRng::seed_from_u64(77), 200, 0.5, 1.0);
        let report = battery.evaluate(&series).unwrap();
        assert!(report.is_tradeable());
        assert!(!report.unanimous_fail());
    }

    #[test]
    fn battery_rejects_explosive_spread_unanimously() {
        let battery = StationarityBattery::new(
            UnitRootParams {
                lags: 0,
                use_critical_value: false,
                ..UnitRootParams::default()
            },
            HalfLifeParams::default(),
            HurstParams::default(),
        );
        let noise = ar1(&mut StdRng::seed_from_u64(8), 200, 0.0, 0.01);
        let series: Vec<f64> = noise
            .iter()
            .enumerate()
            .map(|(t, e)| 100.0 * 1.01_f64.powi(t as i32) + e)
            .collect();
        let report = battery.evaluate(&series).unwrap();
        assert!(!report.unit_root.verdict);
        assert!(!report.half_life.verdict);
        assert!(!report.hurst.verdict);
        assert!(report.unanimous_fail());
    }
}
