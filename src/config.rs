use anyhow::{anyhow, Context, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::fs::File;
use std::path::Path;

use crate::sizing::SizingPolicy;
use crate::stationarity::{HalfLifeParams, HurstParams, UnitRootParams};

const DEFAULT_PRICE_HISTORY_LENGTH: usize = 60;
const DEFAULT_FREQUENCY: &str = "1d";
const DEFAULT_HEDGE_LAG: usize = 1;
const DEFAULT_Z_SCORE_LOOKBACK: usize = 20;
const DEFAULT_ENTRY_THRESHOLD: f64 = 0.5;
const DEFAULT_EXIT_THRESHOLD: f64 = 0.0;
const DEFAULT_UNITS_PER_LEG: f64 = 1.0;

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum StringOrVec {
    String(String),
    Vec(Vec<String>),
}

impl StringOrVec {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrVec::String(value) => value
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
            StringOrVec::Vec(values) => values
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct SignalYaml {
    pairs: Option<StringOrVec>,
    price_history_length: Option<usize>,
    frequency: Option<String>,
    hedge_lag: Option<usize>,
    z_score_lookback: Option<usize>,
    entry_threshold: Option<f64>,
    exit_threshold: Option<f64>,
    unit_root: Option<UnitRootParams>,
    half_life: Option<HalfLifeParams>,
    hurst: Option<HurstParams>,
    sizing: Option<SizingPolicy>,
    order_mode: Option<OrderMode>,
    units_per_leg: Option<f64>,
    quantity_step: Option<f64>,
    replay_file: Option<String>,
    history_file: Option<String>,
    disable_history_persist: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    Percent,
    Quantity,
}

impl std::str::FromStr for OrderMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percent" => Ok(OrderMode::Percent),
            "quantity" => Ok(OrderMode::Quantity),
            other => Err(format!("unknown order mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairSpec {
    pub base: String,
    pub quote: String,
}

impl PairSpec {
    pub fn key(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub pairs: Vec<PairSpec>,
    pub price_history_length: usize,
    pub frequency: String,
    pub hedge_lag: usize,
    pub z_score_lookback: usize,
    pub entry_threshold: f64,
    pub exit_threshold: f64,
    pub unit_root: UnitRootParams,
    pub half_life: HalfLifeParams,
    pub hurst: HurstParams,
    pub sizing: SizingPolicy,
    pub order_mode: OrderMode,
    // Quantity mode only
    pub units_per_leg: f64,
    pub quantity_step: Decimal,
    pub replay_file: Option<String>,
    pub history_file: String,
    pub disable_history_persist: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        let pairs = vec![PairSpec {
            base: "KO".to_string(),
            quote: "PEP".to_string(),
        }];
        let history_file = default_history_file(&pairs);
        SignalConfig {
            pairs,
            price_history_length: DEFAULT_PRICE_HISTORY_LENGTH,
            frequency: DEFAULT_FREQUENCY.to_string(),
            hedge_lag: DEFAULT_HEDGE_LAG,
            z_score_lookback: DEFAULT_Z_SCORE_LOOKBACK,
            entry_threshold: DEFAULT_ENTRY_THRESHOLD,
            exit_threshold: DEFAULT_EXIT_THRESHOLD,
            unit_root: UnitRootParams::default(),
            half_life: HalfLifeParams::default(),
            hurst: HurstParams::default(),
            sizing: SizingPolicy::Softmax,
            order_mode: OrderMode::Percent,
            units_per_leg: DEFAULT_UNITS_PER_LEG,
            quantity_step: Decimal::new(1, 4),
            replay_file: None,
            history_file,
            disable_history_persist: false,
        }
    }
}

impl SignalConfig {
    pub fn from_env_or_yaml() -> Result<Self> {
        let config_path = env::var("PAIRSIGNAL_CONFIG")
            .ok()
            .filter(|value| !value.trim().is_empty());
        if let Some(path) = config_path {
            return Self::from_yaml_path(path);
        }
        Self::from_env()
    }

    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .with_context(|| format!("failed to open config {}", path_ref.display()))?;
        let yaml: SignalYaml = serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse config {}", path_ref.display()))?;
        let mut cfg = Self::from_yaml(yaml)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::from_yaml(SignalYaml::default())?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses YAML text without consulting the environment.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let yaml: SignalYaml = serde_yaml::from_str(raw).context("failed to parse config")?;
        let cfg = Self::from_yaml(yaml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_yaml(yaml: SignalYaml) -> Result<Self> {
        let mut cfg = SignalConfig::default();
        if let Some(pairs) = yaml.pairs {
            cfg.pairs = parse_pairs_vec(&pairs.into_vec())?;
        }
        cfg.history_file = yaml
            .history_file
            .unwrap_or_else(|| default_history_file(&cfg.pairs));
        if let Some(value) = yaml.price_history_length {
            cfg.price_history_length = value;
        }
        if let Some(value) = yaml.frequency {
            cfg.frequency = value;
        }
        if let Some(value) = yaml.hedge_lag {
            cfg.hedge_lag = value;
        }
        if let Some(value) = yaml.z_score_lookback {
            cfg.z_score_lookback = value;
        }
        if let Some(value) = yaml.entry_threshold {
            cfg.entry_threshold = value;
        }
        if let Some(value) = yaml.exit_threshold {
            cfg.exit_threshold = value;
        }
        if let Some(value) = yaml.unit_root {
            cfg.unit_root = value;
        }
        if let Some(value) = yaml.half_life {
            cfg.half_life = value;
        }
        if let Some(value) = yaml.hurst {
            cfg.hurst = value;
        }
        if let Some(value) = yaml.sizing {
            cfg.sizing = value;
        }
        if let Some(value) = yaml.order_mode {
            cfg.order_mode = value;
        }
        if let Some(value) = yaml.units_per_leg {
            cfg.units_per_leg = value;
        }
        if let Some(step) = yaml.quantity_step {
            cfg.quantity_step =
                Decimal::from_f64(step).ok_or_else(|| anyhow!("invalid quantity_step {}", step))?;
        }
        cfg.replay_file = yaml.replay_file;
        if let Some(value) = yaml.disable_history_persist {
            cfg.disable_history_persist = value;
        }
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup("PAIRS") {
            let derived_history = self.history_file == default_history_file(&self.pairs);
            self.pairs = parse_pairs_list(&value)?;
            if derived_history {
                self.history_file = default_history_file(&self.pairs);
            }
        }
        if let Some(value) = lookup("PRICE_HISTORY_LENGTH") {
            self.price_history_length = value
                .trim()
                .parse()
                .with_context(|| format!("invalid PRICE_HISTORY_LENGTH {}", value))?;
        }
        if let Some(value) = lookup("FREQUENCY") {
            self.frequency = value.trim().to_string();
        }
        if let Some(value) = lookup("HEDGE_LAG") {
            self.hedge_lag = value
                .trim()
                .parse()
                .with_context(|| format!("invalid HEDGE_LAG {}", value))?;
        }
        if let Some(value) = lookup("Z_SCORE_LOOKBACK") {
            self.z_score_lookback = value
                .trim()
                .parse()
                .with_context(|| format!("invalid Z_SCORE_LOOKBACK {}", value))?;
        }
        if let Some(value) = lookup("ENTRY_THRESHOLD") {
            self.entry_threshold = value
                .trim()
                .parse()
                .with_context(|| format!("invalid ENTRY_THRESHOLD {}", value))?;
        }
        if let Some(value) = lookup("EXIT_THRESHOLD") {
            self.exit_threshold = value
                .trim()
                .parse()
                .with_context(|| format!("invalid EXIT_THRESHOLD {}", value))?;
        }
        if let Some(value) = lookup("SIZING_POLICY") {
            self.sizing = value.parse().map_err(|e: String| anyhow!(e))?;
        }
        if let Some(value) = lookup("ORDER_MODE") {
            self.order_mode = value.parse().map_err(|e: String| anyhow!(e))?;
        }
        if let Some(value) = lookup("REPLAY_FILE") {
            self.replay_file = Some(value);
        }
        if let Some(value) = lookup("HISTORY_FILE") {
            self.history_file = value;
        }
        if let Some(value) = lookup("DISABLE_HISTORY_PERSIST") {
            self.disable_history_persist = value.trim().to_lowercase() == "true";
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            return Err(anyhow!("no pairs configured"));
        }
        for pair in &self.pairs {
            if pair.base == pair.quote {
                return Err(anyhow!("pair {} uses the same instrument twice", pair.key()));
            }
        }
        if self.price_history_length < 3 {
            return Err(anyhow!(
                "price_history_length must be at least 3 (got {})",
                self.price_history_length
            ));
        }
        if self.hedge_lag < 1 {
            return Err(anyhow!("hedge_lag must be >= 1"));
        }
        if self.z_score_lookback < 2 {
            return Err(anyhow!("z_score_lookback must be >= 2"));
        }
        if !(self.entry_threshold > 0.0) {
            return Err(anyhow!("entry_threshold must be positive"));
        }
        if !(self.exit_threshold >= 0.0 && self.exit_threshold < self.entry_threshold) {
            return Err(anyhow!(
                "exit_threshold must lie in [0, entry_threshold) (got {})",
                self.exit_threshold
            ));
        }
        if !(self.unit_root.p_min < self.unit_root.p_max) {
            return Err(anyhow!("unit_root.p_min must be below unit_root.p_max"));
        }
        if self.unit_root.look_back < self.unit_root.lags * 2 + 5 {
            return Err(anyhow!(
                "unit_root.look_back {} too short for {} lags",
                self.unit_root.look_back,
                self.unit_root.lags
            ));
        }
        if !(self.half_life.min < self.half_life.max) || self.half_life.look_back < 3 {
            return Err(anyhow!("half_life band or look_back is invalid"));
        }
        if !(self.hurst.min < self.hurst.max)
            || self.hurst.max_lag < 4
            || self.hurst.look_back <= self.hurst.max_lag
        {
            return Err(anyhow!(
                "hurst requires min < max and look_back > max_lag >= 4"
            ));
        }
        if self.order_mode == OrderMode::Quantity
            && (!(self.units_per_leg > 0.0) || self.quantity_step <= Decimal::ZERO)
        {
            return Err(anyhow!(
                "quantity mode requires positive units_per_leg and quantity_step"
            ));
        }
        Ok(())
    }

    /// Spread observations the stationarity battery needs before it runs.
    pub fn battery_look_back(&self) -> usize {
        self.unit_root
            .look_back
            .max(self.half_life.look_back)
            .max(self.hurst.look_back)
    }

    /// Union of all instruments across the configured pairs, sorted.
    pub fn instruments(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .pairs
            .iter()
            .flat_map(|p| [p.base.clone(), p.quote.clone()])
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        symbols.sort();
        symbols
    }
}

fn parse_pairs_vec(pairs: &[String]) -> Result<Vec<PairSpec>> {
    let joined = pairs.join(",");
    parse_pairs_list(&joined)
}

fn parse_pairs_list(raw: &str) -> Result<Vec<PairSpec>> {
    let mut pairs = Vec::new();
    for part in raw.split(',') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut split = trimmed.split('/');
        let base = split
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("invalid pair: {}", trimmed))?;
        let quote = split
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("invalid pair: {}", trimmed))?;
        if split.next().is_some() {
            return Err(anyhow!("invalid pair: {}", trimmed));
        }
        pairs.push(PairSpec {
            base: base.to_string(),
            quote: quote.to_string(),
        });
    }
    if pairs.is_empty() {
        return Err(anyhow!("PAIRS produced no valid pairs"));
    }
    Ok(pairs)
}

fn default_history_file(pairs: &[PairSpec]) -> String {
    let mut symbols: Vec<String> = pairs
        .iter()
        .flat_map(|p| [p.base.clone(), p.quote.clone()])
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    symbols.sort();
    let parts: Vec<String> = symbols
        .into_iter()
        .map(|sym| sanitize_symbol_for_filename(&sym))
        .filter(|sym| !sym.is_empty())
        .collect();
    if parts.is_empty() {
        return "pairsignal_state.json".to_string();
    }
    format!("pairsignal_state_{}.json", parts.join("_"))
}

fn sanitize_symbol_for_filename(symbol: &str) -> String {
    symbol
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stationarity::CriticalLevel;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = SignalConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.pairs.len(), 1);
        assert_eq!(cfg.pairs[0].key(), "KO/PEP");
        assert_eq!(cfg.hedge_lag, 1);
        assert_eq!(cfg.entry_threshold, 0.5);
        assert_eq!(cfg.battery_look_back(), 126);
        assert_eq!(cfg.history_file, "pairsignal_state_KO_PEP.json");
    }

    #[test]
    fn yaml_overrides_nested_test_params() {
        let cfg = SignalConfig::from_yaml_str(
            r#"
pairs: ["AAA/BBB", "CCC/DDD"]
hedge_lag: 2
z_score_lookback: 30
entry_threshold: 1.0
exit_threshold: 0.25
unit_root:
  look_back: 80
  critical_level: "10%"
  use_p_value: false
half_life:
  max: 30.0
hurst:
  look_back: 90
  max_lag: 40
sizing: dollar_neutral
order_mode: quantity
quantity_step: 0.01
"#,
        )
        .unwrap();
        assert_eq!(cfg.pairs.len(), 2);
        assert_eq!(cfg.pairs[1].key(), "CCC/DDD");
        assert_eq!(cfg.hedge_lag, 2);
        assert_eq!(cfg.unit_root.look_back, 80);
        assert_eq!(cfg.unit_root.critical_level, CriticalLevel::TenPercent);
        assert!(!cfg.unit_root.use_p_value);
        assert!(cfg.unit_root.use_critical_value);
        assert_eq!(cfg.unit_root.p_max, 0.05);
        assert_eq!(cfg.half_life.max, 30.0);
        assert_eq!(cfg.half_life.min, 1.0);
        assert_eq!(cfg.battery_look_back(), 90);
        assert_eq!(cfg.sizing, SizingPolicy::DollarNeutral);
        assert_eq!(cfg.order_mode, OrderMode::Quantity);
        assert_eq!(cfg.quantity_step, Decimal::new(1, 2));
        assert_eq!(cfg.instruments(), vec!["AAA", "BBB", "CCC", "DDD"]);
    }

    #[test]
    fn comma_separated_pairs_are_accepted() {
        let cfg = SignalConfig::from_yaml_str("pairs: \"XOM/CVX, GLD/GDX\"").unwrap();
        assert_eq!(cfg.pairs[0].key(), "XOM/CVX");
        assert_eq!(cfg.pairs[1].key(), "GLD/GDX");
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(SignalConfig::from_yaml_str("hedge_lag: 0").is_err());
        assert!(SignalConfig::from_yaml_str("entry_threshold: 0.0").is_err());
        assert!(SignalConfig::from_yaml_str("exit_threshold: 0.6").is_err());
        assert!(SignalConfig::from_yaml_str("pairs: \"AAA/AAA\"").is_err());
        assert!(SignalConfig::from_yaml_str("pairs: \"AAA\"").is_err());
        assert!(SignalConfig::from_yaml_str("hurst:\n  look_back: 20\n  max_lag: 20").is_err());
        assert!(SignalConfig::from_yaml_str("unit_root:\n  p_min: 0.1\n  p_max: 0.05").is_err());
    }

    #[test]
    fn overrides_take_precedence() {
        let mut cfg = SignalConfig::default();
        let vars = HashMap::from([
            ("PAIRS", "GLD/GDX"),
            ("HEDGE_LAG", "3"),
            ("ENTRY_THRESHOLD", "1.5"),
            ("SIZING_POLICY", "dollar_neutral"),
            ("DISABLE_HISTORY_PERSIST", "true"),
            ("FREQUENCY", "  "),
        ]);
        cfg.apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.pairs[0].key(), "GLD/GDX");
        assert_eq!(cfg.hedge_lag, 3);
        assert_eq!(cfg.entry_threshold, 1.5);
        assert_eq!(cfg.sizing, SizingPolicy::DollarNeutral);
        assert!(cfg.disable_history_persist);
        assert_eq!(cfg.frequency, "1d");
        assert_eq!(cfg.history_file, "pairsignal_state_GDX_GLD.json");
    }

    #[test]
    fn malformed_override_is_an_error() {
        let mut cfg = SignalConfig::default();
        let err = cfg
            .apply_overrides(|key| (key == "HEDGE_LAG").then(|| "two".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("HEDGE_LAG"));
    }

    #[test]
    fn reads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pairs: [\"EWA/EWC\"]\nz_score_lookback: 25").unwrap();
        let cfg = SignalConfig::from_yaml_path(file.path()).unwrap();
        assert_eq!(cfg.z_score_lookback, 25);
    }
}
