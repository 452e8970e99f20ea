//! Writes a synthetic replay file: one cointegrated price pair per entry in
//! `GEN_PAIRS`, daily bars ending today.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use pairsignal::ports::replay_host::{write_entries, ReplayEntry};
use pairsignal::synthetic::cointegrated_pair;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::str::FromStr;

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid {}: {}", key, value)),
        _ => Ok(default),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let output: String = env_or("GEN_OUTPUT", "replay.jsonl".to_string())?;
    let pairs: String = env_or("GEN_PAIRS", "KO/PEP".to_string())?;
    let bars: usize = env_or("GEN_BARS", 500)?;
    let seed: u64 = env_or("GEN_SEED", 42)?;
    let hedge: f64 = env_or("GEN_HEDGE", 1.5)?;
    let rho: f64 = env_or("GEN_SPREAD_RHO", 0.7)?;
    if bars == 0 {
        return Err(anyhow!("GEN_BARS must be positive"));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut columns: Vec<(String, Vec<f64>)> = Vec::new();
    for raw in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (base, quote) = raw
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid pair: {}", raw))?;
        let (a, b) = cointegrated_pair(&mut rng, bars, hedge, 10.0, rho);
        columns.push((base.trim().to_string(), a));
        columns.push((quote.trim().to_string(), b));
    }

    let start = Utc::now().date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
    let start = start - Duration::days(bars as i64);
    let entries: Vec<ReplayEntry> = (0..bars)
        .map(|i| ReplayEntry {
            timestamp: (start + Duration::days(i as i64)).and_utc().timestamp_millis(),
            prices: columns
                .iter()
                .map(|(symbol, series)| (symbol.clone(), series[i]))
                .collect::<HashMap<_, _>>(),
        })
        .collect();

    let file = File::create(&output).with_context(|| format!("failed to create {}", output))?;
    let mut writer = BufWriter::new(file);
    write_entries(&mut writer, &entries).with_context(|| format!("failed to write {}", output))?;
    writer.flush()?;
    log::info!(
        "[REPLAY] wrote {} bars for {} symbols (seed={} hedge={} rho={}) to {}",
        bars,
        columns.len(),
        seed,
        hedge,
        rho,
        output
    );
    Ok(())
}
