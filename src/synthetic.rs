//! Seeded synthetic price and spread generators.

use rand::Rng;
use rand_distr::StandardNormal;

fn shock<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    let e: f64 = rng.sample(StandardNormal);
    e * sigma
}

/// `x_t = rho * x_{t-1} + e_t`, starting at zero.
pub fn ar1<R: Rng + ?Sized>(rng: &mut R, n: usize, rho: f64, sigma: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(n);
    let mut x = 0.0;
    for _ in 0..n {
        x = rho * x + shock(rng, sigma);
        out.push(x);
    }
    out
}

pub fn random_walk<R: Rng + ?Sized>(rng: &mut R, n: usize, start: f64, sigma: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(n);
    let mut x = start;
    for _ in 0..n {
        x += shock(rng, sigma);
        out.push(x);
    }
    out
}

/// Euler-discretised Ornstein-Uhlenbeck process with unit time step:
/// `x_t = x_{t-1} + theta * (mu - x_{t-1}) + e_t`.
pub fn ornstein_uhlenbeck<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    theta: f64,
    mu: f64,
    sigma: f64,
) -> Vec<f64> {
    let mut out = Vec::with_capacity(n);
    let mut x = mu;
    for _ in 0..n {
        x += theta * (mu - x) + shock(rng, sigma);
        out.push(x);
    }
    out
}

/// Price series `(a, b)` where `b` is a random walk and
/// `a = intercept + hedge * b + spread`, the spread being AR(1).
pub fn cointegrated_pair<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    hedge: f64,
    intercept: f64,
    spread_rho: f64,
) -> (Vec<f64>, Vec<f64>) {
    let b = random_walk(rng, n, 50.0, 0.5);
    let spread = ar1(rng, n, spread_rho, 0.4);
    let a = b
        .iter()
        .zip(spread.iter())
        .map(|(pb, s)| intercept + hedge * pb + s)
        .collect();
    (a, b)
}
