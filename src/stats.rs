use crate::error::{SignalError, SignalResult};

// Relative tolerance on the centred sum of squares of the regressor.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Ordinary least squares fit `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

/// Population mean and standard deviation.
pub fn mean_std(window: &[f64]) -> Option<(f64, f64)> {
    if window.is_empty() {
        return None;
    }
    let mean = window.iter().copied().sum::<f64>() / window.len() as f64;
    let var = window
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / window.len() as f64;
    Some((mean, var.sqrt()))
}

/// OLS of `y` on `x` with an intercept. Fails when the design matrix `[1, x]`
/// is singular or nearly so (constant `x`), or the inputs are unusable.
pub fn ols_fit(y: &[f64], x: &[f64]) -> SignalResult<LinearFit> {
    if x.len() != y.len() {
        return Err(SignalError::InvalidInput(format!(
            "series length mismatch ({} vs {})",
            y.len(),
            x.len()
        )));
    }
    let n = x.len();
    if n < 2 {
        return Err(SignalError::InsufficientHistory {
            required: 2,
            available: n,
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(SignalError::InvalidInput("non-finite value".to_string()));
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut raw_xx = 0.0;
    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        sxx += dx * dx;
        sxy += dx * (yi - mean_y);
        raw_xx += xi * xi;
    }
    if sxx <= SINGULAR_TOLERANCE * raw_xx.max(f64::MIN_POSITIVE) {
        return Err(SignalError::regression(format!(
            "singular design matrix (centred ssq {:.3e}, raw ssq {:.3e})",
            sxx, raw_xx
        )));
    }
    let slope = sxy / sxx;
    Ok(LinearFit {
        intercept: mean_y - slope * mean_x,
        slope,
    })
}

/// Hedge ratio: slope of A's prices regressed on B's prices (with intercept).
#[derive(Debug, Default, Clone, Copy)]
pub struct HedgeRatioEstimator;

impl HedgeRatioEstimator {
    pub fn estimate(&self, series_a: &[f64], series_b: &[f64]) -> SignalResult<f64> {
        if series_a.is_empty() {
            return Err(SignalError::InsufficientHistory {
                required: 2,
                available: 0,
            });
        }
        ols_fit(series_a, series_b).map(|fit| fit.slope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_std_uses_population_variance() {
        let (mean, std) = mean_std(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(mean, 3.0);
        assert!((std - 2f64.sqrt()).abs() < 1e-12);
        assert!(mean_std(&[]).is_none());
    }

    #[test]
    fn ols_recovers_exact_line() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 + 1.5 * v).collect();
        let fit = ols_fit(&y, &x).unwrap();
        assert!((fit.slope - 1.5).abs() < 1e-12);
        assert!((fit.intercept - 3.0).abs() < 1e-10);
    }

    #[test]
    fn hedge_ratio_of_scaled_series() {
        let b: Vec<f64> = (0..50).map(|i| 40.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let a: Vec<f64> = b.iter().map(|p| 10.0 + 2.0 * p).collect();
        let hedge = HedgeRatioEstimator.estimate(&a, &b).unwrap();
        assert!((hedge - 2.0).abs() < 1e-9);
    }

    #[test]
    fn constant_regressor_is_a_regression_error() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![50.0; 4];
        let err = HedgeRatioEstimator.estimate(&a, &b).unwrap_err();
        assert!(matches!(err, SignalError::Regression(_)));
    }

    #[test]
    fn near_constant_large_level_is_singular() {
        let b = vec![1e6, 1e6 + 1e-7, 1e6, 1e6 + 1e-7];
        let a = vec![1.0, 2.0, 3.0, 4.0];
        assert!(matches!(
            ols_fit(&a, &b),
            Err(SignalError::Regression(_))
        ));
    }

    #[test]
    fn rejects_mismatched_and_non_finite_inputs() {
        assert!(matches!(
            ols_fit(&[1.0, 2.0], &[1.0]),
            Err(SignalError::InvalidInput(_))
        ));
        assert!(matches!(
            ols_fit(&[1.0, f64::NAN, 3.0], &[1.0, 2.0, 3.0]),
            Err(SignalError::InvalidInput(_))
        ));
        assert!(matches!(
            HedgeRatioEstimator.estimate(&[], &[]),
            Err(SignalError::InsufficientHistory { .. })
        ));
    }
}
