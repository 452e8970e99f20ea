use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingPolicy {
    /// `exp(cost_i) / sum(exp(cost_j))`, computed with max subtraction.
    Softmax,
    /// `cost_i / sum(|cost_j|)`: signed, gross exposure normalised to 1.
    DollarNeutral,
}

impl std::str::FromStr for SizingPolicy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "softmax" => Ok(SizingPolicy::Softmax),
            "dollar_neutral" | "dollar-neutral" | "linear" => Ok(SizingPolicy::DollarNeutral),
            other => Err(format!("unknown sizing policy: {}", other)),
        }
    }
}

/// Converts a pair's share counts into target portfolio percentages.
#[derive(Debug, Clone, Copy)]
pub struct PositionSizer {
    policy: SizingPolicy,
}

impl PositionSizer {
    pub fn new(policy: SizingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SizingPolicy {
        self.policy
    }

    pub fn weights(
        &self,
        shares_a: f64,
        shares_b: f64,
        price_a: f64,
        price_b: f64,
    ) -> (f64, f64) {
        let cost_a = shares_a * price_a;
        let cost_b = shares_b * price_b;
        match self.policy {
            SizingPolicy::Softmax => softmax_pair(cost_a, cost_b),
            SizingPolicy::DollarNeutral => {
                let gross = cost_a.abs() + cost_b.abs();
                if gross > 0.0 && gross.is_finite() {
                    (cost_a / gross, cost_b / gross)
                } else {
                    (0.0, 0.0)
                }
            }
        }
    }
}

fn softmax_pair(a: f64, b: f64) -> (f64, f64) {
    let max = a.max(b);
    let ea = (a - max).exp();
    let eb = (b - max).exp();
    let sum = ea + eb;
    (ea / sum, eb / sum)
}
