use std::cmp::Reverse;

use super::error::{EngineError, Result, require_finite, require_non_negative};
use super::types::{BasketMetrics, FundHolding, RiskBucket, WeightedAsset, WeightedAverage};

pub const FULL_ALLOCATION: u32 = 100;
pub const DEFAULT_BALANCE_EPSILON: f64 = 1e-6;

/// Basket risk-score cut-offs. The defaults are business thresholds, not derived values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub moderate_below: f64,
    pub moderate_high_below: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            moderate_below: 1.5,
            moderate_high_below: 2.5,
        }
    }
}

impl RiskThresholds {
    pub fn classify(&self, score: f64) -> RiskBucket {
        if score < self.moderate_below {
            RiskBucket::Moderate
        } else if score < self.moderate_high_below {
            RiskBucket::ModerateHigh
        } else {
            RiskBucket::High
        }
    }

    fn validate(&self) -> Result<()> {
        require_finite("moderate_below", self.moderate_below)?;
        require_finite("moderate_high_below", self.moderate_high_below)?;
        if self.moderate_high_below < self.moderate_below {
            return Err(EngineError::invalid(
                "moderate_high_below must be >= moderate_below",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorConfig {
    pub balance_epsilon: f64,
    pub risk: RiskThresholds,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            balance_epsilon: DEFAULT_BALANCE_EPSILON,
            risk: RiskThresholds::default(),
        }
    }
}

/// `Σ(value * weight) / 100`, flagged unbalanced unless the weights sum to 100.
///
/// The value is computed for unbalanced sets too so an in-progress edit can be
/// previewed; callers must check `is_balanced` before presenting it as a
/// basket-level figure.
pub fn weighted_average(set: &[WeightedAsset]) -> Result<WeightedAverage> {
    weighted_average_with(set, DEFAULT_BALANCE_EPSILON)
}

pub fn weighted_average_with(set: &[WeightedAsset], epsilon: f64) -> Result<WeightedAverage> {
    require_non_negative("balance_epsilon", epsilon)?;

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for asset in set {
        require_finite("value", asset.value)?;
        require_weight(asset.weight_percent)?;
        weighted_sum += asset.value * asset.weight_percent;
        weight_sum += asset.weight_percent;
    }

    Ok(WeightedAverage {
        value: weighted_sum / FULL_ALLOCATION as f64,
        weight_sum,
        is_balanced: !set.is_empty() && (weight_sum - FULL_ALLOCATION as f64).abs() <= epsilon,
    })
}

/// Splits 100% across `n` positions in whole percents.
///
/// Every position gets `floor(100 / n)`; the leftover percents are handed out
/// one at a time starting from the first position, so `equal_split(3)` is
/// `[34, 33, 33]`. Putting the whole leftover on the first position would
/// leave it more than 1 away from `100 / n` whenever `100 % n >= 2`
/// (`n = 6` would give `[20, 16, 16, 16, 16, 16]`).
pub fn equal_split(n: usize) -> Result<Vec<u32>> {
    if n == 0 {
        return Err(EngineError::invalid("equal_split needs at least one position"));
    }
    Ok(spread_evenly(FULL_ALLOCATION, n))
}

/// Saturates a weight into `[0, 100]`. NaN and infinities are rejected, not clamped.
pub fn clamp(value: f64) -> Result<f64> {
    require_finite("weight", value)?;
    Ok(value.clamp(0.0, FULL_ALLOCATION as f64))
}

/// True when the weights add up to exactly 100 once rounded to whole percents.
pub fn is_valid(set: &[WeightedAsset]) -> bool {
    if set.iter().any(|asset| !asset.weight_percent.is_finite()) {
        return false;
    }
    let total: f64 = set.iter().map(|asset| asset.weight_percent).sum();
    total.round() == FULL_ALLOCATION as f64
}

/// Percent still to allocate; negative when the set is over-allocated.
pub fn remaining_percent(weights: &[f64]) -> f64 {
    FULL_ALLOCATION as f64 - weights.iter().sum::<f64>()
}

/// Sets position `index` to `value` (clamped, rounded) and rebalances the rest.
///
/// The other positions share `100 - edited` in proportion to their current
/// weights; when they are all zero they share it evenly. Whole-percent
/// leftovers go to the largest fractional shares, earliest position first.
pub fn apply_edit(weights: &[u32], index: usize, value: f64) -> Result<Vec<u32>> {
    if index >= weights.len() {
        return Err(EngineError::invalid(format!(
            "edit index {index} out of bounds for {} positions",
            weights.len()
        )));
    }
    let edited = clamp(value)?.round() as u32;
    if weights.len() == 1 {
        return Ok(vec![FULL_ALLOCATION]);
    }

    let remaining = FULL_ALLOCATION - edited;
    let others: Vec<u32> = weights
        .iter()
        .enumerate()
        .filter(|&(position, _)| position != index)
        .map(|(_, &weight)| weight)
        .collect();

    let shares = if others.iter().all(|&weight| weight == 0) {
        spread_evenly(remaining, others.len())
    } else {
        spread_proportionally(remaining, &others)
    };

    let mut out = shares;
    out.insert(index, edited);
    Ok(out)
}

pub fn basket_metrics(
    holdings: &[FundHolding],
    config: &AggregatorConfig,
) -> Result<BasketMetrics> {
    config.risk.validate()?;

    let cagr_set: Vec<WeightedAsset> = holdings
        .iter()
        .map(|h| WeightedAsset::new(h.cagr, h.weight_percent))
        .collect();
    let risk_set: Vec<WeightedAsset> = holdings
        .iter()
        .map(|h| WeightedAsset::new(h.risk_score, h.weight_percent))
        .collect();

    let cagr = weighted_average_with(&cagr_set, config.balance_epsilon)?;
    let risk_score = weighted_average_with(&risk_set, config.balance_epsilon)?;

    Ok(BasketMetrics {
        cagr,
        risk_score,
        risk_bucket: config.risk.classify(risk_score.value),
        allocated_percent: cagr.weight_sum,
        remaining_percent: FULL_ALLOCATION as f64 - cagr.weight_sum,
    })
}

fn require_weight(weight: f64) -> Result<f64> {
    require_non_negative("weight_percent", weight)?;
    if weight > FULL_ALLOCATION as f64 {
        return Err(EngineError::OutOfRange {
            param: "weight_percent",
            message: "must be <= 100",
            value: weight,
        });
    }
    Ok(weight)
}

fn spread_evenly(total: u32, n: usize) -> Vec<u32> {
    let base = total as usize / n;
    let leftover = total as usize - base * n;
    (0..n)
        .map(|position| (if position < leftover { base + 1 } else { base }) as u32)
        .collect()
}

// Largest-remainder apportionment in integer arithmetic.
fn spread_proportionally(total: u32, weights: &[u32]) -> Vec<u32> {
    let weight_total: u64 = weights.iter().map(|&w| w as u64).sum();
    let mut shares = Vec::with_capacity(weights.len());
    let mut fractions = Vec::with_capacity(weights.len());
    for (position, &weight) in weights.iter().enumerate() {
        let numerator = total as u64 * weight as u64;
        shares.push((numerator / weight_total) as u32);
        fractions.push((Reverse(numerator % weight_total), position));
    }

    let assigned: u32 = shares.iter().sum();
    fractions.sort();
    for &(_, position) in fractions.iter().take((total - assigned) as usize) {
        shares[position] += 1;
    }
    shares
}
