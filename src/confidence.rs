//! Confidence Engine (C8): maps statistical spread, model agreement, and
//! forecast horizon to a `[0,1]` score and a three-level bucket, per
//! spec.md §4.8.
//!
//! Grounded in the multi-model example's `std_dev` widening by
//! `days_ahead` in the retrieval pack, generalized from one ad hoc
//! widening factor into the spec's four composable piecewise-linear
//! factors.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Level {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FactorContribution {
    pub name: String,
    pub weight: f64,
    pub score: f64,
    pub contribution: f64,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfidenceLevel {
    pub score: f64,
    pub level: Level,
    pub factors: Vec<FactorContribution>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeights {
    pub spread: f64,
    pub agreement: f64,
    pub horizon: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        ConfidenceWeights {
            spread: 0.5,
            agreement: 0.3,
            horizon: 0.2,
        }
    }
}

/// Piecewise-linear factor: `1.0` at or below `high_thr`, `0.3` at or
/// above `low_thr`, linear in between.
pub fn from_spread(std_dev: f64, high_thr: f64, low_thr: f64) -> f64 {
    piecewise(std_dev, high_thr, low_thr)
}

pub fn from_range(range: f64, high_thr: f64, low_thr: f64) -> f64 {
    piecewise(range, high_thr, low_thr)
}

fn piecewise(value: f64, high_thr: f64, low_thr: f64) -> f64 {
    if value <= high_thr {
        1.0
    } else if value >= low_thr {
        0.3
    } else {
        let span = low_thr - high_thr;
        let t = (value - high_thr) / span;
        1.0 + t * (0.3 - 1.0)
    }
}

/// `1.0` at day 0, decreasing by `0.05`/day, floored at `0.5` at day 10+.
pub fn from_time_horizon(days_ahead: f64) -> f64 {
    (1.0 - 0.05 * days_ahead).max(0.5)
}

pub fn from_agreement(models_in_agreement: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.3;
    }
    0.3 + 0.7 * (models_in_agreement as f64 / total as f64)
}

fn level_for(score: f64) -> Level {
    if score >= 0.8 {
        Level::High
    } else if score >= 0.5 {
        Level::Medium
    } else {
        Level::Low
    }
}

/// Inputs to the composed score. `spread_std_dev`/`range` are `None`
/// when not applicable (single contributing model forces spread to 0,
/// per spec.md §4.8).
pub struct ScoreInputs {
    pub spread_std_dev: Option<f64>,
    pub spread_high_thr: f64,
    pub spread_low_thr: f64,
    pub range: Option<f64>,
    pub range_high_thr: f64,
    pub range_low_thr: f64,
    pub days_ahead: f64,
    pub models_in_agreement: usize,
    pub total_models: usize,
}

/// Which measure actually fed the spread factor, for the factor's detail
/// string.
enum SpreadSource {
    StdDev(f64),
    Range(f64),
    SingleModel,
}

pub fn score(inputs: &ScoreInputs, weights: &ConfidenceWeights) -> ConfidenceLevel {
    let (spread_score, spread_source) = if inputs.total_models <= 1 {
        (0.0, SpreadSource::SingleModel)
    } else {
        match inputs.spread_std_dev {
            Some(sd) => (
                from_spread(sd, inputs.spread_high_thr, inputs.spread_low_thr),
                SpreadSource::StdDev(sd),
            ),
            None => match inputs.range {
                Some(range) => (
                    from_range(range, inputs.range_high_thr, inputs.range_low_thr),
                    SpreadSource::Range(range),
                ),
                None => (0.0, SpreadSource::SingleModel),
            },
        }
    };
    let agreement_score = from_agreement(inputs.models_in_agreement, inputs.total_models);
    let horizon_score = from_time_horizon(inputs.days_ahead);

    let spread_contribution = weights.spread * spread_score;
    let agreement_contribution = weights.agreement * agreement_score;
    let horizon_contribution = weights.horizon * horizon_score;

    let total = spread_contribution + agreement_contribution + horizon_contribution;

    let factors = vec![
        FactorContribution {
            name: "spread".to_string(),
            weight: weights.spread,
            score: spread_score,
            contribution: spread_contribution,
            detail: match spread_source {
                SpreadSource::StdDev(sd) => format!("stdDev={sd:.3}"),
                SpreadSource::Range(range) => format!("range={range:.3} (stdDev unavailable)"),
                SpreadSource::SingleModel => "single contributing model".to_string(),
            },
        },
        FactorContribution {
            name: "agreement".to_string(),
            weight: weights.agreement,
            score: agreement_score,
            contribution: agreement_contribution,
            detail: format!(
                "{}/{} models in agreement",
                inputs.models_in_agreement, inputs.total_models
            ),
        },
        FactorContribution {
            name: "horizon".to_string(),
            weight: weights.horizon,
            score: horizon_score,
            contribution: horizon_contribution,
            detail: format!("{:.1} days ahead", inputs.days_ahead),
        },
    ];

    ConfidenceLevel {
        score: total,
        level: level_for(total),
        factors,
    }
}
