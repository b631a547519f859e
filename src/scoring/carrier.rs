//! Carrier Scoring Module
//! Normalizes per-carrier delivery aggregates into a weighted value score.

use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::analytics::delivered_only;
use crate::data::columns::{numeric_values, string_values};

/// Weights of the carrier value score. Fixed design constants; together
/// they sum to 1.0.
pub const COST_WEIGHT: f64 = 0.4;
pub const DELIVERY_WEIGHT: f64 = 0.3;
pub const SATISFACTION_WEIGHT: f64 = 0.2;
pub const SUSTAINABILITY_WEIGHT: f64 = 0.1;

/// Customer ratings run from 0 to this maximum.
pub const RATING_SCALE: f64 = 5.0;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("no unified dataset available; process the source tables first")]
    NoData,
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// One row of the carrier scorecard: raw delivered-order aggregates, the
/// four [0,100] sub-scores and the weighted composite.
#[derive(Debug, Clone, Serialize)]
pub struct CarrierScorecard {
    pub carrier: String,
    pub avg_cost: f64,
    pub on_time_percentage: f64,
    pub avg_rating: f64,
    pub co2_per_order: f64,
    pub total_orders: usize,
    pub cost_score: f64,
    pub delivery_score: f64,
    pub satisfaction_score: f64,
    pub sustainability_score: f64,
    pub carrier_value_score: f64,
}

struct CarrierAggregate {
    carrier: String,
    avg_cost: f64,
    on_time: f64,
    avg_rating: f64,
    avg_co2: f64,
    orders: usize,
}

/// Score every carrier seen among delivered orders, sorted descending by
/// value score. The sort is stable, so tied carriers keep their
/// aggregation-group (alphabetical) order.
pub fn calculate_carrier_value_scores(
    df: &DataFrame,
) -> Result<Vec<CarrierScorecard>, ScoringError> {
    let delivered = delivered_only(df)?;
    let carriers = string_values(&delivered, "carrier")?;
    let cost = numeric_values(&delivered, "total_cost")?;
    let on_time = numeric_values(&delivered, "on_time_percentage")?;
    let rating = numeric_values(&delivered, "rating")?;
    let co2 = numeric_values(&delivered, "co2_emissions")?;

    let mut names: Vec<String> = carriers.iter().flatten().cloned().collect();
    names.sort();
    names.dedup();

    let aggregates: Vec<CarrierAggregate> = names
        .par_iter()
        .map(|name| {
            let rows: Vec<usize> = carriers
                .iter()
                .enumerate()
                .filter(|(_, c)| c.as_deref() == Some(name.as_str()))
                .map(|(i, _)| i)
                .collect();
            CarrierAggregate {
                carrier: name.clone(),
                avg_cost: mean_at(&rows, &cost),
                on_time: mean_at(&rows, &on_time),
                avg_rating: mean_at(&rows, &rating),
                avg_co2: mean_at(&rows, &co2),
                orders: rows.len(),
            }
        })
        .collect();

    let max_cost = positive_max(aggregates.iter().map(|a| a.avg_cost));
    let max_co2 = positive_max(aggregates.iter().map(|a| a.avg_co2));

    let mut scorecards: Vec<CarrierScorecard> = aggregates
        .into_iter()
        .map(|agg| {
            let cost_score = inverse_ratio_score(agg.avg_cost, max_cost);
            let delivery_score = agg.on_time;
            let satisfaction_score = agg.avg_rating / RATING_SCALE * 100.0;
            let sustainability_score = inverse_ratio_score(agg.avg_co2, max_co2);
            let carrier_value_score = COST_WEIGHT * cost_score
                + DELIVERY_WEIGHT * delivery_score
                + SATISFACTION_WEIGHT * satisfaction_score
                + SUSTAINABILITY_WEIGHT * sustainability_score;
            CarrierScorecard {
                carrier: agg.carrier,
                avg_cost: agg.avg_cost,
                on_time_percentage: agg.on_time,
                avg_rating: agg.avg_rating,
                co2_per_order: agg.avg_co2,
                total_orders: agg.orders,
                cost_score,
                delivery_score,
                satisfaction_score,
                sustainability_score,
                carrier_value_score,
            }
        })
        .collect();

    scorecards.sort_by(|a, b| {
        b.carrier_value_score
            .partial_cmp(&a.carrier_value_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(scorecards)
}

fn mean_at(rows: &[usize], values: &[Option<f64>]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let sum: f64 = rows.iter().map(|&i| values[i].unwrap_or(0.0)).sum();
    sum / rows.len() as f64
}

/// Largest strictly positive value; 0 when there is none.
fn positive_max(values: impl Iterator<Item = f64>) -> f64 {
    values.filter(|v| *v > 0.0).fold(0.0, f64::max)
}

/// Lower-is-better [0,100] normalization; 0 when the fleet maximum is 0.
fn inverse_ratio_score(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        (1.0 - value / max) * 100.0
    } else {
        0.0
    }
}
