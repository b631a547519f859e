//! Recommendation Engine Module
//! Derives a single carrier-shift recommendation from the scorecard.

use num_format::{Locale, ToFormattedString};
use polars::prelude::*;
use serde::Serialize;

use super::carrier::{CarrierScorecard, ScoringError};
use crate::analytics::delivered_only;
use crate::data::columns::{numeric_values, string_values};

/// Share of the worst carrier's volume proposed for the pilot.
pub const PILOT_VOLUME_PCT: u32 = 15;

/// One heuristic optimization recommendation for the reporting layer.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub action: String,
    pub impact: String,
    pub implementation: String,
    pub savings: String,
    pub risk: String,
    pub timeline: String,
}

/// Best/worst single-pair shift heuristic.
///
/// Requires at least two scored carriers; the savings estimate compares the
/// worst carrier's current delivered spend against its volume priced at the
/// best carrier's mean cost, clamped to non-negative.
pub fn generate_recommendations(
    df: &DataFrame,
    scores: &[CarrierScorecard],
) -> Result<Vec<Recommendation>, ScoringError> {
    if scores.len() < 2 {
        return Ok(Vec::new());
    }
    let best = &scores[0];
    let worst = &scores[scores.len() - 1];

    let delivered = delivered_only(df)?;
    let carriers = string_values(&delivered, "carrier")?;
    let costs = numeric_values(&delivered, "total_cost")?;

    let mut current_cost = 0.0;
    let mut order_count = 0usize;
    for (i, carrier) in carriers.iter().enumerate() {
        if carrier.as_deref() == Some(worst.carrier.as_str()) {
            current_cost += costs[i].unwrap_or(0.0);
            order_count += 1;
        }
    }
    let potential_cost = order_count as f64 * best.avg_cost;
    let savings = (current_cost - potential_cost).max(0.0);

    Ok(vec![Recommendation {
        title: format!("Shift orders from {} to {}", worst.carrier, best.carrier),
        action: format!(
            "Pilot {}% of {} volume to {}",
            PILOT_VOLUME_PCT, worst.carrier, best.carrier
        ),
        impact: format!("Estimated annual saving INR {}", format_inr(savings)),
        implementation: "Pilot then scale".to_string(),
        savings: format!("INR {}/year", format_inr(savings)),
        risk: "Low".to_string(),
        timeline: "6 months".to_string(),
    }])
}

/// Whole-rupee amount with thousands separators.
fn format_inr(amount: f64) -> String {
    (amount.round() as i64).to_formatted_string(&Locale::en)
}
