//! Scoring module - carrier value scores and optimization recommendations

mod carrier;
mod recommend;

pub use carrier::{
    calculate_carrier_value_scores, CarrierScorecard, ScoringError, COST_WEIGHT, DELIVERY_WEIGHT,
    RATING_SCALE, SATISFACTION_WEIGHT, SUSTAINABILITY_WEIGHT,
};
pub use recommend::{generate_recommendations, Recommendation, PILOT_VOLUME_PCT};
