//! Analytics module - read-only query views over the unified dataset

mod queries;

pub use queries::{
    carrier_performance, cost_by_category, cost_leakage, cost_speed_analysis, cost_waterfall,
    delivered_only, filter_data, green_logistics_benefit, key_metrics, revenue_cost_trend,
    route_cost_analysis, sustainability_metrics, unique_values, CostLeakage,
    GreenLogisticsBenefit, KeyMetrics, QueryError, Scenario, SustainabilityMetrics,
    EV_ADOPTION_SHARE, EV_CO2_REDUCTION_SHARE, EV_FUEL_SAVINGS_SHARE, EV_INVESTMENT_PER_VEHICLE,
    EV_MAINTENANCE_SAVINGS_SHARE, OPTIMIZED_CO2_REDUCTION_PCT,
};
