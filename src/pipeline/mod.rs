//! Pipeline module - join/enrichment engine and the owning processor

mod enrich;
mod processor;

pub use enrich::{
    build_unified, cost_category_columns, fleet_co2_factor, EnrichError, DAMAGE_REVENUE_SHARE,
    DEFAULT_CO2_PER_KM, DELAY_COST_RATE, DELAY_FLAT_RATE, DELAY_STORAGE_FEE, STATUS_DELIVERED,
    STATUS_PENDING,
};
pub use processor::LogisticsProcessor;
