//! FreightLens - Logistics Cost Intelligence & Sustainability Analytics
//!
//! Ingests five related shipment tables (orders, delivery performance,
//! routes, vehicle fleet, cost breakdown), merges them into one enriched
//! record per order and exposes read-only cost, trend, route and carrier
//! analytics over the result. The reporting front end consumes the query
//! methods on [`LogisticsProcessor`] and nothing else.

pub mod analytics;
pub mod data;
pub mod pipeline;
pub mod scoring;

pub use analytics::{
    CostLeakage, GreenLogisticsBenefit, KeyMetrics, QueryError, Scenario, SustainabilityMetrics,
};
pub use data::{LoaderError, SourceTables, TableLoader};
pub use pipeline::{EnrichError, LogisticsProcessor};
pub use scoring::{CarrierScorecard, Recommendation, ScoringError};
