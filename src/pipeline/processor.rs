//! Processor Module
//! Owns the unified order dataset and every derived cache on top of it.

use polars::prelude::*;
use std::path::PathBuf;
use tracing::info;

use super::enrich::{self, EnrichError};
use crate::analytics::{
    self, CostLeakage, GreenLogisticsBenefit, KeyMetrics, QueryError, Scenario,
    SustainabilityMetrics,
};
use crate::data::{LoaderError, SourceTables, TableLoader};
use crate::scoring::{self, CarrierScorecard, Recommendation, ScoringError};

/// The processing engine behind the reporting layer.
///
/// Reads borrow `&self` while a rebuild takes `&mut self` and swaps the
/// dataset in wholesale, so a reader can never observe a partially built
/// dataset. Filter results are new frames; the owned dataset is never
/// mutated in place.
pub struct LogisticsProcessor {
    tables: Option<SourceTables>,
    unified: Option<DataFrame>,
    scorecard_cache: Option<Vec<CarrierScorecard>>,
}

impl Default for LogisticsProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticsProcessor {
    pub fn new() -> Self {
        Self {
            tables: None,
            unified: None,
            scorecard_cache: None,
        }
    }

    /// Load the five source tables from a directory of CSV files.
    ///
    /// Replaces any previously loaded tables; the unified dataset and all
    /// caches are dropped until the next [`process`](Self::process).
    pub fn load_from_dir(&mut self, dir: impl Into<PathBuf>) -> Result<(), LoaderError> {
        let tables = TableLoader::new(dir).load_all()?;
        self.replace_tables(tables);
        Ok(())
    }

    /// Install already-loaded tables (embedding and test path).
    pub fn replace_tables(&mut self, tables: SourceTables) {
        self.tables = Some(tables);
        self.unified = None;
        self.scorecard_cache = None;
    }

    pub fn tables(&self) -> Option<&SourceTables> {
        self.tables.as_ref()
    }

    /// Rebuild the unified order dataset from the loaded tables,
    /// invalidating every derived cache.
    pub fn process(&mut self) -> Result<(), EnrichError> {
        let tables = self.tables.as_ref().ok_or(EnrichError::NoSourceTables)?;
        let unified = enrich::build_unified(tables)?;
        info!(rows = unified.height(), "unified dataset rebuilt");
        self.unified = Some(unified);
        self.scorecard_cache = None;
        Ok(())
    }

    /// The unified dataset, if one has been built.
    pub fn unified(&self) -> Option<&DataFrame> {
        self.unified.as_ref()
    }

    fn unified_frame(&self) -> Result<&DataFrame, QueryError> {
        self.unified.as_ref().ok_or(QueryError::NoData)
    }

    fn costs_table(&self) -> Result<&DataFrame, QueryError> {
        self.tables
            .as_ref()
            .map(|t| &t.costs)
            .ok_or(QueryError::NoData)
    }

    // Query layer. Each call is a pure view over the owned dataset.

    pub fn key_metrics(&self) -> Result<KeyMetrics, QueryError> {
        analytics::key_metrics(self.unified_frame()?)
    }

    pub fn cost_by_category(&self) -> Result<DataFrame, QueryError> {
        analytics::cost_by_category(self.costs_table()?)
    }

    pub fn revenue_cost_trend(&self) -> Result<DataFrame, QueryError> {
        analytics::revenue_cost_trend(self.unified_frame()?)
    }

    pub fn carrier_performance(&self) -> Result<DataFrame, QueryError> {
        analytics::carrier_performance(self.unified_frame()?)
    }

    /// Subset of the unified dataset matching all provided inclusion sets.
    pub fn filter_data(
        &self,
        regions: &[String],
        priorities: &[String],
        carriers: &[String],
    ) -> Result<DataFrame, QueryError> {
        analytics::filter_data(self.unified_frame()?, regions, priorities, carriers)
    }

    /// Leakage totals for a slice, typically one returned by
    /// [`filter_data`](Self::filter_data).
    pub fn cost_leakage(&self, frame: &DataFrame) -> Result<CostLeakage, QueryError> {
        analytics::cost_leakage(frame)
    }

    pub fn route_cost_analysis(&self, frame: &DataFrame) -> Result<DataFrame, QueryError> {
        analytics::route_cost_analysis(frame)
    }

    pub fn cost_waterfall(&self, frame: &DataFrame) -> Result<DataFrame, QueryError> {
        analytics::cost_waterfall(frame, self.costs_table()?)
    }

    pub fn cost_speed_analysis(&self, frame: &DataFrame) -> Result<DataFrame, QueryError> {
        analytics::cost_speed_analysis(frame)
    }

    pub fn unique_warehouses(&self) -> Vec<String> {
        self.unified
            .as_ref()
            .map(|df| analytics::unique_values(df, "origin_warehouse"))
            .unwrap_or_default()
    }

    pub fn unique_carriers(&self) -> Vec<String> {
        self.unified
            .as_ref()
            .map(|df| analytics::unique_values(df, "carrier"))
            .unwrap_or_default()
    }

    pub fn sustainability_metrics(
        &self,
        scenario: Scenario,
    ) -> Result<SustainabilityMetrics, QueryError> {
        analytics::sustainability_metrics(self.unified_frame()?, scenario)
    }

    pub fn green_logistics_benefit(&self) -> Result<GreenLogisticsBenefit, QueryError> {
        let fleet_size = self.tables.as_ref().map(|t| t.vehicles.height()).unwrap_or(0);
        analytics::green_logistics_benefit(self.unified_frame()?, fleet_size)
    }

    /// Carrier value scores, computed on first request and cached until
    /// the next rebuild.
    pub fn carrier_value_scores(&mut self) -> Result<&[CarrierScorecard], ScoringError> {
        if self.scorecard_cache.is_none() {
            let df = self.unified.as_ref().ok_or(ScoringError::NoData)?;
            self.scorecard_cache = Some(scoring::calculate_carrier_value_scores(df)?);
        }
        Ok(self.scorecard_cache.as_deref().unwrap_or_default())
    }

    /// Optimization recommendations derived from the cached scorecard.
    pub fn optimization_recommendations(&mut self) -> Result<Vec<Recommendation>, ScoringError> {
        let scores = self.carrier_value_scores()?.to_vec();
        let df = self.unified.as_ref().ok_or(ScoringError::NoData)?;
        scoring::generate_recommendations(df, &scores)
    }
}
