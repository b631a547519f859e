//! Table Loader Module
//! Reads the five source CSVs into normalized in-memory tables using Polars.

use polars::prelude::*;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use super::normalize::normalize_columns;

/// File names expected inside the configured data directory.
pub const ORDERS_FILE: &str = "orders.csv";
pub const DELIVERY_FILE: &str = "delivery_performance.csv";
pub const ROUTES_FILE: &str = "routes_distance.csv";
pub const VEHICLES_FILE: &str = "vehicle_fleet.csv";
pub const COSTS_FILE: &str = "cost_breakdown.csv";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("missing source data: failed to read {table}: {source}")]
    MissingSourceData {
        table: &'static str,
        #[source]
        source: PolarsError,
    },
}

impl LoaderError {
    /// The table file the failed load was attempting to read.
    pub fn table(&self) -> &'static str {
        match self {
            LoaderError::MissingSourceData { table, .. } => table,
        }
    }
}

/// The five normalized source tables.
///
/// `vehicles` is the only table with no order linkage; it is aggregated
/// independently for the fleet CO2 factor.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub orders: DataFrame,
    pub delivery: DataFrame,
    pub routes: DataFrame,
    pub vehicles: DataFrame,
    pub costs: DataFrame,
}

impl SourceTables {
    /// Build the table set from in-memory frames, applying the same column
    /// normalization as the CSV path.
    pub fn from_frames(
        orders: DataFrame,
        delivery: DataFrame,
        routes: DataFrame,
        vehicles: DataFrame,
        costs: DataFrame,
    ) -> PolarsResult<Self> {
        Ok(Self {
            orders: normalize_columns(orders)?,
            delivery: normalize_columns(delivery)?,
            routes: normalize_columns(routes)?,
            vehicles: normalize_columns(vehicles)?,
            costs: normalize_columns(costs)?,
        })
    }
}

/// Loads the source CSVs from a configured directory.
///
/// The load is all-or-nothing: a single unreadable file fails the whole
/// attempt and no partial table set is returned. Recovery (retry, fallback
/// data) is the caller's decision.
pub struct TableLoader {
    dir: PathBuf,
}

impl TableLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load and normalize all five tables in one deterministic attempt.
    pub fn load_all(&self) -> Result<SourceTables, LoaderError> {
        let orders = self.load_table(ORDERS_FILE)?;
        let delivery = self.load_table(DELIVERY_FILE)?;
        let routes = self.load_table(ROUTES_FILE)?;
        let vehicles = self.load_table(VEHICLES_FILE)?;
        let costs = self.load_table(COSTS_FILE)?;
        Ok(SourceTables {
            orders,
            delivery,
            routes,
            vehicles,
            costs,
        })
    }

    fn load_table(&self, table: &'static str) -> Result<DataFrame, LoaderError> {
        let path = self.dir.join(table);
        let df = Self::read_csv(path.to_string_lossy().into_owned())
            .and_then(normalize_columns)
            .map_err(|source| LoaderError::MissingSourceData { table, source })?;
        info!(table, rows = df.height(), "loaded source table");
        Ok(df)
    }

    /// Load a CSV file using Polars lazy scanning, then collect.
    fn read_csv(path: String) -> PolarsResult<DataFrame> {
        LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("freightlens_loader_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_minimal_tables(dir: &PathBuf, skip: Option<&str>) {
        let tables = [
            (ORDERS_FILE, "Order_ID,Carrier\nORD1,QuickShip\n"),
            (DELIVERY_FILE, "Order_ID,Delivery_Status\nORD1,On Time\n"),
            (ROUTES_FILE, "Order_ID,Distance_KM\nORD1,120\n"),
            (VEHICLES_FILE, "Vehicle_ID,CO2_Per_KM\nVEH1,0.6\n"),
            (COSTS_FILE, "Order_ID,Fuel_Cost\nORD1,40\n"),
        ];
        for (name, body) in tables {
            if Some(name) == skip {
                continue;
            }
            fs::write(dir.join(name), body).unwrap();
        }
    }

    #[test]
    fn loads_and_normalizes_all_tables() {
        let dir = scratch_dir("full");
        write_minimal_tables(&dir, None);

        let tables = TableLoader::new(&dir).load_all().unwrap();
        assert!(tables.orders.column("order_id").is_ok());
        assert!(tables.routes.column("distance_km").is_ok());
        assert!(tables.vehicles.column("co2_per_km").is_ok());
        assert_eq!(tables.orders.height(), 1);
    }

    #[test]
    fn missing_table_fails_the_whole_load() {
        let dir = scratch_dir("missing");
        write_minimal_tables(&dir, Some(ROUTES_FILE));

        let err = TableLoader::new(&dir).load_all().unwrap_err();
        assert_eq!(err.table(), ROUTES_FILE);
    }
}
