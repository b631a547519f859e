//! Join & Enrichment Engine
//! Merges the five source tables on `order_id` and derives the financial
//! and environmental metrics every downstream view reads.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::columns::{
    column_mean, numeric_column_names, numeric_values, optional_numeric, string_values,
};
use crate::data::SourceTables;

/// Fallback CO2 factor (kg per km) when the fleet table carries no usable
/// emission figures.
pub const DEFAULT_CO2_PER_KM: f64 = 0.45;
/// Share of the delivery cost charged per delay day.
pub const DELAY_COST_RATE: f64 = 0.05;
/// Flat storage fee charged per delay day.
pub const DELAY_STORAGE_FEE: f64 = 50.0;
/// Per-day delay charge when the source data has no delivery-cost column.
pub const DELAY_FLAT_RATE: f64 = 100.0;
/// Share of revenue written off when a quality issue is reported.
pub const DAMAGE_REVENUE_SHARE: f64 = 0.15;

/// Status values of the unified dataset.
pub const STATUS_DELIVERED: &str = "Delivered";
pub const STATUS_PENDING: &str = "Pending";

const ORDER_ID: &str = "order_id";
const TOTAL_COST: &str = "total_cost";

/// Source columns tried in order for the revenue field.
const REVENUE_SOURCES: &[&str] = &["order_value_inr", "order_value", "revenue"];
/// Source columns tried in order for the route distance field.
const DISTANCE_SOURCES: &[&str] = &["distance_km", "distance"];

/// Collision renames applied after the join. The first applicable rename
/// wins; a rename is skipped when the target name is already taken.
const CANONICAL_RENAMES: &[(&str, &str)] = &[
    ("origin", "origin_warehouse"),
    ("destination", "destination_city"),
    ("customer_rating", "rating"),
];

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("no source tables loaded")]
    NoSourceTables,
    #[error("schema violation: {table} lacks required column '{column}'")]
    SchemaViolation {
        table: &'static str,
        column: &'static str,
    },
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Build the unified order dataset: one row per order in the orders table,
/// left-joined against routes, delivery performance and cost breakdown,
/// with every derived metric column attached and all numeric nulls
/// resolved to 0 as the final step.
pub fn build_unified(tables: &SourceTables) -> Result<DataFrame, EnrichError> {
    require_order_id(tables)?;

    let categories = cost_category_columns(&tables.costs);
    let costs = with_category_total(&tables.costs, &categories)?;

    let mut merged = tables
        .orders
        .clone()
        .lazy()
        .join(
            tables.routes.clone().lazy(),
            [col(ORDER_ID)],
            [col(ORDER_ID)],
            left_join_args("_route"),
        )
        .join(
            tables.delivery.clone().lazy(),
            [col(ORDER_ID)],
            [col(ORDER_ID)],
            left_join_args("_perf"),
        )
        .join(
            costs.lazy(),
            [col(ORDER_ID)],
            [col(ORDER_ID)],
            left_join_args("_cost"),
        )
        .collect()?;

    apply_canonical_renames(&mut merged)?;
    derive_metrics(&mut merged, &tables.vehicles)?;
    zero_fill_numeric(&mut merged)?;

    debug!(
        rows = merged.height(),
        columns = merged.width(),
        "unified dataset built"
    );
    Ok(merged)
}

fn left_join_args(suffix: &str) -> JoinArgs {
    JoinArgs::new(JoinType::Left).with_suffix(Some(suffix.into()))
}

fn require_order_id(tables: &SourceTables) -> Result<(), EnrichError> {
    let keyed: [(&'static str, &DataFrame); 4] = [
        ("orders", &tables.orders),
        ("delivery_performance", &tables.delivery),
        ("routes_distance", &tables.routes),
        ("cost_breakdown", &tables.costs),
    ];
    for (table, df) in keyed {
        if df.column(ORDER_ID).is_err() {
            return Err(EnrichError::SchemaViolation {
                table,
                column: ORDER_ID,
            });
        }
    }
    Ok(())
}

/// Cost-category columns of the cost table: every numeric column that is
/// not the join key or a precomputed total.
pub fn cost_category_columns(costs: &DataFrame) -> Vec<String> {
    numeric_column_names(costs)
        .into_iter()
        .filter(|name| name != ORDER_ID && name != TOTAL_COST)
        .collect()
}

/// Attach the per-row sum of the category columns as `total_cost`.
///
/// A cost row with no usable category values still totals 0.0; only orders
/// with no cost row at all fall through to the delivery-cost fallback.
/// With no category columns present the table is passed through untouched
/// so the fallback chain applies to every order.
fn with_category_total(costs: &DataFrame, categories: &[String]) -> PolarsResult<DataFrame> {
    let mut costs = costs.clone();
    if categories.is_empty() {
        return Ok(costs);
    }
    let mut totals = vec![0.0_f64; costs.height()];
    for name in categories {
        for (i, value) in numeric_values(&costs, name)?.into_iter().enumerate() {
            totals[i] += value.unwrap_or(0.0);
        }
    }
    costs.with_column(Column::new(TOTAL_COST.into(), totals))?;
    Ok(costs)
}

fn apply_canonical_renames(df: &mut DataFrame) -> PolarsResult<()> {
    for &(from, to) in CANONICAL_RENAMES {
        if df.column(from).is_ok() && df.column(to).is_err() {
            df.rename(from, to.into())?;
        }
    }
    Ok(())
}

/// Fleet-average CO2 per km. One scalar applied uniformly to every order;
/// a per-vehicle lookup is intentionally not performed.
pub fn fleet_co2_factor(vehicles: &DataFrame) -> f64 {
    if let Some(mean) = column_mean(vehicles, "co2_emissions_kg_per_km") {
        return mean;
    }
    let means: Vec<f64> = vehicles
        .get_column_names_str()
        .iter()
        .copied()
        .filter(|name| name.contains("co2"))
        .filter_map(|name| column_mean(vehicles, name))
        .collect();
    if means.is_empty() {
        warn!("fleet table has no usable co2 figures, falling back to the default factor");
        return DEFAULT_CO2_PER_KM;
    }
    means.iter().sum::<f64>() / means.len() as f64
}

// Per-order metric rules. Kept as standalone functions so the arithmetic
// is testable independent of the frame plumbing.

/// On-time percentage from promised vs actual days, clipped at 100.
fn on_time_percentage(promised: Option<f64>, actual: Option<f64>) -> Option<f64> {
    match (promised, actual) {
        (Some(p), Some(a)) if a > 0.0 => Some((p / a * 100.0).min(100.0)),
        (Some(_), Some(_)) => Some(100.0),
        _ => None,
    }
}

/// Days late; never negative, 0 when timing data is missing.
fn delay_days(promised: Option<f64>, actual: Option<f64>) -> f64 {
    match (promised, actual) {
        (Some(p), Some(a)) => (a - p).max(0.0),
        _ => 0.0,
    }
}

/// Heuristic delay penalty for one order with a known delivery cost.
fn delay_cost_for(delay_days: f64, delivery_cost: f64) -> f64 {
    delay_days * (delivery_cost * DELAY_COST_RATE + DELAY_STORAGE_FEE)
}

/// Damage write-off: a fraction of revenue once a quality issue is
/// reported, nothing for a missing flag or a "Perfect" outcome.
fn damage_cost_for(quality_issue: Option<&str>, revenue: f64) -> f64 {
    match quality_issue {
        None => 0.0,
        Some("Perfect") => 0.0,
        Some(_) => DAMAGE_REVENUE_SHARE * revenue,
    }
}

/// Margin in percent; 0 rather than a division error when revenue is 0.
fn profit_margin(profit: f64, revenue: f64) -> f64 {
    if revenue != 0.0 {
        profit / revenue * 100.0
    } else {
        0.0
    }
}

/// Cost per km; null rather than infinite when distance is 0 or missing.
fn cost_per_km(total_cost: f64, distance: Option<f64>) -> Option<f64> {
    match distance {
        Some(km) if km != 0.0 => Some(total_cost / km),
        _ => None,
    }
}

fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// First source column present in `df` wins; a full-null view when none is.
fn numeric_with_fallback(df: &DataFrame, sources: &[&str]) -> PolarsResult<Vec<Option<f64>>> {
    for &source in sources {
        if df.column(source).is_ok() {
            return numeric_values(df, source);
        }
    }
    Ok(vec![None; df.height()])
}

fn derive_metrics(df: &mut DataFrame, vehicles: &DataFrame) -> PolarsResult<()> {
    let height = df.height();

    // Delivery status: an order is Delivered once a delivery-status value
    // exists for it.
    let status: Vec<String> = if df.column("delivery_status").is_ok() {
        string_values(df, "delivery_status")?
            .into_iter()
            .map(|v| {
                if v.is_some() {
                    STATUS_DELIVERED.to_string()
                } else {
                    STATUS_PENDING.to_string()
                }
            })
            .collect()
    } else {
        vec![STATUS_DELIVERED.to_string(); height]
    };
    df.with_column(Column::new("status".into(), status))?;

    // Timing metrics.
    let has_timing = df.column("promised_delivery_days").is_ok()
        && df.column("actual_delivery_days").is_ok();
    let promised = optional_numeric(df, "promised_delivery_days")?;
    let actual = optional_numeric(df, "actual_delivery_days")?;
    let on_time: Vec<Option<f64>> = if has_timing {
        (0..height)
            .map(|i| on_time_percentage(promised[i], actual[i]))
            .collect()
    } else {
        vec![Some(100.0); height]
    };
    let delays: Vec<f64> = (0..height)
        .map(|i| delay_days(promised[i], actual[i]))
        .collect();

    // Core amounts, each through its ordered fallback chain.
    let distance = numeric_with_fallback(df, DISTANCE_SOURCES)?;
    let revenue = numeric_with_fallback(df, REVENUE_SOURCES)?;
    let has_delivery_cost = df.column("delivery_cost_inr").is_ok();
    let delivery_cost = optional_numeric(df, "delivery_cost_inr")?;
    let category_total = optional_numeric(df, TOTAL_COST)?;
    let total_cost: Vec<f64> = (0..height)
        .map(|i| category_total[i].or(delivery_cost[i]).unwrap_or(0.0))
        .collect();

    // Emissions from the uniform fleet factor.
    let co2_factor = fleet_co2_factor(vehicles);
    let co2_emissions: Vec<Option<f64>> = distance
        .iter()
        .map(|d| d.map(|km| km * co2_factor))
        .collect();

    // Financial metrics. A missing revenue leaves profit null, which the
    // final zero fill resolves to 0 rather than to a negative cost.
    let profit: Vec<Option<f64>> = (0..height)
        .map(|i| revenue[i].map(|r| r - total_cost[i]))
        .collect();
    let margin: Vec<f64> = (0..height)
        .map(|i| profit_margin(profit[i].unwrap_or(0.0), revenue[i].unwrap_or(0.0)))
        .collect();
    let per_km: Vec<Option<f64>> = (0..height)
        .map(|i| cost_per_km(total_cost[i], distance[i]))
        .collect();

    // Inefficiency heuristics.
    let delay_costs: Vec<f64> = if has_delivery_cost {
        (0..height)
            .map(|i| {
                delivery_cost[i]
                    .map(|dc| delay_cost_for(delays[i], dc))
                    .unwrap_or(0.0)
            })
            .collect()
    } else {
        (0..height).map(|i| delays[i] * DELAY_FLAT_RATE).collect()
    };
    let quality = if df.column("quality_issue").is_ok() {
        string_values(df, "quality_issue")?
    } else {
        vec![None; height]
    };
    let damage_costs: Vec<f64> = (0..height)
        .map(|i| damage_cost_for(quality[i].as_deref(), revenue[i].unwrap_or(0.0)))
        .collect();
    let inefficiency: Vec<f64> = (0..height)
        .map(|i| delay_costs[i] + damage_costs[i])
        .collect();

    // Calendar buckets for the trend views.
    let (month, year) = if df.column("order_date").is_ok() {
        let parsed: Vec<Option<NaiveDate>> = string_values(df, "order_date")?
            .iter()
            .map(|raw| raw.as_deref().and_then(parse_order_date))
            .collect();
        let month: Vec<Option<String>> = parsed
            .iter()
            .map(|d| d.map(|d| d.format("%Y-%m").to_string()))
            .collect();
        let year: Vec<i32> = parsed.iter().map(|d| d.map(|d| d.year()).unwrap_or(0)).collect();
        (month, year)
    } else {
        (vec![None; height], vec![0; height])
    };

    df.with_column(Column::new("on_time_percentage".into(), on_time))?;
    df.with_column(Column::new("delay_days".into(), delays))?;
    df.with_column(Column::new("distance_km".into(), distance))?;
    df.with_column(Column::new("revenue".into(), revenue))?;
    df.with_column(Column::new(TOTAL_COST.into(), total_cost))?;
    df.with_column(Column::new(
        "co2_per_km".into(),
        vec![co2_factor; height],
    ))?;
    df.with_column(Column::new("co2_emissions".into(), co2_emissions))?;
    df.with_column(Column::new("profit".into(), profit))?;
    df.with_column(Column::new("profit_margin".into(), margin))?;
    df.with_column(Column::new("cost_per_km".into(), per_km))?;
    df.with_column(Column::new("delay_cost".into(), delay_costs))?;
    df.with_column(Column::new("damage_cost".into(), damage_costs))?;
    df.with_column(Column::new("cost_of_inefficiency".into(), inefficiency))?;
    df.with_column(Column::new("month".into(), month))?;
    df.with_column(Column::new("year".into(), year))?;
    Ok(())
}

/// Final step: every null in every numeric column resolves to 0 so the
/// aggregation views never see missing markers and never drop rows.
fn zero_fill_numeric(df: &mut DataFrame) -> PolarsResult<()> {
    for name in numeric_column_names(df) {
        if df.column(&name)?.null_count() == 0 {
            continue;
        }
        let values: Vec<f64> = numeric_values(df, &name)?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();
        df.with_column(Column::new(name.as_str().into(), values))?;
    }
    Ok(())
}
