//! Query Layer Module
//! Read-only aggregation views over the unified order dataset. Every query
//! is a pure function of the frame it is given; filtering returns new
//! frames and never mutates the owned dataset.

use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::data::columns::{column_mean, column_sum, numeric_values, string_values};
use crate::pipeline::{cost_category_columns, STATUS_DELIVERED};

/// CO2 reduction assumed by the optimized sustainability scenario.
pub const OPTIMIZED_CO2_REDUCTION_PCT: f64 = 20.0;

/// EV-adoption what-if constants for the green logistics benefit.
pub const EV_ADOPTION_SHARE: f64 = 0.3;
pub const EV_FUEL_SAVINGS_SHARE: f64 = 0.6;
pub const EV_MAINTENANCE_SAVINGS_SHARE: f64 = 0.4;
pub const EV_CO2_REDUCTION_SHARE: f64 = 0.85;
pub const EV_INVESTMENT_PER_VEHICLE: f64 = 50_000.0;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("no unified dataset available; process the source tables first")]
    NoData,
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Executive headline metrics over delivered orders.
#[derive(Debug, Clone, Serialize)]
pub struct KeyMetrics {
    pub total_revenue: f64,
    pub revenue_growth: f64,
    pub cost_leakage: f64,
    pub leakage_reduction: f64,
    pub profit_margin: f64,
    pub margin_change: f64,
    pub co2_per_order: f64,
    pub co2_reduction: f64,
}

/// Avoidable-cost breakdown over a (possibly filtered) slice.
#[derive(Debug, Clone, Serialize)]
pub struct CostLeakage {
    pub delay_costs: f64,
    pub damage_costs: f64,
    pub carrier_overcharges: f64,
}

/// Emission totals for a sustainability scenario.
#[derive(Debug, Clone, Serialize)]
pub struct SustainabilityMetrics {
    pub total_co2: f64,
    pub co2_per_order: f64,
    pub reduction_pct: f64,
}

/// Projected savings from partial EV adoption.
#[derive(Debug, Clone, Serialize)]
pub struct GreenLogisticsBenefit {
    pub cost_savings: f64,
    pub co2_reduction: f64,
    pub reduction_pct: f64,
    pub roi: f64,
    pub payback_months: i64,
}

/// Emission scenario selector for [`sustainability_metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Current,
    Optimized,
}

/// Restrict a frame to delivered orders.
pub fn delivered_only(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .filter(col("status").eq(lit(STATUS_DELIVERED)))
        .collect()
}

pub fn key_metrics(df: &DataFrame) -> Result<KeyMetrics, QueryError> {
    let delivered = delivered_only(df)?;
    let total_revenue = column_sum(&delivered, "revenue")?;
    let total_cost = column_sum(&delivered, "total_cost")?;
    let profit_margin = if total_revenue != 0.0 {
        (total_revenue - total_cost) / total_revenue * 100.0
    } else {
        0.0
    };
    Ok(KeyMetrics {
        total_revenue,
        revenue_growth: 0.0,
        cost_leakage: column_sum(&delivered, "cost_of_inefficiency")?,
        leakage_reduction: 0.0,
        profit_margin,
        margin_change: 0.0,
        co2_per_order: column_mean(&delivered, "co2_emissions").unwrap_or(0.0),
        co2_reduction: 0.0,
    })
}

/// Per-category cost totals over the whole cost table (all cost records,
/// not only delivered orders).
pub fn cost_by_category(costs: &DataFrame) -> Result<DataFrame, QueryError> {
    let categories = cost_category_columns(costs);
    let mut amounts = Vec::with_capacity(categories.len());
    for category in &categories {
        amounts.push(column_sum(costs, category)?);
    }
    Ok(DataFrame::new(vec![
        Column::new("cost_category".into(), categories),
        Column::new("cost_amount".into(), amounts),
    ])?)
}

/// Monthly revenue and cost sums over delivered orders, chronological.
pub fn revenue_cost_trend(df: &DataFrame) -> Result<DataFrame, QueryError> {
    Ok(delivered_only(df)?
        .lazy()
        .filter(col("month").is_not_null())
        .group_by([col("month")])
        .agg([
            col("revenue").sum().alias("revenue"),
            col("total_cost").sum().alias("cost"),
        ])
        .sort(["month"], SortMultipleOptions::default())
        .collect()?)
}

/// Mean cost, on-time rate, volume and rating per carrier over delivered
/// orders.
pub fn carrier_performance(df: &DataFrame) -> Result<DataFrame, QueryError> {
    Ok(delivered_only(df)?
        .lazy()
        .group_by([col("carrier")])
        .agg([
            col("total_cost").mean().alias("avg_cost"),
            col("on_time_percentage").mean().alias("on_time_percentage"),
            col("order_id").count().alias("total_orders"),
            col("rating").mean().alias("avg_rating"),
        ])
        .sort(["carrier"], SortMultipleOptions::default())
        .collect()?)
}

/// Subset matching every provided inclusion set. An empty selection leaves
/// that dimension unfiltered; dimensions combine with logical AND.
pub fn filter_data(
    df: &DataFrame,
    regions: &[String],
    priorities: &[String],
    carriers: &[String],
) -> Result<DataFrame, QueryError> {
    let mut mask = vec![true; df.height()];
    apply_inclusion(df, "origin_warehouse", regions, &mut mask)?;
    apply_inclusion(df, "priority", priorities, &mut mask)?;
    apply_inclusion(df, "carrier", carriers, &mut mask)?;
    let mask = BooleanChunked::from_slice("mask".into(), &mask);
    Ok(df.filter(&mask)?)
}

fn apply_inclusion(
    df: &DataFrame,
    column: &str,
    allowed: &[String],
    mask: &mut [bool],
) -> Result<(), QueryError> {
    if allowed.is_empty() {
        return Ok(());
    }
    for (i, value) in string_values(df, column)?.iter().enumerate() {
        let keep = value
            .as_deref()
            .map(|v| allowed.iter().any(|a| a == v))
            .unwrap_or(false);
        mask[i] = mask[i] && keep;
    }
    Ok(())
}

/// Delay, damage and overcharge totals for a slice.
///
/// The overcharge baseline is the cheapest per-km carrier *within the
/// slice*: cost attributable to not using the cheapest carrier available
/// there.
pub fn cost_leakage(df: &DataFrame) -> Result<CostLeakage, QueryError> {
    let delay_costs = column_sum(df, "delay_cost")?;
    let damage_costs = column_sum(df, "damage_cost")?;

    let carriers = string_values(df, "carrier")?;
    let cost_per_km = numeric_values(df, "cost_per_km")?;
    let distance = numeric_values(df, "distance_km")?;

    let mut per_carrier: HashMap<String, (f64, usize)> = HashMap::new();
    for (i, carrier) in carriers.iter().enumerate() {
        if let (Some(carrier), Some(cpk)) = (carrier, cost_per_km[i]) {
            let entry = per_carrier.entry(carrier.clone()).or_insert((0.0, 0));
            entry.0 += cpk;
            entry.1 += 1;
        }
    }
    let min_carrier_cpk = per_carrier
        .values()
        .map(|(sum, n)| sum / *n as f64)
        .fold(f64::INFINITY, f64::min);

    let carrier_overcharges = if min_carrier_cpk.is_finite() {
        (0..df.height())
            .map(|i| match (cost_per_km[i], distance[i]) {
                (Some(cpk), Some(km)) => (cpk - min_carrier_cpk).max(0.0) * km,
                _ => 0.0,
            })
            .sum()
    } else {
        0.0
    };

    Ok(CostLeakage {
        delay_costs,
        damage_costs,
        carrier_overcharges,
    })
}

/// Cost heatmap per (origin, destination) pair over delivered orders.
pub fn route_cost_analysis(df: &DataFrame) -> Result<DataFrame, QueryError> {
    Ok(delivered_only(df)?
        .lazy()
        .group_by([col("origin_warehouse"), col("destination_city")])
        .agg([
            col("cost_per_km").mean().alias("avg_cost_per_km"),
            col("total_cost").mean().alias("avg_total_cost"),
            col("order_id").count().alias("order_count"),
        ])
        .sort(
            ["origin_warehouse", "destination_city"],
            SortMultipleOptions::default(),
        )
        .collect()?)
}

/// Mean spend per cost category over delivered orders, plus a synthetic
/// `Total` row tagged for waterfall-style rendering.
pub fn cost_waterfall(df: &DataFrame, costs: &DataFrame) -> Result<DataFrame, QueryError> {
    let delivered = delivered_only(df)?;
    let mut categories = cost_category_columns(costs);
    let mut amounts: Vec<f64> = categories
        .iter()
        .map(|category| column_mean(&delivered, category).unwrap_or(0.0))
        .collect();
    let mut measures = vec!["relative".to_string(); categories.len()];

    let total: f64 = amounts.iter().sum();
    categories.push("Total".to_string());
    amounts.push(total);
    measures.push("total".to_string());

    Ok(DataFrame::new(vec![
        Column::new("category".into(), categories),
        Column::new("amount".into(), amounts),
        Column::new("measure".into(), measures),
    ])?)
}

/// Cost against delivery speed for delivered orders.
pub fn cost_speed_analysis(df: &DataFrame) -> Result<DataFrame, QueryError> {
    let mut delivered = delivered_only(df)?;
    let hours: Vec<f64> = if delivered.column("actual_delivery_days").is_ok() {
        numeric_values(&delivered, "actual_delivery_days")?
            .into_iter()
            .map(|v| v.unwrap_or(0.0) * 24.0)
            .collect()
    } else if delivered.column("traffic_delay_minutes").is_ok() {
        numeric_values(&delivered, "traffic_delay_minutes")?
            .into_iter()
            .map(|v| v.unwrap_or(0.0) / 60.0)
            .collect()
    } else {
        vec![0.0; delivered.height()]
    };
    delivered.with_column(Column::new("delivery_hours".into(), hours))?;
    Ok(delivered.select([
        "order_id",
        "delivery_hours",
        "total_cost",
        "delivery_status",
        "rating",
        "carrier",
    ])?)
}

/// Distinct non-null values of a column, sorted.
pub fn unique_values(df: &DataFrame, column: &str) -> Vec<String> {
    df.column(column)
        .ok()
        .and_then(|col| col.unique().ok())
        .map(|unique| {
            let series = unique.as_materialized_series();
            let mut values: Vec<String> = (0..series.len())
                .filter_map(|i| {
                    let val = series.get(i).ok()?;
                    if val.is_null() {
                        None
                    } else {
                        Some(val.to_string().trim_matches('"').to_string())
                    }
                })
                .collect();
            values.sort();
            values
        })
        .unwrap_or_default()
}

pub fn sustainability_metrics(
    df: &DataFrame,
    scenario: Scenario,
) -> Result<SustainabilityMetrics, QueryError> {
    let delivered = delivered_only(df)?;
    let reduction_pct = match scenario {
        Scenario::Optimized => OPTIMIZED_CO2_REDUCTION_PCT,
        Scenario::Current => 0.0,
    };
    let scale = 1.0 - reduction_pct / 100.0;
    Ok(SustainabilityMetrics {
        total_co2: column_sum(&delivered, "co2_emissions")? * scale,
        co2_per_order: column_mean(&delivered, "co2_emissions").unwrap_or(0.0) * scale,
        reduction_pct,
    })
}

/// EV-adoption what-if over delivered orders; `fleet_size` scales the
/// investment estimate.
pub fn green_logistics_benefit(
    df: &DataFrame,
    fleet_size: usize,
) -> Result<GreenLogisticsBenefit, QueryError> {
    let delivered = delivered_only(df)?;
    let fuel_cost = first_present_sum(&delivered, &["fuel_cost", "fuel_consumption_l"])?;
    let fuel_savings = fuel_cost * EV_ADOPTION_SHARE * EV_FUEL_SAVINGS_SHARE;
    let maintenance_savings = first_present_sum(&delivered, &["vehicle_maintenance"])?
        * EV_ADOPTION_SHARE
        * EV_MAINTENANCE_SAVINGS_SHARE;
    let total_savings = fuel_savings + maintenance_savings;

    let current_co2 = column_sum(&delivered, "co2_emissions")?;
    let co2_reduction = current_co2 * EV_ADOPTION_SHARE * EV_CO2_REDUCTION_SHARE;
    let ev_investment = EV_INVESTMENT_PER_VEHICLE * EV_ADOPTION_SHARE * fleet_size.max(1) as f64;

    Ok(GreenLogisticsBenefit {
        cost_savings: total_savings,
        co2_reduction,
        reduction_pct: if current_co2 != 0.0 {
            co2_reduction / current_co2 * 100.0
        } else {
            0.0
        },
        roi: if ev_investment != 0.0 {
            total_savings / ev_investment * 100.0
        } else {
            0.0
        },
        payback_months: if total_savings != 0.0 {
            (ev_investment / (total_savings / 12.0)) as i64
        } else {
            0
        },
    })
}

fn first_present_sum(df: &DataFrame, sources: &[&str]) -> Result<f64, QueryError> {
    for &source in sources {
        if df.column(source).is_ok() {
            return Ok(column_sum(df, source)?);
        }
    }
    Ok(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unified_fixture() -> DataFrame {
        df!(
            "order_id" => ["ORD1", "ORD2", "ORD3"],
            "carrier" => ["QuickShip", "EcoHaul", "QuickShip"],
            "origin_warehouse" => ["WH_East", "WH_West", "WH_East"],
            "destination_city" => ["Boston", "Denver", "Boston"],
            "priority" => ["Express", "Standard", "Standard"],
            "status" => ["Delivered", "Delivered", "Pending"],
            "delivery_status" => [Some("On Time"), Some("Delayed"), None],
            "month" => [Some("2024-02"), Some("2024-01"), None],
            "revenue" => [200.0, 400.0, 0.0],
            "total_cost" => [100.0, 50.0, 0.0],
            "cost_per_km" => [10.0, 5.0, 0.0],
            "distance_km" => [10.0, 10.0, 0.0],
            "co2_emissions" => [4.5, 4.5, 0.0],
            "delay_cost" => [0.0, 110.0, 0.0],
            "damage_cost" => [0.0, 60.0, 0.0],
            "cost_of_inefficiency" => [0.0, 170.0, 0.0],
            "on_time_percentage" => [100.0, 50.0, 100.0],
            "rating" => [5.0, 3.0, 0.0],
            "actual_delivery_days" => [3.0, 4.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn empty_selections_leave_the_frame_unfiltered() {
        let df = unified_fixture();
        let filtered = filter_data(&df, &[], &[], &[]).unwrap();
        assert_eq!(filtered.height(), df.height());
    }

    #[test]
    fn unknown_filter_values_return_an_empty_frame() {
        let df = unified_fixture();
        let filtered =
            filter_data(&df, &["Nowhere".to_string()], &[], &[]).unwrap();
        assert_eq!(filtered.height(), 0);
    }

    #[test]
    fn filters_combine_with_logical_and() {
        let df = unified_fixture();
        let filtered = filter_data(
            &df,
            &["WH_East".to_string()],
            &["Standard".to_string()],
            &[],
        )
        .unwrap();
        assert_eq!(filtered.height(), 1);
    }

    #[test]
    fn overcharge_is_relative_to_the_cheapest_carrier_in_the_slice() {
        // Two delivered orders, equal distance; QuickShip runs at 10/km,
        // EcoHaul at 5/km, so the QuickShip order leaks (10-5)*10 = 50.
        let df = df!(
            "carrier" => ["QuickShip", "EcoHaul"],
            "cost_per_km" => [10.0, 5.0],
            "distance_km" => [10.0, 10.0],
            "delay_cost" => [0.0, 0.0],
            "damage_cost" => [0.0, 0.0],
        )
        .unwrap();
        let leakage = cost_leakage(&df).unwrap();
        assert!((leakage.carrier_overcharges - 50.0).abs() < 1e-9);
        assert_eq!(leakage.delay_costs, 0.0);
        assert_eq!(leakage.damage_costs, 0.0);
    }

    #[test]
    fn leakage_totals_sum_the_heuristic_costs() {
        let leakage = cost_leakage(&unified_fixture()).unwrap();
        assert_eq!(leakage.delay_costs, 110.0);
        assert_eq!(leakage.damage_costs, 60.0);
    }

    #[test]
    fn trend_is_monthly_and_chronological() {
        let trend = revenue_cost_trend(&unified_fixture()).unwrap();
        assert_eq!(trend.height(), 2);
        let months = string_values(&trend, "month").unwrap();
        assert_eq!(months[0].as_deref(), Some("2024-01"));
        assert_eq!(months[1].as_deref(), Some("2024-02"));
        let revenue = numeric_values(&trend, "revenue").unwrap();
        assert_eq!(revenue[0], Some(400.0));
        assert_eq!(revenue[1], Some(200.0));
    }

    #[test]
    fn carrier_performance_covers_delivered_orders_only() {
        let perf = carrier_performance(&unified_fixture()).unwrap();
        assert_eq!(perf.height(), 2);
        let carriers = string_values(&perf, "carrier").unwrap();
        assert_eq!(carriers[0].as_deref(), Some("EcoHaul"));
        let counts = numeric_values(&perf, "total_orders").unwrap();
        // The pending QuickShip order is excluded.
        assert_eq!(counts[1], Some(1.0));
    }

    #[test]
    fn key_metrics_guard_the_zero_revenue_case() {
        let df = df!(
            "status" => ["Delivered"],
            "revenue" => [0.0],
            "total_cost" => [10.0],
            "cost_of_inefficiency" => [0.0],
            "co2_emissions" => [0.0],
        )
        .unwrap();
        let metrics = key_metrics(&df).unwrap();
        assert_eq!(metrics.profit_margin, 0.0);
    }

    #[test]
    fn waterfall_appends_a_tagged_total_row() {
        let costs = df!(
            "order_id" => ["ORD1"],
            "fuel_cost" => [90.0],
            "toll_cost" => [60.0],
        )
        .unwrap();
        let df = df!(
            "status" => ["Delivered", "Delivered"],
            "fuel_cost" => [90.0, 30.0],
            "toll_cost" => [60.0, 20.0],
        )
        .unwrap();
        let waterfall = cost_waterfall(&df, &costs).unwrap();
        assert_eq!(waterfall.height(), 3);
        let categories = string_values(&waterfall, "category").unwrap();
        let amounts = numeric_values(&waterfall, "amount").unwrap();
        let measures = string_values(&waterfall, "measure").unwrap();
        assert_eq!(categories[2].as_deref(), Some("Total"));
        assert_eq!(measures[2].as_deref(), Some("total"));
        // Means are 60 and 40; the total row is their sum.
        assert_eq!(amounts[2], Some(100.0));
    }

    #[test]
    fn cost_by_category_sums_every_cost_record() {
        let costs = df!(
            "order_id" => ["ORD1", "ORD2"],
            "fuel_cost" => [90.0, 10.0],
            "toll_cost" => [60.0, 40.0],
        )
        .unwrap();
        let summary = cost_by_category(&costs).unwrap();
        let categories = string_values(&summary, "cost_category").unwrap();
        let amounts = numeric_values(&summary, "cost_amount").unwrap();
        assert_eq!(categories[0].as_deref(), Some("fuel_cost"));
        assert_eq!(amounts[0], Some(100.0));
        assert_eq!(amounts[1], Some(100.0));
    }

    #[test]
    fn cost_speed_uses_actual_days_in_hours() {
        let speed = cost_speed_analysis(&unified_fixture()).unwrap();
        assert_eq!(speed.height(), 2);
        let hours = numeric_values(&speed, "delivery_hours").unwrap();
        assert_eq!(hours[0], Some(72.0));
        assert_eq!(hours[1], Some(96.0));
    }

    #[test]
    fn unique_values_are_sorted_and_null_free() {
        let values = unique_values(&unified_fixture(), "carrier");
        assert_eq!(values, vec!["EcoHaul".to_string(), "QuickShip".to_string()]);
    }

    #[test]
    fn optimized_scenario_scales_emissions_down() {
        let current =
            sustainability_metrics(&unified_fixture(), Scenario::Current).unwrap();
        let optimized =
            sustainability_metrics(&unified_fixture(), Scenario::Optimized).unwrap();
        assert_eq!(current.reduction_pct, 0.0);
        assert_eq!(optimized.reduction_pct, OPTIMIZED_CO2_REDUCTION_PCT);
        assert!((optimized.total_co2 - current.total_co2 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn record_outputs_keep_the_reporting_contract_field_names() {
        let metrics = key_metrics(&unified_fixture()).unwrap();
        let value = serde_json::to_value(&metrics).unwrap();
        for field in [
            "total_revenue",
            "revenue_growth",
            "cost_leakage",
            "leakage_reduction",
            "profit_margin",
            "margin_change",
            "co2_per_order",
            "co2_reduction",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
        let leakage = cost_leakage(&unified_fixture()).unwrap();
        let value = serde_json::to_value(&leakage).unwrap();
        for field in ["delay_costs", "damage_costs", "carrier_overcharges"] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
    }
}
