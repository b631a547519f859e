//! Schema Normalizer Module
//! Maps arbitrary source column names onto the canonical naming convention.

use polars::prelude::*;

/// Normalize a single column name: trim, lowercase, spaces to underscores.
///
/// Idempotent, so tables can be re-normalized freely.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Rename every column of `df` to its canonical form.
///
/// Rows and column order are left untouched.
pub fn normalize_columns(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let names: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|name| normalize_name(name))
        .collect();
    df.set_column_names(names)?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_trims_and_underscores() {
        assert_eq!(normalize_name("  Order_ID "), "order_id");
        assert_eq!(normalize_name("Delivery Cost INR"), "delivery_cost_inr");
        assert_eq!(normalize_name("already_clean"), "already_clean");
    }

    #[test]
    fn normalizing_twice_matches_normalizing_once() {
        for raw in ["Order Date", "  CO2 Per KM ", "plain", "MiXeD Case Name"] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn frame_columns_keep_their_order() {
        let frame = df!(
            "Order_ID" => ["ORD1"],
            "Order Date" => ["2024-01-05"],
            "Carrier" => ["QuickShip"],
        )
        .unwrap();
        let normalized = normalize_columns(frame).unwrap();
        assert_eq!(
            normalized.get_column_names_str(),
            vec!["order_id", "order_date", "carrier"]
        );
    }
}
