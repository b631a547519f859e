//! Column access helpers shared by the pipeline and the analytics views.
//!
//! Centralizes the untyped-value handling so the rest of the code can work
//! with plain `Vec`s of optional scalars.

use polars::prelude::*;

/// Columns of `df` with a numeric dtype.
pub(crate) fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| {
            matches!(
                col.dtype(),
                DataType::Float32
                    | DataType::Float64
                    | DataType::Int8
                    | DataType::Int16
                    | DataType::Int32
                    | DataType::Int64
                    | DataType::UInt8
                    | DataType::UInt16
                    | DataType::UInt32
                    | DataType::UInt64
            )
        })
        .map(|col| col.name().to_string())
        .collect()
}

/// Non-strict numeric view of a column: values that fail numeric parsing
/// become `None`, never an error.
pub(crate) fn numeric_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let cast = df.column(name)?.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|value| value.filter(|v| !v.is_nan()))
        .collect())
}

/// Like [`numeric_values`], but a missing column yields an all-null view.
pub(crate) fn optional_numeric(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    if df.column(name).is_ok() {
        numeric_values(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

/// String view of a column regardless of its dtype.
pub(crate) fn string_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?;
    let series = column.as_materialized_series();
    Ok((0..series.len())
        .map(|i| {
            series.get(i).ok().and_then(|val| {
                if val.is_null() {
                    None
                } else {
                    Some(val.to_string().trim_matches('"').to_string())
                }
            })
        })
        .collect())
}

/// Sum of a column under non-strict numeric coercion; nulls count as 0.
pub(crate) fn column_sum(df: &DataFrame, name: &str) -> PolarsResult<f64> {
    Ok(numeric_values(df, name)?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .sum())
}

/// Mean over the non-null values of a column; `None` when nothing is left.
pub(crate) fn column_mean(df: &DataFrame, name: &str) -> Option<f64> {
    let cast = df.column(name).ok()?.cast(&DataType::Float64).ok()?;
    cast.f64().ok()?.mean()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_values_become_null() {
        let frame = df!("amount" => ["12.5", "n/a", "7"]).unwrap();
        let values = numeric_values(&frame, "amount").unwrap();
        assert_eq!(values, vec![Some(12.5), None, Some(7.0)]);
    }

    #[test]
    fn missing_column_yields_all_null_view() {
        let frame = df!("a" => [1.0, 2.0]).unwrap();
        let values = optional_numeric(&frame, "not_there").unwrap();
        assert_eq!(values, vec![None, None]);
    }

    #[test]
    fn string_view_strips_quoting_and_keeps_nulls() {
        let frame = df!("carrier" => [Some("QuickShip"), None]).unwrap();
        let values = string_values(&frame, "carrier").unwrap();
        assert_eq!(values, vec![Some("QuickShip".to_string()), None]);
    }

    #[test]
    fn sum_treats_nulls_as_zero() {
        let frame = df!("amount" => [Some(10.0), None, Some(5.0)]).unwrap();
        assert_eq!(column_sum(&frame, "amount").unwrap(), 15.0);
    }
}
