//! Small value-extraction helpers over polars frames.

use polars::prelude::{AnyValue, DataFrame};

use survey_model::Result;

/// Render one cell as text; `None` for null cells. Non-string values fall
/// back to their display form so filters and counts can compare uniformly.
pub fn any_to_string(value: AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(value) => Some(value.to_string()),
        AnyValue::StringOwned(value) => Some(value.to_string()),
        AnyValue::Boolean(value) => Some(value.to_string()),
        other => Some(other.to_string()),
    }
}

/// All cells of one column as optional strings, in row order.
pub fn column_values(frame: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = frame.column(name)?.as_materialized_series();
    let mut values = Vec::with_capacity(series.len());
    for idx in 0..series.len() {
        values.push(any_to_string(series.get(idx).unwrap_or(AnyValue::Null)));
    }
    Ok(values)
}
