//! Small DataFrame access helpers shared by the pipeline stages.

use polars::prelude::*;

/// Whether the frame carries a column with the given name.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| *c == name)
}

/// Extract a column as owned optional strings, casting when needed.
pub fn str_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Extract a column as optional floats, casting when needed.
pub fn f64_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Extract a column as optional integers, casting when needed.
pub fn i64_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<i64>>> {
    let series = df.column(name)?.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

/// As [`str_column`], returning `None` when the column is absent.
pub fn opt_str_column(df: &DataFrame, name: &str) -> crate::Result<Option<Vec<Option<String>>>> {
    if has_column(df, name) {
        str_column(df, name).map(Some)
    } else {
        Ok(None)
    }
}

/// As [`f64_column`], returning `None` when the column is absent.
pub fn opt_f64_column(df: &DataFrame, name: &str) -> crate::Result<Option<Vec<Option<f64>>>> {
    if has_column(df, name) {
        f64_column(df, name).map(Some)
    } else {
        Ok(None)
    }
}

/// Null-ness mask for a column; rows of an absent column count as null.
pub fn null_mask(df: &DataFrame, name: &str) -> crate::Result<Vec<bool>> {
    if !has_column(df, name) {
        return Ok(vec![true; df.height()]);
    }
    Ok(df
        .column(name)?
        .is_null()
        .into_iter()
        .map(|v| v.unwrap_or(true))
        .collect())
}
