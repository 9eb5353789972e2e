//! Core RFM metric aggregation over the eligible order set.

use polars::prelude::*;
use tracing::debug;

use crate::config::DAYS_PER_MONTH;

/// Compute per-customer recency, frequency and monetary aggregates.
///
/// Expects the cleaned order table: non-null lower-cased `Email`,
/// `Purchase Date` in epoch days, numeric `Grand Total`. `reference_days`
/// is the run's fixed "now" in epoch days; every recency-derived figure in
/// the run must use the same value.
pub fn calculate_rfm_metrics(orders: &DataFrame, reference_days: i64) -> crate::Result<DataFrame> {
    let df = orders
        .clone()
        .lazy()
        .group_by([col("Email")])
        .agg([
            col("ID").count().cast(DataType::Int64).alias("Frecuencia"),
            col("Grand Total").sum().alias("LTV_Gasto_Total"),
            col("Grand Total").mean().alias("Gasto_Promedio_Compra"),
            col("Grand Total").max().alias("Gasto_Maximo_Compra"),
            col("Grand Total").min().alias("Gasto_Minimo_Compra"),
            col("Purchase Date").min().alias("Primera_Compra_Fecha"),
            col("Purchase Date").max().alias("Recencia_Fecha"),
        ])
        .with_columns([
            (lit(reference_days) - col("Recencia_Fecha")).alias("Recencia_Dias"),
            (lit(reference_days) - col("Primera_Compra_Fecha")).alias("Dias_Como_Cliente"),
        ])
        .with_columns([
            // a same-day first purchase counts as one day of tenure,
            // keeping the monthly-ticket division away from zero
            when(col("Dias_Como_Cliente").eq(lit(0i64)))
                .then(lit(1i64))
                .otherwise(col("Dias_Como_Cliente"))
                .alias("Dias_Como_Cliente"),
        ])
        .with_columns([
            (col("LTV_Gasto_Total")
                / (col("Dias_Como_Cliente").cast(DataType::Float64) / lit(DAYS_PER_MONTH)))
            .alias("Ticket_Promedio_Mensual"),
        ])
        .collect()?;

    debug!(customers = df.height(), "rfm_metrics_calculated");
    Ok(df)
}
