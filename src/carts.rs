//! Abandoned-cart enrichment and scoring.
//!
//! Carts are matched to the RFM table by email; unmatched carts score as
//! brand-new customers. The output keeps the fixed column layout of the
//! cart report regardless of upstream gaps.

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::format::{parse_comma_decimal, parse_timestamp, parse_us_currency};
use crate::frame;
use crate::scoring::MarketingScorer;

/// Fixed column order of the scored-cart output.
pub const CART_COLS: [&str; 17] = [
    "Email",
    "Products",
    "Quantity",
    "Subtotal",
    "Created",
    "Updated",
    "LTV_Gasto_Total",
    "Frecuencia",
    "Recencia_Dias",
    "Ticket_Promedio_Mensual",
    "Categoria_Preferida",
    "Es_Bahia_Blanca",
    "Tiene_Factura_A",
    "Score_Intencion",
    "Segmento",
    "Tipo_Cliente",
    "Accion_Sugerida",
];

const REQUIRED_COLS: [&str; 4] = ["Email", "Subtotal", "Created", "Updated"];

/// Merge abandoned carts with RFM fields and score them.
///
/// Most recently updated carts come first; within the same update time the
/// higher intention score wins.
pub fn enrich_and_score(
    carts: &DataFrame,
    rfm: &DataFrame,
    scorer: &MarketingScorer,
) -> Result<DataFrame, PipelineError> {
    for name in REQUIRED_COLS {
        if !frame::has_column(carts, name) {
            return Err(PipelineError::MissingColumn {
                column: name.to_string(),
                input: "carts",
            });
        }
    }
    try_enrich_and_score(carts, rfm, scorer)
        .map_err(|e| PipelineError::stage("cart_scoring", e))
}

fn try_enrich_and_score(
    carts: &DataFrame,
    rfm: &DataFrame,
    scorer: &MarketingScorer,
) -> crate::Result<DataFrame> {
    info!(carts = carts.height(), "processing_abandoned_carts");

    let mut df = carts.clone();

    // normalize the join key and the cart-report quirks: US-formatted
    // subtotals and string timestamps
    let emails: Vec<String> = frame::str_column(&df, "Email")?
        .iter()
        .map(|e| e.as_deref().unwrap_or("").trim().to_lowercase())
        .collect();
    df.with_column(Series::new("Email", emails))?;

    let subtotals: Vec<Option<f64>> = frame::str_column(&df, "Subtotal")?
        .iter()
        .map(|v| v.as_deref().and_then(parse_us_currency))
        .collect();
    df.with_column(Series::new("Subtotal", subtotals))?;

    let updated_ts: Vec<Option<i64>> = frame::str_column(&df, "Updated")?
        .iter()
        .map(|v| v.as_deref().and_then(parse_timestamp))
        .collect();
    df.with_column(Series::new("__updated_ts", updated_ts))?;

    let mut merged = df
        .lazy()
        .join(
            rfm.clone().lazy(),
            [col("Email")],
            [col("Email")],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    // the RFM table carries formatted currency strings; scores need numbers
    for name in ["LTV_Gasto_Total", "Ticket_Promedio_Mensual"] {
        if !frame::has_column(&merged, name) {
            continue;
        }
        let values: Vec<Option<f64>> = frame::str_column(&merged, name)?
            .iter()
            .map(|v| v.as_deref().map(parse_comma_decimal))
            .collect();
        merged.with_column(Series::new(name, values))?;
    }

    // unmatched carts are brand-new customers: no orders, no flags;
    // recency stays null so the scorer treats it as unknown
    let mut fills = Vec::new();
    for (name, default) in [
        ("LTV_Gasto_Total", lit(0.0)),
        ("Ticket_Promedio_Mensual", lit(0.0)),
        ("Frecuencia", lit(0i64)),
        ("Tiene_Factura_A", lit("No")),
        ("Es_Bahia_Blanca", lit("No")),
    ] {
        if frame::has_column(&merged, name) {
            fills.push(col(name).fill_null(default));
        } else {
            fills.push(default.alias(name));
        }
    }
    merged = merged.lazy().with_columns(fills).collect()?;

    let scored = scorer.process(&merged)?;

    let sorted = scored.sort(
        ["__updated_ts", "Score_Intencion"],
        SortMultipleOptions::default().with_order_descending_multi([true, true]),
    )?;

    let mut selection = Vec::with_capacity(CART_COLS.len());
    for name in CART_COLS {
        if frame::has_column(&sorted, name) {
            selection.push(col(name));
        } else {
            selection.push(lit("").alias(name));
        }
    }
    let out = sorted.lazy().select(selection).collect()?;

    debug!(rows = out.height(), "carts_processed");
    Ok(out)
}
