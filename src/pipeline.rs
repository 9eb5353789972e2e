//! End-to-end RFM processing pipeline.
//!
//! `RfmProcessor` runs the whole derivation over one snapshot of inputs:
//! customer field extraction, order cleaning, RFM metrics, supplementary
//! KPIs, preference analysis, the fan-in merge and presentation
//! formatting. A failure in any stage aborts the run with a
//! [`PipelineError::Stage`]; callers never see a partial result.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{ELIGIBLE_STATUS, NOT_AVAILABLE, SortBy};
use crate::customers::extract_customer_fields;
use crate::error::PipelineError;
use crate::format::{format_comma_decimal, format_date_dmy, parse_comma_decimal, parse_date,
    to_epoch_days};
use crate::frame;
use crate::kpis::calculate_additional_kpis;
use crate::metrics::calculate_rfm_metrics;
use crate::preferences::analyze_preferences;
use crate::records::RawCustomer;

/// Fixed column order of the RFM output table.
pub const FINAL_COLS: [&str; 32] = [
    "Name",
    "Email",
    "ID",
    "Cliente_Desde",
    "Telefono",
    "Codigo_Postal",
    "Es_Bahia_Blanca",
    "Tax_VAT_Number",
    "VAT_Number",
    "Tiene_Factura_A",
    "LTV_Gasto_Total",
    "Ticket_Promedio_Mensual",
    "Gasto_Promedio_Compra",
    "Gasto_Maximo_Compra",
    "Gasto_Minimo_Compra",
    "Frecuencia",
    "Recencia_Fecha",
    "Recencia_Dias",
    "Tiempo_Promedio_Entre_Compras",
    "Primera_Compra_Fecha",
    "Dias_Como_Cliente",
    "Ultimo_Trimestre_Compra",
    "Dia_Semana_Max_Frec",
    "Categoria_Preferida",
    "Lista_Categorias_Compradas",
    "Marca_Preferida",
    "Lista_Marcas_Compradas",
    "Total_Productos_Unicos",
    "Producto_Favorito_SKU",
    "Producto_Favorito_Nombre",
    "Producto_Favorito_Qty",
    "Historial_Ordenes_Mapeo",
];

/// Currency columns rendered in the comma-decimal convention.
const CURRENCY_COLS: [&str; 5] = [
    "LTV_Gasto_Total",
    "Ticket_Promedio_Mensual",
    "Gasto_Promedio_Compra",
    "Gasto_Maximo_Compra",
    "Gasto_Minimo_Compra",
];

const ORDER_INPUT_COLS: [&str; 6] = [
    "ID",
    "Email",
    "Purchase Date",
    "Grand Total",
    "Status",
    "Payment_Method",
];
const ITEM_INPUT_COLS: [&str; 5] = ["order_id", "customer_email", "sku", "qty_ordered", "row_total"];
const CATALOG_INPUT_COLS: [&str; 4] = ["sku", "product_name", "categories", "brand"];

/// Process customer and order snapshots into the RFM table.
pub struct RfmProcessor {
    min_year: i32,
    reference_date: NaiveDate,
}

impl RfmProcessor {
    /// Create a processor for one run.
    ///
    /// `reference_date` is the run's "now"; it is captured once by the
    /// caller and reused for every recency and tenure figure so the whole
    /// run stays internally consistent (and testable with a fixed clock).
    pub fn new(min_year: i32, reference_date: NaiveDate) -> Self {
        info!(min_year, "rfm_processor_initialized");
        Self {
            min_year,
            reference_date,
        }
    }

    /// Execute the complete RFM pipeline over one snapshot of inputs.
    ///
    /// The eligibility filter (status and minimum year) is applied here,
    /// so callers may hand over unfiltered order exports; pre-filtered
    /// input passes through unchanged.
    pub fn process(
        &self,
        customers: &[RawCustomer],
        orders: &DataFrame,
        catalog: &DataFrame,
        items: &DataFrame,
    ) -> Result<DataFrame, PipelineError> {
        validate_columns(orders, &ORDER_INPUT_COLS, "orders")?;
        validate_columns(items, &ITEM_INPUT_COLS, "items")?;
        validate_columns(catalog, &CATALOG_INPUT_COLS, "catalog")?;

        info!("starting_rfm_processing");

        let df_customers = extract_customer_fields(customers)
            .map_err(|e| PipelineError::stage("extract_customers", e))?;
        let orders = self
            .clean_orders(orders)
            .map_err(|e| PipelineError::stage("clean_data", e))?;

        let reference_days = to_epoch_days(self.reference_date);
        let df_rfm = calculate_rfm_metrics(&orders, reference_days)
            .map_err(|e| PipelineError::stage("rfm_metrics", e))?;
        let df_kpis = calculate_additional_kpis(&orders)
            .map_err(|e| PipelineError::stage("additional_kpis", e))?;
        let df_prefs = analyze_preferences(items, catalog, &orders)
            .map_err(|e| PipelineError::stage("preferences", e))?;

        let merged = merge_all(&df_customers, &df_rfm, &df_kpis, &df_prefs)
            .map_err(|e| PipelineError::stage("merge", e))?;
        let formatted =
            format_output(merged).map_err(|e| PipelineError::stage("format_output", e))?;

        info!(rows = formatted.height(), "rfm_processing_complete");
        Ok(formatted)
    }

    /// Normalize the raw order export into the cleaned eligible set.
    ///
    /// Rows are kept when the status matches the eligible status, the
    /// purchase date parses and its year reaches `min_year`, and a
    /// customer email is present. Dates become epoch days, totals numeric.
    fn clean_orders(&self, orders: &DataFrame) -> crate::Result<DataFrame> {
        let ids = frame::str_column(orders, "ID")?;
        let emails = frame::str_column(orders, "Email")?;
        let dates = frame::str_column(orders, "Purchase Date")?;
        let totals = frame::f64_column(orders, "Grand Total")?;
        let statuses = frame::str_column(orders, "Status")?;
        let payments = frame::str_column(orders, "Payment_Method")?;

        let mut out_ids = Vec::new();
        let mut out_emails = Vec::new();
        let mut out_dates = Vec::new();
        let mut out_totals = Vec::new();
        let mut out_statuses = Vec::new();
        let mut out_payments = Vec::new();

        for i in 0..orders.height() {
            if statuses[i].as_deref() != Some(ELIGIBLE_STATUS) {
                continue;
            }
            let Some(date) = dates[i].as_deref().and_then(parse_date) else {
                continue;
            };
            if date.year() < self.min_year {
                continue;
            }
            let email = emails[i]
                .as_deref()
                .map(|e| e.trim().to_lowercase())
                .unwrap_or_default();
            if email.is_empty() {
                continue;
            }

            out_ids.push(ids[i].clone().unwrap_or_default());
            out_emails.push(email);
            out_dates.push(to_epoch_days(date));
            out_totals.push(totals[i].unwrap_or(0.0));
            out_statuses.push(statuses[i].clone().unwrap_or_default());
            out_payments.push(payments[i].clone().unwrap_or_default());
        }

        let df = df!(
            "ID" => out_ids,
            "Email" => out_emails,
            "Purchase Date" => out_dates,
            "Grand Total" => out_totals,
            "Status" => out_statuses,
            "Payment_Method" => out_payments,
        )?;
        debug!(orders = df.height(), "data_cleaned");
        Ok(df)
    }
}

/// Check input shape up front, naming the first missing column.
fn validate_columns(
    df: &DataFrame,
    required: &[&str],
    input: &'static str,
) -> Result<(), PipelineError> {
    for name in required {
        if !frame::has_column(df, name) {
            return Err(PipelineError::MissingColumn {
                column: (*name).to_string(),
                input,
            });
        }
    }
    Ok(())
}

/// Fan-in merge: customers inner-joined to metrics (customers without
/// eligible orders drop out), KPIs and preferences left-joined on top.
fn merge_all(
    customers: &DataFrame,
    metrics: &DataFrame,
    kpis: &DataFrame,
    prefs: &DataFrame,
) -> crate::Result<DataFrame> {
    let enriched = metrics
        .clone()
        .lazy()
        .join(
            kpis.clone().lazy(),
            [col("Email")],
            [col("Email")],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            prefs.clone().lazy(),
            [col("Email")],
            [col("Email")],
            JoinArgs::new(JoinType::Left),
        );

    let merged = customers
        .clone()
        .lazy()
        .join(
            enriched,
            [col("Email")],
            [col("Email")],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?;

    debug!(rows = merged.height(), "data_merged");
    Ok(merged)
}

/// Presentation formatting and final column selection.
fn format_output(mut df: DataFrame) -> crate::Result<DataFrame> {
    // dates render as DD/MM/YYYY, missing ones as N/A
    let created = frame::i64_column(&df, "created_at")?;
    let rendered: Vec<String> = created.iter().map(|d| format_date_dmy(*d)).collect();
    df.with_column(Series::new("Cliente_Desde", rendered))?;
    df = df.drop("created_at")?;

    for name in ["Recencia_Fecha", "Primera_Compra_Fecha"] {
        let days = frame::i64_column(&df, name)?;
        let rendered: Vec<String> = days.iter().map(|d| format_date_dmy(*d)).collect();
        df.with_column(Series::new(name, rendered))?;
    }

    for name in CURRENCY_COLS {
        let values = frame::f64_column(&df, name)?;
        let rendered: Vec<String> = values.iter().map(|v| format_comma_decimal(*v)).collect();
        df.with_column(Series::new(name, rendered))?;
    }

    // the inter-purchase interval stays visibly undefined for one-order
    // customers rather than collapsing to zero
    let gaps = frame::f64_column(&df, "Tiempo_Promedio_Entre_Compras")?;
    let rendered: Vec<String> = gaps
        .iter()
        .map(|gap| match gap {
            Some(days) => format_comma_decimal(Some(*days)),
            None => NOT_AVAILABLE.to_string(),
        })
        .collect();
    df.with_column(Series::new("Tiempo_Promedio_Entre_Compras", rendered))?;

    // stable schema: every expected column present, in the fixed order
    let mut selection = Vec::with_capacity(FINAL_COLS.len());
    for name in FINAL_COLS {
        if frame::has_column(&df, name) {
            let expr = match df.column(name)?.dtype() {
                DataType::String => col(name).fill_null(lit(NOT_AVAILABLE)),
                DataType::Int64 | DataType::Int32 | DataType::UInt32 | DataType::Float64 => {
                    col(name).fill_null(lit(0))
                }
                _ => col(name),
            };
            selection.push(expr);
        } else {
            selection.push(lit(NOT_AVAILABLE).alias(name));
        }
    }
    let out = df.lazy().select(selection).collect()?;
    debug!("output_formatted");
    Ok(out)
}

/// Sort the formatted RFM table by a criterion.
///
/// Currency columns carry formatted strings at this point, so those sort
/// through a parsed numeric key instead of lexicographically.
pub fn sort_by(df: &DataFrame, sort: SortBy) -> crate::Result<DataFrame> {
    let column = sort.column();
    if !frame::has_column(df, column) {
        warn!(column, "sort_column_not_found");
        return Ok(df.clone());
    }
    let descending = !sort.ascending();
    let options = SortMultipleOptions::default().with_order_descending(descending);

    if CURRENCY_COLS.contains(&column) && df.column(column)?.dtype() == &DataType::String {
        let keys: Vec<f64> = frame::str_column(df, column)?
            .iter()
            .map(|v| v.as_deref().map(parse_comma_decimal).unwrap_or(0.0))
            .collect();
        let mut keyed = df.clone();
        keyed.with_column(Series::new("__sort_key", keys))?;
        let sorted = keyed.sort(["__sort_key"], options)?;
        return Ok(sorted.drop("__sort_key")?);
    }
    Ok(df.sort([column], options)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_is_reported_before_processing() {
        let processor = RfmProcessor::new(2024, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        let orders = df!("ID" => ["1"], "Email" => ["a@b.com"]).unwrap();
        let catalog = df!(
            "sku" => ["1"], "product_name" => ["x"], "categories" => [""], "brand" => [""],
        )
        .unwrap();
        let items = df!(
            "order_id" => ["1"], "customer_email" => ["a@b.com"], "sku" => ["1"],
            "qty_ordered" => [1.0], "row_total" => [1.0],
        )
        .unwrap();

        let err = processor
            .process(&[], &orders, &catalog, &items)
            .unwrap_err();
        match err {
            PipelineError::MissingColumn { column, input } => {
                assert_eq!(column, "Purchase Date");
                assert_eq!(input, "orders");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sort_by_currency_column_is_numeric() {
        let df = df!(
            "LTV_Gasto_Total" => ["2,00", "1.000,00", "30,00"],
            "Email" => ["a@x.com", "b@x.com", "c@x.com"],
        )
        .unwrap();
        let sorted = sort_by(&df, SortBy::Ltv).unwrap();
        let emails = sorted.column("Email").unwrap().str().unwrap();
        // numeric order 1000 > 30 > 2, not the lexicographic "30" > "2" > "1.000"
        assert_eq!(emails.get(0), Some("b@x.com"));
        assert_eq!(emails.get(1), Some("c@x.com"));
        assert_eq!(emails.get(2), Some("a@x.com"));
    }

    #[test]
    fn test_sort_by_unknown_column_is_a_no_op() {
        let df = df!("Email" => ["a@x.com"]).unwrap();
        let sorted = sort_by(&df, SortBy::Recency).unwrap();
        assert!(sorted.equals(&df));
    }
}
