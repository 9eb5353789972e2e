//! Supplementary per-customer KPIs beyond core RFM.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::Datelike;
use polars::prelude::*;
use tracing::debug;

use crate::config::{NOT_AVAILABLE, WEEKDAYS};
use crate::format::{from_epoch_days, quarter_label};
use crate::frame;

/// Compute inter-purchase interval, last-active quarter and preferred
/// weekday per customer from the cleaned order table.
///
/// The inter-purchase interval needs at least two orders; with fewer it is
/// left null, never zero. Weekday ties resolve to the earliest slot of the
/// Monday-first frequency table, a deterministic but arbitrary choice.
pub fn calculate_additional_kpis(orders: &DataFrame) -> crate::Result<DataFrame> {
    let emails = frame::str_column(orders, "Email")?;
    let dates = frame::i64_column(orders, "Purchase Date")?;

    let mut order_of: Vec<String> = Vec::new();
    let mut by_customer: HashMap<String, Vec<i64>> = HashMap::new();
    for (email, days) in emails.into_iter().zip(dates) {
        let (Some(email), Some(days)) = (email, days) else {
            continue;
        };
        match by_customer.entry(email) {
            Entry::Vacant(slot) => {
                order_of.push(slot.key().clone());
                slot.insert(vec![days]);
            }
            Entry::Occupied(mut slot) => slot.get_mut().push(days),
        }
    }

    let mut avg_gaps: Vec<Option<f64>> = Vec::with_capacity(order_of.len());
    let mut quarters: Vec<String> = Vec::with_capacity(order_of.len());
    let mut weekdays: Vec<String> = Vec::with_capacity(order_of.len());

    for email in &order_of {
        let Some(dates) = by_customer.get_mut(email) else {
            continue;
        };
        dates.sort_unstable();

        avg_gaps.push(average_gap_days(dates));

        let last = dates[dates.len() - 1];
        quarters.push(
            from_epoch_days(last)
                .map(quarter_label)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        );
        weekdays.push(preferred_weekday(dates));
    }

    let df = df!(
        "Email" => order_of,
        "Tiempo_Promedio_Entre_Compras" => avg_gaps,
        "Ultimo_Trimestre_Compra" => quarters,
        "Dia_Semana_Max_Frec" => weekdays,
    )?;

    debug!(customers = df.height(), "additional_kpis_calculated");
    Ok(df)
}

/// Mean of consecutive gaps between sorted purchase days; undefined below
/// two orders.
fn average_gap_days(sorted_days: &[i64]) -> Option<f64> {
    if sorted_days.len() < 2 {
        return None;
    }
    let total: i64 = sorted_days.windows(2).map(|w| w[1] - w[0]).sum();
    Some(total as f64 / (sorted_days.len() - 1) as f64)
}

/// Most frequent purchase weekday, localized; earliest slot wins ties.
fn preferred_weekday(days: &[i64]) -> String {
    let mut counts = [0usize; 7];
    for &day in days {
        if let Some(date) = from_epoch_days(day) {
            counts[date.weekday().num_days_from_monday() as usize] += 1;
        }
    }
    let mut best = 0;
    for slot in 1..counts.len() {
        if counts[slot] > counts[best] {
            best = slot;
        }
    }
    if counts[best] == 0 {
        NOT_AVAILABLE.to_string()
    } else {
        WEEKDAYS[best].to_string()
    }
}
