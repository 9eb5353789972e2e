//! Customer purchase-preference analysis.
//!
//! Joins order lines to the catalog by normalized SKU and derives the
//! preferred category, brand and product per customer, the purchased
//! category/brand lists, the order-history summary and the preferential
//! invoice flag.
//!
//! The "preferred X" selections use an explicit argmax over grouped
//! quantity sums: ties on the summed quantity go to the candidate with the
//! smallest original row position. This keeps the output stable across
//! runs instead of leaning on an aggregation library's tie resolution.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use polars::prelude::*;
use tracing::debug;

use crate::config::{INVOICE_A_MARKER, NO_BRAND};
use crate::format::{clean_category, format_comma_decimal, normalize_sku};
use crate::frame;

/// Quantity accumulator for one candidate value of one customer.
struct QtyAgg {
    qty: f64,
    first_idx: usize,
}

impl QtyAgg {
    fn add(map: &mut HashMap<String, QtyAgg>, key: String, qty: f64, idx: usize) {
        match map.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(QtyAgg {
                    qty,
                    first_idx: idx,
                });
            }
            Entry::Occupied(mut slot) => slot.get_mut().qty += qty,
        }
    }
}

/// Pick the candidate with the highest summed quantity; on ties the one
/// first seen in the input wins.
fn argmax_first(candidates: &HashMap<String, QtyAgg>) -> Option<(&str, f64)> {
    let mut best: Option<(&str, &QtyAgg)> = None;
    for (key, agg) in candidates {
        best = match best {
            None => Some((key, agg)),
            Some((best_key, best_agg)) => {
                if agg.qty > best_agg.qty
                    || (agg.qty == best_agg.qty && agg.first_idx < best_agg.first_idx)
                {
                    Some((key, agg))
                } else {
                    Some((best_key, best_agg))
                }
            }
        };
    }
    best.map(|(key, agg)| (key, agg.qty))
}

#[derive(Default)]
struct CustomerPrefs {
    categories: HashMap<String, QtyAgg>,
    brands: HashMap<String, QtyAgg>,
    products: HashMap<String, QtyAgg>,
    category_list: Vec<String>,
    brand_list: Vec<String>,
    distinct_skus: HashSet<String>,
}

struct CatalogEntry {
    product_name: Option<String>,
    categories: Option<String>,
    brand: Option<String>,
}

/// One eligible order, kept for the history summary and invoice flag.
struct OrderLine {
    id: String,
    date: i64,
    total: Option<f64>,
    status: String,
    payment: String,
}

/// Derive per-customer preference columns.
///
/// `orders` must be the cleaned eligible order table; items belonging to
/// orders outside it are ignored so that preference figures and RFM
/// figures describe the same order population. Order-derived fields
/// (history, invoice flag) cover every customer with eligible orders even
/// when no item rows survive for them.
pub fn analyze_preferences(
    items: &DataFrame,
    catalog: &DataFrame,
    orders: &DataFrame,
) -> crate::Result<DataFrame> {
    let catalog_by_sku = index_catalog(catalog)?;
    let (order_of, order_lines) = collect_orders(orders)?;
    let eligible_ids: HashSet<&str> = order_lines
        .values()
        .flatten()
        .map(|line| line.id.as_str())
        .collect();

    let prefs_by_customer = accumulate_items(items, &catalog_by_sku, &eligible_ids)?;

    let rows = order_of.len();
    let mut cat_pref = Vec::with_capacity(rows);
    let mut cat_list = Vec::with_capacity(rows);
    let mut brand_pref = Vec::with_capacity(rows);
    let mut brand_list = Vec::with_capacity(rows);
    let mut fav_sku: Vec<Option<String>> = Vec::with_capacity(rows);
    let mut fav_qty: Vec<Option<f64>> = Vec::with_capacity(rows);
    let mut fav_name: Vec<Option<String>> = Vec::with_capacity(rows);
    let mut unique_products: Vec<i64> = Vec::with_capacity(rows);
    let mut history = Vec::with_capacity(rows);
    let mut invoice_a = Vec::with_capacity(rows);

    for email in &order_of {
        let prefs = prefs_by_customer.get(email);

        cat_pref.push(
            prefs
                .and_then(|p| argmax_first(&p.categories))
                .map(|(cat, _)| cat.to_string()),
        );
        brand_pref.push(
            prefs
                .and_then(|p| argmax_first(&p.brands))
                .map(|(brand, _)| brand.to_string()),
        );
        cat_list.push(prefs.map(|p| p.category_list.join(", ")));
        brand_list.push(prefs.map(|p| p.brand_list.join(", ")));

        match prefs.and_then(|p| argmax_first(&p.products)) {
            Some((sku, qty)) => {
                fav_name.push(
                    catalog_by_sku
                        .get(sku)
                        .and_then(|entry| entry.product_name.clone()),
                );
                fav_sku.push(Some(sku.to_string()));
                fav_qty.push(Some(qty));
            }
            None => {
                fav_sku.push(None);
                fav_qty.push(None);
                fav_name.push(None);
            }
        }
        unique_products.push(prefs.map_or(0, |p| p.distinct_skus.len() as i64));

        let lines = order_lines.get(email).map_or(&[][..], Vec::as_slice);
        history.push(history_summary(lines));
        invoice_a.push(if has_invoice_a(lines) { "Sí" } else { "No" });
    }

    let df = df!(
        "Email" => order_of,
        "Categoria_Preferida" => cat_pref,
        "Lista_Categorias_Compradas" => cat_list,
        "Marca_Preferida" => brand_pref,
        "Lista_Marcas_Compradas" => brand_list,
        "Producto_Favorito_SKU" => fav_sku,
        "Producto_Favorito_Nombre" => fav_name,
        "Producto_Favorito_Qty" => fav_qty,
        "Total_Productos_Unicos" => unique_products,
        "Historial_Ordenes_Mapeo" => history,
        "Tiene_Factura_A" => invoice_a,
    )?;

    debug!(customers = df.height(), "preferences_analyzed");
    Ok(df)
}

/// Catalog lookup keyed by normalized SKU; the first entry wins duplicates.
fn index_catalog(catalog: &DataFrame) -> crate::Result<HashMap<String, CatalogEntry>> {
    let skus = frame::str_column(catalog, "sku")?;
    let names = frame::str_column(catalog, "product_name")?;
    let categories = frame::str_column(catalog, "categories")?;
    let brands = frame::str_column(catalog, "brand")?;

    let mut index = HashMap::with_capacity(catalog.height());
    for i in 0..catalog.height() {
        let Some(sku) = skus[i].as_deref() else {
            continue;
        };
        index.entry(normalize_sku(sku)).or_insert(CatalogEntry {
            product_name: names[i].clone(),
            categories: categories[i].clone(),
            brand: brands[i].clone(),
        });
    }
    Ok(index)
}

/// Group cleaned orders per customer, preserving first-appearance order of
/// customers and the original row order of each customer's orders.
#[allow(clippy::type_complexity)]
fn collect_orders(
    orders: &DataFrame,
) -> crate::Result<(Vec<String>, HashMap<String, Vec<OrderLine>>)> {
    let ids = frame::str_column(orders, "ID")?;
    let emails = frame::str_column(orders, "Email")?;
    let dates = frame::i64_column(orders, "Purchase Date")?;
    let totals = frame::f64_column(orders, "Grand Total")?;
    let statuses = frame::str_column(orders, "Status")?;
    let payments = frame::str_column(orders, "Payment_Method")?;

    let mut order_of = Vec::new();
    let mut by_customer: HashMap<String, Vec<OrderLine>> = HashMap::new();
    for i in 0..orders.height() {
        let (Some(email), Some(date)) = (emails[i].as_deref(), dates[i]) else {
            continue;
        };
        let line = OrderLine {
            id: ids[i].clone().unwrap_or_default(),
            date,
            total: totals[i],
            status: statuses[i].clone().unwrap_or_default(),
            payment: payments[i].clone().unwrap_or_default(),
        };
        match by_customer.entry(email.to_string()) {
            Entry::Vacant(slot) => {
                order_of.push(slot.key().clone());
                slot.insert(vec![line]);
            }
            Entry::Occupied(mut slot) => slot.get_mut().push(line),
        }
    }
    Ok((order_of, by_customer))
}

/// Walk item rows in input order, accumulating quantity sums per customer.
fn accumulate_items(
    items: &DataFrame,
    catalog_by_sku: &HashMap<String, CatalogEntry>,
    eligible_ids: &HashSet<&str>,
) -> crate::Result<HashMap<String, CustomerPrefs>> {
    let order_ids = frame::str_column(items, "order_id")?;
    let emails = frame::str_column(items, "customer_email")?;
    let skus = frame::str_column(items, "sku")?;
    let qty_ordered = frame::f64_column(items, "qty_ordered")?;
    let qty_invoiced = frame::opt_f64_column(items, "qty_invoiced")?;
    let product_types = frame::opt_str_column(items, "product_type")?;
    let parent_null = frame::null_mask(items, "parent_item_id")?;

    let mut by_customer: HashMap<String, CustomerPrefs> = HashMap::new();
    for i in 0..items.height() {
        // configurable rows without a parent duplicate their child line
        let is_configurable = product_types
            .as_ref()
            .and_then(|types| types[i].as_deref())
            .is_some_and(|t| t.eq_ignore_ascii_case("configurable"));
        if is_configurable && parent_null[i] {
            continue;
        }

        let Some(email) = emails[i].as_deref() else {
            continue;
        };
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            continue;
        }
        let order_id = order_ids[i].as_deref().unwrap_or("");
        if !eligible_ids.contains(order_id) {
            continue;
        }

        let sku = normalize_sku(skus[i].as_deref().unwrap_or(""));
        // invoiced quantity preferred, ordered quantity as fallback
        let qty = qty_invoiced
            .as_ref()
            .and_then(|q| q[i])
            .or(qty_ordered[i])
            .unwrap_or(0.0);

        let entry = catalog_by_sku.get(&sku);
        let category = clean_category(entry.and_then(|e| e.categories.as_deref()));
        let brand = entry
            .and_then(|e| e.brand.clone())
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| NO_BRAND.to_string());

        let prefs = by_customer.entry(email).or_default();
        if !prefs.category_list.contains(&category) {
            prefs.category_list.push(category.clone());
        }
        if !prefs.brand_list.contains(&brand) {
            prefs.brand_list.push(brand.clone());
        }
        prefs.distinct_skus.insert(sku.clone());
        QtyAgg::add(&mut prefs.categories, category, qty, i);
        QtyAgg::add(&mut prefs.brands, brand, qty, i);
        QtyAgg::add(&mut prefs.products, sku, qty, i);
    }
    Ok(by_customer)
}

/// `"<id> (<localized total> <status>)"` entries, most recent first.
fn history_summary(lines: &[OrderLine]) -> String {
    let mut ordered: Vec<&OrderLine> = lines.iter().collect();
    ordered.sort_by_key(|line| std::cmp::Reverse(line.date));
    ordered
        .iter()
        .map(|line| {
            format!(
                "{} ({} {})",
                line.id,
                format_comma_decimal(line.total),
                line.status
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn has_invoice_a(lines: &[OrderLine]) -> bool {
    lines
        .iter()
        .any(|line| line.payment.to_lowercase().contains(INVOICE_A_MARKER))
}
