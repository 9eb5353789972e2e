//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::config::SortBy;

/// RFM analysis and marketing scoring over e-commerce order exports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Minimum order year included in the analysis
    #[arg(short, long, value_parser = clap::value_parser!(i32).range(2000..=2100))]
    pub year: i32,

    /// Path to the customers JSON export (array of raw customer records)
    #[arg(long, default_value = "customers.json")]
    pub customers: PathBuf,

    /// Path to the orders CSV export
    #[arg(long, default_value = "orders.csv")]
    pub orders: PathBuf,

    /// Path to the order-items CSV export
    #[arg(long, default_value = "items.csv")]
    pub items: PathBuf,

    /// Path to the product-catalog CSV export
    #[arg(long, default_value = "catalog.csv")]
    pub catalog: PathBuf,

    /// Path to the abandoned-carts CSV export (cart scoring is skipped
    /// when the file does not exist)
    #[arg(long)]
    pub carts: Option<PathBuf>,

    /// Output path for the RFM table
    #[arg(long, default_value = "rfm.csv")]
    pub out_rfm: PathBuf,

    /// Output path for the scored RFM table
    #[arg(long, default_value = "rfm_scored.csv")]
    pub out_scored: PathBuf,

    /// Output path for the scored abandoned carts
    #[arg(long, default_value = "carts_scored.csv")]
    pub out_carts: PathBuf,

    /// Sort criterion for the RFM table
    #[arg(short, long, value_enum, default_value_t = SortBy::Ltv)]
    pub sort: SortBy,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
