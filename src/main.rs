//! RFMForge: RFM analytics and marketing scoring CLI
//!
//! This is the main entrypoint that loads the back-office exports, runs
//! the RFM pipeline and the marketing scorer, and writes the derived
//! tables back to disk.

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use polars::prelude::*;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use rfmforge::records::RawCustomer;
use rfmforge::{carts, pipeline, Args, MarketingScorer, RfmProcessor};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        println!("RFMForge - RFM analysis and marketing scoring");
        println!("=============================================\n");
    }

    let start_time = Instant::now();

    // Step 1: Load input exports
    if args.verbose {
        println!("Step 1: Loading input exports");
    }
    let customers = load_customers(&args.customers)?;
    let orders = read_csv(&args.orders)?;
    let catalog = read_csv(&args.catalog)?;
    let items = read_csv(&args.items)?;

    println!("✓ Inputs loaded:");
    println!("  - Customers: {}", customers.len());
    println!("  - Orders: {}", orders.height());
    println!("  - Catalog entries: {}", catalog.height());
    println!("  - Order items: {}", items.height());

    // Step 2: Run the RFM pipeline. The reference "now" is captured once
    // here and reused for every recency figure in the run.
    if args.verbose {
        println!("\nStep 2: Processing RFM analysis");
        println!("  Minimum order year: {}", args.year);
    }
    let today = Local::now().date_naive();
    let processor = RfmProcessor::new(args.year, today);

    let rfm_start = Instant::now();
    let mut df_rfm = processor.process(&customers, &orders, &catalog, &items)?;
    df_rfm = pipeline::sort_by(&df_rfm, args.sort)?;

    println!("✓ RFM processed: {} customers", df_rfm.height());
    if args.verbose {
        println!("  Processing time: {:.2}s", rfm_start.elapsed().as_secs_f64());
    }
    write_csv(&mut df_rfm, &args.out_rfm)?;

    // Step 3: Score the RFM population
    let scorer = MarketingScorer::default();
    let mut df_scored = scorer.process(&df_rfm)?;
    println!("✓ Customers scored: {}", df_scored.height());
    write_csv(&mut df_scored, &args.out_scored)?;

    // Step 4: Score abandoned carts when a cart export is available
    let mut cart_rows = 0;
    if let Some(path) = &args.carts {
        if path.exists() {
            let df_carts = read_csv(path)?;
            let mut df_carts_scored = carts::enrich_and_score(&df_carts, &df_rfm, &scorer)?;
            cart_rows = df_carts_scored.height();
            println!("✓ Abandoned carts scored: {cart_rows}");
            write_csv(&mut df_carts_scored, &args.out_carts)?;
        } else {
            warn!(path = %path.display(), "abandoned_carts_file_not_found");
            println!("! Cart export not found, skipping cart scoring");
        }
    }

    println!("\n=== Run Summary ===");
    println!("Customers in RFM table: {}", df_rfm.height());
    println!("Abandoned carts scored: {cart_rows}");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    println!("RFM table saved to: {}", args.out_rfm.display());
    println!("Scored table saved to: {}", args.out_scored.display());

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Read the customers JSON export.
fn load_customers(path: &Path) -> Result<Vec<RawCustomer>> {
    let file =
        File::open(path).with_context(|| format!("cannot open customers export {}", path.display()))?;
    let customers: Vec<RawCustomer> = serde_json::from_reader(file)
        .with_context(|| format!("invalid customers export {}", path.display()))?;
    Ok(customers)
}

/// Read one of the CSV exports into a DataFrame.
fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok(df)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .finish(df)
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}
