//! RFMForge: RFM analytics and marketing scoring for e-commerce order data
//!
//! This library turns raw back-office exports (customers, orders, order
//! lines, product catalog) into two derived datasets: a per-customer
//! Recency/Frequency/Monetary profile enriched with purchase-preference
//! and loyalty signals, and a marketing intention score with segment,
//! customer type and suggested action, applied to the RFM population and
//! to abandoned shopping carts.
//!
//! Retrieval, pagination, authentication and upload of results belong to
//! external collaborators; the pipeline here consumes in-memory tables and
//! returns new tables.

pub mod carts;
pub mod cli;
pub mod config;
pub mod customers;
pub mod error;
pub mod format;
mod frame;
pub mod kpis;
pub mod metrics;
pub mod pipeline;
pub mod preferences;
pub mod records;
pub mod scoring;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{ScoringThresholds, SortBy};
pub use error::PipelineError;
pub use pipeline::RfmProcessor;
pub use records::{Address, RawCustomer};
pub use scoring::MarketingScorer;

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
