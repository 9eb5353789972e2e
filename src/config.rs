//! Scoring thresholds, sort criteria and fixed output placeholders.

use clap::ValueEnum;

/// Placeholder used when a customer record has no first or last name.
pub const NO_NAME: &str = "Sin Nombre";

/// Placeholder for items whose catalog entry carries no category path.
pub const NO_CATEGORY: &str = "Sin Categoria";

/// Placeholder for items whose catalog entry carries no brand.
pub const NO_BRAND: &str = "Sin Marca";

/// Placeholder injected for any expected output value absent after merging.
pub const NOT_AVAILABLE: &str = "N/A";

/// Postal-code digit sequence identifying the local region.
pub const LOCAL_POSTAL_PREFIX: &str = "8000";

/// Lower-cased payment-method substring marking a preferential invoice.
pub const INVOICE_A_MARKER: &str = "factura a";

/// Order status eligible for RFM aggregation.
pub const ELIGIBLE_STATUS: &str = "processing";

/// Average days per month used for the monthly ticket metric.
pub const DAYS_PER_MONTH: f64 = 30.416;

/// Spanish weekday names, indexed from Monday.
pub const WEEKDAYS: [&str; 7] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];

/// Cut-offs for the four components of the marketing intention score.
///
/// Passed into [`crate::MarketingScorer`] explicitly so individual runs
/// (and tests) can override any threshold without touching global state.
#[derive(Debug, Clone)]
pub struct ScoringThresholds {
    /// Lifetime value above which the full 30 value points are awarded.
    pub high_value: f64,
    /// Lifetime value above which 20 value points are awarded.
    pub medium_value: f64,
    /// Order count from which the full 30 frequency points are awarded.
    pub high_frequency: i64,
    /// Order count from which 20 frequency points are awarded.
    pub medium_frequency: i64,
    /// Days since last purchase within which 20 recency points are awarded.
    pub recent_days: f64,
    /// Days since last purchase within which 10 recency points are awarded.
    pub medium_days: f64,
    /// Cart subtotal from which the full 20 cart points are awarded.
    pub high_cart_value: f64,
    /// Cart subtotal from which 10 cart points are awarded.
    pub medium_cart_value: f64,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            high_value: 1_000_000.0,
            medium_value: 300_000.0,
            high_frequency: 5,
            medium_frequency: 3,
            recent_days: 7.0,
            medium_days: 30.0,
            high_cart_value: 300_000.0,
            medium_cart_value: 100_000.0,
        }
    }
}

/// Sorting criteria for the final RFM table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortBy {
    /// Total lifetime spend, highest first.
    Ltv,
    /// Eligible order count, highest first.
    Frequency,
    /// Days since last purchase, lowest first.
    Recency,
    /// Average monthly ticket, highest first.
    Ticket,
}

impl SortBy {
    /// Output column the criterion sorts on.
    pub fn column(self) -> &'static str {
        match self {
            SortBy::Ltv => "LTV_Gasto_Total",
            SortBy::Frequency => "Frecuencia",
            SortBy::Recency => "Recencia_Dias",
            SortBy::Ticket => "Ticket_Promedio_Mensual",
        }
    }

    /// Whether ascending order is the useful direction for the criterion.
    pub fn ascending(self) -> bool {
        // lower recency is better
        matches!(self, SortBy::Recency)
    }
}
