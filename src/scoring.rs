//! Marketing intention scoring, segmentation and classification.
//!
//! The scorer is stateless and reusable over any record set exposing the
//! lifetime value, frequency, recency and (optionally) cart subtotal
//! fields, whether those columns are numeric or carry the formatted
//! strings of the final RFM table. Every derivation is a pure function of
//! a single row, so re-running the scorer over an already-scored table
//! recomputes identical values.

use polars::prelude::*;
use tracing::{debug, info};

use crate::config::ScoringThresholds;
use crate::error::PipelineError;
use crate::format::try_parse_comma_decimal;
use crate::frame;

/// Segment cut-offs on the 0-100 intention score.
const HIGH_SEGMENT: i64 = 70;
const MEDIUM_SEGMENT: i64 = 50;

/// Customer-type cut-offs.
const VIP_LTV: f64 = 1_000_000.0;
const VIP_FREQUENCY: i64 = 5;
const RECURRENT_FREQUENCY: i64 = 2;

/// Recency assumed for records carrying no recency information, far
/// outside every scoring window.
const UNKNOWN_RECENCY_DAYS: f64 = 9999.0;

/// Compute intention scores, segments, customer types and suggested
/// actions for customer-shaped record sets.
pub struct MarketingScorer {
    thresholds: ScoringThresholds,
}

impl Default for MarketingScorer {
    fn default() -> Self {
        Self::new(ScoringThresholds::default())
    }
}

impl MarketingScorer {
    pub fn new(thresholds: ScoringThresholds) -> Self {
        info!("marketing_scorer_initialized");
        Self { thresholds }
    }

    /// Add the `Score_Intencion` column.
    pub fn score(&self, df: &DataFrame) -> Result<DataFrame, PipelineError> {
        self.try_score(df).map_err(|e| PipelineError::stage("score", e))
    }

    fn try_score(&self, df: &DataFrame) -> crate::Result<DataFrame> {
        info!(rows = df.height(), "calculating_scores");
        let ltv = numeric_field(df, "LTV_Gasto_Total", 0.0)?;
        let frequency = numeric_field(df, "Frecuencia", 0.0)?;
        let recency = numeric_field(df, "Recencia_Dias", UNKNOWN_RECENCY_DAYS)?;
        let subtotal = numeric_field(df, "Subtotal", 0.0)?;

        let scores: Vec<i64> = (0..df.height())
            .map(|i| self.intention_score(ltv[i], frequency[i] as i64, recency[i], subtotal[i]))
            .collect();

        let mut out = df.clone();
        out.with_column(Series::new("Score_Intencion", scores))?;
        Ok(out)
    }

    /// Add the `Segmento` column from the intention score.
    pub fn segment(&self, df: &DataFrame) -> Result<DataFrame, PipelineError> {
        self.try_segment(df)
            .map_err(|e| PipelineError::stage("segment", e))
    }

    fn try_segment(&self, df: &DataFrame) -> crate::Result<DataFrame> {
        let scores = frame::i64_column(df, "Score_Intencion")?;
        let segments: Vec<&str> = scores
            .iter()
            .map(|score| segment_for(score.unwrap_or(0)))
            .collect();
        let mut out = df.clone();
        out.with_column(Series::new("Segmento", segments))?;
        debug!("segmentation_complete");
        Ok(out)
    }

    /// Add the `Accion_Sugerida` column from the segment.
    pub fn add_recommendations(&self, df: &DataFrame) -> Result<DataFrame, PipelineError> {
        self.try_add_recommendations(df)
            .map_err(|e| PipelineError::stage("recommend", e))
    }

    fn try_add_recommendations(&self, df: &DataFrame) -> crate::Result<DataFrame> {
        let segments = frame::str_column(df, "Segmento")?;
        let actions: Vec<&str> = segments
            .iter()
            .map(|segment| action_for(segment.as_deref().unwrap_or("")))
            .collect();
        let mut out = df.clone();
        out.with_column(Series::new("Accion_Sugerida", actions))?;
        debug!("recommendations_added");
        Ok(out)
    }

    /// Add the `Tipo_Cliente` column.
    ///
    /// A preferential invoice forces VIP regardless of value or frequency.
    pub fn classify(&self, df: &DataFrame) -> Result<DataFrame, PipelineError> {
        self.try_classify(df)
            .map_err(|e| PipelineError::stage("classify", e))
    }

    fn try_classify(&self, df: &DataFrame) -> crate::Result<DataFrame> {
        let ltv = numeric_field(df, "LTV_Gasto_Total", 0.0)?;
        let frequency = numeric_field(df, "Frecuencia", 0.0)?;
        let invoice = frame::opt_str_column(df, "Tiene_Factura_A")?;

        let types: Vec<&str> = (0..df.height())
            .map(|i| {
                let has_invoice = invoice
                    .as_ref()
                    .and_then(|col| col[i].as_deref())
                    .is_some_and(is_affirmative);
                customer_type(has_invoice, ltv[i], frequency[i] as i64)
            })
            .collect();
        let mut out = df.clone();
        out.with_column(Series::new("Tipo_Cliente", types))?;
        debug!("classification_complete");
        Ok(out)
    }

    /// Run the full scoring sequence: score, segment, recommend, classify.
    pub fn process(&self, df: &DataFrame) -> Result<DataFrame, PipelineError> {
        info!("starting_marketing_scoring_pipeline");
        let df = self.score(df)?;
        let df = self.segment(&df)?;
        let df = self.add_recommendations(&df)?;
        let df = self.classify(&df)?;
        info!("marketing_scoring_pipeline_complete");
        Ok(df)
    }

    /// Pure per-row intention score (0-100).
    pub fn intention_score(
        &self,
        ltv: f64,
        frequency: i64,
        recency_days: f64,
        cart_subtotal: f64,
    ) -> i64 {
        let t = &self.thresholds;
        let mut score = 0;

        // historical value (0-30)
        score += if ltv > t.high_value {
            30
        } else if ltv > t.medium_value {
            20
        } else if ltv > 0.0 {
            10
        } else {
            0
        };

        // frequency (0-30)
        score += if frequency >= t.high_frequency {
            30
        } else if frequency >= t.medium_frequency {
            20
        } else if frequency >= 1 {
            10
        } else {
            0
        };

        // recency (0-20)
        score += if recency_days <= t.recent_days {
            20
        } else if recency_days <= t.medium_days {
            10
        } else {
            0
        };

        // cart value (0-20)
        score += if cart_subtotal >= t.high_cart_value {
            20
        } else if cart_subtotal >= t.medium_cart_value {
            10
        } else {
            0
        };

        score
    }
}

/// Extract a numeric field from the frame, tolerating formatted-string
/// columns; missing columns and unreadable cells yield `default`.
fn numeric_field(df: &DataFrame, name: &str, default: f64) -> crate::Result<Vec<f64>> {
    if !frame::has_column(df, name) {
        return Ok(vec![default; df.height()]);
    }
    let series = df.column(name)?;
    let values = if series.dtype() == &DataType::String {
        series
            .str()?
            .into_iter()
            .map(|cell| {
                cell.and_then(try_parse_comma_decimal).unwrap_or(default)
            })
            .collect()
    } else {
        frame::f64_column(df, name)?
            .into_iter()
            .map(|v| v.unwrap_or(default))
            .collect()
    };
    Ok(values)
}

/// Segment bucket for an intention score.
pub fn segment_for(score: i64) -> &'static str {
    if score >= HIGH_SEGMENT {
        "Alta"
    } else if score >= MEDIUM_SEGMENT {
        "Media"
    } else {
        "Baja"
    }
}

/// Suggested action for a segment; unknown segments get the soft default.
pub fn action_for(segment: &str) -> &'static str {
    match segment {
        "Alta" => "WhatsApp + Cupón personalizado",
        "Media" => "Email remarketing",
        _ => "Automatización suave",
    }
}

/// Customer-type classification.
pub fn customer_type(has_invoice_a: bool, ltv: f64, frequency: i64) -> &'static str {
    if has_invoice_a || ltv >= VIP_LTV || frequency >= VIP_FREQUENCY {
        "VIP"
    } else if frequency >= RECURRENT_FREQUENCY {
        "Recurrente"
    } else {
        "Nuevo"
    }
}

fn is_affirmative(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    normalized == "sí" || normalized == "si"
}
