//! Raw input record types supplied by the data-source adapter.
//!
//! Customer records arrive with a nested address list, so they are modeled
//! as serde types rather than a flat table; the extractor in
//! [`crate::customers`] flattens them into the canonical customer table.

use serde::Deserialize;

/// Address entry attached to a raw customer record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub telephone: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
}

/// Customer record as returned by the back office, prior to field
/// extraction. Optional fields degrade to empty values downstream.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCustomer {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub taxvat: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}
