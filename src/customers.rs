//! Customer field extraction.
//!
//! Normalizes raw back-office customer records into the canonical
//! attribute set consumed by the merge stage. Missing optional fields
//! degrade to empty strings; extraction never fails on sparse records.

use polars::prelude::*;
use tracing::debug;

use crate::config::{LOCAL_POSTAL_PREFIX, NO_NAME};
use crate::format::{parse_date, to_epoch_days};
use crate::records::RawCustomer;

/// Flatten raw customer records into the canonical customer table.
///
/// Emails are lower-cased here once, making them directly usable as the
/// pipeline's join key. Phone and postal code come from the first address
/// when any exists. The `created_at` column holds epoch days, null when
/// the source date does not parse.
pub fn extract_customer_fields(raw: &[RawCustomer]) -> crate::Result<DataFrame> {
    let mut emails = Vec::with_capacity(raw.len());
    let mut names = Vec::with_capacity(raw.len());
    let mut ids = Vec::with_capacity(raw.len());
    let mut phones = Vec::with_capacity(raw.len());
    let mut postcodes = Vec::with_capacity(raw.len());
    let mut local_flags = Vec::with_capacity(raw.len());
    let mut tax_vat = Vec::with_capacity(raw.len());
    let mut created = Vec::with_capacity(raw.len());

    for customer in raw {
        emails.push(customer.email.trim().to_lowercase());
        names.push(display_name(customer));
        ids.push(customer.id.to_string());

        let first_address = customer.addresses.first();
        let phone = first_address
            .and_then(|a| a.telephone.clone())
            .unwrap_or_default();
        let postcode = first_address
            .and_then(|a| a.postcode.clone())
            .unwrap_or_default();
        local_flags.push(if postcode.contains(LOCAL_POSTAL_PREFIX) {
            "Si"
        } else {
            "No"
        });
        phones.push(phone);
        postcodes.push(postcode);

        tax_vat.push(customer.taxvat.clone().unwrap_or_default());
        created.push(
            customer
                .created_at
                .as_deref()
                .and_then(parse_date)
                .map(to_epoch_days),
        );
    }

    let df = df!(
        "Email" => emails,
        "Name" => names,
        "ID" => ids,
        "Telefono" => phones,
        "Codigo_Postal" => postcodes,
        "Es_Bahia_Blanca" => local_flags,
        // the single source tax field feeds both output columns
        "Tax_VAT_Number" => tax_vat.clone(),
        "VAT_Number" => tax_vat,
        "created_at" => created,
    )?;

    debug!(rows = df.height(), "customer_fields_extracted");
    Ok(df)
}

fn display_name(customer: &RawCustomer) -> String {
    let first = customer.firstname.as_deref().unwrap_or("");
    let last = customer.lastname.as_deref().unwrap_or("");
    let name = format!("{first} {last}").trim().to_string();
    if name.is_empty() {
        NO_NAME.to_string()
    } else {
        name
    }
}
