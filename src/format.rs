//! Locale and normalization helpers shared across pipeline stages.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::config::{NOT_AVAILABLE, NO_CATEGORY};

/// Days from 0001-01-01 (chrono's common-era day 1) to 1970-01-01.
const UNIX_EPOCH_CE_DAYS: i64 = 719_163;

/// Normalize a SKU to the catalog's canonical form.
///
/// Whitespace is stripped, including internal spaces; fully numeric SKUs
/// are zero-padded to five digits; anything else passes through unchanged.
/// Both sides of an item/catalog join must run through this or the join
/// silently drops rows.
pub fn normalize_sku(sku: &str) -> String {
    let compact: String = sku.chars().filter(|c| !c.is_whitespace()).collect();
    if !compact.is_empty() && compact.chars().all(|c| c.is_ascii_digit()) {
        format!("{compact:0>5}")
    } else {
        compact
    }
}

/// Extract the most specific segment of a category path.
///
/// Category paths come comma-separated with "/"-nested segments; the text
/// after the final comma and final slash wins. Blank or missing input
/// falls back to the `Sin Categoria` placeholder.
pub fn clean_category(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return NO_CATEGORY.to_string();
    };
    let last = raw
        .rsplit(',')
        .next()
        .unwrap_or("")
        .rsplit('/')
        .next()
        .unwrap_or("")
        .trim();
    if last.is_empty() {
        NO_CATEGORY.to_string()
    } else {
        last.to_string()
    }
}

/// Render a number in the Argentine comma-decimal convention.
///
/// `1234.56` becomes `"1.234,56"`; missing or NaN values become `"0,00"`.
pub fn format_comma_decimal(value: Option<f64>) -> String {
    let value = match value {
        Some(v) if v.is_finite() => v,
        _ => return "0,00".to_string(),
    };
    let cents = (value.abs() * 100.0).round() as u64;
    let int_part = (cents / 100).to_string();
    let frac = cents % 100;
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped},{frac:02}")
}

/// Parse a comma-decimal string back to a float, if possible.
///
/// Plain `"1234.56"` parses directly; `"1.234,56"` is read as thousands-dot
/// / decimal-comma.
pub fn try_parse_comma_decimal(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }
    let swapped: String = trimmed
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    swapped.parse::<f64>().ok()
}

/// As [`try_parse_comma_decimal`], defaulting unparseable input to `0.0`.
pub fn parse_comma_decimal(value: &str) -> f64 {
    try_parse_comma_decimal(value).unwrap_or(0.0)
}

/// Parse a US-formatted currency string (`"$1,234.56"`) as exported by the
/// abandoned-cart report.
pub fn parse_us_currency(value: &str) -> Option<f64> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        cleaned.parse().ok()
    }
}

/// Days since the Unix epoch for a calendar date.
pub fn to_epoch_days(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) - UNIX_EPOCH_CE_DAYS
}

/// Calendar date for a days-since-epoch value.
pub fn from_epoch_days(days: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(Duration::days(days))
}

/// Parse the date portion of a backend timestamp.
///
/// Accepts `YYYY-MM-DD`, optionally followed by a time separated with a
/// space or `T`; anything else yields `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split([' ', 'T']).next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Parse a timestamp to epoch seconds, tolerating date-only values.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    parse_date(trimmed)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// Render an epoch-day value as `DD/MM/YYYY`, or `N/A` when missing.
pub fn format_date_dmy(days: Option<i64>) -> String {
    days.and_then(from_epoch_days)
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Calendar-quarter label (`YYYY-Qn`) for a date.
pub fn quarter_label(date: NaiveDate) -> String {
    format!("{}-Q{}", date.year(), (date.month() - 1) / 3 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sku_pads_numeric() {
        assert_eq!(normalize_sku("123"), "00123");
        assert_eq!(normalize_sku("12 34"), "01234");
        assert_eq!(normalize_sku(" 98765 "), "98765");
        assert_eq!(normalize_sku("123456"), "123456");
    }

    #[test]
    fn test_normalize_sku_passes_non_numeric_through() {
        assert_eq!(normalize_sku("AB-12"), "AB-12");
        assert_eq!(normalize_sku(" AB 12 "), "AB12");
        assert_eq!(normalize_sku(""), "");
    }

    #[test]
    fn test_clean_category_takes_last_segment() {
        assert_eq!(clean_category(Some("Root/Electricidad/Cables")), "Cables");
        assert_eq!(
            clean_category(Some("Root/Pisos,Root/Pisos/Porcelanato")),
            "Porcelanato"
        );
        assert_eq!(clean_category(Some("  ")), NO_CATEGORY);
        assert_eq!(clean_category(None), NO_CATEGORY);
    }

    #[test]
    fn test_format_comma_decimal() {
        assert_eq!(format_comma_decimal(Some(1234.56)), "1.234,56");
        assert_eq!(format_comma_decimal(Some(1_100_000.0)), "1.100.000,00");
        assert_eq!(format_comma_decimal(Some(0.5)), "0,50");
        assert_eq!(format_comma_decimal(Some(-42.1)), "-42,10");
        assert_eq!(format_comma_decimal(None), "0,00");
        assert_eq!(format_comma_decimal(Some(f64::NAN)), "0,00");
    }

    #[test]
    fn test_parse_comma_decimal_round_trip() {
        for value in [0.0, 12.5, 999.99, 1234.56, 1_100_000.0, 98_765_432.1] {
            let rendered = format_comma_decimal(Some(value));
            let parsed = parse_comma_decimal(&rendered);
            assert!(
                (parsed - value).abs() < 0.005,
                "{value} -> {rendered} -> {parsed}"
            );
        }
    }

    #[test]
    fn test_parse_comma_decimal_handles_plain_numbers() {
        assert_eq!(parse_comma_decimal("1234.56"), 1234.56);
        assert_eq!(parse_comma_decimal("0,00"), 0.0);
        assert_eq!(parse_comma_decimal("garbage"), 0.0);
        assert_eq!(try_parse_comma_decimal("garbage"), None);
        assert_eq!(try_parse_comma_decimal(""), None);
    }

    #[test]
    fn test_parse_us_currency() {
        assert_eq!(parse_us_currency("$1,234.56"), Some(1234.56));
        assert_eq!(parse_us_currency("350000"), Some(350000.0));
        assert_eq!(parse_us_currency(""), None);
        assert_eq!(parse_us_currency("n/a"), None);
    }

    #[test]
    fn test_epoch_day_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let days = to_epoch_days(date);
        assert_eq!(from_epoch_days(days), Some(date));
        assert_eq!(to_epoch_days(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
    }

    #[test]
    fn test_parse_date_accepts_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert_eq!(parse_date("2024-05-01"), expected);
        assert_eq!(parse_date("2024-05-01 10:30:00"), expected);
        assert_eq!(parse_date("2024-05-01T10:30:00"), expected);
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_format_date_dmy() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(format_date_dmy(Some(to_epoch_days(date))), "15/01/2024");
        assert_eq!(format_date_dmy(None), "N/A");
    }

    #[test]
    fn test_quarter_label() {
        assert_eq!(
            quarter_label(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()),
            "2024-Q2"
        );
        assert_eq!(
            quarter_label(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            "2023-Q4"
        );
    }
}
