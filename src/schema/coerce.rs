//! Raw text coercions.
//!
//! Scalar parsers for the registry's text encodings plus [`coerce_column`],
//! which applies a [`Coercion`] to a whole raw column and yields an Arrow array.
//! Unparseable values become null; coercion never fails on bad input.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Date32Builder, Float64Builder, StringBuilder};
use arrow::datatypes::Date32Type;
use chrono::NaiveDate;

use crate::schema::field::Coercion;

/// Trimmed value, `None` when empty
#[inline]
fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Left-pad a numeric identifier with zeros; longer values are kept as they are
#[must_use]
pub fn zero_pad(raw: &str, width: usize) -> Option<String> {
    non_empty(raw).map(|value| format!("{value:0>width$}"))
}

/// Parse `YYYYMMDD` text into a calendar date
///
/// Anything that is not eight digits forming a valid date (including
/// `"00000000"` and `"0"`) yields `None`.
#[must_use]
pub fn parse_compact_date(raw: &str) -> Option<NaiveDate> {
    let value = non_empty(raw)?;
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year = value[0..4].parse::<i32>().ok()?;
    let month = value[4..6].parse::<u32>().ok()?;
    let day = value[6..8].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a decimal written with `.` thousands separators and `,` decimal mark
///
/// `"1.234,56"` becomes `1234.56`.
#[must_use]
pub fn parse_capital(raw: &str) -> Option<f64> {
    let value = non_empty(raw)?;
    let normalized: String = value
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalize a postal code to a fixed-width digit string
///
/// Dashes are removed, a decimal suffix (`"1234.0"`) is dropped and a missing
/// value becomes `"0"` before padding.
#[must_use]
pub fn normalize_postal_code(raw: &str, width: usize) -> String {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '-').collect();
    let integral = cleaned.split('.').next().unwrap_or_default();
    let value = if integral.is_empty() { "0" } else { integral };
    format!("{value:0>width$}")
}

/// Exact match of the trimmed raw value against the sentinel
#[must_use]
pub fn parse_flag(raw: &str, sentinel: &str) -> bool {
    raw.trim() == sentinel
}

/// Days since the epoch as stored in a `Date32` column
#[must_use]
pub fn date_to_days(date: NaiveDate) -> i32 {
    Date32Type::from_naive_date(date)
}

/// Apply a coercion to a full raw column
#[must_use]
pub fn coerce_column(values: &[String], coercion: Coercion) -> ArrayRef {
    match coercion {
        Coercion::Text => {
            let mut builder = StringBuilder::with_capacity(values.len(), values.len() * 16);
            for raw in values {
                if raw.trim().is_empty() {
                    builder.append_null();
                } else {
                    builder.append_value(raw);
                }
            }
            Arc::new(builder.finish())
        }
        Coercion::ZeroPad { width } => {
            let mut builder = StringBuilder::with_capacity(values.len(), values.len() * width);
            for raw in values {
                builder.append_option(zero_pad(raw, width));
            }
            Arc::new(builder.finish())
        }
        Coercion::PostalCode { width } => {
            let mut builder = StringBuilder::with_capacity(values.len(), values.len() * width);
            for raw in values {
                builder.append_value(normalize_postal_code(raw, width));
            }
            Arc::new(builder.finish())
        }
        Coercion::CompactDate => {
            let mut builder = Date32Builder::with_capacity(values.len());
            for raw in values {
                builder.append_option(parse_compact_date(raw).map(date_to_days));
            }
            Arc::new(builder.finish())
        }
        Coercion::Capital => {
            let mut builder = Float64Builder::with_capacity(values.len());
            for raw in values {
                builder.append_option(parse_capital(raw));
            }
            Arc::new(builder.finish())
        }
        Coercion::Flag { sentinel } => {
            let mut builder = BooleanBuilder::with_capacity(values.len());
            for raw in values {
                builder.append_value(parse_flag(raw, sentinel));
            }
            Arc::new(builder.finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Date32Array, Float64Array, StringArray};

    #[test]
    fn compact_dates() {
        assert_eq!(
            parse_compact_date("20200115"),
            NaiveDate::from_ymd_opt(2020, 1, 15)
        );
        assert_eq!(parse_compact_date("00000000"), None);
        assert_eq!(parse_compact_date("0"), None);
        assert_eq!(parse_compact_date("2020O115"), None);
        assert_eq!(parse_compact_date("20200230"), None);
        assert_eq!(parse_compact_date(""), None);
        assert_eq!(
            parse_compact_date(" 19991231 "),
            NaiveDate::from_ymd_opt(1999, 12, 31)
        );
    }

    #[test]
    fn capital_values() {
        assert_eq!(parse_capital("1.234,56"), Some(1234.56));
        assert_eq!(parse_capital("0,00"), Some(0.0));
        assert_eq!(parse_capital("1.000.000,00"), Some(1_000_000.0));
        assert_eq!(parse_capital("abc"), None);
        assert_eq!(parse_capital(""), None);
    }

    #[test]
    fn padding() {
        assert_eq!(zero_pad("123", 8).as_deref(), Some("00000123"));
        assert_eq!(zero_pad(" 1 ", 4).as_deref(), Some("0001"));
        assert_eq!(zero_pad("123456789", 8).as_deref(), Some("123456789"));
        assert_eq!(zero_pad("", 8), None);
    }

    #[test]
    fn postal_codes() {
        assert_eq!(normalize_postal_code("01310-100", 8), "01310100");
        assert_eq!(normalize_postal_code("1310100.0", 8), "01310100");
        assert_eq!(normalize_postal_code("", 8), "00000000");
    }

    #[test]
    fn flags() {
        assert!(parse_flag("1", "1"));
        assert!(parse_flag(" 1 ", "1"));
        assert!(!parse_flag("2", "1"));
        assert!(!parse_flag("", "1"));
    }

    #[test]
    fn column_coercion_nulls_bad_values() {
        let raw = vec!["20200115".to_string(), "garbage".to_string()];
        let dates = coerce_column(&raw, Coercion::CompactDate);
        let dates = dates.as_any().downcast_ref::<Date32Array>().unwrap();
        assert_eq!(
            dates.value_as_date(0),
            NaiveDate::from_ymd_opt(2020, 1, 15)
        );
        assert!(dates.is_null(1));

        let raw = vec!["1.234,56".to_string(), String::new()];
        let capital = coerce_column(&raw, Coercion::Capital);
        let capital = capital.as_any().downcast_ref::<Float64Array>().unwrap();
        assert!((capital.value(0) - 1234.56).abs() < f64::EPSILON);
        assert!(capital.is_null(1));

        let raw = vec!["12".to_string(), String::new()];
        let ids = coerce_column(&raw, Coercion::ZeroPad { width: 8 });
        let ids = ids.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(ids.value(0), "00000012");
        assert!(ids.is_null(1));
    }
}
