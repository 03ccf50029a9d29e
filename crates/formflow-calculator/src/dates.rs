//! Calendar string helpers shared by the date calculators and form validation.
//!
//! Two shapes are understood: `YYYY-MM` (a month, read as its first day) and
//! `YYYY-MM-DD`. Shape checks are purely lexical; [`normalize_date`] additionally
//! requires a real calendar date.

use chrono::NaiveDate;

fn digits_with_dashes(value: &str, dashes: &[usize]) -> bool {
    value
        .bytes()
        .enumerate()
        .all(|(i, b)| if dashes.contains(&i) { b == b'-' } else { b.is_ascii_digit() })
}

/// `YYYY-MM-DD` by shape only
pub fn is_date_shape(value: &str) -> bool {
    value.len() == 10 && digits_with_dashes(value, &[4, 7])
}

/// `YYYY-MM` by shape only
pub fn is_month_shape(value: &str) -> bool {
    value.len() == 7 && digits_with_dashes(value, &[4])
}

/// Reads a `YYYY-MM` or `YYYY-MM-DD` string as a date. A month maps to its first day.
/// Wrong shapes and impossible dates (`2023-02-30`, `2023-13`) yield `None`.
pub fn normalize_date(value: &str) -> Option<NaiveDate> {
    if is_month_shape(value) {
        let year = value[0..4].parse().ok()?;
        let month = value[5..7].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    if is_date_shape(value) {
        return NaiveDate::parse_from_str(value, "%Y-%m-%d").ok();
    }
    None
}
