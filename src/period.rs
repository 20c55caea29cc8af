//! Survey period extraction from data filenames.
//!
//! IBGE names quarterly archives with a two-digit quarter immediately
//! followed by a `20xx` year, e.g. `PNADC_042012.zip`.

use crate::error::{PnadcError, Result};
use crate::models::Period;
use regex::Regex;
use std::sync::LazyLock;

static PERIOD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2})(20\d{2})").expect("period pattern is a valid regex")
});

/// Resolve the period encoded in a data filename
///
/// The first quarter+year token wins. A filename without one, or whose
/// quarter is outside 1..=4, is an error, never a default period.
pub fn resolve_period(filename: &str) -> Result<Period> {
    let captures = PERIOD_PATTERN
        .captures(filename)
        .ok_or_else(|| PnadcError::PeriodParse {
            filename: filename.to_string(),
        })?;

    // Both groups are pure ASCII digits of bounded length
    let quarter: u32 = captures[1].parse().map_err(|_| PnadcError::PeriodParse {
        filename: filename.to_string(),
    })?;
    let year: i32 = captures[2].parse().map_err(|_| PnadcError::PeriodParse {
        filename: filename.to_string(),
    })?;

    if !(1..=4).contains(&quarter) {
        return Err(PnadcError::PeriodParse {
            filename: filename.to_string(),
        });
    }

    Ok(Period::new(year, quarter))
}
