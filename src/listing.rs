//! Unix `ls -l` style directory listing parsing.
//!
//! FTP `LIST` replies carry nine whitespace separated fields:
//! permissions, links, owner, group, size, month, day, year-or-time and name.
//! Recent files show a time of day instead of a year, in which case the
//! current calendar year is assumed.

use crate::error::{PnadcError, Result};
use crate::models::RemoteEntry;
use chrono::{Datelike, Local, NaiveDateTime};
use tracing::debug;

const LISTING_FIELDS: usize = 9;

/// Parse one listing line of `directory` assuming today's calendar year
pub fn parse_listing_line(line: &str, directory: &str) -> Result<RemoteEntry> {
    parse_listing_line_in_year(line, directory, Local::now().year())
}

/// Parse one listing line, resolving time-only stamps to `current_year`
pub fn parse_listing_line_in_year(
    line: &str,
    directory: &str,
    current_year: i32,
) -> Result<RemoteEntry> {
    let malformed = |reason: String| PnadcError::ListingParse {
        directory: directory.to_string(),
        line: line.to_string(),
        reason,
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != LISTING_FIELDS {
        return Err(malformed(format!(
            "expected {} fields, found {}",
            LISTING_FIELDS,
            fields.len()
        )));
    }

    let (size, month, day, year_or_hour, name) =
        (fields[4], fields[5], fields[6], fields[7], fields[8]);

    let (year, hour) = if year_or_hour.contains(':') {
        (current_year.to_string(), year_or_hour)
    } else {
        (year_or_hour.to_string(), "00:00")
    };

    let stamp = format!("{} {} {} {}", year, month, day, hour);
    let modified = NaiveDateTime::parse_from_str(&stamp, "%Y %b %d %H:%M")
        .map_err(|e| malformed(format!("invalid timestamp {:?}: {}", stamp, e)))?;

    Ok(RemoteEntry {
        modified,
        size: size.parse::<u64>().ok(),
        filename: name.to_string(),
        full_path: format!("{}/{}", directory, name),
    })
}

/// Parse a complete listing; the first malformed line fails the whole listing
pub fn parse_listing<S: AsRef<str>>(lines: &[S], directory: &str) -> Result<Vec<RemoteEntry>> {
    parse_listing_in_year(lines, directory, Local::now().year())
}

/// [`parse_listing`] with an explicit year for time-only stamps
pub fn parse_listing_in_year<S: AsRef<str>>(
    lines: &[S],
    directory: &str,
    current_year: i32,
) -> Result<Vec<RemoteEntry>> {
    let entries = lines
        .iter()
        .map(|line| line.as_ref())
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_listing_line_in_year(line, directory, current_year))
        .collect::<Result<Vec<_>>>()?;

    debug!("Parsed {} entries from {}", entries.len(), directory);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const DIR: &str = "/Microdados/2021";

    #[test]
    fn test_time_of_day_resolves_to_current_year() {
        let line = "-rw-r--r--   1 ftp ftp  145678123 Nov 30 14:32 PNADC_032021.zip";
        let entry = parse_listing_line_in_year(line, DIR, 2024).unwrap();

        let expected = NaiveDate::from_ymd_opt(2024, 11, 30)
            .unwrap()
            .and_hms_opt(14, 32, 0)
            .unwrap();
        assert_eq!(entry.modified, expected);
        assert_eq!(entry.size, Some(145_678_123));
        assert_eq!(entry.filename, "PNADC_032021.zip");
        assert_eq!(entry.full_path, "/Microdados/2021/PNADC_032021.zip");
    }

    #[test]
    fn test_time_of_day_uses_wall_clock_year() {
        let line = "-rw-r--r--   1 ftp ftp  100 Jan 05 09:15 PNADC_012023.zip";
        let entry = parse_listing_line(line, DIR).unwrap();
        assert_eq!(entry.modified.year(), Local::now().year());
    }

    #[test]
    fn test_year_field_resolves_to_midnight() {
        let line = "-rw-r--r--   1 ftp ftp  98765 Mar  5  2021 PNADC_042020.zip";
        let entry = parse_listing_line_in_year(line, DIR, 2024).unwrap();

        let expected = NaiveDate::from_ymd_opt(2021, 3, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(entry.modified, expected);
    }

    #[test]
    fn test_non_numeric_size_is_absent() {
        let line = "drwxr-xr-x   2 ftp ftp  <DIR> Jun 10  2019 Documentacao";
        let entry = parse_listing_line_in_year(line, DIR, 2024).unwrap();
        assert_eq!(entry.size, None);
        assert_eq!(entry.filename, "Documentacao");
    }

    #[test]
    fn test_wrong_field_count_is_rejected() {
        let line = "-rw-r--r--   1 ftp ftp 123 Jan 01 2020 name with spaces.zip";
        let err = parse_listing_line_in_year(line, DIR, 2024).unwrap_err();
        assert!(matches!(err, PnadcError::ListingParse { .. }));

        let err = parse_listing_line_in_year("total 12", DIR, 2024).unwrap_err();
        assert!(matches!(err, PnadcError::ListingParse { .. }));
    }

    #[test]
    fn test_bad_month_is_rejected() {
        let line = "-rw-r--r--   1 ftp ftp 123 Foo 01 2020 PNADC_012020.zip";
        let err = parse_listing_line_in_year(line, DIR, 2024).unwrap_err();
        match err {
            PnadcError::ListingParse { reason, .. } => assert!(reason.contains("timestamp")),
            other => panic!("Expected ListingParse error, got {:?}", other),
        }
    }

    #[test]
    fn test_listing_fails_as_a_unit() {
        let lines = vec![
            "-rw-r--r--   1 ftp ftp 10 Jan 01 2020 PNADC_012020.zip".to_string(),
            "garbage".to_string(),
        ];
        assert!(parse_listing(&lines, DIR).is_err());

        let lines = vec![
            "-rw-r--r--   1 ftp ftp 10 Jan 01 2020 PNADC_012020.zip",
            "",
            "-rw-r--r--   1 ftp ftp 20 Apr 01 2020 PNADC_022020.zip",
        ];
        let entries = parse_listing(&lines, DIR).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
