//! Interval usage report parser
//!
//! The web site exports one row per ICP, meter, meter element and day:
//!
//! ```text
//! ICP<TAB>Meter number<TAB>Meter element<TAB>Date<TAB>00:30<TAB>01:00 ...
//! ```
//!
//! The four named columns are located by header name; every column after
//! `Date` is taken positionally as the half-hour kWh readings. The export is
//! normally tab-delimited but comma-delimited files are accepted too.

use crate::error::{PowershopError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Half-hour slots in one day
pub const INTERVALS_PER_DAY: usize = 48;

pub const ICP_COLUMN: &str = "ICP";
pub const METER_COLUMN: &str = "Meter number";
pub const ELEMENT_COLUMN: &str = "Meter element";
pub const DATE_COLUMN: &str = "Date";

/// One parsed report line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularRow {
    pub icp: String,
    pub meter_number: String,
    pub element: String,
    /// `None` when the date cell matched neither supported format
    pub date: Option<NaiveDate>,
    /// Always exactly [`INTERVALS_PER_DAY`] kWh values
    pub values: Vec<f64>,
}

/// Column positions resolved from the header line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    pub icp: usize,
    pub meter_number: usize,
    pub element: usize,
    pub date: usize,
}

impl ReportLayout {
    /// First interval column, immediately after `Date`
    pub fn first_interval(&self) -> usize {
        self.date + 1
    }

    fn resolve(header: &[String]) -> Option<Self> {
        let find = |name: &str| header.iter().position(|h| clean_cell(h) == name);
        Some(Self {
            icp: find(ICP_COLUMN)?,
            meter_number: find(METER_COLUMN)?,
            element: find(ELEMENT_COLUMN)?,
            date: find(DATE_COLUMN)?,
        })
    }
}

fn plain_split(line: &str, delimiter: u8) -> Vec<String> {
    line.split(char::from(delimiter)).map(str::to_string).collect()
}

/// Split one line into cells
///
/// Quotes are honoured for comma lines only; tab exports never quote.
fn split_line(line: &str, delimiter: u8) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .quoting(delimiter != b'\t')
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(str::to_string).collect(),
        _ => plain_split(line, delimiter),
    }
}

/// Trim whitespace and stray quote characters around a cell
fn clean_cell(cell: &str) -> &str {
    cell.trim().trim_matches('"').trim()
}

fn line_delimiter(line: &str) -> u8 {
    if line.contains('\t') { b'\t' } else { b',' }
}

/// Resolve the header, trying tab first and comma second
pub fn parse_header(line: &str) -> Result<ReportLayout> {
    let line = line.trim_start_matches('\u{feff}');
    [b'\t', b',']
        .into_iter()
        .find_map(|delim| ReportLayout::resolve(&split_line(line, delim)))
        .ok_or_else(|| {
            PowershopError::parse(format!(
                "Report header is missing one of {:?}",
                [ICP_COLUMN, METER_COLUMN, ELEMENT_COLUMN, DATE_COLUMN]
            ))
        })
}

/// `DD/MM/YYYY`, falling back to `YYYY-MM-DD`
pub fn parse_report_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    NaiveDate::parse_from_str(cell, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(cell, "%Y-%m-%d"))
        .ok()
}

/// Interval cells to exactly 48 values: blanks skipped, junk read as zero
pub fn parse_interval_values<'a, I>(cells: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut values: Vec<f64> = cells
        .into_iter()
        .map(clean_cell)
        .filter(|c| !c.is_empty())
        .map(|c| c.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0))
        .collect();
    values.resize(INTERVALS_PER_DAY, 0.0);
    values
}

/// Parse a whole report
///
/// Only an unusable header fails the parse; data lines shorter than the
/// first interval column are dropped and every other line yields a row.
pub fn parse_report(text: &str) -> Result<Vec<TabularRow>> {
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty());

    let Some(header) = lines.next() else {
        return Err(PowershopError::parse("Report is empty"));
    };
    let layout = parse_header(header)?;
    let first_interval = layout.first_interval();

    let mut rows = Vec::new();
    for line in lines {
        let delimiter = line_delimiter(line);
        let mut cells = split_line(line, delimiter);
        if cells.len() < first_interval {
            // An unbalanced quote can swallow the rest of the line
            cells = plain_split(line, delimiter);
        }
        if cells.len() < first_interval {
            continue;
        }
        let cell = |idx: usize| cells.get(idx).map_or("", |c| clean_cell(c)).to_string();
        rows.push(TabularRow {
            icp: cell(layout.icp),
            meter_number: cell(layout.meter_number),
            element: cell(layout.element),
            date: parse_report_date(&cell(layout.date)),
            values: parse_interval_values(cells[first_interval..].iter().map(String::as_str)),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_resolves_named_columns() {
        let layout = parse_header("Date\tICP\tMeter element\tMeter number\t00:30").unwrap();
        assert_eq!(layout.icp, 1);
        assert_eq!(layout.meter_number, 3);
        assert_eq!(layout.element, 2);
        assert_eq!(layout.date, 0);
        assert_eq!(layout.first_interval(), 1);
    }

    #[test]
    fn header_falls_back_to_comma() {
        let layout = parse_header("ICP,Meter number,Meter element,Date,00:30").unwrap();
        assert_eq!(layout.date, 3);
    }

    #[test]
    fn header_missing_column_fails() {
        assert!(parse_header("ICP\tMeter number\tDate").is_err());
        assert!(parse_report("").is_err());
    }

    #[test]
    fn dates_accept_both_formats() {
        assert_eq!(parse_report_date("05/08/2025"), NaiveDate::from_ymd_opt(2025, 8, 5));
        assert_eq!(parse_report_date("2025-08-05"), NaiveDate::from_ymd_opt(2025, 8, 5));
        assert_eq!(parse_report_date("Aug 5"), None);
    }

    #[test]
    fn values_skip_blanks_and_zero_junk() {
        let v = parse_interval_values(["1.5", "", "abc", " 2 "]);
        assert_eq!(v.len(), INTERVALS_PER_DAY);
        assert_eq!(&v[..3], &[1.5, 0.0, 2.0]);
        assert!(v[3..].iter().all(|x| *x == 0.0));
    }
}
