//! Line-oriented parser for OCR text of a Tip Distribution Report.
//!
//! Parsing never fails: anything that cannot be located is left empty (or `0.0`) so the
//! reviewer can fill it in. Header labels may appear anywhere in the document, including
//! after the `Total Tippable Hours:` footer; when a label is repeated, the last occurrence
//! wins.

use crate::types::{Report, ReportRow, RowField};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const STORE_NUMBER: &str = "Store Number:";
const TIME_PERIOD: &str = "Time Period:";
const EXECUTED_BY: &str = "Executed By:";
const EXECUTED_ON: &str = "Executed On:";
const TOTAL_TIPPABLE_HOURS: &str = "Total Tippable Hours:";

/// Substrings that together identify the table header line.
const TABLE_HEADER_MARKERS: [&str; 4] = [
    "Home Store",
    "Partner Name",
    "Partner Number",
    "Total Tippable Hours",
];

/// Columns are separated by two or more whitespace characters; names contain single spaces.
fn column_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").expect("valid column separator regex"))
}

fn spaced_hyphen() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+-\s+").expect("valid period separator regex"))
}

/// Parse raw extracted text into a best-effort [`Report`].
pub fn parse_report(text: &str) -> Report {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut report = Report::default();

    for line in &lines {
        if let Some(rest) = line.strip_prefix(STORE_NUMBER) {
            report.store_number = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix(TIME_PERIOD) {
            let (start, end) = split_period(rest).unwrap_or_default();
            report.time_period_start = start;
            report.time_period_end = end;
        } else if let Some(rest) = line.strip_prefix(EXECUTED_BY) {
            report.executed_by = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix(EXECUTED_ON) {
            report.executed_on = rest.trim().to_string();
        }
    }

    let header_idx = lines.iter().position(|l| is_table_header(l));
    let search_from = header_idx.unwrap_or(0);
    let footer_idx = lines[search_from..]
        .iter()
        .position(|l| l.starts_with(TOTAL_TIPPABLE_HOURS))
        .map(|i| i + search_from);

    if let Some(end) = footer_idx {
        report.total_tippable_hours_reported = lines[end]
            .strip_prefix(TOTAL_TIPPABLE_HOURS)
            .and_then(|rest| parse_hours(rest.trim()))
            .unwrap_or(0.0);
    }

    match (header_idx, footer_idx) {
        (Some(start), Some(end)) if end > start => {
            for line in &lines[start + 1..end] {
                match parse_table_row(line) {
                    Some(row) => report.rows.push(row),
                    None => tracing::debug!(line = %line, "skipping unparseable table line"),
                }
            }
        }
        (Some(_), None) => {
            tracing::debug!("table header found without a Total Tippable Hours footer; no rows parsed");
        }
        _ => {}
    }

    report
}

fn is_table_header(line: &str) -> bool {
    TABLE_HEADER_MARKERS.iter().all(|m| line.contains(m))
}

/// Split a period like `2025-01-13 - 2025-01-19` or `01/13/2025-01/19/2025` into two tokens.
fn split_period(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    let parts: Vec<&str> = if spaced_hyphen().is_match(text) {
        spaced_hyphen().split(text).collect()
    } else {
        text.split('-').collect()
    };
    match parts.as_slice() {
        [start, end] => {
            let (start, end) = (start.trim(), end.trim());
            if start.is_empty() || end.is_empty() {
                None
            } else {
                Some((start.to_string(), end.to_string()))
            }
        }
        _ => None,
    }
}

/// Finite, non-negative hour figure.
fn parse_hours(text: &str) -> Option<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|h| h.is_finite() && *h >= 0.0)
}

/// Parse one data line, e.g. `69600         Ailuogwemhe, Jodie O      US37008498       18.48`.
fn parse_table_row(line: &str) -> Option<ReportRow> {
    let parts: Vec<&str> = column_separator()
        .split(line)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let [home_store, partner_name, partner_number, hours_text, ..] = parts.as_slice() else {
        return None;
    };

    let tippable_hours = parse_hours(hours_text)?;

    let mut uncertain_fields = BTreeSet::new();
    if hours_look_uncertain(hours_text) {
        uncertain_fields.insert(RowField::TippableHours);
    }

    Some(ReportRow {
        home_store: home_store.to_string(),
        partner_name: partner_name.to_string(),
        partner_number: partner_number.to_string(),
        tippable_hours,
        uncertain_fields,
    })
}

/// Stand-in for a real OCR confidence signal: exactly two decimals ending in 3 or 8.
fn hours_look_uncertain(text: &str) -> bool {
    let Some((_, fraction)) = text.split_once('.') else {
        return false;
    };
    fraction.len() == 2
        && fraction.chars().all(|c| c.is_ascii_digit())
        && (fraction.ends_with('3') || fraction.ends_with('8'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::SAMPLE_REPORT_TEXT;

    const TABLE_HEADER: &str =
        "Home Store    Partner Name              Partner Number    Total Tippable Hours";

    fn table(body: &[&str], footer: &str) -> String {
        let mut text = String::from(TABLE_HEADER);
        for line in body {
            text.push('\n');
            text.push_str(line);
        }
        text.push('\n');
        text.push_str(footer);
        text
    }

    #[test]
    fn parses_header_fields() {
        let text = "Store Number: 69600\n\
                    Time Period: 2025-01-13 - 2025-01-19\n\
                    Executed By: SM12345\n\
                    Executed On: 2025-01-20 08:15:23\n";
        let report = parse_report(text);
        assert_eq!(report.store_number, "69600");
        assert_eq!(report.time_period_start, "2025-01-13");
        assert_eq!(report.time_period_end, "2025-01-19");
        assert_eq!(report.executed_by, "SM12345");
        assert_eq!(report.executed_on, "2025-01-20 08:15:23");
        assert!(report.rows.is_empty());
        assert_eq!(report.total_tippable_hours_reported, 0.0);
    }

    #[test]
    fn period_with_bare_hyphen_splits_into_two() {
        let report = parse_report("Time Period:   01/13/2025-01/19/2025  ");
        assert_eq!(report.time_period_start, "01/13/2025");
        assert_eq!(report.time_period_end, "01/19/2025");
    }

    #[test]
    fn period_that_does_not_split_in_two_stays_empty() {
        for text in [
            "Time Period: 2025-01-13 to 2025-01-19",
            "Time Period: 2025-01-13",
            "Time Period: a - b - c",
            "Time Period: 2025-01-13 -",
        ] {
            let report = parse_report(text);
            assert_eq!(report.time_period_start, "", "{text}");
            assert_eq!(report.time_period_end, "", "{text}");
        }
    }

    #[test]
    fn repeated_label_keeps_last_value() {
        let report = parse_report("Store Number: 111\nStore Number: 222");
        assert_eq!(report.store_number, "222");
    }

    #[test]
    fn labels_after_footer_still_override() {
        let text = format!(
            "Store Number: 5\n{}\nStore Number: 9",
            table(&["5    A    N1    1.00"], "Total Tippable Hours: 1.00")
        );
        let report = parse_report(&text);
        assert_eq!(report.store_number, "9");
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.total_tippable_hours_reported, 1.0);
    }

    #[test]
    fn extracts_single_row_and_footer() {
        let text = table(
            &["69600         Ailuogwemhe, Jodie O      US37008498       18.48"],
            "Total Tippable Hours: 107.98",
        );
        let report = parse_report(&text);
        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.home_store, "69600");
        assert_eq!(row.partner_name, "Ailuogwemhe, Jodie O");
        assert_eq!(row.partner_number, "US37008498");
        assert_eq!(row.tippable_hours, 18.48);
        assert_eq!(report.total_tippable_hours_reported, 107.98);
    }

    #[test]
    fn flags_hours_ending_in_three_or_eight() {
        let text = table(
            &[
                "69600    A One    N1    18.48",
                "69600    B Two    N2    12.33",
                "69600    C Three    N3    22.75",
                "69600    D Four    N4    19.5",
                "69600    E Five    N5    8",
                "69600    F Six    N6    7.123",
            ],
            "Total Tippable Hours: 0",
        );
        let report = parse_report(&text);
        let flagged: Vec<bool> = report
            .rows
            .iter()
            .map(|r| r.is_uncertain(RowField::TippableHours))
            .collect();
        assert_eq!(flagged, vec![true, true, false, false, false, false]);
        assert!(report.rows[2].uncertain_fields.is_empty());
    }

    #[test]
    fn malformed_rows_are_dropped() {
        let text = table(
            &[
                "69600 Jodie US1 18.00",
                "69600    Only Three    US1",
                "69600    Anderson, Sarah M    US36955947    n/a",
                "69600    Chen, Michael K    US37012334    -4.00",
                "69600    Davis, Jennifer L    US36998765    31.50",
            ],
            "Total Tippable Hours: 31.50",
        );
        let report = parse_report(&text);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].partner_name, "Davis, Jennifer L");
    }

    #[test]
    fn extra_columns_are_ignored() {
        let text = table(
            &["69600    Martinez, Carlos R    US37015678    19.00    trailing"],
            "Total Tippable Hours: 19.00",
        );
        let report = parse_report(&text);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].tippable_hours, 19.0);
    }

    #[test]
    fn missing_footer_yields_no_rows() {
        let text = format!("{TABLE_HEADER}\n69600    Davis, Jennifer L    US36998765    31.50");
        let report = parse_report(&text);
        assert!(report.rows.is_empty());
        assert_eq!(report.total_tippable_hours_reported, 0.0);
    }

    #[test]
    fn footer_without_table_still_reports_total() {
        let report = parse_report("Store Number: 1\nTotal Tippable Hours: 42.50");
        assert!(report.rows.is_empty());
        assert_eq!(report.total_tippable_hours_reported, 42.5);
    }

    #[test]
    fn unparseable_footer_total_is_zero() {
        let text = table(&["69600    A    N1    1.00"], "Total Tippable Hours: ???");
        let report = parse_report(&text);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.total_tippable_hours_reported, 0.0);
    }

    #[test]
    fn empty_and_garbage_input_do_not_panic() {
        assert_eq!(parse_report(""), Report::default());
        let report = parse_report("\n\n   \n@@@@\nTotal Tippable Hours:");
        assert!(report.rows.is_empty());
    }

    #[test]
    fn parses_sample_report() {
        let report = parse_report(SAMPLE_REPORT_TEXT);
        assert_eq!(report.store_number, "69600");
        assert_eq!(report.time_period_start, "2025-01-13");
        assert_eq!(report.time_period_end, "2025-01-19");
        assert_eq!(report.rows.len(), 5);
        assert_eq!(report.rows[4].partner_name, "Martinez, Carlos R");
        assert_eq!(report.total_tippable_hours_reported, 107.98);
        let uncertain: Vec<usize> = report
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.uncertain_fields.is_empty())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(uncertain, vec![0]);
    }
}
