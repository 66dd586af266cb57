//! Payout exports. Rounding to cents happens here and nowhere else.

use crate::error::ExportError;
use crate::types::{Distribution, Payout, Report};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, XlsxError};
use std::path::{Path, PathBuf};

const EXPORT_HEADERS: [&str; 6] = [
    "Partner Name",
    "Partner Number",
    "Tippable Hours",
    "Tip Amount",
    "Hourly Rate",
    "Store Number",
];

/// CSV with quoted identity columns and two-decimal numbers. No trailing newline.
pub fn payouts_to_csv(payouts: &[Payout], hourly_rate: f64, store_number: &str) -> String {
    let mut lines = Vec::with_capacity(payouts.len() + 1);
    lines.push(EXPORT_HEADERS.join(","));
    for p in payouts {
        lines.push(format!(
            "{},{},{},{},{},{}",
            quote_csv(&p.partner_name),
            quote_csv(&p.partner_number),
            fixed2(p.tippable_hours),
            fixed2(p.tip_amount),
            fixed2(hourly_rate),
            csv_store_number(store_number)
        ));
    }
    lines.join("\n")
}

/// Tab-delimited variant for pasting into a spreadsheet. No quoting.
pub fn payouts_to_tsv(payouts: &[Payout], hourly_rate: f64, store_number: &str) -> String {
    let mut lines = Vec::with_capacity(payouts.len() + 1);
    lines.push(EXPORT_HEADERS.join("\t"));
    for p in payouts {
        lines.push(format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            flatten_tsv(&p.partner_name),
            flatten_tsv(&p.partner_number),
            fixed2(p.tippable_hours),
            fixed2(p.tip_amount),
            fixed2(hourly_rate),
            flatten_tsv(store_number)
        ));
    }
    lines.join("\n")
}

pub fn csv_file_name(report: &Report) -> String {
    format!(
        "tip-distribution-{}-{}.csv",
        report.store_number, report.time_period_end
    )
}

/// Two-decimal rendering where an exact half-cent rounds away from zero.
///
/// `{:.2}` rounds exact binary ties to even (`0.125` -> `0.12`). An f64 sits exactly on a
/// half-cent only when it is an odd number of eighths, so that case is rounded by hand.
fn fixed2(n: f64) -> String {
    let eighths = n * 8.0;
    if n.is_finite() && eighths.fract() == 0.0 && eighths % 2.0 != 0.0 && n.abs() < 1e12 {
        format!("{:.2}", (n * 100.0).round() / 100.0)
    } else {
        format!("{:.2}", n)
    }
}

/// Store numbers are written bare; anything that would break the row gets quoted.
fn csv_store_number(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        quote_csv(s)
    } else {
        s.to_string()
    }
}

fn quote_csv(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn flatten_tsv(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

/// Write the distribution to a new workbook at `path`, forcing an `.xlsx` extension.
/// Returns the path actually written.
pub fn export_payouts_to_xlsx(
    path: &Path,
    report: &Report,
    distribution: &Distribution,
) -> Result<PathBuf, ExportError> {
    if path.as_os_str().is_empty() {
        return Err(ExportError::InvalidPath("empty path".into()));
    }
    let mut path = path.to_path_buf();
    if path.extension().and_then(|e| e.to_str()) != Some("xlsx") {
        path.set_extension("xlsx");
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Tip Distribution")?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x2563EB))
        .set_font_color(Color::RGB(0xFFFFFF));
    let number_format = Format::new()
        .set_num_format("0.00")
        .set_align(FormatAlign::Right);
    let text_format = Format::new();

    for (col, header) in EXPORT_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (idx, p) in distribution.payouts.iter().enumerate() {
        let row = (idx + 1) as u32;
        worksheet.write_string_with_format(row, 0, &p.partner_name, &text_format)?;
        worksheet.write_string_with_format(row, 1, &p.partner_number, &text_format)?;
        worksheet.write_number_with_format(row, 2, round_cents(p.tippable_hours), &number_format)?;
        worksheet.write_number_with_format(row, 3, round_cents(p.tip_amount), &number_format)?;
        worksheet.write_number_with_format(
            row,
            4,
            round_cents(distribution.hourly_rate),
            &number_format,
        )?;
        worksheet.write_string_with_format(row, 5, &report.store_number, &text_format)?;
    }

    for (col, width) in [28.0, 16.0, 15.0, 12.0, 12.0, 14.0].into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    workbook.save(&path).map_err(|e: XlsxError| {
        tracing::error!(path = %path.display(), error = %e, "failed to save workbook");
        ExportError::from(e)
    })?;
    Ok(path)
}

fn round_cents(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}
