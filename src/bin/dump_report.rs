//! Developer utility: parse a saved OCR text dump and print what the parser sees.
//!
//! Usage: `dump_report <file.txt> [--tips 1234.56] [--adjustments -10] [--tsv]`

use clap::Parser;
use std::path::PathBuf;
use tip_distribution_lib::{calculator, export, parser, review, types::DistributionInputs};

#[derive(Parser)]
#[command(name = "dump_report", about = "Parse a tip report text dump")]
struct Args {
    /// OCR text file; use `-` for stdin.
    input: PathBuf,

    /// Tip pool; when given, the distribution is printed as CSV.
    #[arg(long)]
    tips: Option<f64>,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    adjustments: f64,

    /// Print tab-delimited output instead of CSV.
    #[arg(long)]
    tsv: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tip_distribution_lib::init_tracing();
    let args = Args::parse();

    let text = if args.input.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(&args.input)?
    };

    let report = parser::parse_report(&text);
    println!("{}", serde_json::to_string_pretty(&report)?);

    let check = review::check_hours(&report);
    println!(
        "rows: {}  sum of rows: {:.2}  reported: {:.2}  {}",
        report.rows.len(),
        check.sum_of_rows,
        check.reported,
        if check.mismatch { "MISMATCH" } else { "ok" }
    );
    for idx in review::uncertain_rows(&report) {
        let row = &report.rows[idx];
        println!("uncertain: row {} {} ({:.2}h)", idx + 1, row.partner_name, row.tippable_hours);
    }

    if let Some(tips) = args.tips {
        let dist = calculator::calculate(&report.rows, DistributionInputs::new(tips, args.adjustments));
        println!("hourly rate: {:.2}", dist.hourly_rate);
        let out = if args.tsv {
            export::payouts_to_tsv(&dist.payouts, dist.hourly_rate, &report.store_number)
        } else {
            export::payouts_to_csv(&dist.payouts, dist.hourly_rate, &report.store_number)
        };
        println!("{out}");
    }
    Ok(())
}
