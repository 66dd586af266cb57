use crate::types::{Calculation, Distribution, DistributionInputs, Payout, Report, ReportRow};

/// Split `inputs.effective_total()` across rows in proportion to their tippable hours.
///
/// Payouts keep row order and are not rounded; rounding belongs to display and export.
/// A report with no hours yields a zero rate and no payouts.
pub fn calculate(rows: &[ReportRow], inputs: DistributionInputs) -> Distribution {
    let total_hours: f64 = rows.iter().map(|r| r.tippable_hours).sum();
    if total_hours == 0.0 {
        return Distribution {
            hourly_rate: 0.0,
            payouts: Vec::new(),
        };
    }

    let hourly_rate = inputs.effective_total() / total_hours;
    let payouts = rows
        .iter()
        .map(|row| Payout {
            partner_name: row.partner_name.clone(),
            partner_number: row.partner_number.clone(),
            tippable_hours: row.tippable_hours,
            tip_amount: row.tippable_hours * hourly_rate,
        })
        .collect();

    Distribution {
        hourly_rate,
        payouts,
    }
}

pub fn calculate_for_report(
    report: &Report,
    report_id: Option<i64>,
    inputs: DistributionInputs,
) -> Calculation {
    let Distribution {
        hourly_rate,
        payouts,
    } = calculate(&report.rows, inputs);
    Calculation {
        report_id,
        inputs,
        hourly_rate,
        payouts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_report;
    use crate::ocr::SAMPLE_REPORT_TEXT;

    fn rows(hours: &[f64]) -> Vec<ReportRow> {
        hours
            .iter()
            .enumerate()
            .map(|(i, h)| ReportRow {
                home_store: "69600".into(),
                partner_name: format!("Partner {i}"),
                partner_number: format!("US{i:08}"),
                tippable_hours: *h,
                uncertain_fields: Default::default(),
            })
            .collect()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0), "{a} != {b}");
    }

    #[test]
    fn splits_evenly_by_hours() {
        let dist = calculate(&rows(&[10.0, 20.0, 30.0]), DistributionInputs::new(120.0, 0.0));
        assert_eq!(dist.hourly_rate, 2.0);
        let amounts: Vec<f64> = dist.payouts.iter().map(|p| p.tip_amount).collect();
        assert_eq!(amounts, vec![20.0, 40.0, 60.0]);
        assert_eq!(dist.total_paid(), 120.0);
        assert_eq!(dist.payouts[1].partner_name, "Partner 1");
        assert_eq!(dist.payouts[2].tippable_hours, 30.0);
    }

    #[test]
    fn adjustments_change_the_pool() {
        let dist = calculate(&rows(&[10.0, 30.0]), DistributionInputs::new(100.0, -20.0));
        assert_eq!(dist.hourly_rate, 2.0);
        assert_eq!(dist.payouts[0].tip_amount, 20.0);
        assert_eq!(dist.payouts[1].tip_amount, 60.0);
    }

    #[test]
    fn zero_hours_yields_no_distribution() {
        let empty = calculate(&[], DistributionInputs::new(500.0, 0.0));
        assert_eq!(empty.hourly_rate, 0.0);
        assert!(empty.payouts.is_empty());

        let zeros = calculate(&rows(&[0.0, 0.0]), DistributionInputs::new(500.0, 25.0));
        assert_eq!(zeros.hourly_rate, 0.0);
        assert!(zeros.payouts.is_empty());
    }

    #[test]
    fn payouts_reconcile_with_effective_total() {
        let report = parse_report(SAMPLE_REPORT_TEXT);
        let inputs = DistributionInputs::new(1234.56, 17.89);
        let dist = calculate(&report.rows, inputs);
        assert_eq!(dist.payouts.len(), report.rows.len());
        assert_close(dist.total_paid(), inputs.effective_total());
        assert_close(dist.total_hours(), report.sum_of_row_hours());
        for (row, payout) in report.rows.iter().zip(&dist.payouts) {
            assert_eq!(row.partner_number, payout.partner_number);
        }
    }

    #[test]
    fn calculation_is_deterministic() {
        let r = rows(&[3.33, 7.77, 1.11]);
        let inputs = DistributionInputs::new(99.99, 0.01);
        assert_eq!(calculate(&r, inputs), calculate(&r, inputs));
    }

    #[test]
    fn calculation_for_report_carries_id_and_inputs() {
        let report = parse_report(SAMPLE_REPORT_TEXT);
        let inputs = DistributionInputs::new(500.0, 0.0);
        let calc = calculate_for_report(&report, Some(7), inputs);
        assert_eq!(calc.report_id, Some(7));
        assert_eq!(calc.inputs, inputs);
        assert_close(calc.hourly_rate, 500.0 / report.sum_of_row_hours());
        assert_eq!(calc.distribution().payouts.len(), 5);
    }
}
