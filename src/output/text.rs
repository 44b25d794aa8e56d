//! Text report formatting

use super::SessionReport;

/// Render the report as log lines
///
/// One credit line per ledger entry, in sweep order, followed by a per-worker
/// summary and the winner line.
pub fn report_lines(report: &SessionReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.credits.len() + report.totals.len() + 2);

    for credit in &report.credits {
        lines.push(format!(
            "Child {} has earned a total value of {} on this job {}",
            credit.name, credit.value, credit.slot
        ));
    }

    if !report.totals.is_empty() {
        lines.push(String::new());
    }
    for total in &report.totals {
        lines.push(format!(
            "  {:<8} {:>3} jobs, value {}",
            total.name, total.jobs, total.total_value
        ));
    }

    match &report.winner {
        Some(winner) => lines.push(format!(
            "The winner for today is {}, who had a total of {}",
            winner.name, winner.total_value
        )),
        None => lines.push("No jobs were completed today; there is no winner".to_string()),
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, Ledger};

    #[test]
    fn test_report_lines() {
        let mut ledger = Ledger::new();
        let mut job = Job::new(9, 5, 5, 5).unwrap();
        job.claim(0).unwrap();
        job.complete(0).unwrap();
        ledger.record(job);

        let report = SessionReport::tally(&ledger, |_| "Ali".to_string(), 5);
        let lines = report_lines(&report);

        assert_eq!(lines[0], "Child Ali has earned a total value of 50 on this job 9");
        assert_eq!(
            lines.last().unwrap(),
            "The winner for today is Ali, who had a total of 55"
        );
    }

    #[test]
    fn test_report_lines_without_winner() {
        let report = SessionReport::tally(&Ledger::new(), |id| id.to_string(), 5);
        assert_eq!(report_lines(&report).len(), 1);
    }
}
