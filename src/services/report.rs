use crate::services::backfill::{BackfillReport, Termination};
use std::fmt;

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Completed => write!(f, "completed"),
            Termination::Stalled { remaining } => {
                write!(f, "stalled ({} rows still unset)", remaining)
            }
        }
    }
}

// the summary table printed at the end of a run
impl fmt::Display for BackfillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.finished_at - self.started_at;

        writeln!(f, "Distance backfill {}", self.run_id)?;
        writeln!(f, "  {:<24}{:>12}", "records", self.total_records)?;
        writeln!(f, "  {:<24}{:>12}", "pending at start", self.pending_at_start)?;
        writeln!(f, "  {:<24}{:>12}", "processed", self.processed)?;
        writeln!(f, "  {:<24}{:>12}", "batches", self.batches)?;
        writeln!(f, "  {:<24}{:>12}", "failed batches", self.failed_batches)?;
        writeln!(
            f,
            "  {:<24}{:>11.1}s",
            "elapsed",
            elapsed.num_milliseconds() as f64 / 1000.0
        )?;
        writeln!(f, "  {:<24}{:>12}", "result", self.termination.to_string())?;
        writeln!(f)?;
        writeln!(f, "  {:<24}{:>12}{:>9}", "distance to road", "trees", "share")?;

        let total = self.histogram.total();
        for (bucket, count) in self.histogram.rows() {
            let share = if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            };
            writeln!(f, "  {:<24}{:>12}{:>8.1}%", bucket.to_string(), count, share)?;
        }
        write!(f, "  {:<24}{:>12}", "total", total)
    }
}
