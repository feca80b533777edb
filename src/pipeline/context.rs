use crate::pipeline::chain::ChainReport;
use std::time::Duration;

/// Runtime statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessingStats {
    pub records_processed: usize,
    pub records_output: usize,
    /// Records where at least one filter produced nothing
    pub records_unmatched: usize,
    pub errors: usize,
    pub processing_time: Duration,
}

impl ProcessingStats {
    pub fn record(&mut self, report: &ChainReport) {
        if !report.fully_matched() {
            self.records_unmatched += 1;
        }
    }

    /// Fold per-file stats into a running total
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.records_processed += other.records_processed;
        self.records_output += other.records_output;
        self.records_unmatched += other.records_unmatched;
        self.errors += other.errors;
        self.processing_time += other.processing_time;
    }

    /// Records per second, if any time has passed
    pub fn rate(&self) -> Option<f64> {
        let secs = self.processing_time.as_secs_f64();
        (self.records_processed > 0 && secs > 0.0).then(|| self.records_processed as f64 / secs)
    }
}

/// Per-stream position shared with the pipeline while it runs
#[derive(Debug, Default)]
pub struct PipelineContext {
    pub line_number: usize,
    pub total_processed: usize,
    pub file_name: Option<String>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }
}
