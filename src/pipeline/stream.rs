// src/pipeline/stream.rs
use rayon::prelude::*;
use serde_json::Value;
use std::io::{BufRead, Write};
use std::time::Instant;

use crate::error::ProcessingError;
use crate::event::Event;
use crate::pipeline::chain::{ChainReport, FilterChain};
use crate::pipeline::config::{ErrorStrategy, PipelineConfig};
use crate::pipeline::context::{PipelineContext, ProcessingStats};

/// Field names added when `add_source_fields` is on
pub const PATH_FIELD: &str = "path";
pub const LINE_NUMBER_FIELD: &str = "line_number";

/// Main pipeline orchestrator: lines in, one JSON event per line out
pub struct StreamPipeline {
    chain: FilterChain,
    context: PipelineContext,
    config: PipelineConfig,
    stats: ProcessingStats,
}

/// A line waiting for its chain run
struct PendingLine {
    line_number: usize,
    text: String,
}

impl StreamPipeline {
    pub fn new(config: PipelineConfig, chain: FilterChain) -> Self {
        StreamPipeline {
            chain,
            context: PipelineContext::new(),
            config,
            stats: ProcessingStats::default(),
        }
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    /// Process a single file/stream
    pub fn process_stream<R: BufRead, W: Write>(
        &mut self,
        input: R,
        output: &mut W,
        filename: Option<&str>,
    ) -> Result<ProcessingStats, ProcessingError> {
        let start_time = Instant::now();

        self.context.file_name = filename.map(|s| s.to_string());
        self.context.line_number = 0;

        let mut file_stats = ProcessingStats::default();
        let batch_size = if self.config.parallel {
            self.config.batch_size.max(1)
        } else {
            1
        };
        let mut batch: Vec<PendingLine> = Vec::with_capacity(batch_size);

        for line_result in input.lines() {
            let line = match line_result {
                Ok(line) => line,
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        break;
                    }
                    return Err(ProcessingError::IoError(e));
                }
            };

            self.context.line_number += 1;
            file_stats.records_processed += 1;

            if line.len() > self.config.max_line_length {
                let error = ProcessingError::LineTooLong {
                    length: line.len(),
                    max_length: self.config.max_line_length,
                };
                match self.config.error_strategy {
                    ErrorStrategy::FailFast => return Err(error),
                    ErrorStrategy::Skip => {
                        file_stats.errors += 1;
                        tracing::debug!(line = self.context.line_number, "line too long, skipping");
                        continue;
                    }
                }
            }

            batch.push(PendingLine {
                line_number: self.context.line_number,
                text: line,
            });

            if batch.len() >= batch_size {
                let keep_going = self.flush_batch(&mut batch, output, &mut file_stats)?;
                if !keep_going {
                    break;
                }
            }
        }

        if !batch.is_empty() {
            self.flush_batch(&mut batch, output, &mut file_stats)?;
        }

        file_stats.processing_time = start_time.elapsed();
        self.stats.merge(&file_stats);

        Ok(file_stats)
    }

    /// Run the chain over a batch and write the results in input order.
    /// Returns `false` when the reader went away.
    fn flush_batch<W: Write>(
        &mut self,
        batch: &mut Vec<PendingLine>,
        output: &mut W,
        file_stats: &mut ProcessingStats,
    ) -> Result<bool, ProcessingError> {
        let results: Vec<(usize, Event, ChainReport)> = if self.config.parallel {
            batch
                .par_drain(..)
                .map(|pending| self.process_line(pending))
                .collect()
        } else {
            batch
                .drain(..)
                .map(|pending| self.process_line(pending))
                .collect()
        };

        for (line_number, event, report) in results {
            file_stats.record(&report);
            self.context.total_processed += 1;

            match self.write_event(output, &event, line_number) {
                Ok(()) => file_stats.records_output += 1,
                Err(ProcessingError::IoError(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    return Ok(false);
                }
                Err(e) => match self.config.error_strategy {
                    ErrorStrategy::FailFast => return Err(e),
                    ErrorStrategy::Skip => {
                        file_stats.errors += 1;
                        tracing::debug!(line = line_number, error = %e, "skipping event");
                    }
                },
            }
        }
        Ok(true)
    }

    fn process_line(&self, pending: PendingLine) -> (usize, Event, ChainReport) {
        let mut event = Event::from_message(pending.text);
        let report = self.chain.run(&mut event);

        if self.config.add_source_fields {
            if let Some(path) = &self.context.file_name {
                event.set(PATH_FIELD, Value::String(path.clone()));
            }
            event.set(LINE_NUMBER_FIELD, Value::from(pending.line_number));
        }

        (pending.line_number, event, report)
    }

    fn write_event<W: Write>(
        &self,
        output: &mut W,
        event: &Event,
        line_number: usize,
    ) -> Result<(), ProcessingError> {
        let text = serde_json::to_string(event.fields()).map_err(|source| {
            ProcessingError::Serialize {
                line: line_number,
                source,
            }
        })?;
        writeln!(output, "{}", text)?;
        Ok(())
    }

    /// Get current accumulated stats
    pub fn get_stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Events run through the chain since creation or the last `hard_reset`
    pub fn total_processed(&self) -> usize {
        self.context.total_processed
    }

    /// Completely reset everything (for reusing pipeline)
    pub fn hard_reset(&mut self) {
        self.context = PipelineContext::new();
        self.stats = ProcessingStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::PatternCompiler;
    use crate::pipeline::grok::{GrokFilter, GrokFilterConfig};
    use crate::registry::PatternRegistry;
    use std::io::Cursor;

    fn pipeline(config: PipelineConfig) -> StreamPipeline {
        let registry = PatternRegistry::with_base_patterns();
        let compiler = PatternCompiler::new(&registry);
        let grok = GrokFilter::new(
            "grok",
            &compiler,
            GrokFilterConfig::with_patterns(["%{IP:client} %{WORD:word}"]),
        )
        .unwrap();
        StreamPipeline::new(config, FilterChain::new().with_filter(grok))
    }

    #[test]
    fn test_process_stream_writes_jsonl() {
        let mut pipeline = pipeline(PipelineConfig::default());
        let input = Cursor::new("1.1.1.1 abc\nabc\n");
        let mut output = Vec::<u8>::new();

        let stats = pipeline.process_stream(input, &mut output, None).unwrap();
        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            r#"{"message":"1.1.1.1 abc","client":"1.1.1.1","word":"abc"}"#
        );
        assert_eq!(lines[1], r#"{"message":"abc"}"#);
        assert_eq!(stats.records_processed, 2);
        assert_eq!(stats.records_output, 2);
        assert_eq!(stats.records_unmatched, 1);
    }

    #[test]
    fn test_line_too_long_skip_and_fail_fast() {
        let config = PipelineConfig {
            max_line_length: 5,
            ..PipelineConfig::default()
        };
        let mut skipping = pipeline(config.clone());
        let mut output = Vec::<u8>::new();
        let stats = skipping
            .process_stream(Cursor::new("short\nway too long\n"), &mut output, None)
            .unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.records_output, 1);

        let mut failing = pipeline(PipelineConfig {
            error_strategy: ErrorStrategy::FailFast,
            ..config
        });
        let result = failing.process_stream(Cursor::new("way too long\n"), &mut Vec::<u8>::new(), None);
        assert!(matches!(result, Err(ProcessingError::LineTooLong { .. })));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let input: String = (0..500)
            .map(|i| format!("10.0.{}.{} host{}\n", i / 256, i % 256, i))
            .collect();

        let mut sequential = pipeline(PipelineConfig::default());
        let mut expected = Vec::<u8>::new();
        sequential
            .process_stream(Cursor::new(input.clone()), &mut expected, None)
            .unwrap();

        let mut parallel = pipeline(PipelineConfig {
            parallel: true,
            batch_size: 64,
            ..PipelineConfig::default()
        });
        let mut actual = Vec::<u8>::new();
        parallel
            .process_stream(Cursor::new(input), &mut actual, None)
            .unwrap();

        assert_eq!(expected, actual);
    }

    #[test]
    fn test_source_fields() {
        let mut pipeline = pipeline(PipelineConfig {
            add_source_fields: true,
            ..PipelineConfig::default()
        });
        let mut output = Vec::<u8>::new();
        pipeline
            .process_stream(Cursor::new("1.1.1.1 abc\n"), &mut output, Some("access.log"))
            .unwrap();

        let event: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(event["path"], "access.log");
        assert_eq!(event["line_number"], 1);
    }

    #[test]
    fn test_stats_accumulate_across_streams() {
        let mut pipeline = pipeline(PipelineConfig::default());
        pipeline
            .process_stream(Cursor::new("1.1.1.1 a\n"), &mut Vec::<u8>::new(), Some("a"))
            .unwrap();
        pipeline
            .process_stream(Cursor::new("2.2.2.2 b\n"), &mut Vec::<u8>::new(), Some("b"))
            .unwrap();
        assert_eq!(pipeline.get_stats().records_processed, 2);
        assert_eq!(pipeline.total_processed(), 2);

        pipeline.hard_reset();
        assert_eq!(pipeline.get_stats().records_processed, 0);
        assert_eq!(pipeline.total_processed(), 0);
    }
}
