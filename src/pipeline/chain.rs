// src/pipeline/chain.rs
use crate::event::Event;
use crate::pipeline::filter::{Filter, FilterOutcome};
use rayon::prelude::*;

/// Per-event summary of a chain run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainReport {
    pub applied: usize,
    pub no_op: usize,
}

impl ChainReport {
    /// True when no filter came back empty-handed
    pub fn fully_matched(&self) -> bool {
        self.no_op == 0
    }
}

/// Ordered sequence of filters applied to each event
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn with_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run every filter in order. A filter that produces nothing never stops the chain.
    pub fn run(&self, event: &mut Event) -> ChainReport {
        let mut report = ChainReport::default();
        for filter in &self.filters {
            match filter.apply(event) {
                FilterOutcome::Applied => report.applied += 1,
                FilterOutcome::NoOp => report.no_op += 1,
            }
        }
        report
    }

    pub fn apply(&self, mut event: Event) -> Event {
        self.run(&mut event);
        event
    }

    /// Seed one event per line and run the chain on all of them in parallel.
    /// Results come back in input order.
    pub fn apply_all<S>(&self, lines: &[S]) -> Vec<(Event, ChainReport)>
    where
        S: AsRef<str> + Sync,
    {
        lines
            .par_iter()
            .map(|line| {
                let mut event = Event::from_message(line.as_ref());
                let report = self.run(&mut event);
                (event, report)
            })
            .collect()
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filter_names())
            .finish()
    }
}
