// src/pipeline/filter.rs
use crate::event::Event;

/// What a filter did to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The filter produced or changed fields
    Applied,
    /// Nothing was produced. A grok filter that did not match returns this,
    /// even when it tagged the event with a failure marker.
    NoOp,
}

/// One element of a filter chain.
///
/// Filters take `&self`: a chain is shared by every thread applying it, and
/// each call owns its event exclusively.
pub trait Filter: Send + Sync {
    fn apply(&self, event: &mut Event) -> FilterOutcome;
    fn name(&self) -> &str;
}

type FilterFn = dyn Fn(&mut Event) -> FilterOutcome + Send + Sync;

/// A host-supplied filter; the chain knows nothing of what it does
pub struct ExternalFilter {
    name: String,
    func: Box<FilterFn>,
}

impl ExternalFilter {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut Event) -> FilterOutcome + Send + Sync + 'static,
    {
        ExternalFilter {
            name: name.to_string(),
            func: Box::new(func),
        }
    }
}

impl Filter for ExternalFilter {
    fn apply(&self, event: &mut Event) -> FilterOutcome {
        (self.func)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ExternalFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalFilter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
