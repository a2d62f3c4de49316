use std::collections::HashMap;

use tracing::trace;

/// Applications that entered or left the running set between two
/// observations, in observation order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LifecycleDiff {
    /// Bundle identifiers that appeared.
    pub launched: Vec<String>,
    /// Bundle identifiers that disappeared.
    pub closed: Vec<String>,
}

impl LifecycleDiff {
    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.launched.is_empty() && self.closed.is_empty()
    }
}

/// Diff engine over running-application observations.
///
/// Retains the previously observed list and replaces it wholesale on every
/// observation. The diff counts occurrences positionally, so rapid repeated
/// launches or quits of the same identifier are each reported exactly once.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    previous: Vec<String>,
}

impl LifecycleTracker {
    /// Create a tracker with an empty retained set; the first observation
    /// reports every running application as launched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff the new observation against the retained one, then retain it.
    pub fn observe(&mut self, current: Vec<String>) -> LifecycleDiff {
        let mut prev_counts: HashMap<&str, usize> = HashMap::new();
        for id in &self.previous {
            *prev_counts.entry(id.as_str()).or_default() += 1;
        }
        let mut launched = Vec::new();
        for id in &current {
            match prev_counts.get_mut(id.as_str()) {
                Some(n) if *n > 0 => *n -= 1,
                _ => launched.push(id.clone()),
            }
        }

        let mut cur_counts: HashMap<&str, usize> = HashMap::new();
        for id in &current {
            *cur_counts.entry(id.as_str()).or_default() += 1;
        }
        let mut closed = Vec::new();
        for id in &self.previous {
            match cur_counts.get_mut(id.as_str()) {
                Some(n) if *n > 0 => *n -= 1,
                _ => closed.push(id.clone()),
            }
        }

        self.previous = current;
        if !launched.is_empty() || !closed.is_empty() {
            trace!(?launched, ?closed, "running set changed");
        }
        LifecycleDiff { launched, closed }
    }
}
