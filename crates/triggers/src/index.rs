use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use config::{
    ApplicationTrigger, ApplicationTriggerContext, KeyShortcut, Trigger, Workflow, WorkflowGroup,
};
use tracing::{debug, warn};

/// Threshold for warning about slow index rebuilds; a rebuild runs
/// synchronously on configuration changes and must stay cheap.
const BUILD_WARN_MS: u64 = 10;

/// Entry in the chord table for a given `(scope, prefix)` key.
#[derive(Clone, Debug)]
pub enum ChordEntry {
    /// The prefix is a complete chord resolving to this workflow.
    Exact(Workflow),
    /// The prefix is a strict prefix of at least one longer chord.
    Partial,
}

#[derive(Clone, Debug, Default)]
struct LifecycleEntry {
    launched: Vec<Workflow>,
    closed: Vec<Workflow>,
    frontmost: Vec<Workflow>,
}

/// Compiled lookup tables for trigger matching.
///
/// Built with [`TriggerIndex::build`], which is pure, deterministic and
/// total: malformed or irrelevant entries are skipped, never reported.
/// Instances are immutable; the engine replaces whole snapshots on rebuild
/// so a lookup observes either the old table or the new one, never a mix.
#[derive(Clone, Debug, Default)]
pub struct TriggerIndex {
    /// scope → joined key-sequence signature → entry. Nested so a lookup
    /// borrows both keys without allocating.
    chords: HashMap<String, HashMap<String, ChordEntry>>,
    /// bundle identifier → per-context workflow lists, registration order.
    lifecycle: HashMap<String, LifecycleEntry>,
}

impl TriggerIndex {
    /// Compile the given groups into lookup tables.
    ///
    /// Registration order is group order, then workflow order; within one
    /// scope a later exact registration for the same full sequence wins.
    pub fn build(groups: &[WorkflowGroup]) -> Self {
        let start = Instant::now();
        let mut index = Self::default();
        for group in groups {
            let scopes = group.scopes();
            for workflow in &group.workflows {
                if !workflow.is_enabled {
                    continue;
                }
                match &workflow.trigger {
                    Some(Trigger::KeyboardShortcuts(shortcuts)) => {
                        if shortcuts.is_empty() {
                            continue;
                        }
                        for scope in &scopes {
                            index.register_chord(scope, shortcuts, workflow);
                        }
                    }
                    Some(Trigger::Application(triggers)) => {
                        for trigger in triggers {
                            index.register_application(trigger, workflow);
                        }
                    }
                    None => {}
                }
            }
        }
        let elapsed = start.elapsed();
        debug!(
            chords = index.chord_count(),
            lifecycle = index.lifecycle.len(),
            ?elapsed,
            "trigger index rebuilt"
        );
        if elapsed > Duration::from_millis(BUILD_WARN_MS) {
            warn!(?elapsed, "trigger index rebuild slow");
        }
        index
    }

    /// Register a chord under one scope: every strict prefix becomes a
    /// partial entry and the full sequence an exact one. Prefix-keyed
    /// entries let chords that share a prefix merge naturally; a partial
    /// registration never downgrades an exact entry already at that prefix.
    fn register_chord(&mut self, scope: &str, shortcuts: &[KeyShortcut], workflow: &Workflow) {
        let table = self.chords.entry(scope.to_string()).or_default();
        let mut prefix = String::new();
        let last = shortcuts.len() - 1;
        for (pos, shortcut) in shortcuts.iter().enumerate() {
            if pos > 0 {
                prefix.push(' ');
            }
            prefix.push_str(&shortcut.signature());
            if pos == last {
                table.insert(prefix.clone(), ChordEntry::Exact(workflow.clone()));
            } else {
                table.entry(prefix.clone()).or_insert(ChordEntry::Partial);
            }
        }
    }

    fn register_application(&mut self, trigger: &ApplicationTrigger, workflow: &Workflow) {
        let entry = self
            .lifecycle
            .entry(trigger.bundle_identifier.clone())
            .or_default();
        for context in &trigger.contexts {
            match context {
                ApplicationTriggerContext::Launched => entry.launched.push(workflow.clone()),
                ApplicationTriggerContext::Closed => entry.closed.push(workflow.clone()),
                ApplicationTriggerContext::FrontMost => entry.frontmost.push(workflow.clone()),
                // Reserved for future symmetry; nothing dispatches on it.
                ApplicationTriggerContext::ResignFrontMost => {}
            }
        }
    }

    /// Look up the entry for an exact `(scope, prefix)` pair.
    pub fn chord_entry(&self, scope: &str, prefix: &str) -> Option<&ChordEntry> {
        self.chords.get(scope)?.get(prefix)
    }

    /// Workflows registered for the given lifecycle context at a bundle
    /// identifier, in registration order. Lifecycle lookups never fall back
    /// to a wildcard scope.
    pub fn lifecycle_workflows(
        &self,
        bundle_identifier: &str,
        context: ApplicationTriggerContext,
    ) -> &[Workflow] {
        let Some(entry) = self.lifecycle.get(bundle_identifier) else {
            return &[];
        };
        match context {
            ApplicationTriggerContext::Launched => &entry.launched,
            ApplicationTriggerContext::Closed => &entry.closed,
            ApplicationTriggerContext::FrontMost => &entry.frontmost,
            ApplicationTriggerContext::ResignFrontMost => &[],
        }
    }

    /// Number of chord-table entries across all scopes (diagnostics).
    pub fn chord_count(&self) -> usize {
        self.chords.values().map(HashMap::len).sum()
    }

    /// Number of bundle identifiers with lifecycle registrations.
    pub fn lifecycle_count(&self) -> usize {
        self.lifecycle.len()
    }

    /// True when no trigger registered at all.
    pub fn is_empty(&self) -> bool {
        self.chords.is_empty() && self.lifecycle.is_empty()
    }
}
