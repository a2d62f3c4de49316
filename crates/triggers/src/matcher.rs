use config::{Command, KeyShortcut, WILDCARD_SCOPE, Workflow};
use tracing::trace;

use crate::index::{ChordEntry, TriggerIndex};

/// Outcome of feeding one key-down to the matcher.
#[derive(Debug)]
pub enum MatchDecision {
    /// No entry at any scope; release the event to the OS.
    None,
    /// The key extends a chord in progress; consume the event.
    Partial,
    /// The key completed a chord; consume the event and dispatch.
    Exact(Workflow),
}

/// Outcome of feeding one key-up to the matcher.
#[derive(Debug)]
pub enum KeyUpDecision {
    /// Not related to a matched chord; release the event.
    Released,
    /// The key-up of a matched chord's final key; consume it.
    Consumed,
    /// Consume the key-up but forward it to the workflow's trailing
    /// keyboard remap command instead of swallowing it.
    Forward(Command),
}

#[derive(Debug)]
struct PendingKeyUp {
    signature: String,
    forward: Option<Command>,
}

/// Stateful per-event chord matcher.
///
/// Owns only the in-progress chord state; the compiled [`TriggerIndex`] and
/// the live scope are passed in per lookup, never cached across events.
/// Progress resets on every exact match, every failed match and every index
/// rebuild.
#[derive(Debug, Default)]
pub struct ChordMatcher {
    /// Signatures of the keys accepted so far in the current chord attempt.
    progress: Vec<String>,
    /// Final key of the last exact match, retained until its key-up arrives.
    pending_key_up: Option<PendingKeyUp>,
}

impl ChordMatcher {
    /// Create an idle matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a key-down under the given scope.
    ///
    /// Lookup tries the app-scoped table first and falls back to the
    /// wildcard scope, so an app-scoped entry always wins over a wildcard
    /// entry at the same prefix length.
    pub fn handle_key_down(
        &mut self,
        index: &TriggerIndex,
        scope: &str,
        shortcut: &KeyShortcut,
    ) -> MatchDecision {
        let signature = shortcut.signature();
        let mut prefix = self.progress.join(" ");
        if !prefix.is_empty() {
            prefix.push(' ');
        }
        prefix.push_str(&signature);

        let entry = index
            .chord_entry(scope, &prefix)
            .or_else(|| index.chord_entry(WILDCARD_SCOPE, &prefix));

        match entry {
            None => {
                if !self.progress.is_empty() {
                    // Failed mid-chord: reset and release. The failing key is
                    // not re-evaluated as a fresh chord start in this step.
                    trace!(%prefix, "chord attempt failed, resetting");
                    self.reset();
                }
                MatchDecision::None
            }
            Some(ChordEntry::Partial) => {
                trace!(%prefix, scope, "partial chord match");
                self.progress.push(signature);
                MatchDecision::Partial
            }
            Some(ChordEntry::Exact(workflow)) => {
                let workflow = workflow.clone();
                trace!(%prefix, scope, workflow = %workflow.name, "exact chord match");
                self.progress.clear();
                let forward = workflow
                    .commands
                    .last()
                    .filter(|c| matches!(c, Command::Keyboard(_)) && c.is_enabled())
                    .cloned();
                self.pending_key_up = Some(PendingKeyUp { signature, forward });
                MatchDecision::Exact(workflow)
            }
        }
    }

    /// Process a key-up.
    ///
    /// The key-up of an exact match's final key is consumed; when the
    /// matched workflow ends in a keyboard remap command the event is
    /// forwarded to that command instead.
    pub fn handle_key_up(&mut self, shortcut: &KeyShortcut) -> KeyUpDecision {
        match self.pending_key_up.take() {
            Some(pending) if pending.signature == shortcut.signature() => match pending.forward {
                Some(command) => KeyUpDecision::Forward(command),
                None => KeyUpDecision::Consumed,
            },
            other => {
                self.pending_key_up = other;
                KeyUpDecision::Released
            }
        }
    }

    /// True when an OS auto-repeat of this key should stay suppressed
    /// because its initial down completed a chord.
    pub fn is_pending_exact(&self, shortcut: &KeyShortcut) -> bool {
        self.pending_key_up
            .as_ref()
            .is_some_and(|p| p.signature == shortcut.signature())
    }

    /// True when this key was the most recently accepted step of a chord in
    /// progress. Its auto-repeats are suppressed too, so a held key does not
    /// leak keystrokes into the foreground app mid-chord.
    pub fn is_last_accepted(&self, shortcut: &KeyShortcut) -> bool {
        self.progress
            .last()
            .is_some_and(|sig| *sig == shortcut.signature())
    }

    /// True while a multi-key chord attempt is underway.
    pub fn in_progress(&self) -> bool {
        !self.progress.is_empty()
    }

    /// Clear all transient state (progress and pending key-up).
    pub fn reset(&mut self) {
        self.progress.clear();
        self.pending_key_up = None;
    }
}
