//! Keyflow Engine
//!
//! The engine coordinates trigger matching and command dispatch:
//! - compiles workflow groups into a [`triggers::TriggerIndex`] and swaps
//!   snapshots atomically on configuration changes
//! - feeds live key events through the chord matcher, scoped by the
//!   frontmost application, and answers consumed/released per event
//! - diffs running-application observations into lifecycle dispatches
//! - hands resolved command lists to the cancellable [`Dispatcher`]
//!
//! Matching runs synchronously on the thread that delivers OS events and
//! must never block; everything that executes goes through tokio tasks.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

mod dispatcher;
mod error;
mod event;
mod runners;

use config::{ApplicationTriggerContext, Command, KeyShortcut, WILDCARD_SCOPE, WorkflowGroup};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, trace, warn};
use triggers::{ChordMatcher, KeyUpDecision, LifecycleTracker, MatchDecision, TriggerIndex};

pub use crate::{
    dispatcher::{Dispatcher, SERIAL_PACING_MS},
    error::{Error, Result},
    event::{EventDisposition, KeyEvent, KeyEventKind},
    runners::{CommandRunner, OpenRunner, Runners, ShellScriptRunner},
};

/// Threshold for warning about slow key processing; a slow matcher stalls
/// keyboard input system-wide.
const KEY_PROC_WARN_MS: u64 = 5;

/// The top-level keyboard-automation engine.
///
/// Cloneable handle; clones share all state. Construct with
/// [`Engine::new`] from within a tokio runtime, install configuration via
/// [`Engine::set_groups`], then feed it key events and application
/// observations.
#[derive(Clone)]
pub struct Engine {
    /// Compiled trigger tables. Replaced whole on rebuild; readers clone
    /// the `Arc` so a lookup never observes a partially built table.
    index: Arc<RwLock<Arc<TriggerIndex>>>,
    /// In-progress chord state, owned exclusively by the matcher.
    matcher: Arc<Mutex<ChordMatcher>>,
    /// Running-application diff state.
    lifecycle: Arc<Mutex<LifecycleTracker>>,
    /// Live frontmost-application pointer, read at lookup time.
    frontmost: Arc<Mutex<Option<String>>>,
    /// Command dispatch with cancel-on-supersede.
    dispatcher: Dispatcher,
}

impl Engine {
    /// Create an engine with the given command runners.
    ///
    /// Must be called from within a tokio runtime; command execution is
    /// spawned onto it.
    pub fn new(runners: Arc<Runners>) -> Self {
        Self {
            index: Arc::new(RwLock::new(Arc::new(TriggerIndex::default()))),
            matcher: Arc::new(Mutex::new(ChordMatcher::new())),
            lifecycle: Arc::new(Mutex::new(LifecycleTracker::new())),
            frontmost: Arc::new(Mutex::new(None)),
            dispatcher: Dispatcher::new(runners),
        }
    }

    /// Install a new configuration: rebuild the trigger index synchronously,
    /// swap the snapshot, and reset any chord in progress.
    pub fn set_groups(&self, groups: &[WorkflowGroup]) {
        let index = Arc::new(TriggerIndex::build(groups));
        debug!(
            chords = index.chord_count(),
            lifecycle = index.lifecycle_count(),
            "installing trigger index"
        );
        *self.index.write() = index;
        self.matcher.lock().reset();
    }

    fn snapshot(&self) -> Arc<TriggerIndex> {
        self.index.read().clone()
    }

    /// Scope for chord lookups: the frontmost bundle identifier, or the
    /// wildcard when no focus has been observed yet.
    fn scope(&self) -> String {
        self.frontmost
            .lock()
            .clone()
            .unwrap_or_else(|| WILDCARD_SCOPE.to_string())
    }

    /// Process one key event from the host keystroke source.
    ///
    /// Synchronous and non-blocking. Returns whether the OS should suppress
    /// the event ([`EventDisposition::Consumed`]) or deliver it to the
    /// foreground application.
    pub fn handle_key_event(&self, event: &KeyEvent) -> EventDisposition {
        let start = Instant::now();
        let disposition = match event.kind {
            KeyEventKind::Up => self.handle_key_up(&event.shortcut),
            KeyEventKind::Down if event.repeat => {
                // Auto-repeats never advance chord progress. A repeat of the
                // key that just completed a chord, or of the last accepted key
                // of a chord in progress, stays suppressed.
                let matcher = self.matcher.lock();
                if matcher.is_pending_exact(&event.shortcut)
                    || matcher.is_last_accepted(&event.shortcut)
                {
                    EventDisposition::Consumed
                } else {
                    EventDisposition::Released
                }
            }
            KeyEventKind::Down => self.handle_key_down(&event.shortcut),
        };
        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(KEY_PROC_WARN_MS) {
            warn!(?elapsed, shortcut = %event.shortcut, "key processing slow");
        }
        disposition
    }

    fn handle_key_down(&self, shortcut: &KeyShortcut) -> EventDisposition {
        let index = self.snapshot();
        let scope = self.scope();
        let decision = self.matcher.lock().handle_key_down(&index, &scope, shortcut);
        match decision {
            MatchDecision::None => EventDisposition::Released,
            MatchDecision::Partial => EventDisposition::Consumed,
            MatchDecision::Exact(workflow) => {
                debug!(workflow = %workflow.name, scope, "chord resolved, dispatching");
                self.dispatcher
                    .run(workflow.commands, workflow.execution_mode);
                EventDisposition::Consumed
            }
        }
    }

    fn handle_key_up(&self, shortcut: &KeyShortcut) -> EventDisposition {
        match self.matcher.lock().handle_key_up(shortcut) {
            KeyUpDecision::Released => EventDisposition::Released,
            KeyUpDecision::Consumed => EventDisposition::Consumed,
            KeyUpDecision::Forward(command) => {
                trace!(shortcut = %shortcut, "forwarding key-up to remap command");
                self.dispatcher.forward(command, shortcut.clone());
                EventDisposition::Consumed
            }
        }
    }

    /// Handle a frontmost-application change from the host observer.
    ///
    /// The observer deduplicates; every call is a real change. Dispatches
    /// all `FrontMost` workflows registered at the identifier.
    pub fn on_frontmost_application(&self, bundle_identifier: &str) {
        *self.frontmost.lock() = Some(bundle_identifier.to_string());
        trace!(bundle_identifier, "frontmost application changed");
        let index = self.snapshot();
        for workflow in
            index.lifecycle_workflows(bundle_identifier, ApplicationTriggerContext::FrontMost)
        {
            debug!(workflow = %workflow.name, bundle_identifier, "frontmost trigger");
            self.dispatcher
                .run(workflow.commands.clone(), workflow.execution_mode);
        }
    }

    /// Handle a full running-application observation from the host.
    ///
    /// Launched and closed identifiers are diffed against the previous
    /// observation; matched workflows dispatch in registration order,
    /// fire-and-forget.
    pub fn on_running_applications(&self, current: Vec<String>) {
        let diff = self.lifecycle.lock().observe(current);
        if diff.is_empty() {
            return;
        }
        let index = self.snapshot();
        for id in &diff.launched {
            for workflow in index.lifecycle_workflows(id, ApplicationTriggerContext::Launched) {
                debug!(workflow = %workflow.name, bundle_identifier = %id, "launch trigger");
                self.dispatcher
                    .run(workflow.commands.clone(), workflow.execution_mode);
            }
        }
        for id in &diff.closed {
            for workflow in index.lifecycle_workflows(id, ApplicationTriggerContext::Closed) {
                debug!(workflow = %workflow.name, bundle_identifier = %id, "close trigger");
                self.dispatcher
                    .run(workflow.commands.clone(), workflow.execution_mode);
            }
        }
    }

    /// Current frontmost bundle identifier, if one has been observed.
    pub fn frontmost_application(&self) -> Option<String> {
        self.frontmost.lock().clone()
    }

    /// Subscribe to the "last executed command" observation (for a
    /// notification/bezel layer).
    pub fn last_executed(&self) -> watch::Receiver<Option<Command>> {
        self.dispatcher.last_executed()
    }

    /// True while a dispatched run is still executing.
    pub fn is_dispatching(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Cancel any in-flight run without starting a new one.
    pub fn cancel_dispatch(&self) {
        self.dispatcher.cancel();
    }
}
