//! Command dispatch with cancel-on-supersede semantics.
//!
//! At most one run is active per dispatcher; starting a new run cancels the
//! previous one unconditionally. Cancellation is cooperative: the run polls
//! its token between commands and never tears a command down mid-effect.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use config::{Command, ExecutionMode, KeyShortcut};
use parking_lot::Mutex;
use tokio::{
    sync::watch,
    time::{self, Duration},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::runners::Runners;

/// Settling pause between serial commands, letting transient OS side
/// effects (e.g. a just-activated window) land before the next command.
pub const SERIAL_PACING_MS: u64 = 100;

struct ActiveRun {
    token: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

/// Runs resolved command lists against the registered runners.
///
/// Cloneable handle; all clones share the single active-run slot and the
/// "last executed command" channel.
#[derive(Clone)]
pub struct Dispatcher {
    runners: Arc<Runners>,
    runtime: tokio::runtime::Handle,
    active: Arc<Mutex<Option<ActiveRun>>>,
    last_executed: Arc<watch::Sender<Option<Command>>>,
    run_seq: Arc<AtomicU64>,
}

impl Dispatcher {
    /// Create a dispatcher bound to the current tokio runtime.
    ///
    /// Must be called from within a runtime; matching happens on the OS
    /// event thread, so runs are spawned onto the captured handle.
    pub fn new(runners: Arc<Runners>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            runners,
            runtime: tokio::runtime::Handle::current(),
            active: Arc::new(Mutex::new(None)),
            last_executed: Arc::new(tx),
            run_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to the "last executed command" observation. Single writer
    /// (the running task), any number of readers.
    pub fn last_executed(&self) -> watch::Receiver<Option<Command>> {
        self.last_executed.subscribe()
    }

    /// Start a new run, superseding any in-flight one.
    ///
    /// Disabled commands are filtered out, order preserved. The previous
    /// run is cancelled even when the new list turns out to be empty.
    pub fn run(&self, commands: Vec<Command>, mode: ExecutionMode) {
        let run_id = self.run_seq.fetch_add(1, Ordering::Relaxed);
        let commands: Vec<Command> = commands.into_iter().filter(Command::is_enabled).collect();

        // One guard across cancel-and-store: two dispatches racing here must
        // not both see the slot empty, or the loser's run is never cancelled.
        let mut active = self.active.lock();
        if let Some(prev) = active.take() {
            prev.token.cancel();
            trace!(run_id, "superseded previous run");
        }
        if commands.is_empty() {
            debug!(run_id, "no enabled commands, nothing to run");
            return;
        }

        debug!(run_id, count = commands.len(), ?mode, "starting run");
        let token = CancellationToken::new();
        let handle = self.runtime.spawn(execute(
            run_id,
            commands,
            mode,
            token.clone(),
            self.runners.clone(),
            self.last_executed.clone(),
        ));
        *active = Some(ActiveRun { token, handle });
    }

    /// Relay a consumed key-up to a trailing remap command, outside the
    /// active-run slot (fire-and-forget).
    pub fn forward(&self, command: Command, shortcut: KeyShortcut) {
        let runners = self.runners.clone();
        let forwarded = self.runtime.spawn(async move {
            let runner = runners.runner_for(&command);
            if let Err(e) = runner.forward_key_up(&command, &shortcut).await {
                warn!(command = %command.kind(), error = %e, "forwarded key-up failed");
            }
        });
        drop(forwarded);
    }

    /// True while a run is still executing (pending cancellation counts).
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Cancel the active run, if any.
    pub fn cancel(&self) {
        if let Some(prev) = self.active.lock().take() {
            prev.token.cancel();
            trace!("active run cancelled");
        }
    }
}

async fn execute(
    run_id: u64,
    commands: Vec<Command>,
    mode: ExecutionMode,
    token: CancellationToken,
    runners: Arc<Runners>,
    last_executed: Arc<watch::Sender<Option<Command>>>,
) {
    let total = commands.len();
    for (pos, command) in commands.into_iter().enumerate() {
        if token.is_cancelled() {
            trace!(run_id, at = pos, "run cancelled");
            return;
        }

        // The observation fires for the attempt, regardless of outcome.
        if command.notification() {
            last_executed.send_replace(Some(command.clone()));
        }

        let start = Instant::now();
        match runners.runner_for(&command).run(&command).await {
            Ok(()) => trace!(
                run_id,
                command = %command.kind(),
                name = command.name(),
                elapsed = ?start.elapsed(),
                "command completed"
            ),
            // Caught and skipped; the rest of the list still runs.
            Err(e) => warn!(
                run_id,
                command = %command.kind(),
                name = command.name(),
                error = %e,
                "command failed, continuing"
            ),
        }

        if mode == ExecutionMode::Serial && pos + 1 < total {
            tokio::select! {
                () = token.cancelled() => {
                    trace!(run_id, at = pos + 1, "run cancelled during pacing");
                    return;
                }
                () = time::sleep(Duration::from_millis(SERIAL_PACING_MS)) => {}
            }
        }
    }
    trace!(run_id, total, "run finished");
}
