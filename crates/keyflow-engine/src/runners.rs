//! The command-runner seam.
//!
//! One runner per command kind; kind routing is the dispatcher's job,
//! execution is the runner's. Hosts supply runners for the kinds that need
//! OS integration; shell scripts and file/URL opening ship here.

use std::{env, process::Command as ProcessCommand, sync::Arc};

use async_trait::async_trait;
use config::{Command, CommandKind, KeyShortcut, ScriptSource};
use tracing::info;

use crate::{Error, Result};

/// Executes commands of one kind.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion. Errors are caught and logged by the
    /// dispatcher; they never halt the rest of the run.
    async fn run(&self, command: &Command) -> Result<()>;

    /// Relay the key-up of a matched chord's final key to this runner.
    ///
    /// Only reached for a workflow's trailing keyboard remap command, whose
    /// key-down side was already replayed by [`run`](Self::run). The default
    /// replays the whole command again; remap runners override this to emit
    /// just the corresponding key-up.
    async fn forward_key_up(&self, command: &Command, _shortcut: &KeyShortcut) -> Result<()> {
        self.run(command).await
    }
}

/// Registry holding one runner per command kind.
pub struct Runners {
    /// Application activation/launch/close.
    pub application: Arc<dyn CommandRunner>,
    /// URL/file opening.
    pub open: Arc<dyn CommandRunner>,
    /// Shell script execution.
    pub script: Arc<dyn CommandRunner>,
    /// Keystroke replay (pass-through remap).
    pub keyboard: Arc<dyn CommandRunner>,
    /// App-remote named shortcuts.
    pub shortcut: Arc<dyn CommandRunner>,
    /// Literal typing.
    pub typing: Arc<dyn CommandRunner>,
    /// OS-level window/system actions.
    pub system: Arc<dyn CommandRunner>,
    /// Menu-bar navigation.
    pub menu_bar: Arc<dyn CommandRunner>,
    /// Engine built-ins.
    pub built_in: Arc<dyn CommandRunner>,
}

impl Runners {
    /// Use one runner for every kind. Handy for tests and for hosts that
    /// multiplex kinds behind a single facade.
    pub fn uniform(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            application: runner.clone(),
            open: runner.clone(),
            script: runner.clone(),
            keyboard: runner.clone(),
            shortcut: runner.clone(),
            typing: runner.clone(),
            system: runner.clone(),
            menu_bar: runner.clone(),
            built_in: runner,
        }
    }

    /// The runner registered for this command's kind.
    pub fn runner_for(&self, command: &Command) -> &Arc<dyn CommandRunner> {
        match command.kind() {
            CommandKind::Application => &self.application,
            CommandKind::Open => &self.open,
            CommandKind::Script => &self.script,
            CommandKind::Keyboard => &self.keyboard,
            CommandKind::Shortcut => &self.shortcut,
            CommandKind::Type => &self.typing,
            CommandKind::System => &self.system,
            CommandKind::MenuBar => &self.menu_bar,
            CommandKind::BuiltIn => &self.built_in,
        }
    }
}

/// Collapse stdout and stderr into one trimmed message.
fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    let out = String::from_utf8_lossy(&output.stdout);
    let err = String::from_utf8_lossy(&output.stderr);
    if !out.is_empty() {
        combined.push_str(&out);
    }
    if !err.is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&err);
    }
    combined.trim().to_string()
}

/// Runs script commands through the user's shell.
///
/// Inline sources are passed via `-lc`; path sources are executed as a
/// shell command line, so shebangs and PATH resolution apply.
pub struct ShellScriptRunner;

#[async_trait]
impl CommandRunner for ShellScriptRunner {
    async fn run(&self, command: &Command) -> Result<()> {
        let script = match command {
            Command::Script(s) => s.clone(),
            other => return Err(Error::UnsupportedKind(other.kind())),
        };
        let output = tokio::task::spawn_blocking(move || {
            let shell = script
                .shell
                .clone()
                .or_else(|| env::var("SHELL").ok())
                .unwrap_or_else(|| "/bin/zsh".to_string());
            let line = match &script.source {
                ScriptSource::Inline(text) => text.clone(),
                ScriptSource::Path(path) => path.clone(),
            };
            info!(%shell, command = %line, "executing shell command");
            ProcessCommand::new(&shell).arg("-lc").arg(&line).output()
        })
        .await
        .map_err(|e| Error::Msg(format!("script task failed: {}", e)))??;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::CommandFailed(combined_output(&output)))
        }
    }
}

/// Opens files and URLs via the system opener.
pub struct OpenRunner;

#[async_trait]
impl CommandRunner for OpenRunner {
    async fn run(&self, command: &Command) -> Result<()> {
        let open = match command {
            Command::Open(o) => o.clone(),
            other => return Err(Error::UnsupportedKind(other.kind())),
        };
        let output = tokio::task::spawn_blocking(move || {
            let mut cmd = ProcessCommand::new("/usr/bin/open");
            if let Some(app) = &open.application {
                cmd.arg("-b").arg(app);
            }
            cmd.arg(&open.path);
            info!(path = %open.path, "opening");
            cmd.output()
        })
        .await
        .map_err(|e| Error::Msg(format!("open task failed: {}", e)))??;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::CommandFailed(combined_output(&output)))
        }
    }
}
