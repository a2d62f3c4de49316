use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shortcut::KeyShortcut;

fn default_true() -> bool {
    true
}

/// Metadata carried by every command variant.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CommandMeta {
    /// Stable identifier for UI binding.
    #[serde(default)]
    pub id: String,
    /// Human-readable name shown in notifications and logs.
    #[serde(default)]
    pub name: String,
    /// Disabled commands are filtered out before a run starts.
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    /// When set, the dispatcher publishes this command as the
    /// "last executed command" before invoking its runner.
    #[serde(default)]
    pub notification: bool,
}

impl Default for CommandMeta {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            is_enabled: true,
            notification: false,
        }
    }
}

impl CommandMeta {
    /// Meta with just a name, enabled, no notification.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// What an application command does to its target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationAction {
    /// Bring the application frontmost, launching it if needed.
    Activate,
    /// Launch without activating.
    Launch,
    /// Ask the application to quit.
    Close,
}

/// Control an application by bundle identifier.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ApplicationCommand {
    /// Shared command metadata.
    #[serde(default)]
    pub meta: CommandMeta,
    /// What to do with the target application.
    pub action: ApplicationAction,
    /// Target application bundle identifier.
    pub bundle_identifier: String,
}

/// Open a URL or file path, optionally with a specific application.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OpenCommand {
    /// Shared command metadata.
    #[serde(default)]
    pub meta: CommandMeta,
    /// File path or URL to open.
    pub path: String,
    /// Bundle identifier of the application to open with, if any.
    #[serde(default)]
    pub application: Option<String>,
}

/// Where a script command's source lives.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptSource {
    /// Script text supplied inline.
    Inline(String),
    /// Path to a script file on disk.
    Path(String),
}

/// Run a shell script, inline or from a file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScriptCommand {
    /// Shared command metadata.
    #[serde(default)]
    pub meta: CommandMeta,
    /// Script source.
    pub source: ScriptSource,
    /// Shell override; defaults to the user's `$SHELL`.
    #[serde(default)]
    pub shell: Option<String>,
}

/// Replay a sequence of keystrokes into the focused application.
///
/// This is the pass-through remap kind: when a workflow's last command is a
/// keyboard command, the key-up of the matched chord is forwarded to it
/// rather than swallowed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyboardCommand {
    /// Shared command metadata.
    #[serde(default)]
    pub meta: CommandMeta,
    /// Keystrokes to send, in order.
    pub key_shortcuts: Vec<KeyShortcut>,
}

/// Invoke a named app-remote shortcut by name.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShortcutCommand {
    /// Shared command metadata.
    #[serde(default)]
    pub meta: CommandMeta,
    /// Name of the shortcut to run.
    pub shortcut_name: String,
}

/// How literal text is delivered.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeMode {
    /// Emit the whole input at once.
    #[default]
    Instant,
    /// Emit keystroke by keystroke.
    Typing,
}

/// Type literal text into the focused application.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TypeCommand {
    /// Shared command metadata.
    #[serde(default)]
    pub meta: CommandMeta,
    /// Text to type.
    pub input: String,
    /// Delivery mode.
    #[serde(default)]
    pub mode: TypeMode,
}

/// OS-level window and desktop actions.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAction {
    /// Show all windows of the current application.
    ApplicationWindows,
    /// Enter Mission Control.
    MissionControl,
    /// Reveal the desktop.
    ShowDesktop,
    /// Move focus to the next visible window.
    MoveFocusToNextWindow,
    /// Move focus to the previous visible window.
    MoveFocusToPreviousWindow,
    /// Minimize the focused window.
    MinimizeFocusedWindow,
}

/// Perform a system action.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SystemCommand {
    /// Shared command metadata.
    #[serde(default)]
    pub meta: CommandMeta,
    /// Action to perform.
    pub action: SystemAction,
}

/// Navigate and invoke a menu-bar item by its token path.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MenuBarCommand {
    /// Shared command metadata.
    #[serde(default)]
    pub meta: CommandMeta,
    /// Menu path, e.g. `["File", "Export", "PDF…"]`.
    pub tokens: Vec<String>,
}

/// Actions handled by the automation engine itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltInAction {
    /// Ask the host to reload the workflow configuration.
    ReloadConfiguration,
    /// Clear any pending on-screen notifications.
    ClearNotifications,
}

/// A built-in engine action.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BuiltInCommand {
    /// Shared command metadata.
    #[serde(default)]
    pub meta: CommandMeta,
    /// Action to perform.
    pub action: BuiltInAction,
}

/// The closed set of command kinds a workflow can execute.
///
/// The kind set is fixed and exhaustively known at compile time; the
/// dispatcher routes each variant to its registered runner.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Activate, launch or close an application.
    Application(ApplicationCommand),
    /// Open a URL or file.
    Open(OpenCommand),
    /// Run a shell script.
    Script(ScriptCommand),
    /// Replay keystrokes (pass-through remap).
    Keyboard(KeyboardCommand),
    /// Run a named app-remote shortcut.
    Shortcut(ShortcutCommand),
    /// Type literal text.
    Type(TypeCommand),
    /// OS-level window/system action.
    System(SystemCommand),
    /// Invoke a menu-bar item.
    MenuBar(MenuBarCommand),
    /// Engine built-in action.
    BuiltIn(BuiltInCommand),
}

/// Discriminant-only view of [`Command`], used for runner routing and logs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CommandKind {
    /// [`Command::Application`]
    Application,
    /// [`Command::Open`]
    Open,
    /// [`Command::Script`]
    Script,
    /// [`Command::Keyboard`]
    Keyboard,
    /// [`Command::Shortcut`]
    Shortcut,
    /// [`Command::Type`]
    Type,
    /// [`Command::System`]
    System,
    /// [`Command::MenuBar`]
    MenuBar,
    /// [`Command::BuiltIn`]
    BuiltIn,
}

impl CommandKind {
    /// Stable lowercase name for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Open => "open",
            Self::Script => "script",
            Self::Keyboard => "keyboard",
            Self::Shortcut => "shortcut",
            Self::Type => "type",
            Self::System => "system",
            Self::MenuBar => "menu_bar",
            Self::BuiltIn => "built_in",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    /// Shared metadata for any variant.
    pub fn meta(&self) -> &CommandMeta {
        match self {
            Self::Application(c) => &c.meta,
            Self::Open(c) => &c.meta,
            Self::Script(c) => &c.meta,
            Self::Keyboard(c) => &c.meta,
            Self::Shortcut(c) => &c.meta,
            Self::Type(c) => &c.meta,
            Self::System(c) => &c.meta,
            Self::MenuBar(c) => &c.meta,
            Self::BuiltIn(c) => &c.meta,
        }
    }

    /// Whether this command participates in a run.
    pub fn is_enabled(&self) -> bool {
        self.meta().is_enabled
    }

    /// Whether this command requests a "last executed" observation.
    pub fn notification(&self) -> bool {
        self.meta().notification
    }

    /// Human-readable name from the metadata.
    pub fn name(&self) -> &str {
        &self.meta().name
    }

    /// The variant's kind discriminant.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Application(_) => CommandKind::Application,
            Self::Open(_) => CommandKind::Open,
            Self::Script(_) => CommandKind::Script,
            Self::Keyboard(_) => CommandKind::Keyboard,
            Self::Shortcut(_) => CommandKind::Shortcut,
            Self::Type(_) => CommandKind::Type,
            Self::System(_) => CommandKind::System,
            Self::MenuBar(_) => CommandKind::MenuBar,
            Self::BuiltIn(_) => CommandKind::BuiltIn,
        }
    }
}
