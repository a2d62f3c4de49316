//! Configuration model for keyflow.
//!
//! Pure data types shared by the trigger index and the dispatch engine:
//! - [`KeyShortcut`] and its canonical signature form
//! - [`Workflow`], [`Trigger`] and [`WorkflowGroup`]
//! - the closed [`Command`] union over the nine command kinds
//!
//! All types are serde-derivable; persistence is owned by the host layer.

mod command;
mod shortcut;
mod workflow;

pub use command::{
    ApplicationAction, ApplicationCommand, BuiltInAction, BuiltInCommand, Command, CommandKind,
    CommandMeta, KeyboardCommand, MenuBarCommand, OpenCommand, ScriptCommand, ScriptSource,
    ShortcutCommand, SystemAction, SystemCommand, TypeCommand, TypeMode,
};
pub use shortcut::{KeyShortcut, Modifier, Side, sequence_signature};
pub use workflow::{
    ApplicationTrigger, ApplicationTriggerContext, Day, ExecutionMode, Rule, Trigger, WILDCARD_SCOPE,
    Workflow, WorkflowGroup,
};
