use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{command::Command, shortcut::KeyShortcut};

/// Scope value for triggers that apply regardless of the frontmost app.
pub const WILDCARD_SCOPE: &str = "*";

fn default_true() -> bool {
    true
}

/// How a workflow's command list is sequenced by the dispatcher.
///
/// Both modes run commands one at a time in list order; `Concurrent` skips
/// the inter-command pacing sleep. The name refers to cancel-and-replace
/// dispatch, not intra-run parallelism.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Ordered with a settling pause after each command.
    Serial,
    /// Ordered with no pacing between commands.
    #[default]
    Concurrent,
}

/// Application-lifecycle moments a trigger can subscribe to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationTriggerContext {
    /// The application appeared in the running set.
    Launched,
    /// The application left the running set.
    Closed,
    /// The application became frontmost.
    FrontMost,
    /// The application stopped being frontmost. Reserved; no dispatch path
    /// consults it yet.
    ResignFrontMost,
}

/// Fires when the named application hits one of the requested lifecycle
/// contexts. Lifecycle triggers are always app-scoped; there is no wildcard.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ApplicationTrigger {
    /// Target application bundle identifier.
    pub bundle_identifier: String,
    /// Lifecycle contexts this trigger subscribes to.
    pub contexts: BTreeSet<ApplicationTriggerContext>,
}

/// What starts a workflow.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// An ordered chord of one or more keystrokes.
    KeyboardShortcuts(Vec<KeyShortcut>),
    /// One or more application-lifecycle subscriptions.
    Application(Vec<ApplicationTrigger>),
}

/// A named, enable-able unit pairing one trigger with an ordered command
/// list and an execution mode.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Stable identifier.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Disabled workflows never participate in matching.
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    /// The trigger; a workflow without one never participates in matching.
    #[serde(default)]
    pub trigger: Option<Trigger>,
    /// Commands executed in list order.
    #[serde(default)]
    pub commands: Vec<Command>,
    /// Sequencing mode for the command list.
    #[serde(default)]
    pub execution_mode: ExecutionMode,
}

impl Default for Workflow {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            is_enabled: true,
            trigger: None,
            commands: Vec::new(),
            execution_mode: ExecutionMode::default(),
        }
    }
}

impl Workflow {
    /// True when this workflow can take part in trigger matching.
    pub fn is_active(&self) -> bool {
        self.is_enabled && self.trigger.is_some()
    }
}

/// Days of the week for rule gating.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// Restricts a group's applicability to certain applications and/or days.
///
/// An empty bundle list means the group applies globally; an empty day list
/// means every day. Day gating is applied by the host configuration layer
/// before groups reach the engine, so the index build stays deterministic.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Bundle identifiers the group is scoped to.
    #[serde(default)]
    pub bundle_identifiers: Vec<String>,
    /// Days the group is active on.
    #[serde(default)]
    pub days: Vec<Day>,
}

impl Rule {
    /// The scopes keyboard triggers in the group register under.
    pub fn scopes(&self) -> Vec<String> {
        if self.bundle_identifiers.is_empty() {
            vec![WILDCARD_SCOPE.to_string()]
        } else {
            self.bundle_identifiers.clone()
        }
    }

    /// True when the rule permits the given day.
    pub fn is_active_on(&self, day: Day) -> bool {
        self.days.is_empty() || self.days.contains(&day)
    }
}

/// An ordered collection of workflows sharing one scoping rule.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGroup {
    /// Stable identifier.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Workflows in registration order.
    #[serde(default)]
    pub workflows: Vec<Workflow>,
    /// Optional scoping rule; a group without one applies globally.
    #[serde(default)]
    pub rule: Option<Rule>,
}

impl WorkflowGroup {
    /// Scopes for this group's keyboard triggers: the rule's bundle
    /// identifiers, or the wildcard when there is no rule.
    pub fn scopes(&self) -> Vec<String> {
        self.rule
            .as_ref()
            .map(Rule::scopes)
            .unwrap_or_else(|| vec![WILDCARD_SCOPE.to_string()])
    }
}
