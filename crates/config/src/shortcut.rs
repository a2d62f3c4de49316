use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

/// Modifier keys recognized by shortcut triggers.
///
/// Variant declaration order is the canonical signature order, so a
/// `BTreeSet<Modifier>` iterates in canonical form without sorting.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    /// Command (⌘)
    Command,
    /// Option (⌥)
    Option,
    /// Control (⌃)
    Control,
    /// Shift (⇧)
    Shift,
    /// Function (fn)
    Function,
    /// Caps Lock
    CapsLock,
}

impl Modifier {
    /// Canonical spec string, always lowercased with short forms.
    pub fn to_spec(self) -> &'static str {
        match self {
            Self::Command => "cmd",
            Self::Option => "opt",
            Self::Control => "ctrl",
            Self::Shift => "shift",
            Self::Function => "fn",
            Self::CapsLock => "capslock",
        }
    }

    /// Parses a modifier spec, accepting common alias words
    /// (e.g., cmd/command, opt/alt/option, ctrl/control, caps).
    pub fn from_spec(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cmd" | "command" => Some(Self::Command),
            "opt" | "alt" | "option" => Some(Self::Option),
            "ctrl" | "control" => Some(Self::Control),
            "shift" => Some(Self::Shift),
            "fn" | "function" => Some(Self::Function),
            "caps" | "capslock" => Some(Self::CapsLock),
            _ => None,
        }
    }
}

/// Which physical side of the keyboard the modifiers must be pressed on.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left-hand modifiers only.
    Left,
    /// Right-hand modifiers only.
    Right,
    /// Either side matches.
    #[default]
    Unspecified,
}

impl Side {
    fn suffix(self) -> &'static str {
        match self {
            Self::Left => "@left",
            Self::Right => "@right",
            Self::Unspecified => "",
        }
    }
}

/// A single keystroke in a trigger chord: a key plus a set of modifiers and
/// an optional side constraint.
///
/// Matching identity is `(key, modifiers, side)`; `id` exists only so a UI
/// can bind to individual entries and never participates in matching.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyShortcut {
    /// UI-binding identifier; ignored for matching.
    #[serde(default)]
    pub id: String,
    /// The non-modifier key, e.g. "a", "1", "," or "space".
    pub key: String,
    /// Modifier keys held down for this keystroke.
    #[serde(default)]
    pub modifiers: BTreeSet<Modifier>,
    /// Side constraint for the modifiers.
    #[serde(default)]
    pub side: Side,
}

impl KeyShortcut {
    /// Create a shortcut from a key and modifiers, side unspecified.
    pub fn new(key: impl Into<String>, modifiers: impl IntoIterator<Item = Modifier>) -> Self {
        Self {
            id: String::new(),
            key: key.into(),
            modifiers: modifiers.into_iter().collect(),
            side: Side::Unspecified,
        }
    }

    /// Parses a shortcut specification of the form "cmd+shift+k" with an
    /// optional side suffix ("cmd+k@left").
    ///
    /// - Case-insensitive for modifiers and the key.
    /// - Components are separated by "+"; the last component is the key.
    /// - Any "@" suffix other than "left"/"right" fails the parse.
    pub fn parse(s: &str) -> Option<Self> {
        let (body, side) = match s.rsplit_once('@') {
            Some((body, "left")) => (body, Side::Left),
            Some((body, "right")) => (body, Side::Right),
            Some(_) => return None,
            None => (s, Side::Unspecified),
        };
        let mut parts: Vec<&str> = body.split('+').collect();
        let key_raw = parts.pop()?;
        let key = if key_raw == " " {
            " ".to_string()
        } else {
            let trimmed = key_raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.to_ascii_lowercase()
        };
        let mut modifiers = BTreeSet::new();
        for part in parts {
            modifiers.insert(Modifier::from_spec(part.trim())?);
        }
        Some(Self {
            id: String::new(),
            key,
            modifiers,
            side,
        })
    }

    /// Canonical string form of this shortcut: modifiers in canonical order,
    /// lowercased key, side suffix when constrained. Two shortcuts with the
    /// same matching identity always produce the same signature.
    pub fn signature(&self) -> String {
        let mut out: Vec<&str> = self.modifiers.iter().map(|m| m.to_spec()).collect();
        let key = self.key.to_ascii_lowercase();
        out.push(&key);
        format!("{}{}", out.join("+"), self.side.suffix())
    }
}

impl fmt::Display for KeyShortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// Joined signature for a chord sequence, one space between keystrokes.
pub fn sequence_signature(shortcuts: &[KeyShortcut]) -> String {
    shortcuts
        .iter()
        .map(KeyShortcut::signature)
        .collect::<Vec<_>>()
        .join(" ")
}
