use config::KeyShortcut;

/// Direction of a key transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyEventKind {
    /// Key pressed.
    Down,
    /// Key released.
    Up,
}

/// One event from the host keystroke source.
///
/// The host is responsible for translating virtual key codes and modifier
/// flag bitmasks into a [`KeyShortcut`]; events must arrive on a single
/// ordered stream.
#[derive(Clone, Debug)]
pub struct KeyEvent {
    /// Down or up.
    pub kind: KeyEventKind,
    /// The keystroke, in matching identity form.
    pub shortcut: KeyShortcut,
    /// Set when this is an OS auto-repeat of a held key.
    pub repeat: bool,
}

impl KeyEvent {
    /// A non-repeat key-down.
    pub fn down(shortcut: KeyShortcut) -> Self {
        Self {
            kind: KeyEventKind::Down,
            shortcut,
            repeat: false,
        }
    }

    /// A key-up.
    pub fn up(shortcut: KeyShortcut) -> Self {
        Self {
            kind: KeyEventKind::Up,
            shortcut,
            repeat: false,
        }
    }
}

/// Per-event answer to the keystroke source: whether the OS should still
/// deliver the event to the foreground application.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventDisposition {
    /// Suppress the event; the engine handled it.
    Consumed,
    /// Let the event through untouched.
    Released,
}
