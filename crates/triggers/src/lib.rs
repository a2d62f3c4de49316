//! Trigger matching for keyflow.
//!
//! Three pieces, all synchronous and allocation-light on the hot path:
//! - [`TriggerIndex`]: compiles workflow groups into chord and lifecycle
//!   lookup tables. Pure function of configuration; rebuilt snapshots are
//!   swapped whole, never mutated in place.
//! - [`ChordMatcher`]: walks the chord table with a live keystroke stream,
//!   scoped by the frontmost application.
//! - [`LifecycleTracker`]: diffs running-application observations.

mod index;
mod lifecycle;
mod matcher;

pub use index::{ChordEntry, TriggerIndex};
pub use lifecycle::{LifecycleDiff, LifecycleTracker};
pub use matcher::{ChordMatcher, KeyUpDecision, MatchDecision};
