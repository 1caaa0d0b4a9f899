//! Bookmark reconciliation between the device and the library.
//!
//! The merge subsystem is responsible for:
//! 1. **Detection** -- pairing device and library bookmarks by ID and
//!    classifying each pair as unchanged, new, edited or deleted.
//! 2. **Resolution** -- asking a [`ConflictPrompt`] which side wins for every
//!    edit and deletion conflict.
//! 3. **Assembly** -- producing the merged set in device-then-library order.

pub mod conflict;
pub mod engine;

pub use conflict::{prompt_fn, Conflict, ConflictKind, ConflictPrompt, PromptFn, Resolution};
pub use engine::{merge, MergeOutcome, MergeStats};
