//! Conflicts raised during a merge and the capability that decides them.

use serde::{Deserialize, Serialize};

use crate::errors::{BookmarkError, PromptError};
use crate::models::Bookmark;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Categorisation of a conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Same bookmark ID on both sides with differing fields.
    Edit,
    /// Bookmark present in the library but gone from the device.
    Deletion,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Edit => write!(f, "edit"),
            Self::Deletion => write!(f, "deletion"),
        }
    }
}

/// Which side wins a conflict.
///
/// For a [`Conflict::Deletion`], `KeepDevice` accepts the device state, i.e.
/// the bookmark is deleted from the library too, and `KeepLibrary` keeps the
/// library copy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeepDevice,
    KeepLibrary,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeepDevice => write!(f, "keep_device"),
            Self::KeepLibrary => write!(f, "keep_library"),
        }
    }
}

/// A single bookmark that needs a user decision.
#[derive(Debug, Clone, Copy)]
pub enum Conflict<'a> {
    Edit {
        title: &'a str,
        device: &'a Bookmark,
        library: &'a Bookmark,
    },
    Deletion {
        title: &'a str,
        library: &'a Bookmark,
    },
}

impl<'a> Conflict<'a> {
    pub fn kind(&self) -> ConflictKind {
        match self {
            Self::Edit { .. } => ConflictKind::Edit,
            Self::Deletion { .. } => ConflictKind::Deletion,
        }
    }

    /// Title of the book the bookmark belongs to.
    pub fn title(&self) -> &'a str {
        match *self {
            Self::Edit { title, .. } | Self::Deletion { title, .. } => title,
        }
    }

    pub fn bookmark_id(&self) -> &'a str {
        match *self {
            Self::Edit { library, .. } | Self::Deletion { library, .. } => &library.bookmark_id,
        }
    }

    /// Short heading for the prompt window or section.
    pub fn heading(&self) -> String {
        match self {
            Self::Edit { title, .. } => format!("Update {}", title),
            Self::Deletion { title, .. } => format!("Delete {}", title),
        }
    }

    /// The yes/no question. Answering "yes" means [`Resolution::KeepDevice`].
    pub fn question(&self) -> &'static str {
        match self {
            Self::Edit { .. } => "This bookmark is changed, do you want to update library version?",
            Self::Deletion { .. } => {
                "This bookmark is deleted from device, do you want to delete it from library?"
            }
        }
    }

    /// Full prompt text: the question followed by every version in the
    /// exchange format, device version first.
    pub fn message(&self) -> Result<String, BookmarkError> {
        Ok(match self {
            Self::Edit {
                device, library, ..
            } => format!(
                "{}\nDevice:{}\n\nLibrary:{}",
                self.question(),
                device.to_json()?,
                library.to_json()?
            ),
            Self::Deletion { library, .. } => {
                format!("{}\nLibrary:{}", self.question(), library.to_json()?)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Decision capability
// ---------------------------------------------------------------------------

/// Blocking decision capability, called once per conflicting bookmark.
pub trait ConflictPrompt {
    fn decide(&mut self, conflict: &Conflict<'_>) -> Result<Resolution, PromptError>;
}

/// Adapter turning a closure into a [`ConflictPrompt`].
pub struct PromptFn<F> {
    f: F,
}

/// Wrap `f` so it can be used wherever a [`ConflictPrompt`] is expected.
pub fn prompt_fn<F>(f: F) -> PromptFn<F>
where
    F: FnMut(&Conflict<'_>) -> Resolution,
{
    PromptFn { f }
}

impl<F> ConflictPrompt for PromptFn<F>
where
    F: FnMut(&Conflict<'_>) -> Resolution,
{
    fn decide(&mut self, conflict: &Conflict<'_>) -> Result<Resolution, PromptError> {
        Ok((self.f)(conflict))
    }
}
