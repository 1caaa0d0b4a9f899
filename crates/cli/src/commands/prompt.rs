//! Interactive conflict prompts on the terminal.

use dialoguer::{Confirm, Select};

use kobomarks_core::errors::PromptError;
use kobomarks_core::merge::{Conflict, ConflictPrompt, Resolution};

use super::style;

/// Asks the user about every conflict, showing each version in full.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    asked: usize,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conflicts the user was asked about.
    pub fn asked(&self) -> usize {
        self.asked
    }
}

impl ConflictPrompt for TerminalPrompt {
    fn decide(&mut self, conflict: &Conflict<'_>) -> Result<Resolution, PromptError> {
        self.asked += 1;

        println!();
        println!("{}", style::header(&conflict.heading()));
        println!("{}", "─".repeat(conflict.heading().chars().count()));
        println!("{}", conflict.message()?);
        println!();

        match conflict {
            Conflict::Edit { .. } => {
                let choice = Select::new()
                    .with_prompt("Keep which version?")
                    .items(&["Device version (update library)", "Library version"])
                    .default(0)
                    .interact_opt()
                    .map_err(prompt_error)?
                    .ok_or(PromptError::Cancelled)?;

                Ok(if choice == 0 {
                    Resolution::KeepDevice
                } else {
                    Resolution::KeepLibrary
                })
            }
            Conflict::Deletion { .. } => {
                let delete = Confirm::new()
                    .with_prompt("Delete it from the library?")
                    .default(false)
                    .interact_opt()
                    .map_err(prompt_error)?
                    .ok_or(PromptError::Cancelled)?;

                Ok(if delete {
                    Resolution::KeepDevice
                } else {
                    Resolution::KeepLibrary
                })
            }
        }
    }
}

fn prompt_error(e: dialoguer::Error) -> PromptError {
    PromptError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e))
}
