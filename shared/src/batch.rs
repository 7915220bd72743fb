//! Ordered batch of commands dispatched and aggregated together
//!
//! The batch holds shared handles only. Commands keep their own result state;
//! the batch runs them in insertion order and concatenates what they report.

use crate::codec::{split_fields, FieldWriter};
use crate::command::{CommandError, InputStream, OutputStream, SharedCommand};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors raised by batch-level operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// More raw fields were supplied than the batch holds commands
    #[error("No command at position {index} (batch holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Ordered collection of command handles
#[derive(Clone, Default)]
pub struct CommandBatch {
    commands: Vec<SharedCommand>,
}

impl fmt::Debug for CommandBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBatch")
            .field("commands", &self.commands.len())
            .finish()
    }
}

impl CommandBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command. Duplicates are allowed.
    pub fn add(&mut self, command: SharedCommand) {
        self.commands.push(command);
    }

    /// Remove the first occurrence of `command`; no-op if absent
    pub fn remove(&mut self, command: &SharedCommand) {
        if let Some(pos) = self.commands.iter().position(|c| Arc::ptr_eq(c, command)) {
            self.commands.remove(pos);
        }
    }

    /// Number of commands currently held
    pub fn number_of_commands(&self) -> usize {
        self.commands.len()
    }

    /// Set the conversion mode on every command currently held.
    /// Commands added later keep their own mode.
    pub async fn set_convert_raw_data(&self, convert: bool) {
        for command in &self.commands {
            command.lock().await.set_convert_raw_data(convert);
        }
    }

    /// Run every command in order over the shared stream pair
    ///
    /// Stops at the first failing command and returns its error unchanged.
    /// Commands already run keep their results; the rest are not run.
    pub async fn send_commands(
        &self,
        input: &mut InputStream,
        output: &mut OutputStream,
    ) -> Result<(), CommandError> {
        for (position, command) in self.commands.iter().enumerate() {
            trace!("Dispatching command {}/{}", position + 1, self.commands.len());
            command.lock().await.run(input, output).await?;
        }

        debug!("Dispatched {} commands", self.commands.len());
        Ok(())
    }

    /// Raw results in order, each followed by a comma
    pub async fn raw_result(&self) -> String {
        let mut writer = FieldWriter::new();
        for command in &self.commands {
            writer.push(&command.lock().await.result());
        }
        writer.finish()
    }

    /// Formatted results in order, each followed by a comma
    pub async fn formatted_result(&self) -> String {
        let mut writer = FieldWriter::new();
        for command in &self.commands {
            writer.push(&command.lock().await.formatted_result());
        }
        writer.finish()
    }

    /// Feed each field of `raw_result` to the command at the same position
    /// and collect the formatted results
    ///
    /// Fewer fields than commands converts only the leading commands. More
    /// fields than commands fails once the fields run past the last command,
    /// after the leading commands have already been converted.
    pub async fn convert_raw_result_to_formatted_result(
        &self,
        raw_result: &str,
    ) -> Result<String, BatchError> {
        let mut writer = FieldWriter::new();

        for (index, field) in split_fields(raw_result).into_iter().enumerate() {
            let command = self.commands.get(index).ok_or(BatchError::IndexOutOfRange {
                index,
                len: self.commands.len(),
            })?;

            let mut command = command.lock().await;
            command.convert_raw_data(field);
            writer.push(&command.formatted_result());
        }

        Ok(writer.finish())
    }
}
