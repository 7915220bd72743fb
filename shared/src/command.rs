//! Command capability consumed by the batch aggregator
//!
//! A command owns its own protocol framing and decoding. The batch only
//! drives it through this trait and reads back the resulting strings.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

/// Read side of the adapter stream shared by every command in a batch
pub type InputStream = dyn AsyncRead + Send + Unpin;

/// Write side of the adapter stream shared by every command in a batch
pub type OutputStream = dyn AsyncWrite + Send + Unpin;

/// Shared handle to a command. The batch never owns the command's lifetime.
pub type SharedCommand = Arc<Mutex<dyn ObdCommand>>;

/// Errors a command can raise while dispatching
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Transport failure: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Command dispatch cancelled")]
    Cancelled,
}

/// A single request/response unit with raw and formatted result state
#[async_trait]
pub trait ObdCommand: Send {
    /// Send the request over `output` and read the reply from `input`,
    /// updating the raw result on success
    async fn run(
        &mut self,
        input: &mut InputStream,
        output: &mut OutputStream,
    ) -> Result<(), CommandError>;

    /// Decode `raw_field` into the formatted result
    fn convert_raw_data(&mut self, raw_field: &str);

    /// Most recent raw result
    fn result(&self) -> String;

    /// Most recent formatted result
    fn formatted_result(&self) -> String;

    /// Toggle whether future conversions decode or pass raw data through
    fn set_convert_raw_data(&mut self, convert: bool);
}

/// Wrap a concrete command into a shared handle
pub fn shared<C: ObdCommand + 'static>(command: C) -> SharedCommand {
    Arc::new(Mutex::new(command))
}
