//! OBD Shared Command Types
//!
//! This crate provides the command capability trait and the batch aggregator
//! used to poll several OBD-II requests over one adapter stream.

pub mod batch;
pub mod codec;
pub mod command;

pub use batch::{BatchError, CommandBatch};
pub use codec::{split_fields, FieldWriter, FIELD_SEPARATOR};
pub use command::{shared, CommandError, InputStream, ObdCommand, OutputStream, SharedCommand};
