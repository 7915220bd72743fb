//! Comma-separated field lists for batch results
//!
//! Batch output is a list of fields, each followed by a separator:
//! ```text
//! 12,34,56,
//! ```
//!
//! The trailing separator is part of the format. Consumers re-splitting the
//! output see (and must ignore) one trailing empty field.

/// Separator between fields in a batch result
pub const FIELD_SEPARATOR: char = ',';

/// Builder for trailing-separator field lists
#[derive(Debug, Default)]
pub struct FieldWriter {
    buffer: String,
}

impl FieldWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field followed by the separator
    pub fn push(&mut self, field: &str) {
        self.buffer.push_str(field);
        self.buffer.push(FIELD_SEPARATOR);
    }

    /// Take the accumulated list
    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Split a field list into its fields
///
/// Input without any separator is a single field, even when empty. Otherwise
/// trailing empty fields are dropped while inner empty fields are kept.
pub fn split_fields(raw: &str) -> Vec<&str> {
    if !raw.contains(FIELD_SEPARATOR) {
        return vec![raw];
    }

    let mut fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }

    fields
}
