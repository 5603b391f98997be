//! Declarative field definitions for message types

use crate::{accessor::normalize_key, Value};

/// Options for declaring fields on a [`MessageType`](crate::MessageType)
///
/// ```rust
/// use outbox::FieldOptions;
///
/// let options = FieldOptions::new().required(true).writer(false);
/// assert!(options.is_required());
/// assert!(options.has_reader());
/// assert!(!options.has_writer());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOptions {
    required: bool,
    accessor: bool,
    reader: bool,
    writer: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        FieldOptions {
            required: false,
            accessor: true,
            reader: true,
            writer: true,
        }
    }
}

impl FieldOptions {
    /// Optional field with both reader and writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the field as required for delivery
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Install neither reader nor writer when `false`
    pub fn accessor(mut self, accessor: bool) -> Self {
        self.accessor = accessor;
        self
    }

    /// Install a reader (default `true`)
    pub fn reader(mut self, reader: bool) -> Self {
        self.reader = reader;
        self
    }

    /// Install a writer (default `true`)
    pub fn writer(mut self, writer: bool) -> Self {
        self.writer = writer;
        self
    }

    /// Whether the field must be present on delivery
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether a dynamic reader is installed
    pub fn has_reader(&self) -> bool {
        self.accessor && self.reader
    }

    /// Whether a dynamic writer is installed
    pub fn has_writer(&self) -> bool {
        self.accessor && self.writer
    }
}

/// A field declared on a message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    options: FieldOptions,
}

impl FieldDescriptor {
    pub(crate) fn new(name: &str, options: FieldOptions) -> Self {
        FieldDescriptor {
            name: normalize_key(name),
            options,
        }
    }

    /// Canonical field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options the field was declared with
    pub fn options(&self) -> FieldOptions {
        self.options
    }
}

/// Whether a field value counts as missing: null, or an empty string, array or
/// object.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{is_blank, FieldDescriptor, FieldOptions};

    #[test]
    fn accessor_false_disables_both_sides() {
        let options = FieldOptions::new().accessor(false);
        assert!(!options.has_reader());
        assert!(!options.has_writer());
        assert!(!options.is_required());
    }

    #[test]
    fn descriptor_names_are_normalized() {
        let field = FieldDescriptor::new("reply-to", FieldOptions::new());
        assert_eq!(field.name(), "reply_to");
    }

    #[test]
    fn blank_values() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&json!(null))));
        assert!(is_blank(Some(&json!(""))));
        assert!(is_blank(Some(&json!([]))));
        assert!(is_blank(Some(&json!({}))));
        assert!(!is_blank(Some(&json!("Bob"))));
        assert!(!is_blank(Some(&json!(0))));
        assert!(!is_blank(Some(&json!(false))));
    }
}
