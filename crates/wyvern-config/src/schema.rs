//! Configuration Schemas
//!
//! A [`Schema`] is an ordered list of [`KeyValueDescriptor`]s. Each descriptor
//! names the keys it governs with a [`Filter`] and states the expected value
//! kind, whether at least one matching key must be present, an optional
//! default and an optional validity predicate.

use crate::document::{Value, ValueKind};
use crate::path::{Filter, Trie};
use std::fmt;
use std::sync::Arc;

/// Validity predicate attached to a descriptor
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Describes the keys matched by one filter
#[derive(Clone)]
pub struct KeyValueDescriptor {
    filter: Filter,
    description: String,
    kind: ValueKind,
    required: bool,
    default: Option<Value>,
    validator: Option<Validator>,
}

impl KeyValueDescriptor {
    pub fn new(
        filter: Filter,
        description: impl Into<String>,
        kind: ValueKind,
        required: bool,
    ) -> Self {
        Self {
            filter,
            description: description.into(),
            kind,
            required,
            default: None,
            validator: None,
        }
    }

    pub fn string(filter: Filter, description: impl Into<String>, required: bool) -> Self {
        Self::new(filter, description, ValueKind::String, required)
    }

    pub fn integer(filter: Filter, description: impl Into<String>, required: bool) -> Self {
        Self::new(filter, description, ValueKind::Integer, required)
    }

    pub fn boolean(filter: Filter, description: impl Into<String>, required: bool) -> Self {
        Self::new(filter, description, ValueKind::Boolean, required)
    }

    pub fn list(filter: Filter, description: impl Into<String>, required: bool) -> Self {
        Self::new(filter, description, ValueKind::List, required)
    }

    /// An integer descriptor accepting only values in `min..=max`
    pub fn bounded_integer(
        filter: Filter,
        description: impl Into<String>,
        required: bool,
        min: i64,
        max: i64,
    ) -> Self {
        Self::integer(filter, description, required)
            .with_validator(move |value| matches!(value, Value::Integer(i) if (min..=max).contains(i)))
    }

    /// Value returned by reads of a matching key that is not present
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Apply the validity predicate (descriptors without one accept anything)
    pub fn is_valid(&self, value: &Value) -> bool {
        self.validator.as_ref().map_or(true, |check| check(value))
    }
}

impl fmt::Debug for KeyValueDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueDescriptor")
            .field("filter", &self.filter)
            .field("description", &self.description)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// An ordered set of descriptors
///
/// Overlapping filters are resolved by order: [`Schema::descriptor`] returns
/// the first descriptor that matches.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    descriptors: Arc<Vec<KeyValueDescriptor>>,
}

impl Schema {
    pub fn new(descriptors: Vec<KeyValueDescriptor>) -> Self {
        Self {
            descriptors: Arc::new(descriptors),
        }
    }

    /// A schema with no descriptors
    pub fn empty() -> Self {
        Self::default()
    }

    /// Concatenate schemas, keeping their order
    pub fn combine(schemas: &[Schema]) -> Self {
        Self::new(
            schemas
                .iter()
                .flat_map(|schema| schema.descriptors.iter().cloned())
                .collect(),
        )
    }

    pub fn descriptors(&self) -> &[KeyValueDescriptor] {
        &self.descriptors
    }

    /// The first descriptor whose filter matches `key`
    pub fn descriptor(&self, key: &Trie) -> Option<&KeyValueDescriptor> {
        self.descriptors.iter().find(|d| d.filter.matches(key))
    }

    /// Every descriptor whose filter matches `key`, in schema order
    pub fn matching<'a>(&'a self, key: &'a Trie) -> impl Iterator<Item = &'a KeyValueDescriptor> {
        self.descriptors.iter().filter(move |d| d.filter.matches(key))
    }

    pub fn is_key(&self, key: &Trie) -> bool {
        self.descriptor(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
