//! Validated Configurations
//!
//! A [`Configuration`] binds a [`ConfigDocument`] to a [`Schema`]. It can only
//! be built through validation, so every `Configuration` in existence has
//! passed it: there is no partially valid state.

use crate::document::{ConfigDocument, Value, ValueKind};
use crate::path::{Filter, Trie};
use crate::schema::Schema;
use crate::{ConfigError, ConfigResult};
use std::collections::BTreeSet;

/// Rust types that configuration values can be read as
///
/// Untyped reads go through [`Configuration::get_value`].
pub trait ConfigType: Sized {
    /// The value kind this type is read from
    const KIND: ValueKind;

    fn from_value(value: &Value) -> Option<Self>;
}

impl ConfigType for String {
    const KIND: ValueKind = ValueKind::String;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl ConfigType for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_integer()
    }
}

impl ConfigType for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl ConfigType for Vec<Value> {
    const KIND: ValueKind = ValueKind::List;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_list().map(<[Value]>::to_vec)
    }
}

/// A document validated against a schema
#[derive(Debug, Clone)]
pub struct Configuration {
    document: ConfigDocument,
    schema: Schema,
    strict: bool,
    matched: BTreeSet<Trie>,
}

impl Configuration {
    /// Validate `document` against `schema`
    ///
    /// In strict mode any concrete key not covered by a descriptor is an
    /// error; otherwise such keys are ignored.
    pub fn new(document: ConfigDocument, schema: Schema, strict: bool) -> ConfigResult<Self> {
        let matched = validate(&document, &schema, strict)?;
        Ok(Self {
            document,
            schema,
            strict,
            matched,
        })
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    pub fn into_document(self) -> ConfigDocument {
        self.document
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Keys matched by at least one descriptor, in key order
    pub fn matched_keys(&self) -> &BTreeSet<Trie> {
        &self.matched
    }

    /// True if a value is present at `key`, or a matching descriptor has a default
    pub fn has_key(&self, key: &Trie) -> bool {
        self.document.contains_key(key)
            || self
                .schema
                .descriptor(key)
                .is_some_and(|descriptor| descriptor.has_default())
    }

    /// Read the value at `key` as `T`
    pub fn get<T: ConfigType>(&self, key: &Trie) -> ConfigResult<T> {
        let value = self.get_value(key)?;
        T::from_value(value).ok_or_else(|| ConfigError::IncompatibleType {
            key: key.clone(),
            expected: T::KIND,
            found: value.kind(),
        })
    }

    /// Read the value at `key`, falling back to the descriptor default
    pub fn get_value(&self, key: &Trie) -> ConfigResult<&Value> {
        if let Some(pair) = self.document.lookup(key) {
            return Ok(&pair.value);
        }
        self.schema
            .descriptor(key)
            .and_then(|descriptor| descriptor.default_value())
            .ok_or_else(|| ConfigError::InvalidKey(key.clone()))
    }

    /// Write `value` at `key`
    ///
    /// The key must be governed by at least one descriptor, and the value
    /// must have the kind of, and satisfy the predicate of, every descriptor
    /// matching the key. An existing pair is updated in place, otherwise a
    /// new pair is inserted.
    pub fn write(&mut self, key: &Trie, value: impl Into<Value>) -> ConfigResult<()> {
        let value = value.into();
        if key.is_empty() || !self.schema.is_key(key) {
            return Err(ConfigError::InvalidKey(key.clone()));
        }

        for descriptor in self.schema.matching(key) {
            if value.kind() != descriptor.kind() {
                return Err(ConfigError::IncompatibleType {
                    key: key.clone(),
                    expected: descriptor.kind(),
                    found: value.kind(),
                });
            }
            if !descriptor.is_valid(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.clone(),
                    span: None,
                });
            }
        }

        match self.document.lookup_mut(key) {
            Some(pair) => {
                pair.value = value;
                pair.span = None;
            }
            None => self.document.insert(key, value),
        }
        self.matched.insert(key.clone());
        Ok(())
    }

    /// Every concrete key matching `filter`, in document order
    pub fn match_all(&self, filter: &Filter) -> Vec<Trie> {
        self.document.match_all(filter)
    }
}

/// Check `document` against `schema`, returning the matched keys
///
/// Descriptors are processed in schema order and the first failure is
/// reported. Validation has no side effects, so repeating it gives the same
/// outcome.
pub fn validate(
    document: &ConfigDocument,
    schema: &Schema,
    strict: bool,
) -> ConfigResult<BTreeSet<Trie>> {
    let mut matched = BTreeSet::new();

    for descriptor in schema.descriptors() {
        let keys = document.match_all(descriptor.filter());
        if keys.is_empty() && descriptor.is_required() {
            return Err(ConfigError::MissingKey {
                filter: descriptor.filter().clone(),
            });
        }

        for key in keys {
            let Some(pair) = document.lookup(&key) else {
                continue;
            };
            if pair.value.kind() != descriptor.kind() {
                return Err(ConfigError::TypeMismatch {
                    key,
                    expected: descriptor.kind(),
                    found: pair.value.kind(),
                    span: pair.span,
                });
            }
            if !descriptor.is_valid(&pair.value) {
                return Err(ConfigError::InvalidValue {
                    key,
                    span: pair.span,
                });
            }
            matched.insert(key);
        }
    }

    if strict {
        if let Some(key) = document.keys().into_iter().find(|k| !matched.contains(k)) {
            let span = document.lookup(&key).and_then(|pair| pair.span);
            return Err(ConfigError::UnknownKey { key, span });
        }
    }

    Ok(matched)
}
