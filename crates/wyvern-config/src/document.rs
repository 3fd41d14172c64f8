//! Configuration Documents
//!
//! The parsed form of a `wy.toml` file: an ordered tree of tables and
//! key/value pairs. The tree's shape defines the concrete keys present in the
//! document; tables contribute their name segments and pairs their key.
//!
//! Lookup is first-match-wins in declaration order, so a pair declared twice
//! in the same table shadows its later duplicates.

use crate::path::{Filter, Trie};
use crate::schema::Schema;
use crate::{ConfigResult, Configuration};
use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Document conversion errors
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid TOML syntax: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported {kind} value for key '{key}'")]
    UnsupportedValue { key: Trie, kind: &'static str },

    #[error("Key '{0}' is declared both as a value and as a table")]
    Conflict(Trie),

    #[error("Failed to render TOML: {0}")]
    Render(#[from] toml::ser::Error),
}

/// The kind of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Integer,
    Boolean,
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::String => write!(f, "string"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::Boolean => write!(f, "boolean"),
            ValueKind::List => write!(f, "list"),
        }
    }
}

/// A configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    List(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Integer(_) => ValueKind::Integer,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::List(_) => ValueKind::List,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Byte range of a declaration in its source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// `key = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValuePair {
    pub key: String,
    pub value: Value,
    /// Source location, when the producing parser tracks one
    pub span: Option<Span>,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// `[a.b]` followed by its declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: Vec<String>,
    pub children: Vec<Declaration>,
}

impl Table {
    pub fn new<I, S>(name: I, children: Vec<Declaration>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into_iter().map(Into::into).collect(),
            children,
        }
    }

    /// The table name as a key (`a.b` becomes `a/b`)
    pub fn name_key(&self) -> Trie {
        Trie::from_segments(self.name.iter().cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Table(Table),
    KeyValue(KeyValuePair),
}

impl From<Table> for Declaration {
    fn from(table: Table) -> Self {
        Declaration::Table(table)
    }
}

impl From<KeyValuePair> for Declaration {
    fn from(pair: KeyValuePair) -> Self {
        Declaration::KeyValue(pair)
    }
}

/// A parsed configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    declarations: Vec<Declaration>,
}

impl ConfigDocument {
    pub fn new(declarations: Vec<Declaration>) -> Self {
        Self { declarations }
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn push(&mut self, declaration: impl Into<Declaration>) {
        self.declarations.push(declaration.into());
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Find the first key/value pair at `key`
    pub fn lookup(&self, key: &Trie) -> Option<&KeyValuePair> {
        lookup_in(&self.declarations, key.segments())
    }

    pub(crate) fn lookup_mut(&mut self, key: &Trie) -> Option<&mut KeyValuePair> {
        lookup_in_mut(&mut self.declarations, key.segments())
    }

    pub fn contains_key(&self, key: &Trie) -> bool {
        self.lookup(key).is_some()
    }

    /// Forget source positions, e.g. before comparing documents
    pub fn clear_spans(&mut self) {
        fn clear(declarations: &mut [Declaration]) {
            for declaration in declarations {
                match declaration {
                    Declaration::KeyValue(pair) => pair.span = None,
                    Declaration::Table(table) => clear(&mut table.children),
                }
            }
        }
        clear(&mut self.declarations);
    }

    /// Every concrete key matching `filter`, in document order
    ///
    /// A key declared more than once is reported once.
    pub fn match_all(&self, filter: &Filter) -> Vec<Trie> {
        let mut matches = Vec::new();
        let mut seen = HashSet::new();
        collect_matches(
            &self.declarations,
            &Trie::root(),
            filter,
            &mut seen,
            &mut matches,
        );
        matches
    }

    /// Every concrete key in the document
    pub fn keys(&self) -> Vec<Trie> {
        self.match_all(&Filter::all())
    }

    /// Add a new pair at `key`
    ///
    /// The pair goes into the first table whose full path equals the key's
    /// parent; otherwise a new table named by the parent is appended. Root
    /// level keys are appended directly.
    pub(crate) fn insert(&mut self, key: &Trie, value: Value) {
        let Some((last, parent)) = key.segments().split_last() else {
            return;
        };
        let pair = Declaration::KeyValue(KeyValuePair::new(last.clone(), value));

        if parent.is_empty() {
            self.declarations.push(pair);
            return;
        }

        match find_table_mut(&mut self.declarations, parent) {
            Some(table) => table.children.push(pair),
            None => self
                .declarations
                .push(Declaration::Table(Table::new(parent.to_vec(), vec![pair]))),
        }
    }

    /// Validate this document against `schema`
    pub fn into_configuration(self, schema: Schema, strict: bool) -> ConfigResult<Configuration> {
        Configuration::new(self, schema, strict)
    }

    /// Parse TOML text into a document
    ///
    /// Every pair carries the byte range of its value in `source`.
    pub fn from_toml_str(source: &str) -> Result<Self, DocumentError> {
        let table: toml::Table = source.parse()?;
        let mut document = Self::from_toml_table(&table)?;
        if let SpanNode::Table(entries) = toml::from_str::<SpanNode>(source)? {
            document.attach_spans(&Trie::root(), &entries);
        }
        Ok(document)
    }

    fn attach_spans(&mut self, prefix: &Trie, entries: &[(String, toml::Spanned<SpanNode>)]) {
        for (key, node) in entries {
            let path = prefix.append(key.clone());
            match node.get_ref() {
                SpanNode::Value => {
                    if let Some(pair) = self.lookup_mut(&path) {
                        let range = node.span();
                        pair.span = Some(Span {
                            start: range.start,
                            end: range.end,
                        });
                    }
                }
                SpanNode::Table(children) => self.attach_spans(&path, children),
            }
        }
    }

    /// Convert an already parsed TOML table, keeping declaration order
    ///
    /// A parsed table has no source positions, so pairs carry no span.
    pub fn from_toml_table(table: &toml::Table) -> Result<Self, DocumentError> {
        Ok(Self {
            declarations: convert_table(table, &Trie::root())?,
        })
    }

    /// Render the document as TOML text
    pub fn to_toml_string(&self) -> Result<String, DocumentError> {
        let mut root = toml::Table::new();
        merge_into(&mut root, &self.declarations, &Trie::root())?;
        Ok(toml::to_string(&root)?)
    }
}

fn lookup_in<'d>(declarations: &'d [Declaration], key: &[String]) -> Option<&'d KeyValuePair> {
    for declaration in declarations {
        match declaration {
            Declaration::KeyValue(pair) => {
                if key.len() == 1 && pair.key == key[0] {
                    return Some(pair);
                }
            }
            Declaration::Table(table) => {
                let depth = table.name.len();
                if key.len() > depth && key.starts_with(&table.name) {
                    if let Some(found) = lookup_in(&table.children, &key[depth..]) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

fn lookup_in_mut<'d>(
    declarations: &'d mut [Declaration],
    key: &[String],
) -> Option<&'d mut KeyValuePair> {
    for declaration in declarations.iter_mut() {
        match declaration {
            Declaration::KeyValue(pair) => {
                if key.len() == 1 && pair.key == key[0] {
                    return Some(pair);
                }
            }
            Declaration::Table(table) => {
                let depth = table.name.len();
                if key.len() > depth && key.starts_with(&table.name) {
                    if let Some(found) = lookup_in_mut(&mut table.children, &key[depth..]) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

fn find_table_mut<'d>(declarations: &'d mut [Declaration], path: &[String]) -> Option<&'d mut Table> {
    for declaration in declarations.iter_mut() {
        if let Declaration::Table(table) = declaration {
            let depth = table.name.len();
            if !path.starts_with(&table.name) {
                continue;
            }
            if path.len() == depth {
                return Some(table);
            }
            if let Some(found) = find_table_mut(&mut table.children, &path[depth..]) {
                return Some(found);
            }
        }
    }
    None
}

fn collect_matches(
    declarations: &[Declaration],
    prefix: &Trie,
    filter: &Filter,
    seen: &mut HashSet<Trie>,
    matches: &mut Vec<Trie>,
) {
    for declaration in declarations {
        match declaration {
            Declaration::Table(table) => {
                let mut path = prefix.clone();
                for segment in &table.name {
                    path.push(segment.clone());
                }
                collect_matches(&table.children, &path, filter, seen, matches);
            }
            Declaration::KeyValue(pair) => {
                let key = prefix.append(pair.key.clone());
                if filter.matches(&key) && seen.insert(key.clone()) {
                    matches.push(key);
                }
            }
        }
    }
}

fn convert_table(table: &toml::Table, path: &Trie) -> Result<Vec<Declaration>, DocumentError> {
    let mut declarations = Vec::with_capacity(table.len());
    for (key, value) in table {
        let here = path.append(key.clone());
        let declaration = match value {
            toml::Value::Table(inner) => {
                Declaration::Table(Table::new([key.clone()], convert_table(inner, &here)?))
            }
            other => Declaration::KeyValue(KeyValuePair::new(
                key.clone(),
                convert_value(other, &here)?,
            )),
        };
        declarations.push(declaration);
    }
    Ok(declarations)
}

fn convert_value(value: &toml::Value, key: &Trie) -> Result<Value, DocumentError> {
    let unsupported = |kind| DocumentError::UnsupportedValue {
        key: key.clone(),
        kind,
    };
    match value {
        toml::Value::String(s) => Ok(Value::String(s.clone())),
        toml::Value::Integer(i) => Ok(Value::Integer(*i)),
        toml::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| convert_value(item, key))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        toml::Value::Float(_) => Err(unsupported("float")),
        toml::Value::Datetime(_) => Err(unsupported("datetime")),
        toml::Value::Table(_) => Err(unsupported("table")),
    }
}

/// Shape of a TOML source with the position of every value
enum SpanNode {
    Value,
    Table(Vec<(String, toml::Spanned<SpanNode>)>),
}

impl<'de> Deserialize<'de> for SpanNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SpanNodeVisitor)
    }
}

struct SpanNodeVisitor;

impl<'de> Visitor<'de> for SpanNodeVisitor {
    type Value = SpanNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a TOML value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<SpanNode, E> {
        Ok(SpanNode::Value)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<SpanNode, E> {
        Ok(SpanNode::Value)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<SpanNode, E> {
        Ok(SpanNode::Value)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<SpanNode, E> {
        Ok(SpanNode::Value)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<SpanNode, E> {
        Ok(SpanNode::Value)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<SpanNode, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(SpanNode::Value)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SpanNode, A::Error> {
        let mut entries = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            entries.push((key, map.next_value::<toml::Spanned<SpanNode>>()?));
        }
        Ok(SpanNode::Table(entries))
    }
}

fn to_toml_value(value: &Value) -> toml::Value {
    match value {
        Value::String(s) => toml::Value::String(s.clone()),
        Value::Integer(i) => toml::Value::Integer(*i),
        Value::Boolean(b) => toml::Value::Boolean(*b),
        Value::List(items) => toml::Value::Array(items.iter().map(to_toml_value).collect()),
    }
}

fn merge_into(
    target: &mut toml::Table,
    declarations: &[Declaration],
    path: &Trie,
) -> Result<(), DocumentError> {
    for declaration in declarations {
        match declaration {
            Declaration::KeyValue(pair) => {
                let key = path.append(pair.key.clone());
                match target.get(&pair.key) {
                    Some(toml::Value::Table(_)) => return Err(DocumentError::Conflict(key)),
                    // Shadowed duplicate
                    Some(_) => {}
                    None => {
                        target.insert(pair.key.clone(), to_toml_value(&pair.value));
                    }
                }
            }
            Declaration::Table(table) => {
                let mut here = path.clone();
                let mut cursor: &mut toml::Table = &mut *target;
                for segment in &table.name {
                    here.push(segment.clone());
                    let entry = cursor
                        .entry(segment.clone())
                        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
                    cursor = match entry {
                        toml::Value::Table(inner) => inner,
                        _ => return Err(DocumentError::Conflict(here)),
                    };
                }
                merge_into(cursor, &table.children, &here)?;
            }
        }
    }
    Ok(())
}
