//! Wyvern Configuration System
//!
//! Provides schema-validated configuration for Wyvern projects and packages:
//! - Hierarchical keys and glob filters ([`Trie`], [`Filter`])
//! - Configuration documents built from tables and key/value pairs
//! - Schemas describing which keys exist, their kinds and defaults
//! - Validated [`Configuration`]s with typed reads and writes
//! - Project (`wy.toml`) and global (`~/.wyvern/config.toml`) loading
//!
//! # Configuration Hierarchy
//!
//! 1. Global config (~/.wyvern/config.toml), validated leniently
//! 2. Environment variables (WYVERN_*) written over the global config
//! 3. Project config (wy.toml), validated strictly
//!
//! # Example
//!
//! ```no_run
//! use wyvern_config::{ConfigLoader, Filter, KeyValueDescriptor, Schema};
//! use std::path::Path;
//!
//! let schema = Schema::new(vec![KeyValueDescriptor::string(
//!     Filter::parse("package/name").unwrap(),
//!     "package name",
//!     true,
//! )]);
//! let project = ConfigLoader::new()
//!     .load_project(Path::new("."), &schema)
//!     .unwrap();
//! ```

pub mod configuration;
pub mod document;
pub mod loader;
pub mod path;
pub mod schema;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration in {file}: {error}")]
    Parse { file: PathBuf, error: DocumentError },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Invalid path: {0}")]
    Path(#[from] PathError),

    #[error("Missing required key matching '{filter}'")]
    MissingKey { filter: Filter },

    #[error("Expected {expected} for '{key}' but found {found}{}", at(.span))]
    TypeMismatch {
        key: Trie,
        expected: ValueKind,
        found: ValueKind,
        span: Option<Span>,
    },

    #[error("Invalid value for '{key}'{}", at(.span))]
    InvalidValue { key: Trie, span: Option<Span> },

    #[error("Unknown key '{key}'{}", at(.span))]
    UnknownKey { key: Trie, span: Option<Span> },

    #[error("Cannot use {found} value of '{key}' as {expected}")]
    IncompatibleType {
        key: Trie,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("No value or default for key '{0}'")]
    InvalidKey(Trie),

    #[error("Invalid value '{value}' in environment variable {var}")]
    InvalidEnvironment { var: String, value: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

fn at(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!(" at {}", span),
        None => String::new(),
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use configuration::{validate, ConfigType, Configuration};
pub use document::{
    ConfigDocument, Declaration, DocumentError, KeyValuePair, Span, Table, Value, ValueKind,
};
pub use loader::{ConfigLoader, Project, PROJECT_FILE};
pub use path::{Filter, FilterSegment, PathError, Trie};
pub use schema::{KeyValueDescriptor, Schema};
