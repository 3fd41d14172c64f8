//! Package manifest (the `wy.toml` embedded in every package)

use crate::version::SemanticVersion;
use crate::{PackageError, Result};
use serde::{Deserialize, Serialize};
use wyvern_config::{
    ConfigDocument, ConfigError, Configuration, Declaration, Filter, KeyValueDescriptor,
    KeyValuePair, Schema, Table, Trie, Value,
};

fn is_version(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| SemanticVersion::parse(s).is_ok())
}

fn filter(path: &str) -> Filter {
    Filter::literal(path.split('/'))
}

fn key(path: &str) -> Trie {
    Trie::from_segments(path.split('/'))
}

fn manifest_error(error: ConfigError) -> PackageError {
    PackageError::Manifest(error.to_string())
}

/// Schema for package configuration files
///
/// ```toml
/// [package]
/// name = "json"
/// version = "1.2.0"
/// authors = ["ada"]
/// description = "JSON codec"
///
/// [dependencies]
/// text = "2.0.0"
/// ```
pub fn package_schema() -> Schema {
    Schema::new(vec![
        KeyValueDescriptor::string(filter("package/name"), "package name", true),
        KeyValueDescriptor::string(filter("package/version"), "package version", true)
            .with_validator(is_version),
        KeyValueDescriptor::list(filter("package/authors"), "package authors", false),
        KeyValueDescriptor::string(filter("package/description"), "one-line summary", false),
        KeyValueDescriptor::string(
            Filter::literal(["dependencies"]).then_one(),
            "required version of a dependency",
            false,
        )
        .with_validator(is_version),
    ])
}

/// Typed view of a package configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageManifest {
    pub name: String,
    pub version: SemanticVersion,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Dependencies in declaration order
    #[serde(default)]
    pub dependencies: Vec<(String, SemanticVersion)>,
}

impl PackageManifest {
    pub fn new(name: impl Into<String>, version: SemanticVersion) -> Self {
        Self {
            name: name.into(),
            version,
            authors: Vec::new(),
            description: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, name: impl Into<String>, version: SemanticVersion) -> Self {
        self.dependencies.push((name.into(), version));
        self
    }

    /// Read a manifest from a configuration validated against [`package_schema`]
    pub fn from_config(config: &Configuration) -> Result<Self> {
        let name: String = config.get(&key("package/name")).map_err(manifest_error)?;
        let version: String = config.get(&key("package/version")).map_err(manifest_error)?;

        let authors_key = key("package/authors");
        let mut authors = Vec::new();
        if config.has_key(&authors_key) {
            for author in config.get::<Vec<Value>>(&authors_key).map_err(manifest_error)? {
                match author {
                    Value::String(author) => authors.push(author),
                    other => {
                        return Err(PackageError::Manifest(format!(
                            "author {} is not a string",
                            other
                        )))
                    }
                }
            }
        }

        let description_key = key("package/description");
        let description = if config.has_key(&description_key) {
            Some(config.get::<String>(&description_key).map_err(manifest_error)?)
        } else {
            None
        };

        let mut dependencies = Vec::new();
        for dep in config.match_all(&Filter::literal(["dependencies"]).then_one()) {
            let required: String = config.get(&dep).map_err(manifest_error)?;
            let dep_name = dep.last().unwrap_or("").to_string();
            dependencies.push((dep_name, SemanticVersion::parse(&required)?));
        }

        Ok(Self {
            name,
            version: SemanticVersion::parse(&version)?,
            authors,
            description,
            dependencies,
        })
    }

    /// Render as a configuration document
    pub fn to_document(&self) -> ConfigDocument {
        let mut package: Vec<Declaration> = vec![
            KeyValuePair::new("name", self.name.as_str()).into(),
            KeyValuePair::new("version", self.version.to_string()).into(),
        ];
        if !self.authors.is_empty() {
            let authors: Vec<Value> = self.authors.iter().map(|a| Value::from(a.as_str())).collect();
            package.push(KeyValuePair::new("authors", authors).into());
        }
        if let Some(description) = &self.description {
            package.push(KeyValuePair::new("description", description.as_str()).into());
        }

        let mut document = ConfigDocument::new(vec![Table::new(["package"], package).into()]);
        if !self.dependencies.is_empty() {
            let dependencies = self
                .dependencies
                .iter()
                .map(|(name, version)| {
                    Declaration::from(KeyValuePair::new(name.as_str(), version.to_string()))
                })
                .collect();
            document.push(Table::new(["dependencies"], dependencies));
        }
        document
    }
}
