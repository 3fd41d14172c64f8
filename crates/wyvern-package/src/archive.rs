//! Package archives
//!
//! A package is distributed as a gzip-compressed tar archive of regular
//! files. The package configuration lives at [`PACKAGE_CONFIG_ENTRY`].

use crate::version::SemanticVersion;
use crate::PackageError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Component;
use std::sync::Arc;
use tar::{Archive, Builder, EntryType, Header};
use thiserror::Error;
use wyvern_config::{ConfigDocument, Configuration, Schema};

/// Archive entry holding the package configuration
pub const PACKAGE_CONFIG_ENTRY: &str = "wy.toml";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to write archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt archive: {0}")]
    Corrupt(String),
}

/// In-memory package contents, keyed by entry path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageArchive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl PackageArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.entries.insert(path.into(), data.into());
    }

    pub fn entry(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    /// Entries in path order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(path, data)| (path.as_str(), data.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as `.tar.gz`
    ///
    /// Header metadata is fixed, so equal archives encode to equal bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = Builder::new(encoder);

        for (path, data) in &self.entries {
            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            builder.append_data(&mut header, path, data.as_slice())?;
        }

        Ok(builder.into_inner()?.finish()?)
    }

    /// Decode a `.tar.gz` produced by [`PackageArchive::to_bytes`]
    ///
    /// Only regular files with relative paths are accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let corrupt = |e: std::io::Error| ArchiveError::Corrupt(e.to_string());
        let mut archive = Archive::new(GzDecoder::new(bytes));
        let mut entries = BTreeMap::new();

        for entry in archive.entries().map_err(corrupt)? {
            let mut entry = entry.map_err(corrupt)?;
            if entry.header().entry_type() != EntryType::Regular {
                return Err(ArchiveError::Corrupt(format!(
                    "unsupported entry type {:?}",
                    entry.header().entry_type()
                )));
            }

            let path = entry.path().map_err(corrupt)?.into_owned();
            if !path.components().all(|c| matches!(c, Component::Normal(_))) {
                return Err(ArchiveError::Corrupt(format!(
                    "entry path escapes the archive: {}",
                    path.display()
                )));
            }
            let name = path
                .to_str()
                .ok_or_else(|| ArchiveError::Corrupt("entry path is not UTF-8".to_string()))?
                .replace('\\', "/");

            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(corrupt)?;
            entries.insert(name, data);
        }

        Ok(Self { entries })
    }

    /// Lowercase hex SHA-256 of the encoded archive
    pub fn checksum(&self) -> Result<String, ArchiveError> {
        let mut hasher = Sha256::new();
        hasher.update(self.to_bytes()?);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Package identity: name plus version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId {
    pub name: String,
    pub version: SemanticVersion,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: SemanticVersion) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parse a stored identifier such as `json-v1.2.0`
    ///
    /// The last `-v` separates name and version, so names may contain `-v`.
    pub fn parse_file_stem(stem: &str) -> Option<Self> {
        let split = stem.rfind("-v")?;
        let name = &stem[..split];
        if name.is_empty() {
            return None;
        }
        let version = SemanticVersion::parse(&stem[split + 2..]).ok()?;
        Some(Self::new(name, version))
    }

    /// The version of `name` encoded in `stem`, if the stem belongs to `name`
    pub fn version_for(stem: &str, name: &str) -> Option<SemanticVersion> {
        let suffix = stem.strip_prefix(name)?.strip_prefix("-v")?;
        SemanticVersion::parse(suffix).ok()
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-v{}", self.name, self.version)
    }
}

/// A fetched package
#[derive(Debug, Clone)]
pub struct PackageRoot {
    id: PackageId,
    archive: Arc<PackageArchive>,
}

impl PackageRoot {
    pub fn new(id: PackageId, archive: Arc<PackageArchive>) -> Self {
        Self { id, archive }
    }

    pub fn id(&self) -> &PackageId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn version(&self) -> SemanticVersion {
        self.id.version
    }

    pub fn archive(&self) -> &PackageArchive {
        &self.archive
    }

    pub fn entry(&self, path: &str) -> Option<&[u8]> {
        self.archive.entry(path)
    }

    /// Parse and validate the embedded package configuration
    ///
    /// Validation is lenient: keys the schema does not know are ignored.
    pub fn read_config(&self, schema: &Schema) -> Result<Configuration, PackageError> {
        let bytes = self
            .entry(PACKAGE_CONFIG_ENTRY)
            .ok_or_else(|| PackageError::MissingConfig(self.id.clone()))?;
        let source =
            std::str::from_utf8(bytes).map_err(|_| PackageError::InvalidUtf8(self.id.clone()))?;

        ConfigDocument::from_toml_str(source)
            .map_err(wyvern_config::ConfigError::from)
            .and_then(|document| Configuration::new(document, schema.clone(), false))
            .map_err(|source| PackageError::Config {
                id: self.id.clone(),
                source,
            })
    }
}
