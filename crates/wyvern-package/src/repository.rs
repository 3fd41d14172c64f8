//! Package repositories
//!
//! A repository stores package archives under the identifier
//! `<name>-v<version>`. Stored packages are never replaced: putting a
//! version that already exists fails.

use crate::archive::{ArchiveError, PackageArchive, PackageId, PackageRoot};
use crate::log::{LogEvent, Logger, NullLogger};
use crate::version::SemanticVersion;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use wyvern_config::{ConfigError, Configuration, Filter, KeyValueDescriptor, Schema, Trie};

const ARCHIVE_SUFFIX: &str = ".tar.gz";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("I/O error at {}: {error}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("Stored package {id} is unreadable: {error}")]
    Corrupt {
        id: PackageId,
        #[source]
        error: ArchiveError,
    },

    #[error("Failed to encode package: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Package {0} already exists")]
    AlreadyExists(PackageId),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RepositoryError {
    fn io(path: &Path, error: io::Error) -> Self {
        RepositoryError::Io {
            path: path.to_path_buf(),
            error,
        }
    }
}

/// A versioned package store
pub trait Repository: Send + Sync {
    fn name(&self) -> &str;

    /// The repository this one was chained to, if any
    ///
    /// `list` and `get` only look at this repository; use [`find_in_chain`]
    /// to fall back along the chain.
    fn parent(&self) -> Option<&dyn Repository>;

    /// All stored versions of `name`
    fn list(&self, name: &str) -> Result<BTreeSet<SemanticVersion>, RepositoryError>;

    /// Fetch one package, `Ok(None)` if it is not stored here
    fn get(
        &self,
        name: &str,
        version: SemanticVersion,
    ) -> Result<Option<PackageRoot>, RepositoryError>;

    fn put(
        &mut self,
        archive: &PackageArchive,
        name: &str,
        version: SemanticVersion,
    ) -> Result<(), RepositoryError>;
}

/// Fetch a package from `repository` or the first parent that has it
pub fn find_in_chain(
    repository: &dyn Repository,
    name: &str,
    version: SemanticVersion,
) -> Result<Option<PackageRoot>, RepositoryError> {
    let mut current = Some(repository);
    while let Some(repo) = current {
        if let Some(root) = repo.get(name, version)? {
            return Ok(Some(root));
        }
        current = repo.parent();
    }
    Ok(None)
}

/// Versions of `name` stored anywhere along the chain
pub fn list_in_chain(
    repository: &dyn Repository,
    name: &str,
) -> Result<BTreeSet<SemanticVersion>, RepositoryError> {
    let mut versions = BTreeSet::new();
    let mut current = Some(repository);
    while let Some(repo) = current {
        versions.extend(repo.list(name)?);
        current = repo.parent();
    }
    Ok(versions)
}

/// Directory of `<name>-v<version>.tar.gz` files
pub struct LocalRepository {
    name: String,
    root: PathBuf,
    parent: Option<Box<dyn Repository>>,
    logger: Arc<dyn Logger>,
}

impl LocalRepository {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            parent: None,
            logger: Arc::new(NullLogger),
        }
    }

    /// Schema of the settings read by [`LocalRepository::from_config`]
    pub fn schema() -> Schema {
        Schema::new(vec![KeyValueDescriptor::string(
            Filter::literal(["repository", "dir"]),
            "local package repository directory",
            false,
        )])
    }

    /// Open the repository named by `repository/dir`, or `default_root`
    pub fn from_config(
        name: impl Into<String>,
        config: &Configuration,
        default_root: impl Into<PathBuf>,
    ) -> Result<Self, RepositoryError> {
        let key = Trie::from_segments(["repository", "dir"]);
        let root = if config.has_key(&key) {
            PathBuf::from(config.get::<String>(&key)?)
        } else {
            default_root.into()
        };
        Ok(Self::new(name, root))
    }

    pub fn with_parent(mut self, parent: Box<dyn Repository>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn archive_path(&self, id: &PackageId) -> PathBuf {
        self.root.join(format!("{}{}", id, ARCHIVE_SUFFIX))
    }

    /// The stored file for `id`
    ///
    /// Archives written by [`Repository::put`] use the canonical file name.
    /// Files copied in by hand may spell the version with leading zeros
    /// (`json-v1.02.0.tar.gz`), so those are found by scanning.
    fn locate(&self, id: &PackageId) -> Result<Option<PathBuf>, RepositoryError> {
        let path = self.archive_path(id);
        if path.is_file() {
            return Ok(Some(path));
        }

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RepositoryError::io(&self.root, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| RepositoryError::io(&self.root, e))?;
            let matches = entry
                .file_name()
                .to_str()
                .and_then(|f| f.strip_suffix(ARCHIVE_SUFFIX))
                .and_then(|stem| PackageId::version_for(stem, &id.name))
                == Some(id.version);
            if matches {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    /// Flush the directory entry created by a rename
    #[cfg(unix)]
    fn sync_root(&self) -> io::Result<()> {
        fs::File::open(&self.root)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_root(&self) -> io::Result<()> {
        Ok(())
    }
}

impl Repository for LocalRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<&dyn Repository> {
        self.parent.as_deref()
    }

    fn list(&self, name: &str) -> Result<BTreeSet<SemanticVersion>, RepositoryError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(RepositoryError::io(&self.root, e)),
        };

        let mut versions = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| RepositoryError::io(&self.root, e))?;
            let file_name = entry.file_name();
            let Some(stem) = file_name
                .to_str()
                .and_then(|f| f.strip_suffix(ARCHIVE_SUFFIX))
            else {
                continue;
            };
            if let Some(version) = PackageId::version_for(stem, name) {
                versions.insert(version);
            }
        }
        Ok(versions)
    }

    fn get(
        &self,
        name: &str,
        version: SemanticVersion,
    ) -> Result<Option<PackageRoot>, RepositoryError> {
        let id = PackageId::new(name, version);
        let Some(path) = self.locate(&id)? else {
            return Ok(None);
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RepositoryError::io(&path, e)),
        };
        let archive = PackageArchive::from_bytes(&bytes).map_err(|error| {
            RepositoryError::Corrupt {
                id: id.clone(),
                error,
            }
        })?;

        Ok(Some(PackageRoot::new(id, Arc::new(archive))))
    }

    /// Writes to a temporary file first and renames it into place once the
    /// data is on disk, then syncs the directory so the rename survives a
    /// crash
    fn put(
        &mut self,
        archive: &PackageArchive,
        name: &str,
        version: SemanticVersion,
    ) -> Result<(), RepositoryError> {
        let id = PackageId::new(name, version);
        if self.locate(&id)?.is_some() {
            return Err(RepositoryError::AlreadyExists(id));
        }
        let path = self.archive_path(&id);

        fs::create_dir_all(&self.root).map_err(|e| RepositoryError::io(&self.root, e))?;
        let bytes = archive.to_bytes()?;

        let temp_path = self.root.join(format!(".{}{}.tmp", id, ARCHIVE_SUFFIX));
        let written = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&temp_path, &path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(RepositoryError::io(&path, e));
        }
        self.sync_root()
            .map_err(|e| RepositoryError::io(&self.root, e))?;

        self.logger.log(&LogEvent::Installed { location: path });
        Ok(())
    }
}

/// In-memory repository
#[derive(Default)]
pub struct MemoryRepository {
    name: String,
    packages: BTreeMap<String, Arc<PackageArchive>>,
    parent: Option<Box<dyn Repository>>,
}

impl MemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: BTreeMap::new(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: Box<dyn Repository>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Builder form of [`Repository::put`]
    pub fn with_package(
        mut self,
        archive: PackageArchive,
        name: &str,
        version: SemanticVersion,
    ) -> Result<Self, RepositoryError> {
        self.put(&archive, name, version)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl Repository for MemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<&dyn Repository> {
        self.parent.as_deref()
    }

    fn list(&self, name: &str) -> Result<BTreeSet<SemanticVersion>, RepositoryError> {
        Ok(self
            .packages
            .keys()
            .filter_map(|stem| PackageId::version_for(stem, name))
            .collect())
    }

    fn get(
        &self,
        name: &str,
        version: SemanticVersion,
    ) -> Result<Option<PackageRoot>, RepositoryError> {
        let id = PackageId::new(name, version);
        Ok(self
            .packages
            .get(&id.to_string())
            .map(|archive| PackageRoot::new(id, Arc::clone(archive))))
    }

    fn put(
        &mut self,
        archive: &PackageArchive,
        name: &str,
        version: SemanticVersion,
    ) -> Result<(), RepositoryError> {
        let id = PackageId::new(name, version);
        let stem = id.to_string();
        if self.packages.contains_key(&stem) {
            return Err(RepositoryError::AlreadyExists(id));
        }
        self.packages.insert(stem, Arc::new(archive.clone()));
        Ok(())
    }
}
