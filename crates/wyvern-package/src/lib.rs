//! Wyvern Package Management
//!
//! Semantic versions, package archives, versioned package repositories and
//! the breadth-first dependency resolver used to assemble a project's
//! transitive dependency set.

pub mod archive;
pub mod dependency;
pub mod log;
pub mod manifest;
pub mod repository;
pub mod resolver;
pub mod version;

pub use archive::{ArchiveError, PackageArchive, PackageId, PackageRoot, PACKAGE_CONFIG_ENTRY};
pub use dependency::SemanticDependency;
pub use log::{LogEvent, Logger, MemoryLogger, NullLogger, StderrLogger};
pub use manifest::{package_schema, PackageManifest};
pub use repository::{
    find_in_chain, list_in_chain, LocalRepository, MemoryRepository, Repository, RepositoryError,
};
pub use resolver::{
    DependencyRequest, Resolution, ResolveError, ResolveResult, Resolver, SkipReason,
    SkippedDependency,
};
pub use version::{SemanticVersion, VersionError};

use wyvern_config::ConfigError;

/// Errors reading a fetched package
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Package {0} has no wy.toml")]
    MissingConfig(PackageId),

    #[error("wy.toml of package {0} is not valid UTF-8")]
    InvalidUtf8(PackageId),

    #[error("Invalid configuration in package {id}: {source}")]
    Config {
        id: PackageId,
        #[source]
        source: ConfigError,
    },

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error(transparent)]
    Version(#[from] VersionError),
}

pub type Result<T> = std::result::Result<T, PackageError>;
