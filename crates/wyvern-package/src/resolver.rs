//! Dependency resolution
//!
//! Resolution is breadth-first. The root configuration's dependencies form
//! the first batch; every package fetched in one batch contributes its own
//! dependencies to the next. A `(name, constraint)` request is processed at
//! most once, so diamonds are fetched once and cycles terminate.
//!
//! A dependency that cannot be fetched or whose configuration is unusable is
//! skipped: it is logged, recorded in [`Resolution::skipped`] and resolution
//! carries on without it. Only malformed constraints and repository I/O
//! faults abort a resolution.

use crate::archive::{PackageId, PackageRoot};
use crate::log::{LogEvent, Logger, NullLogger};
use crate::manifest::package_schema;
use crate::repository::{find_in_chain, list_in_chain, Repository, RepositoryError};
use crate::version::{SemanticVersion, VersionError};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use wyvern_config::{ConfigError, Configuration, Filter, Schema, Trie};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid version constraint for {}: {error}", .request.name)]
    Version {
        request: DependencyRequest,
        #[source]
        error: VersionError,
    },

    #[error("Dependency key '{0}' does not name a package")]
    MalformedDependency(Trie),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// One requested dependency, exactly as written in a configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyRequest {
    pub name: String,
    pub constraint: String,
}

impl DependencyRequest {
    pub fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
        }
    }
}

impl fmt::Display for DependencyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.constraint)
    }
}

/// Why a dependency was left out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    Corrupt(String),
    BadConfig(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "not found in repository"),
            SkipReason::Corrupt(detail) => write!(f, "corrupt archive ({})", detail),
            SkipReason::BadConfig(detail) => write!(f, "unusable configuration ({})", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDependency {
    pub request: DependencyRequest,
    /// The package that was selected for the request
    pub id: PackageId,
    pub reason: SkipReason,
}

/// Resolved packages in discovery order
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub packages: Vec<PackageRoot>,
    pub skipped: Vec<SkippedDependency>,
}

impl Resolution {
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackageRoot> {
        self.packages.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.iter().any(|root| root.name() == name)
    }

    pub fn ids(&self) -> Vec<PackageId> {
        self.packages.iter().map(|root| root.id().clone()).collect()
    }
}

impl<'r> IntoIterator for &'r Resolution {
    type Item = &'r PackageRoot;
    type IntoIter = std::slice::Iter<'r, PackageRoot>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Breadth-first dependency resolver over one repository
pub struct Resolver<'a> {
    repository: &'a dyn Repository,
    logger: &'a dyn Logger,
    schema: Schema,
    parent_fallback: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(repository: &'a dyn Repository) -> Self {
        Self {
            repository,
            logger: &NullLogger,
            schema: package_schema(),
            parent_fallback: false,
        }
    }

    pub fn with_logger(mut self, logger: &'a dyn Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Schema used to validate the configuration inside each package
    pub fn with_package_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Also search the repository's parents when listing and fetching
    pub fn with_parent_fallback(mut self, enabled: bool) -> Self {
        self.parent_fallback = enabled;
        self
    }

    /// Dependencies declared under `dependencies` in document order
    pub fn extract_dependencies(
        &self,
        config: &Configuration,
    ) -> ResolveResult<Vec<DependencyRequest>> {
        let filter = Filter::literal(["dependencies"]).then_any();
        let mut requests = Vec::new();

        for key in config.match_all(&filter) {
            let Some(name) = key.get(1) else {
                return Err(ResolveError::MalformedDependency(key));
            };
            let constraint: String = config.get(&key)?;
            requests.push(DependencyRequest::new(name, constraint));
        }

        Ok(requests)
    }

    /// Pick the version of `name` to fetch for `target`
    ///
    /// The highest stored version with the target's major component, as long
    /// as it is not below the target. Falls back to the target itself.
    pub fn select_version(
        &self,
        name: &str,
        target: SemanticVersion,
    ) -> ResolveResult<SemanticVersion> {
        let versions = if self.parent_fallback {
            list_in_chain(self.repository, name)?
        } else {
            self.repository.list(name)?
        };

        Ok(versions
            .into_iter()
            .filter(|v| v.is_compatible_with(&target) && *v >= target)
            .max()
            .unwrap_or(target))
    }

    /// Resolve every transitive dependency of `config`
    pub fn resolve(&self, config: &Configuration) -> ResolveResult<Resolution> {
        let mut visited = HashSet::new();
        let mut frontier: Vec<DependencyRequest> = self
            .extract_dependencies(config)?
            .into_iter()
            .filter(|request| visited.insert(request.clone()))
            .collect();
        let mut resolution = Resolution::default();

        while !frontier.is_empty() {
            let mut next = Vec::new();

            for request in frontier {
                let target = SemanticVersion::parse(&request.constraint).map_err(|error| {
                    ResolveError::Version {
                        request: request.clone(),
                        error,
                    }
                })?;
                let version = self.select_version(&request.name, target)?;
                let id = PackageId::new(&request.name, version);

                let root = match self.fetch(&request.name, version) {
                    Ok(Some(root)) => root,
                    Ok(None) => {
                        self.skip(&mut resolution, request, id, SkipReason::NotFound);
                        continue;
                    }
                    Err(RepositoryError::Corrupt { error, .. }) => {
                        let reason = SkipReason::Corrupt(error.to_string());
                        self.skip(&mut resolution, request, id, reason);
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

                let children = match root
                    .read_config(&self.schema)
                    .map_err(|e| e.to_string())
                    .and_then(|config| {
                        self.extract_dependencies(&config)
                            .map_err(|e| e.to_string())
                    }) {
                    Ok(children) => children,
                    Err(detail) => {
                        self.skip(&mut resolution, request, id, SkipReason::BadConfig(detail));
                        continue;
                    }
                };

                self.logger.log(&LogEvent::Loaded { id });
                resolution.packages.push(root);
                next.extend(
                    children
                        .into_iter()
                        .filter(|child| visited.insert(child.clone())),
                );
            }

            frontier = next;
        }

        Ok(resolution)
    }

    fn fetch(
        &self,
        name: &str,
        version: SemanticVersion,
    ) -> Result<Option<PackageRoot>, RepositoryError> {
        if self.parent_fallback {
            find_in_chain(self.repository, name, version)
        } else {
            self.repository.get(name, version)
        }
    }

    fn skip(
        &self,
        resolution: &mut Resolution,
        request: DependencyRequest,
        id: PackageId,
        reason: SkipReason,
    ) {
        self.logger.log(&LogEvent::Skipped {
            id: id.clone(),
            reason: reason.clone(),
        });
        resolution.skipped.push(SkippedDependency {
            request,
            id,
            reason,
        });
    }
}
