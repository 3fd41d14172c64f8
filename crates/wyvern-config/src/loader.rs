//! Configuration Loader
//!
//! Finds and validates project configuration (`wy.toml`) and the user's
//! global configuration (`~/.wyvern/config.toml`), applying `WYVERN_*`
//! environment overrides to the latter.

use crate::configuration::Configuration;
use crate::document::{ConfigDocument, Value, ValueKind};
use crate::path::Trie;
use crate::schema::Schema;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project configuration file
pub const PROJECT_FILE: &str = "wy.toml";

const GLOBAL_DIR: &str = ".wyvern";
const GLOBAL_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "WYVERN_";

/// A project configuration together with the directory it was found in
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: Configuration,
}

/// Configuration loader
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Overrides the global config location (otherwise under the home directory)
    global_config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Read global configuration from `path` instead of the home directory
    pub fn with_global_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load the project containing `start_dir`
    ///
    /// Walks up the directory tree to find `wy.toml` and validates it
    /// strictly. Returns `None` if no project file exists up to the
    /// filesystem root.
    pub fn load_project(&self, start_dir: &Path, schema: &Schema) -> ConfigResult<Option<Project>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_FILE);

            if config_path.is_file() {
                let config = self.load_file(&config_path, schema, true)?;
                return Ok(Some(Project {
                    root: current,
                    config,
                }));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok(None),
            }
        }
    }

    /// Read, parse and validate one configuration file
    pub fn load_file(
        &self,
        path: &Path,
        schema: &Schema,
        strict: bool,
    ) -> ConfigResult<Configuration> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let document =
            ConfigDocument::from_toml_str(&content).map_err(|error| ConfigError::Parse {
                file: path.to_path_buf(),
                error,
            })?;

        Configuration::new(document, schema.clone(), strict)
    }

    /// Load the global configuration
    ///
    /// A missing file yields an empty document. Unknown keys are ignored so
    /// that one global file can serve several tools. Environment overrides
    /// are applied last.
    pub fn load_global(&self, schema: &Schema) -> ConfigResult<Configuration> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => Self::global_config_dir()?.join(GLOBAL_FILE),
        };

        let mut config = if path.exists() {
            self.load_file(&path, schema, false)?
        } else {
            Configuration::new(ConfigDocument::default(), schema.clone(), false)?
        };

        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Get the global configuration directory (~/.wyvern)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(GLOBAL_DIR))
    }

    /// Ensure global configuration directory exists
    pub fn ensure_global_config_dir() -> ConfigResult<PathBuf> {
        let dir = Self::global_config_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }
}

/// Environment variable that overrides `key`
///
/// `repository/dir` becomes `WYVERN_REPOSITORY_DIR`.
pub fn env_var_name(key: &Trie) -> String {
    let name = key.segments().join("_").replace('-', "_");
    format!("{}{}", ENV_PREFIX, name.to_uppercase())
}

/// Write `WYVERN_*` variables onto the keys named exactly by the schema
///
/// Wildcard descriptors have no single variable name and are skipped.
fn apply_env_overrides(config: &mut Configuration) -> ConfigResult<()> {
    let overrides: Vec<(Trie, ValueKind)> = config
        .schema()
        .descriptors()
        .iter()
        .filter_map(|d| d.filter().as_key().map(|key| (key, d.kind())))
        .collect();

    for (key, kind) in overrides {
        let var = env_var_name(&key);
        let Ok(raw) = env::var(&var) else {
            continue;
        };
        let value = parse_env_value(kind, &raw).ok_or_else(|| ConfigError::InvalidEnvironment {
            var: var.clone(),
            value: raw.clone(),
        })?;
        config.write(&key, value)?;
    }

    Ok(())
}

fn parse_env_value(kind: ValueKind, raw: &str) -> Option<Value> {
    match kind {
        ValueKind::String => Some(Value::String(raw.to_string())),
        ValueKind::Integer => raw.trim().parse().ok().map(Value::Integer),
        ValueKind::Boolean => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Boolean(true)),
            "false" | "0" | "no" => Some(Value::Boolean(false)),
            _ => None,
        },
        ValueKind::List => Some(Value::List(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Value::from)
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Filter;
    use crate::schema::KeyValueDescriptor;
    use serial_test::serial;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(PROJECT_FILE);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn project_schema() -> Schema {
        Schema::new(vec![
            KeyValueDescriptor::string(Filter::parse("package/name").unwrap(), "name", true),
            KeyValueDescriptor::string(Filter::parse("package/version").unwrap(), "version", true),
        ])
    }

    fn global_schema() -> Schema {
        Schema::new(vec![
            KeyValueDescriptor::string(Filter::parse("repository/dir").unwrap(), "dir", false),
            KeyValueDescriptor::boolean(Filter::parse("build/verbose").unwrap(), "verbose", false)
                .with_default(false),
        ])
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[package]
name = "parent-project"
version = "1.0.0"
"#,
        );
        let sub_dir = temp_dir.path().join("src").join("nested");
        fs::create_dir_all(&sub_dir).unwrap();

        let project = ConfigLoader::new()
            .load_project(&sub_dir, &project_schema())
            .unwrap()
            .unwrap();

        assert_eq!(project.root, temp_dir.path());
        assert_eq!(
            project
                .config
                .get::<String>(&Trie::parse("package/name").unwrap())
                .unwrap(),
            "parent-project"
        );
    }

    #[test]
    fn test_project_is_strict() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[package]
name = "x"
version = "1.0.0"
edition = "2026"
"#,
        );

        let err = ConfigLoader::new()
            .load_project(temp_dir.path(), &project_schema())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_config_file(temp_dir.path(), "[package\nname = 1");

        let err = ConfigLoader::new()
            .load_file(&path, &project_schema(), true)
            .unwrap_err();
        match err {
            ConfigError::Parse { file, .. } => assert_eq!(file, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ConfigLoader::new()
            .load_file(&temp_dir.path().join("nope.toml"), &Schema::empty(), false)
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    #[serial]
    fn test_missing_global_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new().with_global_path(temp_dir.path().join("config.toml"));

        let config = loader.load_global(&global_schema()).unwrap();

        assert!(config.document().is_empty());
        assert!(!config
            .get::<bool>(&Trie::parse("build/verbose").unwrap())
            .unwrap());
    }

    #[test]
    #[serial]
    fn test_env_override_written_onto_global() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[repository]\ndir = \"/srv/packages\"\n").unwrap();

        env::set_var("WYVERN_REPOSITORY_DIR", "/tmp/override");
        env::set_var("WYVERN_BUILD_VERBOSE", "yes");

        let config = ConfigLoader::new()
            .with_global_path(&path)
            .load_global(&global_schema());

        env::remove_var("WYVERN_REPOSITORY_DIR");
        env::remove_var("WYVERN_BUILD_VERBOSE");

        let config = config.unwrap();
        assert_eq!(
            config
                .get::<String>(&Trie::parse("repository/dir").unwrap())
                .unwrap(),
            "/tmp/override"
        );
        assert!(config
            .get::<bool>(&Trie::parse("build/verbose").unwrap())
            .unwrap());
    }

    #[test]
    #[serial]
    fn test_invalid_env_override() {
        let temp_dir = TempDir::new().unwrap();
        env::set_var("WYVERN_BUILD_VERBOSE", "sometimes");

        let result = ConfigLoader::new()
            .with_global_path(temp_dir.path().join("config.toml"))
            .load_global(&global_schema());

        env::remove_var("WYVERN_BUILD_VERBOSE");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvironment { ref var, .. }) if var == "WYVERN_BUILD_VERBOSE"
        ));
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(
            env_var_name(&Trie::parse("repository/dir").unwrap()),
            "WYVERN_REPOSITORY_DIR"
        );
        assert_eq!(
            env_var_name(&Trie::parse("build/max-jobs").unwrap()),
            "WYVERN_BUILD_MAX_JOBS"
        );
    }
}
