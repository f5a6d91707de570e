use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;

use crate::household::Household;

static DEFAULT_DB_NAME: &str = "housekeep.sqlite3";
static PHOTOS_DIR_NAME: &str = "photos";
static HOUSEHOLD_FILE_NAME: &str = "household.toml";
static ENV_DATA_DIR: &str = "HOUSEKEEP_DATA_DIR";
static ENV_SUGGEST_URL: &str = "HOUSEKEEP_SUGGEST_URL";
static ENV_SUGGEST_KEY: &str = "HOUSEKEEP_SUGGEST_KEY";

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("dev", "housekeep", "housekeep"));

/// Endpoint of the text-generation service used for suggestions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionEndpoint {
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    data_dir: PathBuf,
    db_path: PathBuf,
    photos_dir: PathBuf,
    household: Household,
    suggestions: Option<SuggestionEndpoint>,
}

impl AppConfig {
    /// Construct [`AppConfig`] by resolving the data directory using the provided override,
    /// environment variables, and platform defaults.
    pub fn discover(data_dir_override: Option<PathBuf>) -> Result<Self> {
        let data_dir = resolve_data_dir(data_dir_override)?;
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create data directory at {}", data_dir.display())
            })?;
        }
        let mut config = Self::from_data_dir(data_dir)?;
        config.suggestions = suggestion_endpoint_from_env();
        Ok(config)
    }

    /// Construct [`AppConfig`] directly from a resolved data directory.
    pub fn from_data_dir(data_dir: PathBuf) -> Result<Self> {
        let db_path = data_dir.join(DEFAULT_DB_NAME);
        let photos_dir = data_dir.join(PHOTOS_DIR_NAME);
        let household = Household::load_or_default(&data_dir.join(HOUSEHOLD_FILE_NAME))?;
        Ok(Self {
            data_dir,
            db_path,
            photos_dir,
            household,
            suggestions: None,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn photos_dir(&self) -> &Path {
        &self.photos_dir
    }

    pub fn household(&self) -> &Household {
        &self.household
    }

    pub fn suggestions(&self) -> Option<&SuggestionEndpoint> {
        self.suggestions.as_ref()
    }
}

fn suggestion_endpoint_from_env() -> Option<SuggestionEndpoint> {
    let url = env::var(ENV_SUGGEST_URL).ok().filter(|v| !v.trim().is_empty())?;
    let api_key = env::var(ENV_SUGGEST_KEY).ok().filter(|v| !v.trim().is_empty());
    Some(SuggestionEndpoint { url, api_key })
}

fn resolve_data_dir(data_dir_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = data_dir_override {
        return Ok(dir);
    }

    if let Ok(env_dir) = env::var(ENV_DATA_DIR) {
        return Ok(PathBuf::from(env_dir));
    }

    if cfg!(debug_assertions) {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let dev_dir = manifest_dir.join("..").join("tmp").join("dev-housekeep");
        return Ok(dev_dir);
    }

    if let Some(project) = &*PROJECT_DIRS {
        return Ok(project.data_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".housekeep"));
    }

    Ok(env::current_dir()?.join(".housekeep"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn derives_paths_from_data_dir() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.db_path(), dir.path().join("housekeep.sqlite3"));
        assert_eq!(config.photos_dir(), dir.path().join("photos"));
        assert_eq!(config.household(), &Household::default());
        assert!(config.suggestions().is_none());
    }

    #[test]
    fn explicit_override_wins() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve_data_dir(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(resolved, dir.path());
    }
}
