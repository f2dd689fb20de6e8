use anyhow::{Context, Result};
use bua_core::{FileImageStore, Limits};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const IMAGE_KEY: &str = "bua";

pub struct Config {
    pub data_dir: PathBuf,
    pub limits: Limits,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "bua").context("Could not determine home directory")?;
        Self::from_dir(proj_dirs.data_dir())
    }

    /// Use `data_dir` for the image and read limits from `config.json` there, if present.
    pub fn from_dir(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let config_path = data_dir.join("config.json");
        let limits = if config_path.exists() {
            let text = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            serde_json::from_str::<Limits>(&text)
                .with_context(|| format!("Invalid config file: {}", config_path.display()))?
        } else {
            Limits::default()
        };

        Ok(Config {
            data_dir: data_dir.to_path_buf(),
            limits,
        })
    }

    pub fn image_store(&self) -> FileImageStore {
        FileImageStore::new(&self.data_dir, IMAGE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_dir(dir.path()).unwrap();
        assert_eq!(config.limits, Limits::default());
        assert_eq!(config.image_store().path(), dir.path().join("bua.sqlite"));
    }

    #[test]
    fn test_config_file_overrides_limits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"max_favorites": 5}"#).unwrap();
        let config = Config::from_dir(dir.path()).unwrap();
        assert_eq!(config.limits.max_favorites, 5);
        assert_eq!(config.limits.daily_log_cap, 6);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{not json").unwrap();
        assert!(Config::from_dir(dir.path()).is_err());
    }
}
