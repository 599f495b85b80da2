use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use std::path::PathBuf;

const API_KEY_ENV: &str = "SPOONACULAR_API_KEY";
const API_KEY_FILE: &str = "spoonacular_key";

pub struct Config {
    pub db_path: PathBuf,
    pub sleep_path: PathBuf,
    pub alarm_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "pulse").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            db_path: data_dir.join("pulse.db"),
            sleep_path: data_dir.join("sleep.json"),
            alarm_path: data_dir.join("alarms.json"),
            data_dir,
        })
    }

    /// Spoonacular API key from `SPOONACULAR_API_KEY`, falling back to the
    /// `spoonacular_key` file in the data directory.
    pub fn spoonacular_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }

        let path = self.data_dir.join(API_KEY_FILE);
        if path.exists() {
            let key = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read API key file: {}", path.display()))?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }

        bail!(
            "No Spoonacular API key. Set {API_KEY_ENV} or write the key to {}",
            path.display()
        )
    }
}
