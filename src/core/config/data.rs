use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// OpenRouter API base URL (defaults to https://openrouter.ai/api/v1)
    pub base_url: Option<String>,
    /// Sent as `X-Title` for OpenRouter app attribution
    pub app_title: Option<String>,
    /// Sent as `HTTP-Referer` for OpenRouter app attribution
    pub referer: Option<String>,
    /// Model used by `text`/`image` when none is given on the command line
    pub default_model: Option<String>,
    /// Directory holding the persisted catalog and API key
    pub storage_dir: Option<PathBuf>,
    /// Directory generated images are written to
    pub images_dir: Option<PathBuf>,
}

/// Keys accepted by `opencreator set` / `opencreator unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    AppTitle,
    Referer,
    DefaultModel,
    StorageDir,
    ImagesDir,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::BaseUrl,
        ConfigKey::AppTitle,
        ConfigKey::Referer,
        ConfigKey::DefaultModel,
        ConfigKey::StorageDir,
        ConfigKey::ImagesDir,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base-url",
            ConfigKey::AppTitle => "app-title",
            ConfigKey::Referer => "referer",
            ConfigKey::DefaultModel => "default-model",
            ConfigKey::StorageDir => "storage-dir",
            ConfigKey::ImagesDir => "images-dir",
        }
    }

    pub fn parse(name: &str) -> Result<Self, UnknownConfigKey> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| UnknownConfigKey(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownConfigKey(pub String);

impl fmt::Display for UnknownConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<&str> = ConfigKey::ALL.iter().map(|key| key.name()).collect();
        write!(
            f,
            "Unknown config key '{}'. Valid keys: {}",
            self.0,
            valid.join(", ")
        )
    }
}

impl std::error::Error for UnknownConfigKey {}

impl Config {
    /// Set a key from its command-line string form. Blank values unset it.
    pub fn set_value(&mut self, key: ConfigKey, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.unset_value(key);
            return;
        }
        let text = Some(value.to_string());
        match key {
            ConfigKey::BaseUrl => self.base_url = text,
            ConfigKey::AppTitle => self.app_title = text,
            ConfigKey::Referer => self.referer = text,
            ConfigKey::DefaultModel => self.default_model = text,
            ConfigKey::StorageDir => self.storage_dir = Some(PathBuf::from(value)),
            ConfigKey::ImagesDir => self.images_dir = Some(PathBuf::from(value)),
        }
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::BaseUrl => self.base_url = None,
            ConfigKey::AppTitle => self.app_title = None,
            ConfigKey::Referer => self.referer = None,
            ConfigKey::DefaultModel => self.default_model = None,
            ConfigKey::StorageDir => self.storage_dir = None,
            ConfigKey::ImagesDir => self.images_dir = None,
        }
    }

    pub fn get_value(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::BaseUrl => self.base_url.clone(),
            ConfigKey::AppTitle => self.app_title.clone(),
            ConfigKey::Referer => self.referer.clone(),
            ConfigKey::DefaultModel => self.default_model.clone(),
            ConfigKey::StorageDir => self.storage_dir.as_deref().map(path_display),
            ConfigKey::ImagesDir => self.images_dir.as_deref().map(path_display),
        }
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
