use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GalleryError;

pub const DEFAULT_ARTICLES_ENDPOINT: &str =
    "https://cdn.theculturetrip.com/home-assignment/response.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub feed: FeedConfig,
    pub images: ImageConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub endpoint: String,
    pub request_timeout_seconds: u64,
    /// `None` loads the list once at startup.
    pub refresh_interval_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Share one in-flight request between callers asking for the same URL.
    pub deduplicate: bool,
    /// `None` keeps every fetched image for the lifetime of the process.
    pub max_cached_images: Option<usize>,
    /// Reject payloads whose magic bytes are not a known image format.
    pub validate_images: bool,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub cross_fade_ms: u64,
    pub image_height: f32,
    pub avatar_size: f32,
    pub card_spacing: f32,
    pub presenter_pool_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ARTICLES_ENDPOINT.to_owned(),
            request_timeout_seconds: 10,
            refresh_interval_minutes: None,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            deduplicate: true,
            max_cached_images: None,
            validate_images: true,
            request_timeout_seconds: 30,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            cross_fade_ms: 200,
            image_height: 219.0,
            avatar_size: 40.0,
            card_spacing: 16.0,
            presenter_pool_size: 8,
        }
    }
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_minutes
            .filter(|minutes| *minutes > 0)
            .map(|minutes| Duration::from_secs(minutes * 60))
    }
}

impl ImageConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl UiConfig {
    pub fn cross_fade(&self) -> Duration {
        Duration::from_millis(self.cross_fade_ms)
    }
}

impl GalleryConfig {
    /// `<config dir>/article-gallery/config.json`
    pub fn config_file_path() -> Result<PathBuf, GalleryError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| GalleryError::Config("no configuration directory found".into()))?;
        Ok(config_dir.join("article-gallery").join("config.json"))
    }

    /// Loads the user configuration, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        let path = match Self::config_file_path() {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "using default configuration");
                return Self::default();
            }
        };
        if !path.exists() {
            return Self::default();
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_from_file(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to load configuration, using defaults");
                Self::default()
            }
        }
    }

    pub fn try_from_file(path: impl AsRef<Path>) -> Result<Self, GalleryError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), GalleryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), GalleryError> {
        self.save_to(Self::config_file_path()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults_for_missing_fields() {
        let config: GalleryConfig =
            serde_json::from_str(r#"{ "images": { "deduplicate": false } }"#).unwrap();
        assert!(!config.images.deduplicate);
        assert!(config.images.validate_images);
        assert_eq!(config.feed.endpoint, DEFAULT_ARTICLES_ENDPOINT);
        assert_eq!(config.ui.cross_fade(), Duration::from_millis(200));
    }

    #[test]
    fn zero_refresh_interval_means_load_once() {
        let feed = FeedConfig {
            refresh_interval_minutes: Some(0),
            ..FeedConfig::default()
        };
        assert!(feed.refresh_interval().is_none());
        let feed = FeedConfig {
            refresh_interval_minutes: Some(2),
            ..FeedConfig::default()
        };
        assert_eq!(feed.refresh_interval(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let mut path = std::env::temp_dir();
        path.push(format!("gallery_config_{}.json", std::process::id()));
        std::fs::write(&path, b"{ not json").unwrap();
        let config = GalleryConfig::from_file(&path);
        assert!(config.images.deduplicate);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn save_and_reload() {
        let mut path = std::env::temp_dir();
        path.push(format!("gallery_config_rt_{}", std::process::id()));
        path.push("config.json");
        let mut config = GalleryConfig::default();
        config.images.max_cached_images = Some(64);
        config.save_to(&path).unwrap();

        let loaded = GalleryConfig::try_from_file(&path).unwrap();
        assert_eq!(loaded.images.max_cached_images, Some(64));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
