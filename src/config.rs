use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::{Context, eyre};
use serde::{Deserialize, Serialize};

use crate::http::DEFAULT_USER_AGENT;
use crate::youtube::{DEFAULT_CONCURRENCY, PageRange, YouTubeSettings};
use crate::ytmusic::ClientLocale;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub ytmusic: YtMusicConfig,
    pub youtube: YouTubeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout, e.g. "10s" or "1m 30s".
    #[serde(with = "duration_text")]
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YtMusicConfig {
    pub base_url: String,
    pub hl: String,
    pub gl: String,
}

impl Default for YtMusicConfig {
    fn default() -> Self {
        Self {
            base_url: "https://music.youtube.com".to_string(),
            hl: "en".to_string(),
            gl: "US".to_string(),
        }
    }
}

impl YtMusicConfig {
    pub fn locale(&self) -> ClientLocale {
        ClientLocale {
            hl: self.hl.clone(),
            gl: self.gl.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub base_url: String,
    pub concurrency: usize,
    pub page_start: u32,
    pub page_end: u32,
    pub requests_per_second: u32,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        let settings = YouTubeSettings::default();
        Self {
            base_url: "https://www.youtube.com".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            page_start: settings.pages.start,
            page_end: settings.pages.end,
            requests_per_second: settings.requests_per_second,
        }
    }
}

impl YouTubeConfig {
    pub fn settings(&self) -> YouTubeSettings {
        YouTubeSettings {
            concurrency: self.concurrency,
            pages: PageRange::new(self.page_start, self.page_end),
            requests_per_second: self.requests_per_second,
        }
    }
}

// `humantime` strings in TOML.
mod duration_text {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Default location: `<config dir>/track-finder/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("track-finder").join("config.toml"))
    }

    /// Load `path` (or the default location), falling back to defaults when
    /// the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Some(path) => path,
                None => {
                    log::debug!("No config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        log::debug!("Loading config from {}", path.display());
        Self::from_file(&path)
    }

    /// Write the default config to `path`, refusing to overwrite.
    pub fn create_default(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(eyre!("Config file already exists: {}", path.display()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
