use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// Maximum accepted upload size, e.g. "100MB".
    #[serde(default = "default_max_upload")]
    pub max_upload_size: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_upload_size: default_max_upload(),
        }
    }
}

impl MediaConfig {
    pub fn upload_root(&self) -> PathBuf {
        PathBuf::from(&self.upload_dir)
    }

    pub fn max_upload_bytes(&self) -> Result<usize> {
        parse_size(&self.max_upload_size)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_max_width")]
    pub max_width: u32,
    #[serde(default = "default_image_secondary_width")]
    pub secondary_width: u32,
    #[serde(default = "default_image_quality")]
    pub quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: default_image_max_width(),
            secondary_width: default_image_secondary_width(),
            quality: default_image_quality(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    #[serde(default = "default_video_max_duration")]
    pub max_duration_secs: f64,
    #[serde(default = "default_video_timeout")]
    pub timeout_secs: u64,
    /// Extra encoder locations probed before the built-in candidates.
    #[serde(default)]
    pub encoder_paths: Vec<PathBuf>,
    #[serde(default = "default_video_max_width")]
    pub max_width: u32,
    #[serde(default = "default_video_max_height")]
    pub max_height: u32,
    #[serde(default = "default_video_fps")]
    pub max_fps: u32,
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate_kbps: u32,
    #[serde(default = "default_video_maxrate")]
    pub max_bitrate_kbps: u32,
    #[serde(default = "default_video_bufsize")]
    pub buffer_size_kbps: u32,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_video_max_duration(),
            timeout_secs: default_video_timeout(),
            encoder_paths: Vec::new(),
            max_width: default_video_max_width(),
            max_height: default_video_max_height(),
            max_fps: default_video_fps(),
            video_bitrate_kbps: default_video_bitrate(),
            max_bitrate_kbps: default_video_maxrate(),
            buffer_size_kbps: default_video_bufsize(),
            audio_bitrate_kbps: default_audio_bitrate(),
        }
    }
}

impl VideoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_database_path() -> String {
    "data/guestbox.db".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_upload_dir() -> String {
    "data/uploads".to_string()
}

fn default_max_upload() -> String {
    "100MB".to_string()
}

fn default_image_max_width() -> u32 {
    2500
}

fn default_image_secondary_width() -> u32 {
    2000
}

fn default_image_quality() -> u8 {
    85
}

fn default_video_max_duration() -> f64 {
    30.0
}

fn default_video_timeout() -> u64 {
    300
}

fn default_video_max_width() -> u32 {
    1920
}

fn default_video_max_height() -> u32 {
    1080
}

fn default_video_fps() -> u32 {
    30
}

fn default_video_bitrate() -> u32 {
    2500
}

fn default_video_maxrate() -> u32 {
    4000
}

fn default_video_bufsize() -> u32 {
    8000
}

fn default_audio_bitrate() -> u32 {
    128
}

/// Parses sizes such as `"512KB"`, `"100MB"`, `"1GB"` or a bare byte count.
pub fn parse_size(value: &str) -> Result<usize> {
    let trimmed = value.trim().to_uppercase();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let amount: usize = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid size '{}'", value))?;
    let multiplier = match unit.trim() {
        "" | "B" => 1,
        "KB" | "K" => 1024,
        "MB" | "M" => 1024 * 1024,
        "GB" | "G" => 1024 * 1024 * 1024,
        other => anyhow::bail!("Unknown size unit '{}' in '{}'", other, value),
    };
    amount
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Size '{}' is too large", value))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}",
                path.display(),
                e
            )
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(
                "Config file {} not found, using defaults",
                path.display()
            );
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.media.max_upload_bytes()?;
        if self.image.max_width == 0 || self.image.secondary_width == 0 {
            anyhow::bail!("image widths must be greater than 0");
        }
        if self.image.secondary_width > self.image.max_width {
            anyhow::bail!("image.secondary_width must not exceed image.max_width");
        }
        if self.image.quality == 0 || self.image.quality > 100 {
            anyhow::bail!("image.quality must be between 1 and 100");
        }
        if self.video.max_duration_secs.is_nan() || self.video.max_duration_secs <= 0.0 {
            anyhow::bail!("video.max_duration_secs must be greater than 0");
        }
        if self.video.timeout_secs == 0 {
            anyhow::bail!("video.timeout_secs must be greater than 0");
        }
        if self.video.max_bitrate_kbps < self.video.video_bitrate_kbps {
            anyhow::bail!("video.max_bitrate_kbps must be at least video.video_bitrate_kbps");
        }
        Ok(())
    }
}
