use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// Speech-to-text vendor settings.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// API base, e.g. `https://api.siliconflow.cn/v1`.
    pub base_url: String,
    /// Vendor model identifier.
    pub model: String,
    /// Bearer token. Falls back to `SILICONFLOW_API_KEY` when unset.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.siliconflow.cn/v1".into(),
            model: "FunAudioLLM/SenseVoiceSmall".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl SpeechConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("SILICONFLOW_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Chat-completion vendor settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// API base, e.g. `https://api.deepseek.com/v1`.
    pub base_url: String,
    pub model: String,
    /// Bearer token. Falls back to `DEEPSEEK_API_KEY` when unset.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".into(),
            model: "deepseek-chat".into(),
            api_key: None,
            timeout_secs: 60,
            max_tokens: 4000,
            temperature: 0.7,
        }
    }
}

impl ChatConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Retry behavior for vendor calls: bounded attempts, fixed delay.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

/// Result-cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry directory. Defaults to `~/.cache/aiscribe/results`.
    pub dir: Option<PathBuf>,
    /// Oldest entries are evicted once this count is exceeded.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            max_entries: 256,
        }
    }
}

impl CacheConfig {
    /// Resolve the cache directory, defaulting to ~/.cache/aiscribe/results.
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("aiscribe")
                .join("results")
        })
    }
}

/// Media intake and normalization settings.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Accepted audio extensions, lowercase, without the dot.
    pub audio_formats: Vec<String>,
    /// Accepted video extensions, lowercase, without the dot.
    pub video_formats: Vec<String>,
    pub max_file_size_mb: u64,
    /// Chunk length for long-audio transcription.
    pub chunk_duration_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            audio_formats: ["mp3", "wav", "aac", "m4a", "flac"]
                .map(String::from)
                .to_vec(),
            video_formats: ["mp4", "mov", "avi", "mkv", "wmv"]
                .map(String::from)
                .to_vec(),
            max_file_size_mb: 100,
            chunk_duration_secs: 60,
        }
    }
}

/// Everything the pipeline needs, passed explicitly — there is no ambient
/// global configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub speech: SpeechConfig,
    pub chat: ChatConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub media: MediaConfig,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speech_api_key(mut self, key: impl Into<String>) -> Self {
        self.speech.api_key = Some(key.into());
        self
    }

    pub fn chat_api_key(mut self, key: impl Into<String>) -> Self {
        self.chat.api_key = Some(key.into());
        self
    }

    pub fn speech_base_url(mut self, url: impl Into<String>) -> Self {
        self.speech.base_url = url.into();
        self
    }

    pub fn chat_base_url(mut self, url: impl Into<String>) -> Self {
        self.chat.base_url = url.into();
        self
    }

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache.dir = Some(dir);
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    pub fn max_cache_entries(mut self, max: usize) -> Self {
        self.cache.max_entries = max;
        self
    }

    pub fn chunk_duration_secs(mut self, secs: u64) -> Self {
        self.media.chunk_duration_secs = secs;
        self
    }

    /// Load a JSON config file and merge it over the defaults.
    pub fn load_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&raw)?;
        let mut config = Self::default();
        file.apply(&mut config);
        Ok(config)
    }

    /// Load the default config file if one exists, else plain defaults.
    /// Looks in `~/.config/aiscribe/config.json`.
    pub fn load_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not load config file, using defaults");
                Self::default()
            }
        }
    }
}

/// Default config file location: `~/.config/aiscribe/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("aiscribe").join("config.json"))
}

/// Basic shape check for a vendor API key: `sk-` prefix, more than 20 chars.
pub fn api_key_looks_valid(key: &str) -> bool {
    let key = key.trim();
    key.len() > 20 && key.starts_with("sk-")
}

/// On-disk config file: every field optional, present fields win.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    speech: Option<SpeechFile>,
    chat: Option<ChatFile>,
    retry: Option<RetryFile>,
    cache: Option<CacheFile>,
    media: Option<MediaFile>,
}

#[derive(Debug, Default, Deserialize)]
struct SpeechFile {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatFile {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct RetryFile {
    max_attempts: Option<u32>,
    delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheFile {
    enabled: Option<bool>,
    dir: Option<PathBuf>,
    max_entries: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct MediaFile {
    audio_formats: Option<Vec<String>>,
    video_formats: Option<Vec<String>>,
    max_file_size_mb: Option<u64>,
    chunk_duration_secs: Option<u64>,
}

impl ConfigFile {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(s) = self.speech {
            merge(&mut config.speech.base_url, s.base_url);
            merge(&mut config.speech.model, s.model);
            config.speech.api_key = s.api_key.or(config.speech.api_key.take());
            merge(&mut config.speech.timeout_secs, s.timeout_secs);
        }
        if let Some(c) = self.chat {
            merge(&mut config.chat.base_url, c.base_url);
            merge(&mut config.chat.model, c.model);
            config.chat.api_key = c.api_key.or(config.chat.api_key.take());
            merge(&mut config.chat.timeout_secs, c.timeout_secs);
            merge(&mut config.chat.max_tokens, c.max_tokens);
            merge(&mut config.chat.temperature, c.temperature);
        }
        if let Some(r) = self.retry {
            merge(&mut config.retry.max_attempts, r.max_attempts);
            merge(&mut config.retry.delay_ms, r.delay_ms);
        }
        if let Some(c) = self.cache {
            merge(&mut config.cache.enabled, c.enabled);
            config.cache.dir = c.dir.or(config.cache.dir.take());
            merge(&mut config.cache.max_entries, c.max_entries);
        }
        if let Some(m) = self.media {
            merge(&mut config.media.audio_formats, m.audio_formats);
            merge(&mut config.media.video_formats, m.video_formats);
            merge(&mut config.media.max_file_size_mb, m.max_file_size_mb);
            merge(&mut config.media.chunk_duration_secs, m.chunk_duration_secs);
        }
    }
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}
