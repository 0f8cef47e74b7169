//! Configuration loading, validation, and run resolution for papertriage.
//!
//! Loads configuration from `~/.papertriage/config.toml` (or an explicit
//! path) with environment variable overrides, then resolves it together
//! with command-line overrides into an immutable [`RunContext`].

use papertriage_core::{Action, DecisionMode, ExtractionLimits};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Folders scanned for candidate documents
    #[serde(default)]
    pub input_folders: Vec<String>,

    /// File extensions treated as candidates (case-insensitive)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Where `remove` decisions move files to
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,

    /// Pages read per document
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Characters kept per document
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Append-only CSV audit log
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// Directory for per-run digest files
    #[serde(default = "default_digest_dir")]
    pub digest_dir: String,

    /// External metadata sources, in precedence order (later wins)
    #[serde(default)]
    pub metadata_sources: Vec<MetadataSourceConfig>,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub digest: DigestConfig,

    #[serde(default)]
    pub auto_decision: AutoDecisionConfig,

    #[serde(default)]
    pub email: EmailConfig,
}

fn default_extensions() -> Vec<String> {
    vec!["pdf".into()]
}
fn default_archive_dir() -> String {
    "archive".into()
}
fn default_max_pages() -> usize {
    3
}
fn default_max_chars() -> usize {
    4000
}
fn default_log_path() -> String {
    "triage_log.csv".into()
}
fn default_digest_dir() -> String {
    "digests".into()
}
fn default_true() -> bool {
    true
}

/// A metadata source descriptor. `type` is checked at discovery time so an
/// unknown type only disables that one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSourceConfig {
    #[serde(rename = "type", default = "default_source_type")]
    pub kind: String,
    pub path: String,
}

fn default_source_type() -> String {
    "bookmarks".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama", "openai", "openrouter" or "custom"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Base URL of an OpenAI-compatible endpoint (provider default if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-document summarization timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_provider() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "llama3.2:latest".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    512
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_url: None,
            api_key_env: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Recurring schedule. `cron` (5-field) wins over the day/hour/minute fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,

    #[serde(default = "default_day_of_week")]
    pub day_of_week: String,

    #[serde(default = "default_hour")]
    pub hour: u32,

    #[serde(default)]
    pub minute: u32,
}

fn default_day_of_week() -> String {
    "sun".into()
}
fn default_hour() -> u32 {
    9
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: None,
            day_of_week: default_day_of_week(),
            hour: default_hour(),
            minute: 0,
        }
    }
}

impl ScheduleConfig {
    /// The effective 5-field cron expression.
    pub fn cron_expression(&self) -> String {
        match &self.cron {
            Some(expr) if !expr.trim().is_empty() => expr.trim().to_string(),
            _ => format!("{} {} * * {}", self.minute, self.hour, self.day_of_week),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Still write/send a digest for processed documents after a manual quit
    #[serde(default = "default_true")]
    pub on_early_exit: bool,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            on_early_exit: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoDecisionConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_auto_action")]
    pub default: Action,
}

fn default_auto_action() -> Action {
    Action::Keep
}

impl Default for AutoDecisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default: default_auto_action(),
        }
    }
}

/// SMTP settings. The password is never stored here — only the name of the
/// environment variable that holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default = "default_true")]
    pub use_tls: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    #[serde(default = "default_sender")]
    pub sender: String,

    #[serde(default)]
    pub recipients: Vec<String>,

    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_smtp_host() -> String {
    "localhost".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_sender() -> String {
    "paper-triage@example.com".into()
}
fn default_subject() -> String {
    "Weekly paper triage digest".into()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            use_tls: true,
            username: None,
            password_env: None,
            sender: default_sender(),
            recipients: vec![],
            subject: default_subject(),
        }
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            input_folders: vec![],
            extensions: default_extensions(),
            archive_dir: default_archive_dir(),
            max_pages: default_max_pages(),
            max_chars: default_max_chars(),
            metadata_sources: vec![],
            log_path: default_log_path(),
            digest_dir: default_digest_dir(),
            llm: LlmConfig::default(),
            schedule: ScheduleConfig::default(),
            digest: DigestConfig::default(),
            auto_decision: AutoDecisionConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

impl TriageConfig {
    /// Load configuration from the default path (~/.papertriage/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::default_path())
    }

    /// Load from `path`, then apply environment variable overrides:
    /// - `PAPERTRIAGE_MODEL`
    /// - `PAPERTRIAGE_LLM_URL`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if let Ok(model) = std::env::var("PAPERTRIAGE_MODEL") {
            config.llm.model = model;
        }
        if let Ok(url) = std::env::var("PAPERTRIAGE_LLM_URL") {
            config.llm.api_url = Some(url);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".papertriage")
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate settings that do not depend on the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages == 0 {
            return Err(ConfigError::ValidationError(
                "max_pages must be positive".into(),
            ));
        }
        if self.max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "max_chars must be positive".into(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "extensions must list at least one file extension".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.timeout_secs must be positive".into(),
            ));
        }
        if self.schedule.hour > 23 || self.schedule.minute > 59 {
            return Err(ConfigError::ValidationError(
                "schedule.hour must be 0-23 and schedule.minute 0-59".into(),
            ));
        }
        if self.email.enabled {
            if self.email.sender.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "email.sender is required when email is enabled".into(),
                ));
            }
            if self.email.recipients.is_empty() {
                return Err(ConfigError::ValidationError(
                    "email.recipients must not be empty when email is enabled".into(),
                ));
            }
        }
        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

// ── Run resolution ──────────────────────────────────────────────────────────

/// Command-line overrides. `None`/`false` means "use the config value".
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub dry_run: bool,
    pub max_pages: Option<usize>,
    pub max_chars: Option<usize>,
    pub auto_decision: Option<Action>,
    /// Force manual mode even when `auto_decision.enabled` is set
    pub interactive: bool,
    pub archive_dir: Option<String>,
    pub log_path: Option<String>,
    pub digest_dir: Option<String>,
    /// Replaces `input_folders` when non-empty
    pub input_folders: Vec<String>,
    pub no_email: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSource {
    pub kind: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSettings {
    pub enabled: bool,
    pub dir: PathBuf,
    pub on_early_exit: bool,
}

/// Configuration snapshot for one invocation. Immutable for the run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub input_folders: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub metadata_sources: Vec<MetadataSource>,
    pub limits: ExtractionLimits,
    pub mode: DecisionMode,
    pub archive_dir: PathBuf,
    pub log_path: PathBuf,
    pub digest: DigestSettings,
    pub dry_run: bool,
    pub email_enabled: bool,
}

impl RunContext {
    /// Merge config and overrides; the command line wins.
    ///
    /// Fails with a [`ConfigError`] when the result cannot drive a run
    /// (no folders, missing folder, zero limits).
    pub fn resolve(config: &TriageConfig, overrides: &RunOverrides) -> Result<Self, ConfigError> {
        let folders = if overrides.input_folders.is_empty() {
            &config.input_folders
        } else {
            &overrides.input_folders
        };
        if folders.is_empty() {
            return Err(ConfigError::ValidationError(
                "no input folders configured (set input_folders or pass --input)".into(),
            ));
        }

        let mut input_folders = Vec::with_capacity(folders.len());
        for folder in folders {
            let path = expand_tilde(folder);
            if !path.is_dir() {
                return Err(ConfigError::MissingFolder { path });
            }
            input_folders.push(path);
        }

        let limits = ExtractionLimits {
            max_pages: overrides.max_pages.unwrap_or(config.max_pages),
            max_chars: overrides.max_chars.unwrap_or(config.max_chars),
        };
        if limits.max_pages == 0 || limits.max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "max_pages and max_chars must be positive".into(),
            ));
        }

        let mode = resolve_mode(&config.auto_decision, overrides);

        Ok(Self {
            input_folders,
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            metadata_sources: config
                .metadata_sources
                .iter()
                .map(|s| MetadataSource {
                    kind: s.kind.to_lowercase(),
                    path: expand_tilde(&s.path),
                })
                .collect(),
            limits,
            mode,
            archive_dir: expand_tilde(overrides.archive_dir.as_deref().unwrap_or(&config.archive_dir)),
            log_path: expand_tilde(overrides.log_path.as_deref().unwrap_or(&config.log_path)),
            digest: DigestSettings {
                enabled: config.digest.enabled,
                dir: expand_tilde(overrides.digest_dir.as_deref().unwrap_or(&config.digest_dir)),
                on_early_exit: config.digest.on_early_exit,
            },
            dry_run: overrides.dry_run,
            email_enabled: config.email.enabled && !overrides.no_email,
        })
    }
}

/// CLI `--auto-decision` beats `--interactive`, which beats the config.
fn resolve_mode(auto: &AutoDecisionConfig, overrides: &RunOverrides) -> DecisionMode {
    if let Some(default) = overrides.auto_decision {
        return DecisionMode::Auto { default };
    }
    if overrides.interactive {
        return DecisionMode::Manual;
    }
    if auto.enabled {
        DecisionMode::Auto {
            default: auto.default,
        }
    } else {
        DecisionMode::Manual
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs_home();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return dirs_home().join(rest);
    }
    PathBuf::from(path)
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors. All of them are fatal: no document is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Input folder does not exist or is not a directory: {path}")]
    MissingFolder { path: PathBuf },
}
