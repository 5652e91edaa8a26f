//! Application configuration.
//!
//! User config lives at `~/.oireachtas/oireachtas.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{OireachtasError, Result};
use crate::types::{Chamber, RECORD_TAG, SourceKind};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "oireachtas.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".oireachtas";

// ---------------------------------------------------------------------------
// Config structs (matching oireachtas.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listing API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Download and assembly settings.
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Per-source date windows.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Flattener settings.
    #[serde(default)]
    pub flatten: FlattenConfig,

    /// Prebuilt corpus cache.
    #[serde(default)]
    pub corpus: CorpusConfig,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the listing API (without trailing slash).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Results requested per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Timeout for one listing request, in seconds.
    #[serde(default = "default_listing_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            timeout_secs: default_listing_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.oireachtas.ie/v1".into()
}
fn default_page_size() -> u32 {
    50
}
fn default_listing_timeout() -> u64 {
    30
}

/// `[harvest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Directory that receives one sub-directory of documents per source.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Path of the assembled corpus file.
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,

    /// Concurrent downloads.
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,

    /// Timeout for one document download, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Stop each listing after this many unique documents.
    #[serde(default)]
    pub max_per_source: Option<usize>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            corpus_path: default_corpus_path(),
            max_workers: default_max_workers(),
            download_timeout_secs: default_download_timeout(),
            max_per_source: None,
        }
    }
}

fn default_data_dir() -> String {
    "data".into()
}
fn default_corpus_path() -> String {
    "all_debates.xml".into()
}
fn default_max_workers() -> u32 {
    8
}
fn default_download_timeout() -> u64 {
    60
}

/// Date window and switch for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceWindow {
    /// Whether `harvest` pages this source.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// First sitting date requested.
    pub date_start: NaiveDate,

    /// Last sitting date requested.
    #[serde(default = "default_date_end")]
    pub date_end: NaiveDate,
}

impl SourceWindow {
    fn starting(year: i32, month: u32, day: u32) -> Self {
        Self {
            enabled: true,
            date_start: NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default(),
            date_end: default_date_end(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_date_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 31).unwrap_or_default()
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_dail_window")]
    pub dail: SourceWindow,

    #[serde(default = "default_seanad_window")]
    pub seanad: SourceWindow,

    #[serde(default = "default_committee_window")]
    pub committee: SourceWindow,

    #[serde(default = "default_questions_window")]
    pub written_questions: SourceWindow,
}

impl SourcesConfig {
    /// The window configured for a source kind.
    pub fn window(&self, kind: SourceKind) -> &SourceWindow {
        match kind {
            SourceKind::House(Chamber::Dail) => &self.dail,
            SourceKind::House(Chamber::Seanad) => &self.seanad,
            SourceKind::Committee => &self.committee,
            SourceKind::WrittenQuestion => &self.written_questions,
        }
    }

    pub fn window_mut(&mut self, kind: SourceKind) -> &mut SourceWindow {
        match kind {
            SourceKind::House(Chamber::Dail) => &mut self.dail,
            SourceKind::House(Chamber::Seanad) => &mut self.seanad,
            SourceKind::Committee => &mut self.committee,
            SourceKind::WrittenQuestion => &mut self.written_questions,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            dail: default_dail_window(),
            seanad: default_seanad_window(),
            committee: default_committee_window(),
            written_questions: default_questions_window(),
        }
    }
}

fn default_dail_window() -> SourceWindow {
    SourceWindow::starting(1919, 1, 1)
}
fn default_seanad_window() -> SourceWindow {
    SourceWindow::starting(1929, 1, 1)
}
fn default_committee_window() -> SourceWindow {
    SourceWindow::starting(1924, 1, 1)
}
fn default_questions_window() -> SourceWindow {
    // Oral questions overlap the Dáil record, so only written ones are harvested.
    SourceWindow::starting(2012, 1, 1)
}

/// Column delimiter of the flattened output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
}

impl Delimiter {
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Comma => b',',
            Self::Tab => b'\t',
        }
    }
}

/// `[flatten]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenConfig {
    /// Element name that marks a corpus record.
    #[serde(default = "default_record_tag")]
    pub record_tag: String,

    /// Output delimiter.
    #[serde(default)]
    pub delimiter: Delimiter,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            record_tag: default_record_tag(),
            delimiter: Delimiter::default(),
        }
    }
}

fn default_record_tag() -> String {
    RECORD_TAG.into()
}

/// `[corpus]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Where a prebuilt corpus can be downloaded from.
    #[serde(default = "default_corpus_url")]
    pub url: String,

    /// Local cache path for the prebuilt corpus.
    #[serde(default = "default_corpus_cache")]
    pub cache_path: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            url: default_corpus_url(),
            cache_path: default_corpus_cache(),
        }
    }
}

fn default_corpus_url() -> String {
    "https://huggingface.co/datasets/jmcinern/Oireachtas_XML/resolve/main/Oireachtas_XML_1919-01-01_to_2025-07-31.xml".into()
}
fn default_corpus_cache() -> String {
    "Oireachtas_XML_1919-01-01_to_2025-07-31.xml".into()
}

// ---------------------------------------------------------------------------
// Harvest options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime harvest configuration, merged from the config file and CLI flags.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Listing API base URL.
    pub api_base: String,
    /// Results per listing page.
    pub page_size: u32,
    /// Listing request timeout in seconds.
    pub listing_timeout_secs: u64,
    /// Concurrent downloads.
    pub max_workers: u32,
    /// Download timeout in seconds.
    pub download_timeout_secs: u64,
    /// Per-source cap on unique documents.
    pub max_per_source: Option<usize>,
    /// Root download directory.
    pub data_dir: PathBuf,
    /// Output corpus path.
    pub corpus_path: PathBuf,
}

impl From<&AppConfig> for HarvestOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_base: config.api.base_url.trim_end_matches('/').to_string(),
            page_size: config.api.page_size,
            listing_timeout_secs: config.api.timeout_secs,
            max_workers: config.harvest.max_workers,
            download_timeout_secs: config.harvest.download_timeout_secs,
            max_per_source: config.harvest.max_per_source,
            data_dir: PathBuf::from(&config.harvest.data_dir),
            corpus_path: PathBuf::from(&config.harvest.corpus_path),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.oireachtas/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| OireachtasError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.oireachtas/oireachtas.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OireachtasError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        OireachtasError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| OireachtasError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| OireachtasError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| OireachtasError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject settings that would make paging or downloading impossible.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.api.page_size == 0 {
        return Err(OireachtasError::config("api.page_size must be at least 1"));
    }
    if config.harvest.max_workers == 0 {
        return Err(OireachtasError::config("harvest.max_workers must be at least 1"));
    }
    if config.flatten.record_tag.trim().is_empty() {
        return Err(OireachtasError::config("flatten.record_tag must not be empty"));
    }
    for kind in SourceKind::ALL {
        let window = config.sources.window(kind);
        if window.date_start > window.date_end {
            return Err(OireachtasError::config(format!(
                "{kind} source window: date_start {} is after date_end {}",
                window.date_start, window.date_end
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("api.oireachtas.ie"));
        assert!(toml_str.contains("1919-01-01"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.api.page_size, 50);
        assert_eq!(parsed.flatten.record_tag, "debate");
        assert_eq!(
            parsed.sources.seanad.date_start,
            NaiveDate::from_ymd_opt(1929, 1, 1).unwrap()
        );
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml_str = r#"
[harvest]
max_workers = 2
max_per_source = 100

[sources.committee]
enabled = false
date_start = "2020-01-01"

[flatten]
delimiter = "tab"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.harvest.max_workers, 2);
        assert_eq!(config.harvest.max_per_source, Some(100));
        assert_eq!(config.harvest.data_dir, "data");
        assert!(!config.sources.committee.enabled);
        assert_eq!(config.sources.committee.date_end, default_date_end());
        assert!(config.sources.dail.enabled);
        assert_eq!(config.flatten.delimiter, Delimiter::Tab);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn harvest_options_from_app_config() {
        let mut app = AppConfig::default();
        app.api.base_url = "http://localhost:9000/v1/".into();
        let opts = HarvestOptions::from(&app);
        assert_eq!(opts.api_base, "http://localhost:9000/v1");
        assert_eq!(opts.max_workers, 8);
        assert_eq!(opts.corpus_path, PathBuf::from("all_debates.xml"));
    }

    #[test]
    fn validation_rejects_inverted_window() {
        let mut config = AppConfig::default();
        config.sources.dail.date_start = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("dail source window"));

        let mut config = AppConfig::default();
        config.api.page_size = 0;
        assert!(validate_config(&config).is_err());
    }
}
