//! Configuration for the market board tools.
//!
//! Every tool reads one JSON file at `~/.market-board/config.json`. Missing
//! sections fall back to built-in defaults, so a fresh install runs with no
//! file at all.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (`BOARD_*` prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `BOARD_LOG_LEVEL` → observability.log_level
//! - `BOARD_LOG_FORMAT` → observability.log_format
//! - `BOARD_OUTPUT_DIR` → output.dir
//! - `BOARD_HTTP_TIMEOUT_SECS` → http.timeout_secs
//! - `BOARD_EMAIL_ENABLED` → email.enabled
//! - `BOARD_EMAIL_SENDER` → email.sender
//! - `BOARD_EMAIL_RECEIVERS` → email.receivers
//! - `BOARD_EMAIL_AUTH_CODE` → email.auth_code

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".market-board"),
        |dirs| dirs.home_dir().join(".market-board"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Settings shared by every vendor client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Referer sent to the Baidu quotation endpoint
    #[serde(default = "default_referer")]
    pub referer: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            referer: default_referer(),
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// Where generated files land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base directory; `~` and `$VAR` are expanded.
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_price_json")]
    pub price_json: String,
    #[serde(default = "default_index_html")]
    pub index_html: String,
    #[serde(default = "default_strategy_fragment")]
    pub strategy_fragment: String,
    /// Glob used to pick the newest advisor chart
    #[serde(default = "default_strategy_chart_glob")]
    pub strategy_chart_glob: String,
    /// Directory holding an `index.hbs` that replaces the embedded dashboard template
    #[serde(default)]
    pub template_dir: Option<String>,
    /// Sub-directory for hot-list dumps and analysis reports
    #[serde(default = "default_hot_data_dir")]
    pub hot_data_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            price_json: default_price_json(),
            index_html: default_index_html(),
            strategy_fragment: default_strategy_fragment(),
            strategy_chart_glob: default_strategy_chart_glob(),
            template_dir: None,
            hot_data_dir: default_hot_data_dir(),
        }
    }
}

impl OutputConfig {
    /// Expanded base directory.
    pub fn base_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.dir).into_owned())
    }

    /// Resolve a file name against the base directory.
    pub fn path(&self, file: impl AsRef<Path>) -> PathBuf {
        self.base_dir().join(file)
    }

    /// Directory holding the hot-list files.
    pub fn hot_dir(&self) -> PathBuf {
        self.base_dir().join(&self.hot_data_dir)
    }

    /// Expanded template override directory, if configured.
    pub fn template_dir(&self) -> Option<PathBuf> {
        self.template_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()))
    }
}

// ============================================================================
// Instruments
// ============================================================================

/// A code/name pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub code: String,
    pub name: String,
}

impl InstrumentConfig {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

/// A spot index paired with its main futures contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuturesPairConfig {
    /// Short key used in `price.json` (`has_<key>_chart`)
    pub key: String,
    pub name: String,
    pub spot_code: String,
    pub future_code: String,
    /// Embed file the chart fragment is written to
    pub chart_file: String,
}

/// Rolling-window parameters for the basis chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_ma_window")]
    pub ma_window: usize,
    #[serde(default = "default_bollinger_window")]
    pub bollinger_window: usize,
    #[serde(default = "default_std_multiplier")]
    pub std_multiplier: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_window: default_ma_window(),
            bollinger_window: default_bollinger_window(),
            std_multiplier: default_std_multiplier(),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Market-snapshot dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_main_stock")]
    pub stock: InstrumentConfig,
    /// Price used for the main stock when fabricating demo data
    #[serde(default = "default_stock_price")]
    pub default_stock_price: f64,
    #[serde(default = "default_indices")]
    pub indices: Vec<InstrumentConfig>,
    #[serde(default = "default_futures")]
    pub futures: Vec<FuturesPairConfig>,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    /// Sessions shown in the recent trading table
    #[serde(default = "default_recent_days")]
    pub recent_days: usize,
    /// Sessions shown in the candlestick chart
    #[serde(default = "default_kline_days")]
    pub kline_days: usize,
    #[serde(default = "default_chart_width")]
    pub chart_width: u32,
    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            stock: default_main_stock(),
            default_stock_price: default_stock_price(),
            indices: default_indices(),
            futures: default_futures(),
            indicators: IndicatorConfig::default(),
            recent_days: default_recent_days(),
            kline_days: default_kline_days(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
        }
    }
}

// ============================================================================
// Advisor
// ============================================================================

/// Dividend-ETF advisor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_etf")]
    pub etf: InstrumentConfig,
    #[serde(default = "default_benchmark")]
    pub benchmark: InstrumentConfig,
    /// Trailing return window (sessions)
    #[serde(default = "default_return_window")]
    pub return_window: usize,
    /// Moving average window over the differential (sessions)
    #[serde(default = "default_diff_ma_window")]
    pub ma_window: usize,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_daily_base_invest")]
    pub daily_base_invest: f64,
    /// Rows shown in the fragment's history table
    #[serde(default = "default_recent_days")]
    pub recent_rows: usize,
    #[serde(default = "default_major_indices")]
    pub major_indices: Vec<InstrumentConfig>,
    /// Sessions shown in each index kline chart
    #[serde(default = "default_index_chart_days")]
    pub index_chart_days: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            etf: default_etf(),
            benchmark: default_benchmark(),
            return_window: default_return_window(),
            ma_window: default_diff_ma_window(),
            initial_capital: default_initial_capital(),
            daily_base_invest: default_daily_base_invest(),
            recent_rows: default_recent_days(),
            major_indices: default_major_indices(),
            index_chart_days: default_index_chart_days(),
        }
    }
}

// ============================================================================
// Email
// ============================================================================

/// SMTP delivery of the advisor report. Disabled unless configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub sender: String,
    /// Comma-separated list
    #[serde(default)]
    pub receivers: String,
    /// SMTP authorization code (not the mailbox password)
    #[serde(default)]
    pub auth_code: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            sender: String::new(),
            receivers: String::new(),
            auth_code: None,
        }
    }
}

impl EmailConfig {
    /// Split the receiver list, dropping blanks.
    pub fn receiver_list(&self) -> Vec<String> {
        self.receivers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

// ============================================================================
// Hot list
// ============================================================================

/// Hot-stock ranking scraper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotListConfig {
    /// Concepts kept in the analysis ranking
    #[serde(default = "default_top_concepts")]
    pub top_concepts: usize,
    /// Rows in the concept snippet
    #[serde(default = "default_snippet_concepts")]
    pub snippet_concepts: usize,
    /// Rows in the stock snippet
    #[serde(default = "default_snippet_stocks")]
    pub snippet_stocks: usize,
}

impl Default for HotListConfig {
    fn default() -> Self {
        Self {
            top_concepts: default_top_concepts(),
            snippet_concepts: default_snippet_concepts(),
            snippet_stocks: default_snippet_stocks(),
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub hot: HotListConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load from `path` (or the default location), apply env overrides, validate.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("BOARD_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("BOARD_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(dir) = std::env::var("BOARD_OUTPUT_DIR") {
            self.output.dir = dir;
        }
        if let Ok(timeout) = std::env::var("BOARD_HTTP_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.http.timeout_secs = t;
            }
        }
        if let Ok(enabled) = std::env::var("BOARD_EMAIL_ENABLED") {
            self.email.enabled = matches!(enabled.as_str(), "1" | "true" | "yes");
        }
        if let Ok(sender) = std::env::var("BOARD_EMAIL_SENDER") {
            self.email.sender = sender;
        }
        if let Ok(receivers) = std::env::var("BOARD_EMAIL_RECEIVERS") {
            self.email.receivers = receivers;
        }
        if let Ok(code) = std::env::var("BOARD_EMAIL_AUTH_CODE") {
            self.email.auth_code = Some(code);
        }
    }

    /// Reject settings the pipelines cannot run with.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        let ind = &self.snapshot.indicators;
        if ind.ma_window == 0 || ind.bollinger_window < 2 {
            return Err(Error::Config(
                "snapshot.indicators: ma_window must be > 0 and bollinger_window >= 2".into(),
            ));
        }
        let adv = &self.advisor;
        if adv.return_window == 0 || adv.ma_window == 0 {
            return Err(Error::Config(
                "advisor: return_window and ma_window must be > 0".into(),
            ));
        }
        if adv.initial_capital <= 0.0 || adv.daily_base_invest <= 0.0 {
            return Err(Error::Config(
                "advisor: initial_capital and daily_base_invest must be positive".into(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::Config("http.timeout_secs must be > 0".into()));
        }
        if self.email.enabled {
            if self.email.sender.is_empty() || self.email.receiver_list().is_empty() {
                return Err(Error::Config(
                    "email is enabled but sender or receivers are empty".into(),
                ));
            }
            if self.email.auth_code.as_deref().map_or(true, str::is_empty) {
                return Err(Error::Config(
                    "email is enabled but auth_code is missing".into(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0".into()
}
fn default_referer() -> String {
    "https://gushitong.baidu.com/".into()
}
fn default_output_dir() -> String {
    ".".into()
}
fn default_price_json() -> String {
    "price.json".into()
}
fn default_index_html() -> String {
    "index.html".into()
}
fn default_strategy_fragment() -> String {
    "strategy_fragment.html".into()
}
fn default_strategy_chart_glob() -> String {
    "红利ETF_三种策略_梯度买卖_*_*.svg".into()
}
fn default_hot_data_dir() -> String {
    "hot_data".into()
}
fn default_main_stock() -> InstrumentConfig {
    InstrumentConfig::new("600900", "长江电力")
}
fn default_stock_price() -> f64 {
    26.80
}
fn default_indices() -> Vec<InstrumentConfig> {
    vec![
        InstrumentConfig::new("000001", "上证指数"),
        InstrumentConfig::new("399006", "创业板指"),
        InstrumentConfig::new("000688", "科创50"),
        InstrumentConfig::new("000985", "中证全指"),
    ]
}
fn default_futures() -> Vec<FuturesPairConfig> {
    vec![
        FuturesPairConfig {
            key: "hs300".into(),
            name: "沪深300".into(),
            spot_code: "000300".into(),
            future_code: "IF888".into(),
            chart_file: "hs300_basis_embed.html".into(),
        },
        FuturesPairConfig {
            key: "zz1000".into(),
            name: "中证1000".into(),
            spot_code: "000852".into(),
            future_code: "IC888".into(),
            chart_file: "zz1000_basis_embed.html".into(),
        },
    ]
}
fn default_ma_window() -> usize {
    60
}
fn default_bollinger_window() -> usize {
    20
}
fn default_std_multiplier() -> f64 {
    2.0
}
fn default_recent_days() -> usize {
    20
}
fn default_kline_days() -> usize {
    180
}
fn default_chart_width() -> u32 {
    1000
}
fn default_chart_height() -> u32 {
    600
}
fn default_etf() -> InstrumentConfig {
    InstrumentConfig::new("515180", "红利ETF")
}
fn default_benchmark() -> InstrumentConfig {
    InstrumentConfig::new("000985", "中证全指")
}
fn default_return_window() -> usize {
    40
}
fn default_diff_ma_window() -> usize {
    240
}
fn default_initial_capital() -> f64 {
    10_000.0
}
fn default_daily_base_invest() -> f64 {
    50.0
}
fn default_major_indices() -> Vec<InstrumentConfig> {
    vec![
        InstrumentConfig::new("000001", "上证指数"),
        InstrumentConfig::new("399001", "深证成指"),
        InstrumentConfig::new("399006", "创业板指"),
    ]
}
fn default_index_chart_days() -> usize {
    60
}
fn default_smtp_host() -> String {
    "smtp.qq.com".into()
}
fn default_smtp_port() -> u16 {
    465
}
fn default_top_concepts() -> usize {
    30
}
fn default_snippet_concepts() -> usize {
    10
}
fn default_snippet_stocks() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_board_constants() {
        let config = Config::default();
        assert_eq!(config.snapshot.stock.code, "600900");
        assert_eq!(config.snapshot.indices.len(), 4);
        assert_eq!(config.snapshot.futures[1].future_code, "IC888");
        assert_eq!(config.advisor.return_window, 40);
        assert_eq!(config.advisor.ma_window, 240);
        assert_eq!(config.http.timeout_secs, 10);
        assert!(!config.email.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"advisor": {{"daily_base_invest": 100}}, "output": {{"dir": "/tmp/board"}}}}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.advisor.daily_base_invest, 100.0);
        assert_eq!(config.advisor.initial_capital, 10_000.0);
        assert_eq!(config.output.path("price.json"), PathBuf::from("/tmp/board/price.json"));
        assert_eq!(config.output.price_json, "price.json");
    }

    #[test]
    fn test_receiver_list_splits_and_trims() {
        let email = EmailConfig {
            receivers: "a@example.com, b@example.com,,".into(),
            ..EmailConfig::default()
        };
        assert_eq!(email.receiver_list(), vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_validate_rejects_enabled_email_without_code() {
        let mut config = Config::default();
        config.email.enabled = true;
        config.email.sender = "bot@example.com".into();
        config.email.receivers = "me@example.com".into();
        assert!(config.validate().is_err());

        config.email.auth_code = Some("abcd".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = Config::default();
        config.advisor.return_window = 0;
        assert!(config.validate().is_err());
    }
}
