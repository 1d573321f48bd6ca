use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 10000;
const CONFIG_DIR: &str = "config";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_IMAGES_DIR: &str = "static";
const DEFAULT_REPORTS_DIR: &str = "reports";
const DEFAULT_PREVIEW_ROWS: usize = 10;
const DEFAULT_SEASONAL_PERIOD: usize = 7;
const DEFAULT_FORECAST_HORIZON: usize = 10;
const DEFAULT_SEARCH_TRIALS: usize = 10;

/// Time-series pipeline knobs
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Seasonal period of the additive decomposition (daily data, weekly cycle)
    #[serde(default = "default_seasonal_period")]
    #[validate(range(min = 2, max = 366))]
    pub seasonal_period: usize,

    /// Number of daily steps forecast past the last observation
    #[serde(default = "default_forecast_horizon")]
    #[validate(range(min = 1, max = 365))]
    pub forecast_horizon: usize,

    /// Number of ARIMA orders sampled by the order search
    #[serde(default = "default_search_trials")]
    #[validate(range(min = 1, max = 500))]
    pub search_trials: usize,

    /// Fixed sampler seed; unset draws a fresh seed per analysis
    #[serde(default)]
    pub search_seed: Option<u64>,

    /// Upper bound of the AR order
    #[serde(default = "default_max_p")]
    #[validate(range(max = 10))]
    pub max_p: usize,

    /// Upper bound of the differencing order
    #[serde(default = "default_max_d")]
    #[validate(range(max = 2))]
    pub max_d: usize,

    /// Upper bound of the MA order
    #[serde(default = "default_max_q")]
    #[validate(range(max = 10))]
    pub max_q: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            seasonal_period: default_seasonal_period(),
            forecast_horizon: default_forecast_horizon(),
            search_trials: default_search_trials(),
            search_seed: None,
            max_p: default_max_p(),
            max_d: default_max_d(),
            max_q: default_max_q(),
        }
    }
}

/// Which report layout the generator writes
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// Title, summary and every chart with its caption
    #[default]
    Full,
    /// One page with the record count and the sales total
    SummaryOnly,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default)]
    pub mode: ReportMode,
}

/// Pixel size of the rendered PNG charts
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ChartConfig {
    #[serde(default = "default_chart_width")]
    #[validate(range(min = 200, max = 4000))]
    pub width: u32,

    #[serde(default = "default_chart_height")]
    #[validate(range(min = 150, max = 4000))]
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: default_chart_width(),
            height: default_chart_height(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Directory receiving uploaded spreadsheets
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Directory receiving rendered chart images
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,

    /// Directory receiving generated PDF reports
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Accepted spreadsheet extensions, matched case-insensitively
    #[serde(default = "default_allowed_extensions")]
    #[validate(length(min = 1))]
    pub allowed_extensions: Vec<String>,

    /// Rows returned by the upload preview
    #[serde(default = "default_preview_rows")]
    #[validate(range(min = 1, max = 1000))]
    pub preview_rows: usize,

    /// Maximum request body size in bytes (default 20MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    #[serde(default)]
    #[validate]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    #[validate]
    pub report: ReportConfig,

    #[serde(default)]
    #[validate]
    pub charts: ChartConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            upload_dir: default_upload_dir(),
            images_dir: default_images_dir(),
            reports_dir: default_reports_dir(),
            allowed_extensions: default_allowed_extensions(),
            preview_rows: default_preview_rows(),
            max_body_size: default_max_body_size(),
            analysis: AnalysisConfig::default(),
            report: ReportConfig::default(),
            charts: ChartConfig::default(),
        }
    }
}

impl AppConfig {
    /// Configuration rooted at `base`, with the three working directories beneath it
    pub fn with_base_dir(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            upload_dir: base.join(DEFAULT_UPLOAD_DIR),
            images_dir: base.join(DEFAULT_IMAGES_DIR),
            reports_dir: base.join(DEFAULT_REPORTS_DIR),
            ..Self::default()
        }
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Whether `extension` is one of the accepted spreadsheet formats
    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    /// Creates the upload, image and report directories if they are missing
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [&self.upload_dir, &self.images_dir, &self.reports_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    fn validate_additional_constraints(&self) -> Result<(), validator::ValidationErrors> {
        let mut errors = validator::ValidationErrors::new();

        // charts are copied from images_dir into reports_dir
        if self.images_dir == self.reports_dir {
            let mut err = ValidationError::new("reports_dir_distinct");
            err.message = Some("reports_dir must differ from images_dir".into());
            errors.add("reports_dir", err);
        }

        if self.upload_dir == self.images_dir || self.upload_dir == self.reports_dir {
            let mut err = ValidationError::new("upload_dir_distinct");
            err.message = Some("upload_dir must not be shared with generated artifacts".into());
            errors.add("upload_dir", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from(DEFAULT_UPLOAD_DIR)
}

fn default_images_dir() -> PathBuf {
    PathBuf::from(DEFAULT_IMAGES_DIR)
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from(DEFAULT_REPORTS_DIR)
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["xls".to_string(), "xlsx".to_string()]
}

fn default_preview_rows() -> usize {
    DEFAULT_PREVIEW_ROWS
}

fn default_max_body_size() -> usize {
    20 * 1024 * 1024
}

fn default_seasonal_period() -> usize {
    DEFAULT_SEASONAL_PERIOD
}

fn default_forecast_horizon() -> usize {
    DEFAULT_FORECAST_HORIZON
}

fn default_search_trials() -> usize {
    DEFAULT_SEARCH_TRIALS
}

fn default_max_p() -> usize {
    5
}

fn default_max_d() -> usize {
    2
}

fn default_max_q() -> usize {
    5
}

fn default_chart_width() -> u32 {
    1200
}

fn default_chart_height() -> u32 {
    600
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!(
        "sales_forecast_api={level},sales_analyze={level},tower_http=debug",
        level = level
    );
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
/// 5. `PORT`, as set by hosting platforms
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let mut builder = Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        );

    if let Ok(port) = env::var("PORT") {
        builder = builder.set_override("port", port)?;
    }

    let app_config: AppConfig = builder.build()?.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Directory configuration rejected: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_fixed_pipeline_shape() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.port, 10000);
        assert_eq!(cfg.preview_rows, 10);
        assert_eq!(cfg.analysis.seasonal_period, 7);
        assert_eq!(cfg.analysis.forecast_horizon, 10);
        assert_eq!(cfg.analysis.search_trials, 10);
        assert_eq!(
            (cfg.analysis.max_p, cfg.analysis.max_d, cfg.analysis.max_q),
            (5, 2, 5)
        );
        assert_eq!(cfg.report.mode, ReportMode::Full);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn extension_check_ignores_case() {
        let cfg = AppConfig::default();
        assert!(cfg.is_allowed_extension("XLSX"));
        assert!(cfg.is_allowed_extension("xls"));
        assert!(!cfg.is_allowed_extension("csv"));
        assert!(!cfg.is_allowed_extension(""));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let cfg = AppConfig {
            log_level: "verbose".into(),
            ..AppConfig::default()
        };
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("log_level"));
    }

    #[test]
    fn zero_trial_budget_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.analysis.search_trials = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn shared_artifact_directories_are_rejected() {
        let mut cfg = AppConfig::default();
        cfg.reports_dir = cfg.images_dir.clone();
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("reports_dir"));
    }

    #[test]
    fn ensure_directories_creates_all_three() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = AppConfig::with_base_dir(tmp.path());
        cfg.ensure_directories().unwrap();
        assert!(cfg.upload_dir.is_dir());
        assert!(cfg.images_dir.is_dir());
        assert!(cfg.reports_dir.is_dir());
    }

    #[test]
    fn report_mode_parses_snake_case() {
        let mode: ReportMode = serde_json::from_str("\"summary_only\"").unwrap();
        assert_eq!(mode, ReportMode::SummaryOnly);
    }
}
