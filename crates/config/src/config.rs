//! Core configuration structures and loading logic

use crate::resolution::Resolution;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Values parsed but are inconsistent
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Where and what to look for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanConfig {
    /// Root of the camera recording tree
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Clips younger than this may still be written (default 30)
    #[serde(default = "default_min_age_seconds")]
    pub min_age_seconds: f64,
    /// Clips older than this are stale and ignored (default 600)
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: f64,
    /// File extensions treated as clips, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_root() -> PathBuf {
    PathBuf::from("/var/lib/motioneye")
}

fn default_min_age_seconds() -> f64 {
    30.0
}

fn default_max_age_seconds() -> f64 {
    600.0
}

fn default_extensions() -> Vec<String> {
    vec!["mp4".to_string()]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            min_age_seconds: default_min_age_seconds(),
            max_age_seconds: default_max_age_seconds(),
            extensions: default_extensions(),
        }
    }
}

/// Payload budget of the delivery channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryConfig {
    /// Clips below this are not worth posting (default 0.5)
    #[serde(default = "default_min_mbytes")]
    pub min_mbytes: f64,
    /// Largest payload the channel accepts (default 9)
    #[serde(default = "default_max_mbytes")]
    pub max_mbytes: f64,
    /// Segment-count ceiling per clip (default 20)
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    /// Frame index used for the still-image fallback (default 24)
    #[serde(default = "default_fallback_frame")]
    pub fallback_frame: u32,
}

fn default_min_mbytes() -> f64 {
    0.5
}

fn default_max_mbytes() -> f64 {
    9.0
}

fn default_max_chunks() -> usize {
    20
}

fn default_fallback_frame() -> u32 {
    24
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            min_mbytes: default_min_mbytes(),
            max_mbytes: default_max_mbytes(),
            max_chunks: default_max_chunks(),
            fallback_frame: default_fallback_frame(),
        }
    }
}

/// Downscale attempt for over-budget clips
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownscaleConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Catalog of candidate resolutions
    #[serde(default = "default_resolutions")]
    pub resolutions: Vec<Resolution>,
}

fn default_resolutions() -> Vec<Resolution> {
    vec![
        Resolution::new(1920, 1080),
        Resolution::new(1280, 720),
        Resolution::new(854, 480),
        Resolution::new(640, 360),
    ]
}

impl Default for DownscaleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            resolutions: default_resolutions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HousekeepingConfig {
    /// Clips older than this many days are deleted (default 3)
    #[serde(default = "default_max_days_to_keep")]
    pub max_days_to_keep: f64,
}

fn default_max_days_to_keep() -> f64 {
    3.0
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            max_days_to_keep: default_max_days_to_keep(),
        }
    }
}

/// Telegram Bot API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    /// Upper bound for one upload (default 60)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            timeout_secs: default_timeout_secs(),
            api_base: default_api_base(),
        }
    }
}

/// Retry ledger for clips whose delivery failed after renaming
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    /// Attempts allowed per clip (0 disables the ledger)
    #[serde(default)]
    pub retry_limit: u32,
    /// Ledger file name, created under the scan root
    #[serde(default = "default_ledger_file_name")]
    pub file_name: String,
}

fn default_ledger_file_name() -> String {
    ".motion-sweep-ledger.json".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retry_limit: 0,
            file_name: default_ledger_file_name(),
        }
    }
}

impl LedgerConfig {
    pub fn enabled(&self) -> bool {
        self.retry_limit > 0
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Compute and log every decision without renaming, deleting or posting
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub downscale: DownscaleConfig,
    #[serde(default)]
    pub housekeeping: HousekeepingConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the sweep.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - SWEEP_ROOT -> scan.root
    /// - SWEEP_MAX_AGE_SECONDS -> scan.max_age_seconds
    /// - SWEEP_MIN_MBYTES -> delivery.min_mbytes
    /// - SWEEP_MAX_MBYTES -> delivery.max_mbytes
    /// - SWEEP_MAX_CHUNKS -> delivery.max_chunks
    /// - SWEEP_DRY_RUN -> dry_run
    /// - TELEGRAM_BOT_TOKEN -> telegram.bot_token
    /// - TELEGRAM_CHAT_ID -> telegram.chat_id
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SWEEP_ROOT") {
            if !val.is_empty() {
                self.scan.root = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("SWEEP_MAX_AGE_SECONDS") {
            if let Ok(secs) = val.parse::<f64>() {
                self.scan.max_age_seconds = secs;
            }
        }

        if let Ok(val) = env::var("SWEEP_MIN_MBYTES") {
            if let Ok(mb) = val.parse::<f64>() {
                self.delivery.min_mbytes = mb;
            }
        }

        if let Ok(val) = env::var("SWEEP_MAX_MBYTES") {
            if let Ok(mb) = val.parse::<f64>() {
                self.delivery.max_mbytes = mb;
            }
        }

        if let Ok(val) = env::var("SWEEP_MAX_CHUNKS") {
            if let Ok(chunks) = val.parse::<usize>() {
                self.delivery.max_chunks = chunks;
            }
        }

        if let Ok(val) = env::var("SWEEP_DRY_RUN") {
            // Accept "true", "1", "yes" as true; "false", "0", "no" as false
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.dry_run = true,
                "false" | "0" | "no" => self.dry_run = false,
                _ => {} // Invalid value, keep existing
            }
        }

        if let Ok(val) = env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = val;
        }

        if let Ok(val) = env::var("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = val;
        }
    }

    /// Check cross-field constraints the types cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.scan.min_age_seconds < 0.0 || self.scan.min_age_seconds >= self.scan.max_age_seconds {
            return invalid(format!(
                "scan.min_age_seconds ({}) must be >= 0 and below scan.max_age_seconds ({})",
                self.scan.min_age_seconds, self.scan.max_age_seconds
            ));
        }
        if self.scan.extensions.is_empty() {
            return invalid("scan.extensions must not be empty".to_string());
        }
        if self.delivery.max_mbytes <= 0.0 {
            return invalid(format!(
                "delivery.max_mbytes ({}) must be positive",
                self.delivery.max_mbytes
            ));
        }
        if self.delivery.min_mbytes < 0.0 || self.delivery.min_mbytes > self.delivery.max_mbytes {
            return invalid(format!(
                "delivery.min_mbytes ({}) must be between 0 and delivery.max_mbytes ({})",
                self.delivery.min_mbytes, self.delivery.max_mbytes
            ));
        }
        if self.delivery.max_chunks == 0 {
            return invalid("delivery.max_chunks must be at least 1".to_string());
        }
        if self.housekeeping.max_days_to_keep <= 0.0 {
            return invalid(format!(
                "housekeeping.max_days_to_keep ({}) must be positive",
                self.housekeeping.max_days_to_keep
            ));
        }
        Ok(())
    }

    /// Load configuration from file, apply environment overrides and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear all config-related env vars
    fn clear_env_vars() {
        env::remove_var("SWEEP_ROOT");
        env::remove_var("SWEEP_MAX_AGE_SECONDS");
        env::remove_var("SWEEP_MIN_MBYTES");
        env::remove_var("SWEEP_MAX_MBYTES");
        env::remove_var("SWEEP_MAX_CHUNKS");
        env::remove_var("SWEEP_DRY_RUN");
        env::remove_var("TELEGRAM_BOT_TOKEN");
        env::remove_var("TELEGRAM_CHAT_ID");
    }

    // *For any* valid TOML configuration string, the loaded configuration SHALL
    // carry every value of the scan, delivery, downscale and housekeeping sections.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_parses_all_sections(
            max_age in 60u32..7200,
            max_mb in 1u32..50,
            max_chunks in 1usize..100,
            days in 1u32..30,
            enabled in proptest::bool::ANY,
            dry_run in proptest::bool::ANY,
        ) {
            let toml_str = format!(
                r#"
dry_run = {}

[scan]
root = "/srv/cams"
max_age_seconds = {}

[delivery]
max_mbytes = {}
max_chunks = {}

[downscale]
enabled = {}
resolutions = ["1280:720", "640:360"]

[housekeeping]
max_days_to_keep = {}
"#,
                dry_run, max_age, max_mb, max_chunks, enabled, days
            );

            let config = Config::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(config.dry_run, dry_run);
            prop_assert_eq!(&config.scan.root, &PathBuf::from("/srv/cams"));
            prop_assert!((config.scan.max_age_seconds - f64::from(max_age)).abs() < 1e-9);
            prop_assert!((config.delivery.max_mbytes - f64::from(max_mb)).abs() < 1e-9);
            prop_assert_eq!(config.delivery.max_chunks, max_chunks);
            prop_assert_eq!(config.downscale.enabled, enabled);
            prop_assert_eq!(
                &config.downscale.resolutions,
                &vec![Resolution::new(1280, 720), Resolution::new(640, 360)]
            );
            prop_assert!((config.housekeeping.max_days_to_keep - f64::from(days)).abs() < 1e-9);
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn prop_env_overrides_max_mbytes(
            initial in 1u32..20,
            override_mb in 1u32..50,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!("[delivery]\nmax_mbytes = {}\n", initial);
            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("SWEEP_MAX_MBYTES", override_mb.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert!((config.delivery.max_mbytes - f64::from(override_mb)).abs() < 1e-9);
        }

        #[test]
        fn prop_env_overrides_dry_run(
            initial in proptest::bool::ANY,
            override_dry in proptest::bool::ANY,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!("dry_run = {}\n", initial);
            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("SWEEP_DRY_RUN", override_dry.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.dry_run, override_dry);
        }
    }

    #[test]
    fn test_env_overrides_root_and_telegram() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::default();
        env::set_var("SWEEP_ROOT", "/data/motion");
        env::set_var("TELEGRAM_BOT_TOKEN", "123:abc");
        env::set_var("TELEGRAM_CHAT_ID", "-1001");
        env::set_var("SWEEP_MAX_CHUNKS", "not-a-number");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config.scan.root, PathBuf::from("/data/motion"));
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.chat_id, "-1001");
        assert_eq!(config.delivery.max_chunks, 20); // invalid value ignored
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_toml("").expect("Empty TOML should parse");

        assert!(!config.dry_run);
        assert_eq!(config.scan.root, PathBuf::from("/var/lib/motioneye"));
        assert!((config.scan.min_age_seconds - 30.0).abs() < 1e-9);
        assert!((config.scan.max_age_seconds - 600.0).abs() < 1e-9);
        assert_eq!(config.scan.extensions, vec!["mp4".to_string()]);
        assert!((config.delivery.min_mbytes - 0.5).abs() < 1e-9);
        assert!((config.delivery.max_mbytes - 9.0).abs() < 1e-9);
        assert_eq!(config.delivery.max_chunks, 20);
        assert_eq!(config.delivery.fallback_frame, 24);
        assert!(!config.downscale.enabled);
        assert_eq!(config.downscale.resolutions.len(), 4);
        assert!((config.housekeeping.max_days_to_keep - 3.0).abs() < 1e-9);
        assert_eq!(config.telegram.timeout_secs, 60);
        assert!(!config.ledger.enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_resolution_fails_parse() {
        let toml_str = r#"
[downscale]
resolutions = ["1920:1080", "big"]
"#;
        assert!(matches!(
            Config::parse_toml(toml_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_budget() {
        let toml_str = r#"
[delivery]
min_mbytes = 10.0
max_mbytes = 9.0
"#;
        let config = Config::parse_toml(toml_str).expect("Valid TOML");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_age_window() {
        let mut config = Config::default();
        config.scan.min_age_seconds = 900.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_chunks() {
        let mut config = Config::default();
        config.delivery.max_chunks = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
