use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::storage::StorageConfig;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: proxy upstream, client session behaviour, guards, logging.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub bind_address: String,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The backend the auth proxy forwards to.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct UpstreamConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
    /// Name of the HTTP-only cookie carrying the refresh credential.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

/// Client-side session settings.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SessionConfig {
    /// Base URL of the auth proxy the client talks to.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Tokens living this many seconds or less get `short_lived_buffer_ms` shaved off.
    #[serde(default = "default_short_lived_threshold_secs")]
    pub short_lived_threshold_secs: i64,
    #[serde(default = "default_short_lived_buffer_ms")]
    pub short_lived_buffer_ms: i64,
    /// Keep an unexpired optimistic session when verification fails transiently.
    #[serde(default = "default_true")]
    pub keep_optimistic_on_transient: bool,
    #[serde(default = "default_timeout_in_ms")]
    pub request_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            storage: StorageConfig::default(),
            short_lived_threshold_secs: default_short_lived_threshold_secs(),
            short_lived_buffer_ms: default_short_lived_buffer_ms(),
            keep_optimistic_on_transient: true,
            request_timeout_ms: default_timeout_in_ms(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct GuardConfig {
    #[serde(default = "default_redirect_delay_ms")]
    pub redirect_delay_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            redirect_delay_ms: default_redirect_delay_ms(),
        }
    }
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

fn default_cookie_name() -> String {
    "refreshToken".to_string()
}

fn default_backend_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_short_lived_threshold_secs() -> i64 {
    10
}

fn default_short_lived_buffer_ms() -> i64 {
    500
}

fn default_redirect_delay_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

/// Build the figment used for loading: `./config.yaml` overlaid with
/// `CAREERMATE_`-prefixed environment variables (`__` separates nesting).
pub fn config_figment() -> Figment {
    Figment::new()
        .merge(Yaml::file("./config.yaml"))
        .merge(Env::prefixed("CAREERMATE_").split("__"))
}

/// Extract a versioned config from any figment.
pub fn extract_config(figment: &Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from "config.yaml" in the current directory plus environment overrides.
pub fn load_config() -> ConfigV1 {
    match extract_config(&config_figment()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
