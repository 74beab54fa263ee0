use portal_core::config::{load_settings, TelemetrySettings};
use portal_core::error::AppError;
use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub checkout: CheckoutSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct BackendSettings {
    /// Base URL of the POS REST API, including any version prefix.
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    15
}

#[derive(Deserialize, Clone)]
pub struct CheckoutSettings {
    /// Hosted checkout script. Empty disables the load check.
    pub script_url: String,
    /// Public client key handed to the browser alongside the payment token.
    pub client_key: Secret<String>,
    /// How long to wait for a widget outcome before treating it as pending.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl CheckoutSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

fn default_wait_timeout_secs() -> u64 {
    900
}

#[derive(Deserialize, Clone, Debug)]
pub struct PollingSettings {
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
    pub verify_attempts: u32,
    pub verify_interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            request_timeout_secs: 10,
            verify_attempts: 5,
            verify_interval_ms: 500,
        }
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn verify_interval(&self) -> Duration {
        Duration::from_millis(self.verify_interval_ms)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct SessionSettings {
    /// Lifetime of the "skip subscription check" grant after a payment.
    pub skip_check_ttl_secs: i64,
    pub idempotency_ttl_secs: i64,
    /// An unsettled claim older than this is handed out again.
    #[serde(default = "default_in_flight_ttl_secs")]
    pub in_flight_ttl_secs: i64,
    /// Sessions untouched for this long are forgotten.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: i64,
    /// Payment pages nobody looked at for this long are torn down.
    #[serde(default = "default_page_idle_secs")]
    pub page_idle_secs: i64,
}

fn default_in_flight_ttl_secs() -> i64 {
    60
}

fn default_idle_ttl_secs() -> i64 {
    3600
}

fn default_page_idle_secs() -> i64 {
    600
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            skip_check_ttl_secs: 60,
            idempotency_ttl_secs: 300,
            in_flight_ttl_secs: default_in_flight_ttl_secs(),
            idle_ttl_secs: default_idle_ttl_secs(),
            page_idle_secs: default_page_idle_secs(),
        }
    }
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let base_path = std::env::current_dir()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("No working directory: {}", e)))?;

    // Running from the crate directory or from the workspace root
    let configuration_directory = if base_path.ends_with("merchant-portal") {
        base_path.join("config")
    } else {
        base_path.join("merchant-portal").join("config")
    };

    load_settings(&configuration_directory)
}
