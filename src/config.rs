use std::path::Path;

use chrono_tz::Tz;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::Deserialize;

/// Environment variables with this prefix override the JSON file, with `__`
/// separating nested keys (`SOLAR_SIM__WEATHER__API_KEY`).
pub const ENV_PREFIX: &str = "SOLAR_SIM__";

/// Credentials are taken verbatim from the environment. The generic `Env`
/// provider parses values, which turns an all-digit key into a number.
const VERBATIM_ENV_KEYS: [(&str, &str); 2] = [
    ("WEATHER__API_KEY", "weather.api_key"),
    ("STORE__ACCESS_TOKEN", "store.access_token"),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("unknown timezone '{0}': {1}")]
    Timezone(String, String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_timezone() -> String { "UTC".to_string() }
fn default_peak_power_w() -> f64 { 1000.0 }
fn default_daytime_start_hour() -> f64 { 6.0 }
fn default_daytime_end_hour() -> f64 { 19.0 }
fn default_capacity_wh() -> f64 { 16_800.0 }
fn default_initial_charge_percent() -> f64 { 75.0 }
fn default_base_power_w() -> f64 { 300.0 }
fn default_interval_hours() -> f64 { 0.25 }
fn default_timeout_seconds() -> u64 { 10 }
fn default_fallback_cloud_cover() -> f64 { 30.0 }
fn default_snapshot_path() -> String { "snapshots.jsonl".to_string() }
fn default_firestore_base_url() -> String { "https://firestore.googleapis.com/v1".to_string() }
fn default_firestore_database() -> String { "(default)".to_string() }
fn default_collection() -> String { "solarData".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub solar: SolarConfig,
    #[serde(default)]
    pub battery: BatteryConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub tick: TickConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    pub city: String,
    /// IANA zone name used for the daytime window and the local calendar day.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SolarConfig {
    #[serde(default = "default_peak_power_w")]
    pub peak_power_w: f64,
    #[serde(default = "default_daytime_start_hour")]
    pub daytime_start_hour: f64,
    #[serde(default = "default_daytime_end_hour")]
    pub daytime_end_hour: f64,
    /// Residual output outside the daytime window. Zero unless a site wants to
    /// model ambient light.
    #[serde(default)]
    pub night_floor_w: f64,
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            peak_power_w: default_peak_power_w(),
            daytime_start_hour: default_daytime_start_hour(),
            daytime_end_hour: default_daytime_end_hour(),
            night_floor_w: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatteryConfig {
    #[serde(default = "default_capacity_wh")]
    pub capacity_wh: f64,
    /// Charge assumed when the history holds no snapshot yet.
    #[serde(default = "default_initial_charge_percent")]
    pub initial_charge_percent: f64,
    /// Lowest fraction of capacity the model will ever report. 0.0 lets the
    /// battery drain completely; 0.2 keeps a 20% reserve.
    #[serde(default)]
    pub floor_fraction: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_wh: default_capacity_wh(),
            initial_charge_percent: default_initial_charge_percent(),
            floor_fraction: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoadConfig {
    #[serde(default = "default_base_power_w")]
    pub base_power_w: f64,
    #[serde(default)]
    pub profile: Vec<LoadWindow>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self { base_power_w: default_base_power_w(), profile: Vec::new() }
    }
}

/// Load override for a local-time window `[start_hour, end_hour)`. A window
/// whose start is after its end wraps past midnight.
#[derive(Debug, Deserialize, Clone)]
pub struct LoadWindow {
    pub start_hour: f64,
    pub end_hour: f64,
    pub power_w: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TickConfig {
    #[serde(default = "default_interval_hours")]
    pub interval_hours: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { interval_hours: default_interval_hours() }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherProvider {
    #[default]
    OpenWeatherMap,
    OpenMeteo,
}

impl WeatherProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            WeatherProvider::OpenWeatherMap => "https://api.openweathermap.org",
            WeatherProvider::OpenMeteo => "https://api.open-meteo.com",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default)]
    pub provider: WeatherProvider,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_fallback_cloud_cover")]
    pub fallback_cloud_cover_percent: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            provider: WeatherProvider::default(),
            base_url: None,
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
            fallback_cloud_cover_percent: default_fallback_cloud_cover(),
        }
    }
}

impl WeatherConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    JsonLines(JsonLinesConfig),
    Firestore(FirestoreConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::JsonLines(JsonLinesConfig { path: default_snapshot_path() })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct JsonLinesConfig {
    #[serde(default = "default_snapshot_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FirestoreConfig {
    #[serde(default = "default_firestore_base_url")]
    pub base_url: String,
    pub project_id: String,
    #[serde(default = "default_firestore_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// OAuth2 bearer token. Left empty when talking to the emulator.
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Config {
    /// Loads `path` and applies `SOLAR_SIM__*` environment overrides on top.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Json::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        for (var, key) in VERBATIM_ENV_KEYS {
            if let Ok(raw) = std::env::var(format!("{ENV_PREFIX}{var}")) {
                figment = figment.merge(Serialized::default(key, raw));
            }
        }
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.site
            .timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Timezone(self.site.timezone.clone(), e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        if self.site.city.trim().is_empty() {
            return invalid("site.city must not be empty".into());
        }
        self.timezone()?;

        let solar = &self.solar;
        if !(solar.peak_power_w > 0.0) {
            return invalid(format!("solar.peak_power_w must be positive, got {}", solar.peak_power_w));
        }
        if !(0.0..=24.0).contains(&solar.daytime_start_hour)
            || !(0.0..=24.0).contains(&solar.daytime_end_hour)
            || solar.daytime_start_hour >= solar.daytime_end_hour
        {
            return invalid(format!(
                "daytime window {}..{} must satisfy 0 <= start < end <= 24",
                solar.daytime_start_hour, solar.daytime_end_hour
            ));
        }
        if solar.night_floor_w < 0.0 || solar.night_floor_w > solar.peak_power_w {
            return invalid(format!("solar.night_floor_w must lie in [0, peak], got {}", solar.night_floor_w));
        }

        let battery = &self.battery;
        if !(battery.capacity_wh > 0.0) {
            return invalid(format!("battery.capacity_wh must be positive, got {}", battery.capacity_wh));
        }
        if !(0.0..=1.0).contains(&battery.floor_fraction) {
            return invalid(format!("battery.floor_fraction must lie in [0, 1], got {}", battery.floor_fraction));
        }
        if !(0.0..=100.0).contains(&battery.initial_charge_percent) {
            return invalid(format!(
                "battery.initial_charge_percent must lie in [0, 100], got {}",
                battery.initial_charge_percent
            ));
        }

        if !(self.tick.interval_hours > 0.0) {
            return invalid(format!("tick.interval_hours must be positive, got {}", self.tick.interval_hours));
        }

        if self.load.base_power_w < 0.0 {
            return invalid(format!("load.base_power_w must not be negative, got {}", self.load.base_power_w));
        }
        for window in &self.load.profile {
            if !(0.0..=24.0).contains(&window.start_hour) || !(0.0..=24.0).contains(&window.end_hour) {
                return invalid(format!(
                    "load window {}..{} has hours outside 0..=24",
                    window.start_hour, window.end_hour
                ));
            }
            if window.power_w < 0.0 {
                return invalid(format!("load window power must not be negative, got {}", window.power_w));
            }
        }

        if !(0.0..=100.0).contains(&self.weather.fallback_cloud_cover_percent) {
            return invalid(format!(
                "weather.fallback_cloud_cover_percent must lie in [0, 100], got {}",
                self.weather.fallback_cloud_cover_percent
            ));
        }

        Ok(())
    }
}
