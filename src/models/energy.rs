use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Weather ─────────────────────────────────────────────────────────────────

/// Cloud cover observed (or assumed) for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherSample {
    cloud_cover_percent: f64,
}

impl WeatherSample {
    /// Values outside 0..=100 are clamped.
    pub fn from_cloud_cover(cloud_cover_percent: f64) -> Self {
        Self { cloud_cover_percent: cloud_cover_percent.clamp(0.0, 100.0) }
    }

    pub fn cloud_cover_percent(&self) -> f64 {
        self.cloud_cover_percent
    }

    /// Fraction of rated solar potential not blocked by clouds, in [0, 1].
    pub fn sun_factor(&self) -> f64 {
        (100.0 - self.cloud_cover_percent) / 100.0
    }
}

/// Where the tick's cloud cover came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherSource {
    #[default]
    Observed,
    Fallback,
}

// ─── Battery ─────────────────────────────────────────────────────────────────

/// Stored energy as a percentage of capacity.
pub fn charge_percent(stored_energy_wh: f64, capacity_wh: f64) -> f64 {
    if capacity_wh > 0.0 { stored_energy_wh / capacity_wh * 100.0 } else { 0.0 }
}

/// Battery state derived from the snapshot history. Never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryState {
    pub stored_energy_wh: f64,
    pub capacity_wh: f64,
}

impl BatteryState {
    pub fn from_charge_percent(capacity_wh: f64, charge_percent: f64) -> Self {
        Self { stored_energy_wh: capacity_wh * charge_percent / 100.0, capacity_wh }
    }

    pub fn from_snapshot(snapshot: &EnergySnapshot) -> Self {
        Self {
            stored_energy_wh: snapshot.battery_energy_wh,
            capacity_wh: snapshot.battery_capacity_wh,
        }
    }

    pub fn charge_percent(&self) -> f64 {
        charge_percent(self.stored_energy_wh, self.capacity_wh)
    }
}

// ─── Persisted snapshot ──────────────────────────────────────────────────────

/// One tick's worth of site state. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergySnapshot {
    pub city: String,
    /// Instantaneous solar output (W)
    pub solar_power_w: f64,
    /// Site consumption used for this tick (W)
    #[serde(default)]
    pub load_power_w: f64,
    /// Solar minus load (W); positive charges the battery
    pub net_power_w: f64,
    /// Energy produced during this tick (Wh)
    pub energy_period_wh: f64,
    /// Energy produced since local midnight, this tick included (Wh)
    pub total_energy_today_wh: f64,
    pub battery_energy_wh: f64,
    pub battery_charge_percent: f64,
    pub battery_capacity_wh: f64,
    pub cloud_cover_percent: f64,
    pub is_daytime: bool,
    /// Local hour, 0-23
    pub hour_of_day: u32,
    #[serde(default)]
    pub weather_source: WeatherSource,
    pub timestamp: DateTime<Utc>,
}

// ─── OpenWeatherMap wire types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OwmCurrentResponse {
    pub clouds: Option<OwmClouds>,
    #[serde(default)]
    pub weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
pub struct OwmClouds {
    pub all: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OwmCondition {
    pub id: u16,
}

// ─── Open-Meteo wire types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CurrentWeatherResponse {
    pub current: CurrentData,
}

#[derive(Debug, Deserialize)]
pub struct CurrentData {
    pub cloud_cover: Option<f64>,
    pub weather_code: Option<u16>,
}
