#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use figment::{Figment, providers::Serialized};
use serde_json::{Value, json};

use solar_tick_sim::config::Config;
use solar_tick_sim::services::simulation_cycle::SimulationCycle;
use solar_tick_sim::services::weather_service::WeatherObserver;
use solar_tick_sim::{EnergySnapshot, SnapshotStore, StoreError};

/// In-memory history with switchable read/write failures.
#[derive(Default)]
pub struct MemoryStore {
    snapshots: Mutex<Vec<EnergySnapshot>>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn with(snapshots: Vec<EnergySnapshot>) -> Self {
        Self { snapshots: Mutex::new(snapshots), ..Default::default() }
    }

    pub fn failing_reads() -> Self {
        Self { fail_reads: true, ..Default::default() }
    }

    pub fn failing_writes() -> Self {
        Self { fail_writes: true, ..Default::default() }
    }

    pub fn snapshots(&self) -> Vec<EnergySnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    fn unavailable() -> StoreError {
        StoreError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "store offline"))
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn latest(&self) -> Result<Option<EnergySnapshot>, StoreError> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        let snapshots = self.snapshots.lock().unwrap();
        Ok(snapshots.iter().max_by_key(|s| s.timestamp).cloned())
    }

    async fn since(&self, from: DateTime<Utc>) -> Result<Vec<EnergySnapshot>, StoreError> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        let mut found: Vec<_> = self
            .snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.timestamp >= from)
            .cloned()
            .collect();
        found.sort_by_key(|s| s.timestamp);
        Ok(found)
    }

    async fn append(&self, snapshot: &EnergySnapshot) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(Self::unavailable());
        }
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

/// Shared history so a test can inspect what the cycle wrote.
pub struct SharedStore(pub std::sync::Arc<MemoryStore>);

#[async_trait]
impl SnapshotStore for SharedStore {
    async fn latest(&self) -> Result<Option<EnergySnapshot>, StoreError> {
        self.0.latest().await
    }

    async fn since(&self, from: DateTime<Utc>) -> Result<Vec<EnergySnapshot>, StoreError> {
        self.0.since(from).await
    }

    async fn append(&self, snapshot: &EnergySnapshot) -> Result<(), StoreError> {
        self.0.append(snapshot).await
    }
}

fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Site config with an unreachable-by-design weather setup (no API key), so
/// weather falls back unless `overrides` says otherwise.
pub fn config(overrides: Value) -> Config {
    let mut base = json!({
        "site": { "city": "Plovdiv", "timezone": "UTC" },
        "solar": { "peak_power_w": 1000.0, "daytime_start_hour": 6.0, "daytime_end_hour": 19.0 },
        "battery": { "capacity_wh": 16800.0, "initial_charge_percent": 75.0, "floor_fraction": 0.0 },
        "load": { "base_power_w": 300.0 },
        "tick": { "interval_hours": 0.25 },
        "weather": { "provider": "open_weather_map", "fallback_cloud_cover_percent": 30.0 }
    });
    merge(&mut base, overrides);
    Config::from_figment(Figment::from(Serialized::defaults(base))).expect("valid test config")
}

pub fn cycle(config: &Config, store: impl SnapshotStore + 'static) -> SimulationCycle {
    let weather = WeatherObserver::new(&config.weather, &config.site).expect("weather client");
    SimulationCycle::new(config, weather, Box::new(store)).expect("cycle")
}

pub fn snapshot_at(timestamp: DateTime<Utc>, battery_energy_wh: f64, energy_period_wh: f64) -> EnergySnapshot {
    EnergySnapshot {
        city: "Plovdiv".into(),
        solar_power_w: energy_period_wh * 4.0,
        load_power_w: 300.0,
        net_power_w: energy_period_wh * 4.0 - 300.0,
        energy_period_wh,
        total_energy_today_wh: energy_period_wh,
        battery_energy_wh,
        battery_charge_percent: battery_energy_wh / 16_800.0 * 100.0,
        battery_capacity_wh: 16_800.0,
        cloud_cover_percent: 30.0,
        is_daytime: true,
        hour_of_day: 12,
        weather_source: Default::default(),
        timestamp,
    }
}
