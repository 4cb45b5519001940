use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigError};
use crate::models::energy::{BatteryState, EnergySnapshot, WeatherSource};
use crate::services::battery_model::BatteryModel;
use crate::services::daily_energy::DailyEnergyAccumulator;
use crate::services::load_profile::LoadProfile;
use crate::services::solar_algorithm::{SolarPowerEstimator, decimal_hour};
use crate::services::weather_service::{WeatherError, WeatherObservation, WeatherObserver};
use crate::store::{SnapshotStore, StoreError};

/// A problem absorbed during the tick. Each one has a fallback value already
/// applied by the time it is reported.
#[derive(Debug, thiserror::Error)]
pub enum SoftFailure {
    #[error("weather degraded, using fallback cloud cover: {0}")]
    WeatherDegraded(#[source] WeatherError),
    #[error("prior state unavailable, using initial charge: {0}")]
    PriorStateUnavailable(#[source] StoreError),
    #[error("daily aggregation degraded, counting current period only: {0}")]
    AggregationDegraded(#[source] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("snapshot could not be persisted: {0}")]
    CycleFailed(#[from] StoreError),
}

#[derive(Debug)]
pub struct TickReport {
    pub snapshot: EnergySnapshot,
    pub soft_failures: Vec<SoftFailure>,
    pub persisted: bool,
}

impl TickReport {
    /// True when the tick ran on fallback weather.
    pub fn is_degraded(&self) -> bool {
        self.snapshot.weather_source == WeatherSource::Fallback
    }
}

/// Everything one tick needs, built once from configuration and handed the
/// weather and store collaborators.
pub struct SimulationCycle {
    city: String,
    timezone: Tz,
    interval_hours: f64,
    initial_charge_percent: f64,
    solar: SolarPowerEstimator,
    battery: BatteryModel,
    load: LoadProfile,
    weather: WeatherObserver,
    store: Box<dyn SnapshotStore>,
}

impl SimulationCycle {
    pub fn new(
        config: &Config,
        weather: WeatherObserver,
        store: Box<dyn SnapshotStore>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            city: config.site.city.clone(),
            timezone: config.timezone()?,
            interval_hours: config.tick.interval_hours,
            initial_charge_percent: config.battery.initial_charge_percent,
            solar: SolarPowerEstimator::from_config(&config.solar),
            battery: BatteryModel::from_config(&config.battery),
            load: LoadProfile::from_config(&config.load),
            weather,
            store,
        })
    }

    /// Runs one tick and appends its snapshot. Fails only when the append does.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, CycleError> {
        let mut report = self.simulate(now).await;

        if let Err(e) = self.store.append(&report.snapshot).await {
            error!(city = %self.city, error = %e, "failed to persist snapshot");
            return Err(CycleError::CycleFailed(e));
        }
        report.persisted = true;

        info!(
            city = %self.city,
            solar_w = report.snapshot.solar_power_w,
            net_w = report.snapshot.net_power_w,
            battery_percent = report.snapshot.battery_charge_percent,
            today_wh = report.snapshot.total_energy_today_wh,
            degraded = report.is_degraded(),
            "snapshot persisted"
        );
        Ok(report)
    }

    /// Computes the snapshot `tick` would write, without writing it.
    #[tracing::instrument(name = "simulate", skip(self), fields(city = %self.city))]
    pub async fn simulate(&self, now: DateTime<Utc>) -> TickReport {
        let mut soft_failures = Vec::new();

        let observation = self.weather.observe(&self.city).await;
        let weather = observation.sample();
        let weather_source = observation.source();
        if let WeatherObservation::Fallback { reason, .. } = observation {
            warn!(error = %reason, cloud_cover = weather.cloud_cover_percent(), "weather degraded");
            soft_failures.push(SoftFailure::WeatherDegraded(reason));
        }

        let local_now = now.with_timezone(&self.timezone);
        let hour = decimal_hour(&local_now);
        let is_daytime = self.solar.is_daytime(hour);
        let solar_power_w = self.solar.estimate(hour, weather.sun_factor(), is_daytime);

        let initial = BatteryState::from_charge_percent(self.battery.capacity_wh(), self.initial_charge_percent);
        let previous = match self.store.latest().await {
            Ok(Some(snapshot)) => BatteryState::from_snapshot(&snapshot),
            Ok(None) => {
                info!(charge_percent = self.initial_charge_percent, "no prior snapshot, starting from initial charge");
                initial
            }
            Err(e) => {
                warn!(error = %e, "prior snapshot unreadable, starting from initial charge");
                soft_failures.push(SoftFailure::PriorStateUnavailable(e));
                initial
            }
        };

        let load_power_w = self.load.power_at(hour);
        let battery = self
            .battery
            .integrate(previous.stored_energy_wh, solar_power_w, load_power_w, self.interval_hours);

        let energy_period_wh = solar_power_w * self.interval_hours;
        let daily = DailyEnergyAccumulator::new(self.store.as_ref(), self.timezone)
            .total_since_local_midnight(now, energy_period_wh)
            .await;
        if let Some(e) = daily.degraded {
            warn!(error = %e, "daily history unreadable, counting current period only");
            soft_failures.push(SoftFailure::AggregationDegraded(e));
        }

        let snapshot = EnergySnapshot {
            city: self.city.clone(),
            solar_power_w,
            load_power_w,
            net_power_w: battery.net_power_w,
            energy_period_wh,
            total_energy_today_wh: daily.total_wh,
            battery_energy_wh: battery.energy_wh,
            battery_charge_percent: battery.charge_percent,
            battery_capacity_wh: self.battery.capacity_wh(),
            cloud_cover_percent: weather.cloud_cover_percent(),
            is_daytime,
            hour_of_day: local_now.hour(),
            weather_source,
            timestamp: now,
        };

        TickReport { snapshot, soft_failures, persisted: false }
    }
}
