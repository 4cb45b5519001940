//! ============================================================
//!  Solar Power Estimation
//!
//!  Output inside the site's daytime window follows a half-sine:
//!
//! ```text
//!     P(h) = P_peak × sin(π × (h − start) / (end − start)) × sun_factor
//! ```
//!
//!  which is zero at both window edges and peaks at the midpoint.
//!  Outside the window the output is the configured night floor
//!  (zero unless the site models residual ambient light).
//! ============================================================

use chrono::Timelike;
use std::f64::consts::PI;

use crate::config::SolarConfig;

#[derive(Debug, Clone)]
pub struct SolarPowerEstimator {
    peak_power_w: f64,
    start_hour: f64,
    end_hour: f64,
    night_floor_w: f64,
}

impl SolarPowerEstimator {
    pub fn new(peak_power_w: f64, start_hour: f64, end_hour: f64) -> Self {
        Self { peak_power_w, start_hour, end_hour, night_floor_w: 0.0 }
    }

    pub fn from_config(cfg: &SolarConfig) -> Self {
        Self {
            peak_power_w: cfg.peak_power_w,
            start_hour: cfg.daytime_start_hour,
            end_hour: cfg.daytime_end_hour,
            night_floor_w: cfg.night_floor_w,
        }
    }

    pub fn with_night_floor(mut self, night_floor_w: f64) -> Self {
        self.night_floor_w = night_floor_w;
        self
    }

    pub fn peak_power_w(&self) -> f64 {
        self.peak_power_w
    }

    /// True for `start <= hour < end`.
    pub fn is_daytime(&self, hour_of_day: f64) -> bool {
        hour_of_day >= self.start_hour && hour_of_day < self.end_hour
    }

    /// Instantaneous output in W.
    ///
    /// * `hour_of_day` – local decimal hour (10.25 = 10:15)
    /// * `sun_factor`  – fraction of potential not blocked by clouds, [0, 1]
    /// * `is_daytime`  – whether `hour_of_day` falls inside the window
    pub fn estimate(&self, hour_of_day: f64, sun_factor: f64, is_daytime: bool) -> f64 {
        if !is_daytime {
            return self.night_floor_w;
        }
        if hour_of_day <= self.start_hour || hour_of_day >= self.end_hour {
            return self.night_floor_w.min(self.peak_power_w);
        }

        let phase = (hour_of_day - self.start_hour) / (self.end_hour - self.start_hour);
        let profile = (PI * phase).sin().max(0.0);
        let power_w = self.peak_power_w * profile * sun_factor.clamp(0.0, 1.0);

        power_w.max(self.night_floor_w).clamp(0.0, self.peak_power_w)
    }
}

/// Local decimal hour of `t`.
pub fn decimal_hour<T: Timelike>(t: &T) -> f64 {
    t.hour() as f64 + t.minute() as f64 / 60.0 + t.second() as f64 / 3600.0
}
