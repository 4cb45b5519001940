use crate::config::{LoadConfig, LoadWindow};

/// Site consumption by local time of day.
#[derive(Debug, Clone)]
pub struct LoadProfile {
    base_power_w: f64,
    windows: Vec<LoadWindow>,
}

impl LoadProfile {
    pub fn constant(power_w: f64) -> Self {
        Self { base_power_w: power_w, windows: Vec::new() }
    }

    pub fn from_config(cfg: &LoadConfig) -> Self {
        Self { base_power_w: cfg.base_power_w, windows: cfg.profile.clone() }
    }

    /// Power drawn at local decimal hour `hour`. The first matching window
    /// wins; otherwise the base load applies.
    pub fn power_at(&self, hour: f64) -> f64 {
        self.windows
            .iter()
            .find(|w| window_contains(w, hour))
            .map(|w| w.power_w)
            .unwrap_or(self.base_power_w)
    }
}

fn window_contains(window: &LoadWindow, hour: f64) -> bool {
    if window.start_hour <= window.end_hour {
        hour >= window.start_hour && hour < window.end_hour
    } else {
        hour >= window.start_hour || hour < window.end_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> LoadProfile {
        LoadProfile::from_config(&LoadConfig {
            base_power_w: 300.0,
            profile: vec![
                LoadWindow { start_hour: 18.0, end_hour: 22.0, power_w: 650.0 },
                LoadWindow { start_hour: 23.0, end_hour: 5.0, power_w: 180.0 },
            ],
        })
    }

    #[test]
    fn test_base_load_outside_windows() {
        assert_eq!(profile().power_at(12.0), 300.0);
        assert_eq!(profile().power_at(22.5), 300.0);
    }

    #[test]
    fn test_evening_window() {
        assert_eq!(profile().power_at(18.0), 650.0);
        assert_eq!(profile().power_at(21.75), 650.0);
        assert_eq!(profile().power_at(22.0), 300.0);
    }

    #[test]
    fn test_window_wrapping_midnight() {
        assert_eq!(profile().power_at(23.5), 180.0);
        assert_eq!(profile().power_at(0.0), 180.0);
        assert_eq!(profile().power_at(4.99), 180.0);
        assert_eq!(profile().power_at(5.0), 300.0);
    }

    #[test]
    fn test_constant_profile() {
        assert_eq!(LoadProfile::constant(250.0).power_at(3.0), 250.0);
    }
}
