use crate::config::BatteryConfig;
use crate::models::energy::charge_percent;

/// Result of integrating one tick of net power into the battery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryIntegration {
    /// Solar minus load (W)
    pub net_power_w: f64,
    /// Unclamped energy change over the interval (Wh)
    pub delta_wh: f64,
    /// Stored energy after clamping (Wh)
    pub energy_wh: f64,
    pub charge_percent: f64,
}

/// Energy-bucket battery: no efficiency losses, no rate limits, clamped to
/// `[floor_fraction × capacity, capacity]`.
#[derive(Debug, Clone, Copy)]
pub struct BatteryModel {
    capacity_wh: f64,
    floor_fraction: f64,
}

impl BatteryModel {
    pub fn new(capacity_wh: f64, floor_fraction: f64) -> Self {
        Self { capacity_wh, floor_fraction: floor_fraction.clamp(0.0, 1.0) }
    }

    pub fn from_config(cfg: &BatteryConfig) -> Self {
        Self::new(cfg.capacity_wh, cfg.floor_fraction)
    }

    pub fn capacity_wh(&self) -> f64 {
        self.capacity_wh
    }

    pub fn floor_wh(&self) -> f64 {
        self.floor_fraction * self.capacity_wh
    }

    pub fn integrate(
        &self,
        previous_energy_wh: f64,
        solar_power_w: f64,
        load_power_w: f64,
        interval_hours: f64,
    ) -> BatteryIntegration {
        integrate(
            previous_energy_wh,
            solar_power_w,
            load_power_w,
            interval_hours,
            self.capacity_wh,
            self.floor_fraction,
        )
    }
}

/// Integrates `solar - load` over `interval_hours` on top of
/// `previous_energy_wh` and clamps the result into the allowed band.
pub fn integrate(
    previous_energy_wh: f64,
    solar_power_w: f64,
    load_power_w: f64,
    interval_hours: f64,
    capacity_wh: f64,
    floor_fraction: f64,
) -> BatteryIntegration {
    let capacity_wh = capacity_wh.max(0.0);
    let floor_wh = floor_fraction.clamp(0.0, 1.0) * capacity_wh;

    let net_power_w = solar_power_w - load_power_w;
    let delta_wh = net_power_w * interval_hours;
    let energy_wh = (previous_energy_wh + delta_wh).clamp(floor_wh, capacity_wh);

    BatteryIntegration {
        net_power_w,
        delta_wh,
        energy_wh,
        charge_percent: charge_percent(energy_wh, capacity_wh),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_hour_surplus() {
        let r = integrate(12_600.0, 780.0, 300.0, 0.25, 16_800.0, 0.0);
        assert_eq!(r.net_power_w, 480.0);
        assert_eq!(r.delta_wh, 120.0);
        assert_eq!(r.energy_wh, 12_720.0);
        assert!((r.charge_percent - 75.714_285).abs() < 1e-4, "got {:.4}%", r.charge_percent);
    }

    #[test]
    fn test_clamps_at_capacity() {
        let r = integrate(16_700.0, 5_000.0, 0.0, 1.0, 16_800.0, 0.0);
        assert_eq!(r.energy_wh, 16_800.0);
        assert_eq!(r.charge_percent, 100.0);
    }

    #[test]
    fn test_clamps_at_zero_floor() {
        let r = integrate(50.0, 0.0, 300.0, 0.25, 16_800.0, 0.0);
        assert_eq!(r.delta_wh, -75.0);
        assert_eq!(r.energy_wh, 0.0);
        assert_eq!(r.charge_percent, 0.0);
    }

    #[test]
    fn test_reserve_floor_holds() {
        let model = BatteryModel::new(16_800.0, 0.2);
        assert!((model.floor_wh() - 3_360.0).abs() < 1e-9);
        let r = model.integrate(3_400.0, 0.0, 2_000.0, 0.25);
        assert_eq!(r.energy_wh, model.floor_wh());
        assert!((r.charge_percent - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_balanced_tick_leaves_energy_untouched() {
        let r = integrate(9_001.5, 300.0, 300.0, 0.25, 16_800.0, 0.2);
        assert_eq!(r.net_power_w, 0.0);
        assert_eq!(r.energy_wh, 9_001.5);
    }

    #[test]
    fn test_previous_below_floor_is_lifted() {
        // History written before a reserve floor was configured.
        let r = integrate(1_000.0, 0.0, 0.0, 0.25, 16_800.0, 0.2);
        assert!((r.energy_wh - 3_360.0).abs() < 1e-9);
    }
}
