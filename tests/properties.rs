use proptest::prelude::*;

use solar_tick_sim::WeatherSample;
use solar_tick_sim::services::battery_model::integrate;
use solar_tick_sim::services::solar_algorithm::SolarPowerEstimator;

proptest! {
    #[test]
    fn sun_factor_stays_in_unit_interval(cloud in 0.0f64..=100.0) {
        let sample = WeatherSample::from_cloud_cover(cloud);
        let factor = sample.sun_factor();
        prop_assert!((0.0..=1.0).contains(&factor));
        prop_assert!((factor - (100.0 - cloud) / 100.0).abs() < 1e-12);
    }

    #[test]
    fn solar_output_bounded_by_peak(
        peak in 1.0f64..20_000.0,
        start in 0.0f64..12.0,
        span in 1.0f64..12.0,
        hour in 0.0f64..24.0,
        sun in 0.0f64..=1.0,
    ) {
        let est = SolarPowerEstimator::new(peak, start, start + span);
        let power = est.estimate(hour, sun, est.is_daytime(hour));
        prop_assert!(power >= 0.0 && power <= est.peak_power_w(), "power={} peak={}", power, peak);
        prop_assert_eq!(est.estimate(start, sun, est.is_daytime(start)), 0.0);
        prop_assert_eq!(est.estimate(start + span, sun, est.is_daytime(start + span)), 0.0);
    }

    #[test]
    fn battery_stays_inside_band(
        capacity in 1.0f64..100_000.0,
        floor in 0.0f64..=1.0,
        previous_fraction in 0.0f64..=1.0,
        solar in 0.0f64..1.0e7,
        load in 0.0f64..1.0e7,
        interval in 0.0f64..24.0,
    ) {
        let r = integrate(previous_fraction * capacity, solar, load, interval, capacity, floor);
        prop_assert!(r.energy_wh >= floor * capacity && r.energy_wh <= capacity, "energy={}", r.energy_wh);
        prop_assert!((r.charge_percent - r.energy_wh / capacity * 100.0).abs() < 1e-9);
    }

    #[test]
    fn balanced_power_is_idempotent(
        capacity in 1.0f64..100_000.0,
        floor in 0.0f64..=1.0,
        position in 0.0f64..=1.0,
        power in 0.0f64..10_000.0,
        interval in 0.0f64..24.0,
    ) {
        let previous = floor * capacity + position * (capacity - floor * capacity);
        let previous = previous.clamp(floor * capacity, capacity);
        let r = integrate(previous, power, power, interval, capacity, floor);
        prop_assert_eq!(r.energy_wh, previous);
    }
}

#[test]
fn quarter_hour_reference_case() {
    let r = integrate(12_600.0, 780.0, 300.0, 0.25, 16_800.0, 0.0);
    assert_eq!(r.net_power_w, 480.0);
    assert_eq!(r.delta_wh, 120.0);
    assert_eq!(r.energy_wh, 12_720.0);
    assert!((r.charge_percent - 75.71).abs() < 0.01);
}
