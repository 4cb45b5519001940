use chrono::{DateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::store::{SnapshotStore, StoreError};

/// Daily production total, plus the read failure if the history could not be
/// consulted and only the current period was counted.
#[derive(Debug)]
pub struct DailyTotal {
    pub total_wh: f64,
    pub degraded: Option<StoreError>,
}

/// First instant of `now`'s calendar day in `tz`, as UTC.
///
/// Zones that skip midnight for DST start the day at the first local time
/// that exists.
pub fn start_of_local_day(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local_midnight = now.with_timezone(&tz).date_naive().and_time(NaiveTime::MIN);

    (0..=24 * 60)
        .find_map(|minutes| {
            tz.from_local_datetime(&(local_midnight + TimeDelta::minutes(minutes)))
                .earliest()
        })
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now)
}

pub struct DailyEnergyAccumulator<'a> {
    store: &'a dyn SnapshotStore,
    timezone: Tz,
}

impl<'a> DailyEnergyAccumulator<'a> {
    pub fn new(store: &'a dyn SnapshotStore, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    /// Energy produced since local midnight, `current_period_wh` included.
    pub async fn total_since_local_midnight(&self, now: DateTime<Utc>, current_period_wh: f64) -> DailyTotal {
        let day_start = start_of_local_day(now, self.timezone);

        match self.store.since(day_start).await {
            Ok(history) => DailyTotal {
                total_wh: history.iter().map(|s| s.energy_period_wh).sum::<f64>() + current_period_wh,
                degraded: None,
            },
            Err(e) => DailyTotal { total_wh: current_period_wh, degraded: Some(e) },
        }
    }
}
