use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{SiteConfig, WeatherConfig, WeatherProvider};
use crate::models::energy::{
    CurrentWeatherResponse, OwmCurrentResponse, WeatherSample, WeatherSource,
};

/// Cloud cover assumed for condition codes the lookup tables do not know.
pub const UNKNOWN_CONDITION_CLOUD_COVER: f64 = 50.0;

/// Why the observer fell back to its configured sample.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("no API key configured for the weather provider")]
    MissingCredentials,
    #[error("site latitude/longitude are required by this provider")]
    MissingLocation,
    #[error("weather request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("weather provider answered {0}")]
    Status(StatusCode),
    #[error("unrecognized weather response: {0}")]
    Malformed(String),
}

/// Outcome of one observation. Both arms carry a usable sample.
#[derive(Debug)]
pub enum WeatherObservation {
    Observed(WeatherSample),
    Fallback { sample: WeatherSample, reason: WeatherError },
}

impl WeatherObservation {
    pub fn sample(&self) -> WeatherSample {
        match self {
            WeatherObservation::Observed(sample) => *sample,
            WeatherObservation::Fallback { sample, .. } => *sample,
        }
    }

    pub fn source(&self) -> WeatherSource {
        match self {
            WeatherObservation::Observed(_) => WeatherSource::Observed,
            WeatherObservation::Fallback { .. } => WeatherSource::Fallback,
        }
    }
}

pub struct WeatherObserver {
    client: Client,
    provider: WeatherProvider,
    base_url: String,
    api_key: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    fallback: WeatherSample,
}

impl WeatherObserver {
    pub fn new(cfg: &WeatherConfig, site: &SiteConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            provider: cfg.provider,
            base_url: cfg.base_url().to_string(),
            api_key: cfg.api_key.clone().filter(|k| !k.trim().is_empty()),
            latitude: site.latitude,
            longitude: site.longitude,
            fallback: WeatherSample::from_cloud_cover(cfg.fallback_cloud_cover_percent),
        })
    }

    /// Current cloud cover for `city`. Never fails: any problem with the
    /// provider yields the fallback sample together with its cause.
    pub async fn observe(&self, city: &str) -> WeatherObservation {
        match self.fetch_cloud_cover(city).await {
            Ok(cloud_cover) => WeatherObservation::Observed(WeatherSample::from_cloud_cover(cloud_cover)),
            Err(reason) => WeatherObservation::Fallback { sample: self.fallback, reason },
        }
    }

    async fn fetch_cloud_cover(&self, city: &str) -> Result<f64, WeatherError> {
        match self.provider {
            WeatherProvider::OpenWeatherMap => {
                let api_key = self.api_key.as_deref().ok_or(WeatherError::MissingCredentials)?;
                let url = format!("{}/data/2.5/weather", self.base_url);
                let resp: OwmCurrentResponse =
                    self.get_json(&url, &[("q", city), ("appid", api_key)]).await?;
                cloud_cover_from_owm(&resp)
            }
            WeatherProvider::OpenMeteo => {
                let (lat, lon) = self
                    .latitude
                    .zip(self.longitude)
                    .ok_or(WeatherError::MissingLocation)?;
                let url = format!("{}/v1/forecast", self.base_url);
                let (lat, lon) = (lat.to_string(), lon.to_string());
                let resp: CurrentWeatherResponse = self
                    .get_json(
                        &url,
                        &[("latitude", lat.as_str()), ("longitude", lon.as_str()), ("current", "cloud_cover,weather_code")],
                    )
                    .await?;
                cloud_cover_from_open_meteo(&resp)
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, WeatherError> {
        let resp = self.client.get(url).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status));
        }

        let body = resp.text().await?;
        debug!(provider = ?self.provider, bytes = body.len(), "weather response received");
        serde_json::from_str(&body).map_err(|e| WeatherError::Malformed(e.to_string()))
    }
}

fn checked_percent(value: f64) -> Result<f64, WeatherError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(WeatherError::Malformed(format!("cloud cover {} is not a number", value)))
    }
}

fn cloud_cover_from_owm(resp: &OwmCurrentResponse) -> Result<f64, WeatherError> {
    if let Some(all) = resp.clouds.as_ref().and_then(|c| c.all) {
        return checked_percent(all);
    }
    resp.weather
        .first()
        .map(|condition| owm_condition_cloud_cover(condition.id))
        .ok_or_else(|| WeatherError::Malformed("neither clouds.all nor weather[0].id present".into()))
}

fn cloud_cover_from_open_meteo(resp: &CurrentWeatherResponse) -> Result<f64, WeatherError> {
    if let Some(cover) = resp.current.cloud_cover {
        return checked_percent(cover);
    }
    resp.current
        .weather_code
        .map(wmo_code_cloud_cover)
        .ok_or_else(|| WeatherError::Malformed("neither cloud_cover nor weather_code present".into()))
}

/// OpenWeatherMap condition id → estimated cloud cover (%).
pub fn owm_condition_cloud_cover(id: u16) -> f64 {
    match id {
        800 => 0.0,             // clear sky
        801 => 18.0,            // few clouds, 11-25 %
        802 => 40.0,            // scattered clouds, 25-50 %
        803 => 75.0,            // broken clouds, 51-84 %
        804 => 95.0,            // overcast, 85-100 %
        200..=232 => 95.0,      // thunderstorm
        300..=321 => 85.0,      // drizzle
        500..=531 => 90.0,      // rain
        600..=622 => 90.0,      // snow
        701..=781 => 60.0,      // mist, haze, fog, dust
        _ => UNKNOWN_CONDITION_CLOUD_COVER,
    }
}

/// WMO weather interpretation code (as used by Open-Meteo) → estimated
/// cloud cover (%).
pub fn wmo_code_cloud_cover(code: u16) -> f64 {
    match code {
        0 => 0.0,               // clear sky
        1 => 15.0,              // mainly clear
        2 => 50.0,              // partly cloudy
        3 => 100.0,             // overcast
        45 | 48 => 90.0,        // fog
        51..=57 => 85.0,        // drizzle
        61..=67 => 90.0,        // rain
        71..=77 => 95.0,        // snow
        80..=82 => 80.0,        // rain showers
        85 | 86 => 85.0,        // snow showers
        95..=99 => 100.0,       // thunderstorm
        _ => UNKNOWN_CONDITION_CLOUD_COVER,
    }
}
