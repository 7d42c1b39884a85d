//! Current weather from OpenWeatherMap.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use url::Url;

use super::{check_status, ExternalSource, HttpFetch};
use crate::core::panel::{Payload, WeatherReport};
use crate::error::{ControlError, Result};

const ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";
const PROVIDER: &str = "openweathermap";

pub struct WeatherSource {
    fetcher: Arc<dyn HttpFetch>,
    city: String,
    url: String,
    timeout: Duration,
}

impl WeatherSource {
    pub fn new(
        fetcher: Arc<dyn HttpFetch>,
        city: &str,
        api_key: &str,
        units: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let url = Url::parse_with_params(
            ENDPOINT,
            &[("q", city), ("appid", api_key), ("units", units)],
        )
        .map_err(|e| ControlError::registry(format!("weather: invalid parameters: {}", e)))?;
        Ok(Self {
            fetcher,
            city: city.to_string(),
            url: url.into(),
            timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    name: Option<String>,
    main: OwmMain,
    weather: Vec<OwmCondition>,
    wind: Option<OwmWind>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: Option<f64>,
    humidity: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: Option<f64>,
}

fn decode_weather(city: &str, body: &str) -> Result<WeatherReport> {
    let response: OwmResponse = serde_json::from_str(body)
        .map_err(|e| ControlError::decode(format!("weather payload: {}", e)))?;
    let condition = response
        .weather
        .first()
        .ok_or_else(|| ControlError::decode("weather payload has no conditions"))?;
    Ok(WeatherReport {
        city: response.name.unwrap_or_else(|| city.to_string()),
        temp_c: response.main.temp,
        feels_like_c: response.main.feels_like,
        description: condition.description.clone(),
        humidity_pct: response.main.humidity,
        wind_speed_mps: response.wind.and_then(|w| w.speed),
    })
}

impl ExternalSource for WeatherSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Payload>> {
        Box::pin(async move {
            let response = self.fetcher.fetch(&self.url, self.timeout).await?;
            check_status(&response, PROVIDER)?;
            let report = decode_weather(&self.city, &response.body)?;
            Ok(Payload::Weather(report))
        })
    }
}
