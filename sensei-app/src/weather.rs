//! Current-weather enrichment, via Open-Meteo.
//!
//! Strictly optional context for the prompt: any failure degrades to `None`,
//! never an error.

use serde::Deserialize;

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub windspeed: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current_weather: Option<CurrentWeather>,
}

#[tracing::instrument(level = "debug")]
pub async fn fetch_current(latitude: f64, longitude: f64) -> Option<CurrentWeather> {
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .ok()?;
    let response = http
        .get(FORECAST_URL)
        .query(&[
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("timezone", "auto".to_string()),
        ])
        .send()
        .await;

    let response = match response {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::debug!(status = %r.status(), "météo indisponible");
            return None;
        }
        Err(e) => {
            tracing::debug!(error = %e, "météo indisponible");
            return None;
        }
    };

    match response.json::<ForecastResponse>().await {
        Ok(parsed) => parsed.current_weather,
        Err(e) => {
            tracing::debug!(error = %e, "réponse météo inattendue");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_payload_shape_decodes() {
        let body = r#"{"current_weather": {"temperature": -3.4, "windspeed": 12.0, "winddirection": 270}}"#;
        let parsed: ForecastResponse = serde_json::from_str(body).expect("decode");
        let weather = parsed.current_weather.expect("present");
        assert_eq!(weather.temperature, -3.4);
        assert_eq!(weather.windspeed, 12.0);
    }

    #[test]
    fn absent_current_weather_is_none() {
        let parsed: ForecastResponse = serde_json::from_str("{}").expect("decode");
        assert!(parsed.current_weather.is_none());
    }
}
