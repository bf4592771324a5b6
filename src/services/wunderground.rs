//! Weather Underground client.
//!
//! Fetches the almanac (historical normals), current conditions and the
//! forecast for a city and folds them into a `WeatherSnapshot`.
//! See: https://www.wunderground.com/weather/api/d/docs

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::SourceError;
use crate::services::disposition::WeatherInputs;

pub const DEFAULT_BASE_URL: &str = "http://api.wunderground.com";

const ICON_URL_TEMPLATE: &str = "https://icons.wxug.com/i/c/{icon_set}/{icon_name}.gif";

/// One letter per icon set, selected by a 1-based index.
const ICON_SET_KEYS: &str = "abcdefghijk";

/// Icon set used when none (or an out-of-range one) is requested.
pub const DEFAULT_ICON_SET: i64 = 10;

/// Normalized weather for one location at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub sky_description: String,
    pub icon_code: String,
    pub current_temp_f: f64,
    pub average_high_temp_f: f64,
    /// Not used for classification.
    pub forecast: Vec<ForecastDay>,
}

impl WeatherSnapshot {
    pub fn classifier_inputs(&self) -> WeatherInputs {
        WeatherInputs {
            sky: Some(self.sky_description.clone()),
            icon: Some(self.icon_code.clone()),
            current_temp_f: Some(self.current_temp_f),
            average_high_temp_f: Some(self.average_high_temp_f),
        }
    }
}

/// A single day of the simple forecast.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ForecastDay {
    pub high_f: Option<f64>,
    pub low_f: Option<f64>,
    pub conditions: String,
    pub icon: String,
}

/// Anything that can produce a snapshot for a (city, region) pair.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_snapshot(&self, city: &str, region: &str)
        -> Result<WeatherSnapshot, SourceError>;
}

/// The three provider features we request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Almanac,
    Conditions,
    Forecast,
}

impl Feature {
    fn path(&self) -> &'static str {
        match self {
            Feature::Almanac => "almanac",
            Feature::Conditions => "conditions",
            Feature::Forecast => "forecast",
        }
    }
}

// --- Weather Underground JSON response types ---

/// Provider numbers arrive either as JSON numbers or numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AlmanacResponse {
    almanac: WuAlmanac,
}

#[derive(Debug, Deserialize)]
struct WuAlmanac {
    temp_high: WuTempRecord,
}

#[derive(Debug, Deserialize)]
struct WuTempRecord {
    normal: WuTempPair,
}

#[derive(Debug, Deserialize)]
struct WuTempPair {
    #[serde(rename = "F")]
    f: NumberOrString,
}

#[derive(Debug, Deserialize)]
struct ConditionsResponse {
    current_observation: WuObservation,
}

#[derive(Debug, Deserialize)]
struct WuObservation {
    weather: String,
    icon: String,
    temp_f: NumberOrString,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    forecast: WuForecast,
}

#[derive(Debug, Deserialize)]
struct WuForecast {
    simpleforecast: Option<WuSimpleForecast>,
}

#[derive(Debug, Deserialize)]
struct WuSimpleForecast {
    #[serde(default)]
    forecastday: Vec<WuForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WuForecastDay {
    high: Option<WuForecastTemp>,
    low: Option<WuForecastTemp>,
    #[serde(default)]
    conditions: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WuForecastTemp {
    fahrenheit: Option<NumberOrString>,
}

/// Client for the Weather Underground REST API.
#[derive(Debug, Clone)]
pub struct WundergroundClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl WundergroundClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build the request URL for a feature, normalizing city and region.
    pub fn request_url(&self, feature: Feature, city: &str, region: &str) -> String {
        format!(
            "{}/api/{}/{}/q/{}/{}.json",
            self.base_url,
            self.api_key,
            feature.path(),
            normalize_region(region),
            normalize_city(city)
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        feature: Feature,
        city: &str,
        region: &str,
    ) -> Result<T, SourceError> {
        let url = self.request_url(feature, city, region);
        tracing::debug!("Requesting {} for {}, {}", feature.path(), city, region);

        let response = self.client.get(&url).send().await.map_err(|e| {
            SourceError::ProviderUnavailable(format!("{} request failed: {}", feature.path(), e))
        })?;

        if !response.status().is_success() {
            return Err(SourceError::ProviderUnavailable(format!(
                "{} returned HTTP {}",
                feature.path(),
                response.status()
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            SourceError::ProviderUnavailable(format!("{} body read failed: {}", feature.path(), e))
        })?;

        serde_json::from_slice(&body).map_err(|e| {
            SourceError::ProviderResponseInvalid(format!("{} parse error: {}", feature.path(), e))
        })
    }
}

#[async_trait]
impl WeatherSource for WundergroundClient {
    async fn fetch_snapshot(
        &self,
        city: &str,
        region: &str,
    ) -> Result<WeatherSnapshot, SourceError> {
        let (almanac, conditions, forecast) = tokio::try_join!(
            self.get_json::<AlmanacResponse>(Feature::Almanac, city, region),
            self.get_json::<ConditionsResponse>(Feature::Conditions, city, region),
            self.get_json::<ForecastResponse>(Feature::Forecast, city, region),
        )?;

        build_snapshot(almanac, conditions, forecast)
    }
}

fn build_snapshot(
    almanac: AlmanacResponse,
    conditions: ConditionsResponse,
    forecast: ForecastResponse,
) -> Result<WeatherSnapshot, SourceError> {
    let obs = conditions.current_observation;

    let current_temp_f = obs.temp_f.as_f64().ok_or_else(|| {
        SourceError::ProviderResponseInvalid("current_observation.temp_f is not numeric".into())
    })?;
    let average_high_temp_f = almanac.almanac.temp_high.normal.f.as_f64().ok_or_else(|| {
        SourceError::ProviderResponseInvalid("almanac.temp_high.normal.F is not numeric".into())
    })?;

    let forecast = forecast
        .forecast
        .simpleforecast
        .map(|sf| {
            sf.forecastday
                .into_iter()
                .map(|day| ForecastDay {
                    high_f: day
                        .high
                        .and_then(|t| t.fahrenheit)
                        .and_then(|v| v.as_f64()),
                    low_f: day.low.and_then(|t| t.fahrenheit).and_then(|v| v.as_f64()),
                    conditions: day.conditions,
                    icon: day.icon,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(WeatherSnapshot {
        sky_description: obs.weather,
        icon_code: obs.icon,
        current_temp_f,
        average_high_temp_f,
        forecast,
    })
}

/// Provider city format: spaces become underscores, then title case.
pub fn normalize_city(city: &str) -> String {
    let mut out = String::with_capacity(city.len());
    let mut start_of_word = true;
    for ch in city.trim().replace(' ', "_").chars() {
        if ch.is_alphabetic() {
            if start_of_word {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            start_of_word = false;
        } else {
            out.push(ch);
            start_of_word = true;
        }
    }
    out
}

/// Provider region format: uppercase two-letter code.
pub fn normalize_region(region: &str) -> String {
    region.trim().to_uppercase()
}

/// Display URL for a provider icon. Out-of-range sets fall back to the default.
pub fn resolve_icon_url(icon_name: &str, icon_set: Option<i64>) -> String {
    let keys: Vec<char> = ICON_SET_KEYS.chars().collect();
    let requested = icon_set.unwrap_or(DEFAULT_ICON_SET);

    let index = if requested > 0 && requested as usize <= keys.len() {
        requested as usize - 1
    } else {
        DEFAULT_ICON_SET as usize - 1
    };

    ICON_URL_TEMPLATE
        .replace("{icon_set}", &keys[index].to_string())
        .replace("{icon_name}", icon_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> WundergroundClient {
        WundergroundClient::new(base_url, "37883be45f3f1a09", Duration::from_secs(5)).unwrap()
    }

    fn almanac_json() -> serde_json::Value {
        serde_json::json!({
            "response": { "version": "0.1" },
            "almanac": {
                "airport_code": "KSFO",
                "temp_high": {
                    "normal": { "F": "65", "C": "18" },
                    "record": { "F": "79", "C": "26" }
                }
            }
        })
    }

    fn conditions_json() -> serde_json::Value {
        serde_json::json!({
            "current_observation": {
                "weather": "Partly Cloudy",
                "icon": "partlycloudy",
                "temp_f": 58.6
            }
        })
    }

    fn forecast_json() -> serde_json::Value {
        serde_json::json!({
            "forecast": {
                "simpleforecast": {
                    "forecastday": [
                        {
                            "high": { "fahrenheit": "68", "celsius": "20" },
                            "low": { "fahrenheit": "52", "celsius": "11" },
                            "conditions": "Partly Cloudy",
                            "icon": "partlycloudy"
                        },
                        {
                            "high": { "fahrenheit": "61", "celsius": "16" },
                            "low": { "fahrenheit": "" },
                            "conditions": "Rain",
                            "icon": "rain"
                        }
                    ]
                }
            }
        })
    }

    async fn mount(server: &MockServer, feature: &str, status: u16, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/api/37883be45f3f1a09/{}/q/CA/San_Francisco.json",
                feature
            )))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_request_url() {
        let c = client(DEFAULT_BASE_URL);
        let expected = "http://api.wunderground.com/api/37883be45f3f1a09/almanac/q/CA/San_Francisco.json";
        assert_eq!(c.request_url(Feature::Almanac, "San_Francisco", "CA"), expected);
        assert_eq!(c.request_url(Feature::Almanac, "San Francisco", "ca"), expected);
        assert_eq!(
            c.request_url(Feature::Forecast, "san francisco", "ca"),
            "http://api.wunderground.com/api/37883be45f3f1a09/forecast/q/CA/San_Francisco.json"
        );
        assert_eq!(
            c.request_url(Feature::Conditions, "San Francisco", "CA"),
            "http://api.wunderground.com/api/37883be45f3f1a09/conditions/q/CA/San_Francisco.json"
        );
    }

    #[test]
    fn test_normalize_city() {
        assert_eq!(normalize_city("san francisco"), "San_Francisco");
        assert_eq!(normalize_city("SAN FRANCISCO"), "San_Francisco");
        assert_eq!(normalize_city("winston-salem"), "Winston-Salem");
        assert_eq!(normalize_city("o'fallon"), "O'Fallon");
        assert_eq!(normalize_city(""), "");
    }

    #[test]
    fn test_normalize_region() {
        assert_eq!(normalize_region("ca"), "CA");
        assert_eq!(normalize_region(" ny "), "NY");
    }

    #[test]
    fn test_icon_url_default_set() {
        assert_eq!(
            resolve_icon_url("partlycloudy", None),
            "https://icons.wxug.com/i/c/j/partlycloudy.gif"
        );
    }

    #[test]
    fn test_icon_url_custom_set() {
        assert_eq!(
            resolve_icon_url("partlycloudy", Some(2)),
            "https://icons.wxug.com/i/c/b/partlycloudy.gif"
        );
        assert_eq!(
            resolve_icon_url("rain", Some(11)),
            "https://icons.wxug.com/i/c/k/rain.gif"
        );
        assert_eq!(
            resolve_icon_url("rain", Some(1)),
            "https://icons.wxug.com/i/c/a/rain.gif"
        );
    }

    #[test]
    fn test_icon_url_out_of_range_falls_back() {
        for set in [200, 12, 0, -1] {
            assert_eq!(
                resolve_icon_url("partlycloudy", Some(set)),
                "https://icons.wxug.com/i/c/j/partlycloudy.gif",
                "set {}",
                set
            );
        }
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let server = MockServer::start().await;
        mount(&server, "almanac", 200, almanac_json()).await;
        mount(&server, "conditions", 200, conditions_json()).await;
        mount(&server, "forecast", 200, forecast_json()).await;

        let snapshot = client(&server.uri())
            .fetch_snapshot("san francisco", "ca")
            .await
            .unwrap();

        assert_eq!(snapshot.sky_description, "Partly Cloudy");
        assert_eq!(snapshot.icon_code, "partlycloudy");
        assert!((snapshot.current_temp_f - 58.6).abs() < 1e-9);
        assert!((snapshot.average_high_temp_f - 65.0).abs() < 1e-9);
        assert_eq!(snapshot.forecast.len(), 2);
        assert_eq!(snapshot.forecast[0].high_f, Some(68.0));
        assert_eq!(snapshot.forecast[1].low_f, None);
        assert_eq!(snapshot.forecast[1].icon, "rain");
    }

    #[tokio::test]
    async fn test_non_success_status_is_unavailable() {
        let server = MockServer::start().await;
        mount(&server, "almanac", 200, almanac_json()).await;
        mount(&server, "conditions", 503, serde_json::json!({})).await;
        mount(&server, "forecast", 200, forecast_json()).await;

        let err = client(&server.uri())
            .fetch_snapshot("San Francisco", "CA")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::ProviderUnavailable(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_missing_top_level_key_is_invalid() {
        let server = MockServer::start().await;
        // Weather Underground answers 200 with an error object for bad keys.
        mount(
            &server,
            "almanac",
            200,
            serde_json::json!({
                "response": { "error": { "type": "keynotfound" } }
            }),
        )
        .await;
        mount(&server, "conditions", 200, conditions_json()).await;
        mount(&server, "forecast", 200, forecast_json()).await;

        let err = client(&server.uri())
            .fetch_snapshot("San Francisco", "CA")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::ProviderResponseInvalid(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_non_numeric_temperature_is_invalid() {
        let server = MockServer::start().await;
        mount(&server, "almanac", 200, almanac_json()).await;
        mount(
            &server,
            "conditions",
            200,
            serde_json::json!({
                "current_observation": {
                    "weather": "Clear",
                    "icon": "clear",
                    "temp_f": "n/a"
                }
            }),
        )
        .await;
        mount(&server, "forecast", 200, forecast_json()).await;

        let err = client(&server.uri())
            .fetch_snapshot("San Francisco", "CA")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::ProviderResponseInvalid(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_unavailable() {
        let err = client("http://127.0.0.1:1")
            .fetch_snapshot("San Francisco", "CA")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::ProviderUnavailable(_)), "{:?}", err);
    }

    #[test]
    fn test_classifier_inputs() {
        let snapshot = WeatherSnapshot {
            sky_description: "Rain".into(),
            icon_code: "rain".into(),
            current_temp_f: 50.0,
            average_high_temp_f: 52.0,
            forecast: vec![],
        };
        let inputs = snapshot.classifier_inputs();
        assert_eq!(inputs.icon.as_deref(), Some("rain"));
        assert_eq!(inputs.current_temp_f, Some(50.0));
        assert_eq!(inputs.average_high_temp_f, Some(52.0));
    }
}
