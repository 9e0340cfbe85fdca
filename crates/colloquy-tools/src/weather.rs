//! Weather lookup tool.
//!
//! Uses the Open-Meteo geocoding and forecast APIs — keyless, so the tool
//! works out of the box.  Any network fault or unknown city becomes an
//! error payload at the registry boundary.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use colloquy_engine::{InvocationContext, Tool, ToolDefinition, ToolError};

use crate::params::require_str;

/// Open-Meteo geocoding endpoint.
const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// Open-Meteo forecast endpoint.
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Current-conditions lookup by city name.
pub struct WeatherTool {
    client: reqwest::Client,
}

impl WeatherTool {
    /// Create the weather tool.
    pub fn new() -> Self {
        Self {
            client: default_client(),
        }
    }

    async fn geocode(&self, city: &str) -> Result<(f64, f64, String), ToolError> {
        let response = self
            .client
            .get(GEOCODING_URL)
            .query(&[("name", city), ("count", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::Failed {
                tool_name: "get_weather".into(),
                reason: format!("geocoding API returned status {}", response.status()),
            });
        }

        let body: Value = response.json().await?;
        let hit = body["results"]
            .as_array()
            .and_then(|r| r.first())
            .ok_or_else(|| ToolError::Failed {
                tool_name: "get_weather".into(),
                reason: format!("unknown city: {city}"),
            })?;

        let lat = hit["latitude"].as_f64().unwrap_or(0.0);
        let lon = hit["longitude"].as_f64().unwrap_or(0.0);
        let resolved = hit["name"].as_str().unwrap_or(city).to_owned();
        Ok((lat, lon, resolved))
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_weather".into(),
            description: "Get current weather conditions for a city: \
                          temperature, wind, humidity, and a short description."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City name, e.g. \"Oslo\"" }
                },
                "required": ["city"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: Value,
        _ctx: &InvocationContext,
    ) -> Result<Value, ToolError> {
        let city = require_str(&arguments, "city", "get_weather")?;
        debug!(city, "looking up weather");

        let (lat, lon, resolved) = self.geocode(city).await?;

        let response = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,wind_speed_10m,weather_code".into(),
                ),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::Failed {
                tool_name: "get_weather".into(),
                reason: format!("forecast API returned status {}", response.status()),
            });
        }

        let body: Value = response.json().await?;
        let current = &body["current"];

        Ok(json!({
            "city": resolved,
            "latitude": lat,
            "longitude": lon,
            "temperature_c": current["temperature_2m"],
            "humidity_pct": current["relative_humidity_2m"],
            "wind_speed_kmh": current["wind_speed_10m"],
            "conditions": describe_weather_code(current["weather_code"].as_u64()),
        }))
    }
}

fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// Map a WMO weather code to a short human-readable description.
fn describe_weather_code(code: Option<u64>) -> &'static str {
    match code {
        Some(0) => "clear sky",
        Some(1..=3) => "partly cloudy",
        Some(45 | 48) => "fog",
        Some(51..=57) => "drizzle",
        Some(61..=67) => "rain",
        Some(71..=77) => "snow",
        Some(80..=82) => "rain showers",
        Some(85 | 86) => "snow showers",
        Some(95..=99) => "thunderstorm",
        _ => "unknown",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_codes_map_to_descriptions() {
        assert_eq!(describe_weather_code(Some(0)), "clear sky");
        assert_eq!(describe_weather_code(Some(63)), "rain");
        assert_eq!(describe_weather_code(Some(96)), "thunderstorm");
        assert_eq!(describe_weather_code(None), "unknown");
        assert_eq!(describe_weather_code(Some(12345)), "unknown");
    }

    #[test]
    fn definition_requires_city() {
        let tool = WeatherTool::new();
        let def = tool.definition();
        assert_eq!(def.name, "get_weather");
        assert_eq!(def.input_schema["required"][0], "city");
    }

    #[tokio::test]
    async fn missing_city_is_invalid_params() {
        let tool = WeatherTool::new();
        let ctx = InvocationContext {
            thread_key: "t1".into(),
        };
        let err = tool.invoke(json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }
}
