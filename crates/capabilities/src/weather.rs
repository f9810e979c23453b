//! Weather lookup capability — stub that returns mock weather data.
//!
//! In production this would call a real weather API. The stub returns
//! plausible, deterministic weather data so the execution loop can be
//! tested end-to-end without network access.

use async_trait::async_trait;
use deskhand_core::capability::Capability;
use deskhand_core::context::ExecutionContext;
use deskhand_core::error::CapabilityError;

pub struct WeatherCapability;

#[async_trait]
impl Capability for WeatherCapability {
    fn name(&self) -> &str {
        "get_current_weather"
    }

    fn description(&self) -> &str {
        "Get current weather conditions for a coordinate. Returns temperature, conditions, humidity, and wind speed."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "latitude": {
                    "type": "number",
                    "description": "Latitude of the location, in decimal degrees"
                },
                "longitude": {
                    "type": "number",
                    "description": "Longitude of the location, in decimal degrees"
                },
                "units": {
                    "type": "string",
                    "enum": ["metric", "imperial"],
                    "description": "Temperature units (default: metric)"
                }
            },
            "required": ["latitude", "longitude"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> Result<String, CapabilityError> {
        let latitude = input["latitude"]
            .as_f64()
            .ok_or_else(|| CapabilityError::InvalidInput("missing 'latitude'".into()))?;
        let longitude = input["longitude"]
            .as_f64()
            .ok_or_else(|| CapabilityError::InvalidInput("missing 'longitude'".into()))?;
        let units = input["units"].as_str().unwrap_or("metric");

        let report = generate_mock_weather(latitude, longitude, units);
        serde_json::to_string_pretty(&report).map_err(|e| CapabilityError::ExecutionFailed {
            capability: "get_current_weather".into(),
            reason: e.to_string(),
        })
    }
}

#[derive(serde::Serialize)]
struct WeatherReport {
    latitude: f64,
    longitude: f64,
    temperature: f64,
    units: String,
    conditions: String,
    humidity: u32,
    wind_speed: f64,
}

/// Generate deterministic mock weather from the coordinate.
fn generate_mock_weather(latitude: f64, longitude: f64, units: &str) -> WeatherReport {
    let hash: u32 = format!("{latitude:.3},{longitude:.3}")
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

    let conditions_list = [
        "Clear skies",
        "Partly cloudy",
        "Overcast",
        "Light rain",
        "Heavy rain",
        "Thunderstorms",
        "Snow",
        "Foggy",
    ];

    let base_temp_c = ((hash % 40) as f64) - 5.0; // -5 to 35°C
    let (temperature, unit_label) = if units == "imperial" {
        (base_temp_c * 9.0 / 5.0 + 32.0, "°F")
    } else {
        (base_temp_c, "°C")
    };

    WeatherReport {
        latitude,
        longitude,
        temperature: (temperature * 10.0).round() / 10.0,
        units: unit_label.to_string(),
        conditions: conditions_list[(hash as usize / 7) % conditions_list.len()].to_string(),
        humidity: 30 + (hash % 60),
        wind_speed: ((hash % 30) as f64) + 5.0,
    }
}
