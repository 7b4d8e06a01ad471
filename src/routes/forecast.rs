//! Synthetic weather forecast endpoint.

use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Local, NaiveDate};
use rand::Rng;
use serde::Serialize;

/// Descriptors ordered roughly coldest to hottest.
const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

/// One day's forecast.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct WeatherForecast {
    /// Forecast date
    pub date: NaiveDate,
    /// Temperature in degrees Celsius
    #[cfg_attr(feature = "utoipa", schema(example = 25))]
    pub temperature_c: i32,
    /// Temperature in degrees Fahrenheit, derived from `temperature_c`
    #[cfg_attr(feature = "utoipa", schema(example = 76))]
    pub temperature_f: i32,
    /// One-word weather description
    #[cfg_attr(feature = "utoipa", schema(example = "Warm"))]
    pub summary: String,
}

impl WeatherForecast {
    fn random(date: NaiveDate, rng: &mut impl Rng) -> Self {
        let temperature_c = rng.gen_range(-20..55);
        Self {
            date,
            temperature_c,
            temperature_f: fahrenheit(temperature_c),
            summary: SUMMARIES[rng.gen_range(0..SUMMARIES.len())].to_string(),
        }
    }
}

/// Celsius to Fahrenheit, truncating toward zero.
fn fahrenheit(celsius: i32) -> i32 {
    32 + (celsius as f64 / 0.5556) as i32
}

/// Five-day weather forecast.
///
/// Returns randomly generated data for the next five days. Exists to give
/// the rate limiter something worth protecting.
#[cfg_attr(feature = "utoipa", utoipa::path(
    get,
    path = "/weatherforecast",
    tag = "forecast",
    operation_id = "get_weather_forecast",
    responses(
        (status = 200, description = "Forecast for the next five days", body = [WeatherForecast]),
        (status = 429, description = "Rate limit exceeded", body = crate::openapi::ErrorResponse),
    )
))]
#[tracing::instrument(name = "forecast.get")]
pub async fn get_weather_forecast() -> impl IntoResponse {
    let mut rng = rand::thread_rng();
    let today = Local::now().date_naive();

    let forecast: Vec<WeatherForecast> = (1..=5)
        .map(|day| WeatherForecast::random(today + Duration::days(day), &mut rng))
        .collect();

    Json(forecast)
}
