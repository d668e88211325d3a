//! Open-Meteo historical archive source

use crate::SourceResult;
use chrono::{DateTime, NaiveDateTime, Utc};
use meteo_core::{FetchError, FetchRequest, Series, TimeWindow, WeatherSource};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://archive-api.open-meteo.com";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: Option<HashMap<String, Value>>,
}

/// Hourly history from the Open-Meteo archive API
///
/// The API answers in whole days; samples outside the requested window
/// are trimmed off before returning.
pub struct OpenMeteoArchive {
    client: reqwest::Client,
    base_url: Url,
}

impl OpenMeteoArchive {
    pub fn new(base_url: &str, timeout: Duration) -> SourceResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
        })
    }

    fn request_url(&self, request: &FetchRequest) -> Result<Url, FetchError> {
        let mut url = self
            .base_url
            .join("v1/archive")
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("latitude", &format!("{:.4}", request.latitude))
            .append_pair("longitude", &format!("{:.4}", request.longitude))
            .append_pair(
                "start_date",
                &request.window.start.format("%Y-%m-%d").to_string(),
            )
            .append_pair(
                "end_date",
                &request.window.end.format("%Y-%m-%d").to_string(),
            )
            .append_pair("hourly", request.variable.as_str())
            .append_pair("timezone", "GMT");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl WeatherSource for OpenMeteoArchive {
    fn name(&self) -> &str {
        "open-meteo"
    }

    #[instrument(skip(self), fields(variable = %request.variable))]
    async fn fetch(&self, request: &FetchRequest) -> Result<Series, FetchError> {
        let url = self.request_url(request)?;
        debug!(%url, "requesting archive data");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let series = parse_archive(&body, request.variable.as_str(), &request.window)?;
        debug!(samples = series.len(), "archive data received");
        Ok(series)
    }
}

/// Extract `variable` from an archive payload, trimmed to `window`
pub fn parse_archive(body: &str, variable: &str, window: &TimeWindow) -> Result<Series, FetchError> {
    let response: ArchiveResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    let hourly = response
        .hourly
        .ok_or_else(|| FetchError::Malformed("missing hourly block".into()))?;

    let times = hourly
        .get("time")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Malformed("missing hourly.time".into()))?;
    let values = hourly
        .get(variable)
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Malformed(format!("missing hourly.{}", variable)))?;
    if times.len() != values.len() {
        return Err(FetchError::Malformed(format!(
            "{} timestamps for {} values",
            times.len(),
            values.len()
        )));
    }

    let mut series = Series::with_capacity(values.len());
    for (time, value) in times.iter().zip(values) {
        let instant = parse_time(time)?;
        if !window.contains(instant) {
            continue;
        }
        let sample = match value {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            other => {
                return Err(FetchError::Malformed(format!("non-numeric sample {}", other)));
            }
        };
        series.push(sample);
    }
    Ok(series)
}

fn parse_time(value: &Value) -> Result<DateTime<Utc>, FetchError> {
    let text = value
        .as_str()
        .ok_or_else(|| FetchError::Malformed(format!("non-string timestamp {}", value)))?;
    let naive = NaiveDateTime::parse_from_str(text, TIME_FORMAT)
        .map_err(|e| FetchError::Malformed(format!("timestamp {}: {}", text, e)))?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}
