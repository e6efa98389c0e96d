//! Blocking HTTP client for the sensor network API.
//!
//! - One `ureq` agent, shared by all fetch workers (the agent is `Sync`).
//! - Every call is bounded by the configured global timeout; retries are left to
//!   the next refresh cycle.
//!
//! Endpoints
//! - `GET /sites`, `GET /devices`, `GET /device/{id}`, `GET /device/{id}/{resolution}`

use http::StatusCode;
use log::{debug, trace};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::models::shed::{DeviceDoc, DeviceId, DeviceIndexDoc, Resolution, SeriesDoc, SiteDoc};
use crate::source::{SourceError, TelemetrySource};
use crate::utils::decode_json;

const USER_AGENT: &str = concat!("fieldwatch/", env!("CARGO_PKG_VERSION"));

pub struct ShedClient {
    agent: ureq::Agent,
    base_url: String,
}

impl ShedClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        let base_url = base_url.into().trim_end_matches('/').to_string();
        ShedClient { agent, base_url }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let mut res = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status: StatusCode = res.status();
        trace!("Response from {} was {}", url, status);
        let body = res
            .body_mut()
            .read_to_string()
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = if body.is_empty() { String::from("<no body>") } else { body };
            return Err(SourceError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(decode_json(&body)?)
    }
}

impl TelemetrySource for ShedClient {
    fn list_sites(&self) -> Result<Vec<SiteDoc>, SourceError> {
        self.get_json("/sites")
    }

    fn list_device_ids_by_category(&self) -> Result<DeviceIndexDoc, SourceError> {
        self.get_json("/devices")
    }

    fn get_device(&self, id: &DeviceId) -> Result<DeviceDoc, SourceError> {
        self.get_json(&format!("/device/{}", id.0))
    }

    fn get_device_series(&self, id: &DeviceId, resolution: Resolution) -> Result<SeriesDoc, SourceError> {
        self.get_json(&format!("/device/{}/{}", id.0, resolution.path_segment()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_paths_without_doubling_slashes() {
        let client = ShedClient::new("http://shed.example/", Duration::from_secs(5));
        assert_eq!(client.url("/sites"), "http://shed.example/sites");
        assert_eq!(client.url("device/a1"), "http://shed.example/device/a1");
    }
}
