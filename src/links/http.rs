//! HTTP clients for the touch table and projector nodes.
//!
//! Thin wrappers over `reqwest`. Status probes use a short per-request
//! timeout; calibration calls only bound the connect phase because a
//! calibration legitimately takes as long as the user needs to touch.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{LinkError, Projector, ProjectorCalibration, ProjectorStatus, TableCalibrated, TouchTable};

const CONNECT_TIMEOUT_SECS: u64 = 2;
const PROBE_TIMEOUT_SECS: u64 = 2;

fn build_client() -> Result<reqwest::Client, LinkError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| LinkError::HttpClientBuild(e.to_string()))
}

/// Send a request and decode a JSON body, mapping every failure to `LinkError`.
async fn fetch_json<T: DeserializeOwned>(peer: &str, req: reqwest::RequestBuilder) -> Result<T, LinkError> {
    let response = send(peer, req).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| LinkError::Parse { peer: peer.to_string(), message: e.to_string() })
}

async fn send(peer: &str, req: reqwest::RequestBuilder) -> Result<reqwest::Response, LinkError> {
    let response = req
        .send()
        .await
        .map_err(|e| LinkError::Request { peer: peer.to_string(), message: e.to_string() })?;
    let status = response.status();
    if !status.is_success() {
        return Err(LinkError::Response { peer: peer.to_string(), status: status.as_u16() });
    }
    Ok(response)
}

// =============================================================================
// TOUCH TABLE
// =============================================================================

pub struct HttpTouchTable {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTouchTable {
    /// # Errors
    ///
    /// Returns [`LinkError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, LinkError> {
        Ok(Self { http: build_client()?, base_url: base_url.into() })
    }
}

#[async_trait]
impl TouchTable for HttpTouchTable {
    async fn calibrated(&self) -> Result<bool, LinkError> {
        let req = self
            .http
            .get(format!("{}/calibrated", self.base_url))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS));
        let body: TableCalibrated = fetch_json(&self.base_url, req).await?;
        Ok(body.calibrated)
    }

    async fn calibrate_service_ready(&self) -> Result<(), LinkError> {
        let req = self
            .http
            .get(format!("{}/healthz", self.base_url))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS));
        send(&self.base_url, req).await.map(|_| ())
    }

    async fn calibrate(&self) -> Result<(), LinkError> {
        let req = self.http.post(format!("{}/calibrate", self.base_url));
        send(&self.base_url, req).await.map(|_| ())
    }
}

// =============================================================================
// PROJECTOR
// =============================================================================

pub struct HttpProjector {
    http: reqwest::Client,
    base_url: String,
}

impl HttpProjector {
    /// # Errors
    ///
    /// Returns [`LinkError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, LinkError> {
        Ok(Self { http: build_client()?, base_url: base_url.into() })
    }
}

#[async_trait]
impl Projector for HttpProjector {
    fn id(&self) -> &str {
        &self.base_url
    }

    async fn status(&self) -> Result<ProjectorStatus, LinkError> {
        let req = self
            .http
            .get(format!("{}/status", self.base_url))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS));
        fetch_json(&self.base_url, req).await
    }

    async fn calibrate(&self) -> Result<bool, LinkError> {
        let req = self.http.post(format!("{}/calibrate", self.base_url));
        let body: ProjectorCalibration = fetch_json(&self.base_url, req).await?;
        Ok(body.calibrated)
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
