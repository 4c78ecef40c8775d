use std::time::Duration;

use serde_json::Value;

use crate::domain::ports::{DeliveryError, InventoryGateway};
use crate::domain::stock::StockEndpoint;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking HTTP client for the inventory service's stock endpoints.
///
/// Blocking on purpose: the dispatcher owns a dedicated worker thread, so an
/// async client would only add a second runtime. Must not be constructed or
/// used on a tokio runtime thread.
pub struct HttpInventoryClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpInventoryClient {
    pub fn new(base_url: &str) -> Result<Self, DeliveryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DeliveryError(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint_url(&self, endpoint: StockEndpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.uri_path())
    }
}

impl InventoryGateway for HttpInventoryClient {
    fn adjust_stock(&self, endpoint: StockEndpoint, payload: &Value) -> Result<(), DeliveryError> {
        let url = self.endpoint_url(endpoint);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .map_err(|e| DeliveryError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError(format!(
                "{} responded with {}",
                url,
                response.status()
            )));
        }

        Ok(())
    }
}
