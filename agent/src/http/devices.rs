//! Device property API client

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::authn::credential::Credential;
use crate::authn::signer::{sign_device_request, SIGN_METHOD};
use crate::authn::token_client::ApiKeys;
use crate::errors::FetchError;
use crate::http::client::HttpClient;
use crate::models::device::{DeviceQuery, PropertyList, PropertyReading};
use crate::utils::timestamp_ms;

/// Which vendor endpoint serves property snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyEndpoint {
    /// `GET /v1.0/devices/{id}/status`
    #[default]
    Status,

    /// `GET /v2.0/cloud/thing/{id}/shadow/properties`
    Shadow,
}

impl PropertyEndpoint {
    /// Request path (and query) for `query`
    pub fn path(&self, query: &DeviceQuery) -> String {
        let device_id = urlencoding::encode(&query.device_id);
        match self {
            PropertyEndpoint::Status => format!("/v1.0/devices/{}/status", device_id),
            PropertyEndpoint::Shadow => {
                let path = format!("/v2.0/cloud/thing/{}/shadow/properties", device_id);
                if query.is_discovery() {
                    path
                } else {
                    let params = url::form_urlencoded::Serializer::new(String::new())
                        .append_pair("codes", &query.requested_property_codes.join(","))
                        .finish();
                    format!("{}?{}", path, params)
                }
            }
        }
    }
}

/// Fetches property snapshots with a signed, authenticated request
pub struct DeviceFetcher {
    http_client: Arc<HttpClient>,
    keys: Arc<ApiKeys>,
    endpoint: PropertyEndpoint,
}

impl DeviceFetcher {
    pub fn new(
        http_client: Arc<HttpClient>,
        keys: Arc<ApiKeys>,
        endpoint: PropertyEndpoint,
    ) -> Self {
        Self {
            http_client,
            keys,
            endpoint,
        }
    }

    /// Fetch the device's current properties, filtered by the query.
    ///
    /// Never touches credential state; a failure only fails this call.
    pub async fn fetch_properties(
        &self,
        query: &DeviceQuery,
        credential: &Credential,
    ) -> Result<Vec<PropertyReading>, FetchError> {
        let t = timestamp_ms();
        let sign = sign_device_request(
            &self.keys.client_id,
            credential.access_token(),
            self.keys.client_secret.expose_secret(),
            &t,
        );
        let headers = [
            ("client_id", self.keys.client_id.clone()),
            ("access_token", credential.access_token().to_string()),
            ("t", t),
            ("sign", sign),
            ("sign_method", SIGN_METHOD.to_string()),
        ];

        let list: PropertyList = self
            .http_client
            .get_signed(&self.endpoint.path(query), &headers)
            .await?;
        let readings = list.into_readings(query);

        debug!(
            "Fetched {} properties for device {}",
            readings.len(),
            query.device_id
        );
        Ok(readings)
    }
}
