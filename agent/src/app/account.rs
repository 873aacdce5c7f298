//! One configured vendor account: credential lifecycle plus device polling

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::authn::credential::Credential;
use crate::authn::guard::{AuthGuard, DEFAULT_EXPIRY_BUFFER_SECS};
use crate::authn::store::CredentialStore;
use crate::authn::token_client::{ApiKeys, HttpTokenClient, TokenClient};
use crate::errors::{AuthError, FetchError};
use crate::http::client::{HttpClient, DEFAULT_REQUEST_TIMEOUT};
use crate::http::devices::{DeviceFetcher, PropertyEndpoint};
use crate::models::device::{DeviceQuery, PropertyReading};
use crate::models::region::Region;

/// Everything needed to set up an account
#[derive(Debug)]
pub struct AccountOptions {
    /// Account name, unique per process
    pub name: String,

    /// Cloud project keys
    pub keys: Arc<ApiKeys>,

    /// Data center of the cloud project
    pub region: Region,

    /// Overrides the region's base URL (tests, private deployments)
    pub base_url: Option<String>,

    /// Property endpoint variant
    pub endpoint: PropertyEndpoint,

    /// Deadline for every vendor call
    pub request_timeout: Duration,

    /// Rotate the credential this long before it expires
    pub expiry_buffer: chrono::Duration,

    /// Devices polled through this account
    pub devices: Vec<DeviceQuery>,
}

impl AccountOptions {
    pub fn new(name: impl Into<String>, keys: ApiKeys, region: Region) -> Self {
        Self {
            name: name.into(),
            keys: Arc::new(keys),
            region,
            base_url: None,
            endpoint: PropertyEndpoint::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            expiry_buffer: chrono::Duration::seconds(DEFAULT_EXPIRY_BUFFER_SECS),
            devices: Vec::new(),
        }
    }

    fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(self.region.base_url())
    }
}

/// Handle to an initialized account
pub struct Account {
    name: String,
    guard: AuthGuard,
    fetcher: DeviceFetcher,
    devices: HashMap<String, DeviceQuery>,
}

impl Account {
    /// Set up an account against the vendor API.
    ///
    /// With an `existing` credential no token is requested unless it is already
    /// inside the expiry buffer; without one a new token is obtained. Either way a
    /// returned handle holds a credential the vendor accepted.
    pub async fn initialize(
        options: AccountOptions,
        existing: Option<Credential>,
    ) -> Result<Self, AuthError> {
        let http_client = Arc::new(HttpClient::with_timeout(
            options.base_url(),
            options.request_timeout,
        )?);
        let token_client: Arc<dyn TokenClient> = Arc::new(HttpTokenClient::new(
            http_client.clone(),
            options.keys.clone(),
        ));
        let fetcher = DeviceFetcher::new(http_client, options.keys.clone(), options.endpoint);

        Self::with_token_client(options, existing, token_client, fetcher).await
    }

    /// Set up an account with an explicit token client
    pub async fn with_token_client(
        options: AccountOptions,
        existing: Option<Credential>,
        token_client: Arc<dyn TokenClient>,
        fetcher: DeviceFetcher,
    ) -> Result<Self, AuthError> {
        info!(
            "Initializing account {} (region {}, {} devices)",
            options.name,
            options.region,
            options.devices.len()
        );

        let credential = match existing {
            Some(credential) => credential,
            None => token_client.obtain_new_token().await.map_err(|e| {
                error!("Account {} failed to authenticate: {}", options.name, e);
                e
            })?,
        };

        let store = Arc::new(CredentialStore::new(credential));
        let guard = AuthGuard::with_buffer(store, token_client, options.expiry_buffer);
        guard.ensure_valid_now().await?;

        let devices = options
            .devices
            .into_iter()
            .map(|query| (query.device_id.clone(), query))
            .collect();

        Ok(Self {
            name: options.name,
            guard,
            fetcher,
            devices,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The account's credential store
    pub fn store(&self) -> &Arc<CredentialStore> {
        self.guard.store()
    }

    pub fn guard(&self) -> &AuthGuard {
        &self.guard
    }

    /// Configured device IDs
    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Run one poll cycle for a configured device
    pub async fn poll(&self, device_id: &str) -> Result<Vec<PropertyReading>, FetchError> {
        let query = self
            .devices
            .get(device_id)
            .ok_or_else(|| FetchError::UnknownDevice(device_id.to_string()))?;
        self.fetch(query).await
    }

    /// Run one poll cycle for an arbitrary query
    pub async fn fetch(&self, query: &DeviceQuery) -> Result<Vec<PropertyReading>, FetchError> {
        let credential = self.guard.ensure_valid_now().await?;
        self.fetcher.fetch_properties(query, &credential).await
    }
}
