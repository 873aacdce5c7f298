//! Token endpoint client

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use crate::authn::credential::Credential;
use crate::authn::signer::{generate_nonce, sign_token_request, SIGN_METHOD};
use crate::errors::AuthError;
use crate::http::client::HttpClient;
use crate::utils::timestamp_ms;

/// Cloud project keys of one account
#[derive(Debug)]
pub struct ApiKeys {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl ApiKeys {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }
}

/// Network operations that mint credentials. A trait so the guard can be tested without a vendor.
#[async_trait]
pub trait TokenClient: Send + Sync {
    /// Full authentication with the project keys
    async fn obtain_new_token(&self) -> Result<Credential, AuthError>;

    /// Exchange a refresh token for a new credential
    async fn refresh_token(&self, refresh_token: &str) -> Result<Credential, AuthError>;
}

/// `result` payload of both token endpoints
#[derive(Debug, Deserialize)]
struct TokenResult {
    access_token: String,

    #[serde(default)]
    refresh_token: Option<String>,

    #[serde(alias = "expire_seconds")]
    expire_time: i64,
}

impl TokenResult {
    fn into_credential(self) -> Result<Credential, AuthError> {
        if self.access_token.is_empty() {
            return Err(AuthError::InvalidCredential("empty access_token".to_string()));
        }
        if self.expire_time <= 0 {
            return Err(AuthError::InvalidCredential(format!(
                "non-positive expire_time {}",
                self.expire_time
            )));
        }
        Ok(Credential::new(
            self.access_token,
            self.refresh_token,
            Utc::now(),
            self.expire_time,
        ))
    }
}

/// [`TokenClient`] talking to the vendor token endpoints
pub struct HttpTokenClient {
    http_client: Arc<HttpClient>,
    keys: Arc<ApiKeys>,
}

impl HttpTokenClient {
    pub fn new(http_client: Arc<HttpClient>, keys: Arc<ApiKeys>) -> Self {
        Self { http_client, keys }
    }

    fn signed_headers(&self) -> Vec<(&'static str, String)> {
        let t = timestamp_ms();
        let nonce = generate_nonce();
        let sign = sign_token_request(
            &self.keys.client_id,
            self.keys.client_secret.expose_secret(),
            &t,
            &nonce,
        );

        vec![
            ("client_id", self.keys.client_id.clone()),
            ("sign", sign),
            ("t", t),
            ("nonce", nonce),
            ("sign_method", SIGN_METHOD.to_string()),
        ]
    }

    async fn request_token(&self, path: &str) -> Result<Credential, AuthError> {
        let headers = self.signed_headers();
        let result: TokenResult = self.http_client.get_signed(path, &headers).await?;
        result.into_credential()
    }
}

#[async_trait]
impl TokenClient for HttpTokenClient {
    async fn obtain_new_token(&self) -> Result<Credential, AuthError> {
        debug!("Requesting new token for client {}", self.keys.client_id);

        let credential = self.request_token("/v1.0/token?grant_type=1").await?;

        info!(
            "Obtained new token, expires in {} seconds",
            credential.ttl_seconds()
        );
        Ok(credential)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::MissingRefreshToken);
        }
        debug!("Refreshing token for client {}", self.keys.client_id);

        let path = format!("/v1.0/token/{}", urlencoding::encode(refresh_token));
        let credential = self.request_token(&path).await?;

        info!(
            "Refreshed token, expires in {} seconds",
            credential.ttl_seconds()
        );
        Ok(credential)
    }
}
