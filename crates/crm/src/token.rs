//! Access-token ownership.
//!
//! A single [`TokenManager`] is built at startup and shared (via `Arc`) with the transport.
//! It hands out the authorization header for each outbound call and, when it holds no
//! token yet, runs the refresh-token grant once and writes the result back to the
//! configuration file. Only presence is checked: an expired token is not detected.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use crmpilot_core::config::{AppConfig, CrmConfig};
use crmpilot_core::errors::TokenRefreshError;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::store::{CredentialStore, TomlCredentialStore, ACCESS_TOKEN_KEY};

const AUTH_SCHEME: &str = "Zoho-oauthtoken";

#[derive(Clone, Debug)]
pub struct RefreshCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
}

impl RefreshCredentials {
    pub fn from_config(config: &CrmConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
        }
    }

    /// Config keys that must be filled in before a refresh can be attempted.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id.trim().is_empty() {
            missing.push("crm.client_id");
        }
        if self.client_secret.expose_secret().trim().is_empty() {
            missing.push("crm.client_secret");
        }
        if self.refresh_token.expose_secret().trim().is_empty() {
            missing.push("crm.refresh_token");
        }
        missing
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn refresh(
        &self,
        credentials: &RefreshCredentials,
    ) -> Result<SecretString, TokenRefreshError>;
}

/// OAuth refresh-token grant against the Zoho accounts server.
pub struct ZohoTokenProvider {
    client: Client,
    accounts_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ZohoTokenProvider {
    pub fn new(client: Client, accounts_url: impl Into<String>) -> Self {
        Self { client, accounts_url: accounts_url.into() }
    }
}

#[async_trait]
impl TokenProvider for ZohoTokenProvider {
    async fn refresh(
        &self,
        credentials: &RefreshCredentials,
    ) -> Result<SecretString, TokenRefreshError> {
        let response = self
            .client
            .post(&self.accounts_url)
            .form(&[
                ("refresh_token", credentials.refresh_token.expose_secret()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.expose_secret()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|error| TokenRefreshError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenRefreshError::Status { status: status.as_u16(), body });
        }

        // The accounts server answers 200 with an `error` field for bad grants.
        let token: TokenResponse =
            response.json().await.map_err(|error| TokenRefreshError::Request(error.to_string()))?;
        match token.access_token.filter(|value| !value.trim().is_empty()) {
            Some(access_token) => Ok(SecretString::from(access_token)),
            None => Err(TokenRefreshError::Rejected(
                token.error.unwrap_or_else(|| "empty access token".to_string()),
            )),
        }
    }
}

pub struct TokenManager {
    provider: Arc<dyn TokenProvider>,
    store: Arc<dyn CredentialStore>,
    credentials: RefreshCredentials,
    current: Mutex<Option<SecretString>>,
}

impl TokenManager {
    pub fn new(
        provider: Arc<dyn TokenProvider>,
        store: Arc<dyn CredentialStore>,
        credentials: RefreshCredentials,
        initial: Option<SecretString>,
    ) -> Self {
        Self { provider, store, credentials, current: Mutex::new(initial) }
    }

    /// Wires the Zoho provider and the TOML store the configuration was loaded from.
    pub fn from_config(client: Client, config: &AppConfig) -> Self {
        Self::new(
            Arc::new(ZohoTokenProvider::new(client, config.crm.accounts_url.clone())),
            Arc::new(TomlCredentialStore::new(config.credential_store_path())),
            RefreshCredentials::from_config(&config.crm),
            config.crm.access_token.clone(),
        )
    }

    /// Headers to attach to a CRM request, acquiring a token first if none is held.
    pub async fn auth_header(&self) -> Result<BTreeMap<String, String>, TokenRefreshError> {
        let token = self.access_token().await?;
        let mut headers = BTreeMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("{AUTH_SCHEME} {}", token.expose_secret()),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Ok(headers)
    }

    async fn access_token(&self) -> Result<SecretString, TokenRefreshError> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref() {
            return Ok(token.clone());
        }

        let missing = self.credentials.missing_settings();
        if !missing.is_empty() {
            return Err(TokenRefreshError::NotConfigured(format!(
                "no access token is held and {} must be set to refresh one",
                missing.join(", ")
            )));
        }

        let token = self.provider.refresh(&self.credentials).await.map_err(|error| {
            warn!(event_name = "crm.token.refresh_failed", error = %error, "token refresh failed");
            error
        })?;
        self.store.persist(ACCESS_TOKEN_KEY, &token)?;
        info!(event_name = "crm.token.refreshed", "access token refreshed and persisted");

        *current = Some(token.clone());
        Ok(token)
    }
}
