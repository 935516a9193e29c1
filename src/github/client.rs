use anyhow::{Context, Result as AnyResult};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::TargetStore;
use crate::error::{Result, RotationError};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";

/// Public key a store expects secrets to be sealed with
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorePublicKey {
    pub key_id: String,
    /// Base64-encoded X25519 key
    pub key: String,
}

/// Result of an accepted create-or-update call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Created,
    Updated,
}

impl UploadOutcome {
    fn from_status(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::CREATED => Some(UploadOutcome::Created),
            StatusCode::NO_CONTENT => Some(UploadOutcome::Updated),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct PutSecretRequest<'a> {
    encrypted_value: &'a str,
    key_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<&'a str>,
}

/// GitHub REST client for Actions and Dependabot secrets
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(base_url: impl Into<String>, token: SecretString) -> AnyResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorization(&self) -> String {
        format!("token {}", self.token.expose_secret())
    }

    /// Fetch the store's current public key
    pub async fn public_key(&self, store: &TargetStore) -> Result<StorePublicKey> {
        let url = self.url(&store.public_key_path());
        debug!("Fetching public key from: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.authorization())
            .header("Accept", ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(RotationError::PublicKeyFetch {
                store: store.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let key: StorePublicKey = response.json().await?;
        debug!("Fetched public key {} for {}", key.key_id, store);
        Ok(key)
    }

    /// Create or update a secret with a value sealed under `key_id`
    pub async fn put_secret(
        &self,
        store: &TargetStore,
        name: &str,
        encrypted_value: &str,
        key_id: &str,
    ) -> Result<UploadOutcome> {
        let url = self.url(&store.secret_path(name));
        debug!("Uploading secret to: {}", url);

        let body = PutSecretRequest {
            encrypted_value,
            key_id,
            visibility: store.visibility(),
        };

        let response = self
            .client
            .put(&url)
            .header("Authorization", self.authorization())
            .header("Accept", ACCEPT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let outcome =
            UploadOutcome::from_status(status).ok_or_else(|| RotationError::UploadRejected {
                secret_name: name.to_string(),
                store: store.to_string(),
                status: status.as_u16(),
            })?;

        info!("Updated {} in {}", name, store);
        Ok(outcome)
    }
}
