use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_iam::config::Credentials;
use aws_sdk_iam::error::SdkError;
use aws_sdk_iam::Client as IamClient;
use aws_sdk_sts::Client as StsClient;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use super::{AccessKeyInfo, IdentityService, NewAccessKey};
use crate::config::AwsConfig;

const CREDENTIALS_PROVIDER: &str = "key-rotator";

/// AWS IAM + STS client built once from explicit credentials
pub struct AwsIdentityClient {
    iam: IamClient,
    sts: StsClient,
}

impl AwsIdentityClient {
    /// Create a new client from the configured credentials
    pub async fn new(config: &AwsConfig) -> Result<Self> {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.expose_secret().to_string(),
            config
                .session_token
                .as_ref()
                .map(|token| token.expose_secret().to_string()),
            None,
            CREDENTIALS_PROVIDER,
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        Ok(Self {
            iam: IamClient::new(&sdk_config),
            sts: StsClient::new(&sdk_config),
        })
    }
}

#[async_trait::async_trait]
impl IdentityService for AwsIdentityClient {
    async fn caller_arn(&self) -> Result<String> {
        debug!("Looking up caller identity via STS");

        let response = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .context("Failed to look up caller identity")?;

        response
            .arn()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Caller identity response has no ARN"))
    }

    async fn list_access_keys(&self, username: &str) -> Result<Vec<AccessKeyInfo>> {
        debug!("Listing access keys for user: {}", username);

        let response = self
            .iam
            .list_access_keys()
            .user_name(username)
            .send()
            .await
            .with_context(|| format!("Failed to list access keys for user '{}'", username))?;

        Ok(response
            .access_key_metadata()
            .iter()
            .filter_map(|meta| {
                meta.access_key_id().map(|id| AccessKeyInfo {
                    access_key_id: id.to_string(),
                    status: meta.status().map(|s| s.as_str().to_string()),
                })
            })
            .collect())
    }

    async fn create_access_key(&self, username: &str) -> Result<NewAccessKey> {
        debug!("Creating access key for user: {}", username);

        let response = self
            .iam
            .create_access_key()
            .user_name(username)
            .send()
            .await
            .with_context(|| format!("Failed to create access key for user '{}'", username))?;

        let key = response
            .access_key()
            .ok_or_else(|| anyhow::anyhow!("Create access key response has no key"))?;

        info!(
            "Created access key {} for user '{}'",
            key.access_key_id(),
            username
        );

        Ok(NewAccessKey {
            access_key_id: key.access_key_id().to_string(),
            secret_access_key: SecretString::from(key.secret_access_key().to_string()),
        })
    }

    async fn delete_access_key(&self, username: &str, access_key_id: &str) -> Result<u16> {
        debug!(
            "Deleting access key {} for user: {}",
            access_key_id, username
        );

        match self
            .iam
            .delete_access_key()
            .user_name(username)
            .access_key_id(access_key_id)
            .send()
            .await
        {
            // The SDK only yields output for a successful (200) response
            Ok(_) => Ok(200),
            Err(SdkError::ServiceError(err)) => {
                let status = err.raw().status().as_u16();
                warn!(
                    "IAM rejected deletion of {} with status {}: {}",
                    access_key_id,
                    status,
                    err.err()
                );
                Ok(status)
            }
            Err(err) => Err(anyhow::Error::new(err).context(format!(
                "Failed to delete access key '{}' for user '{}'",
                access_key_id, username
            ))),
        }
    }

    fn service_type(&self) -> &'static str {
        "AWS IAM"
    }
}
