//! Identity-management service abstraction
//!
//! The rotation phases only talk to this trait, so the AWS client can be swapped for an
//! in-memory fake in tests.

mod aws_iam;

pub use aws_iam::AwsIdentityClient;

use anyhow::Result;
use secrecy::SecretString;

/// Existing access key as listed by the identity service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyInfo {
    pub access_key_id: String,
    pub status: Option<String>,
}

/// Freshly issued access key pair
#[derive(Debug)]
pub struct NewAccessKey {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
}

/// Trait for identity services that own access keys
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// Canonical identifier (ARN) of the calling identity
    async fn caller_arn(&self) -> Result<String>;

    /// List every access key owned by a user
    async fn list_access_keys(&self, username: &str) -> Result<Vec<AccessKeyInfo>>;

    /// Issue a new access key for a user
    async fn create_access_key(&self, username: &str) -> Result<NewAccessKey>;

    /// Delete an access key, returning the HTTP status of the delete call
    async fn delete_access_key(&self, username: &str, access_key_id: &str) -> Result<u16>;

    /// Service name for display purposes
    fn service_type(&self) -> &'static str;
}
