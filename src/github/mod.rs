//! Secrets-hosting targets
//!
//! Two kinds of store receive the rotated key:
//! - repository Actions secrets
//! - organization Dependabot secrets (uploaded with private visibility)
//!
//! Both share one upload path; a `TargetStore` carries the endpoint and visibility
//! differences.

mod client;

pub use client::{GitHubClient, StorePublicKey, UploadOutcome};

use std::fmt;

/// Store scope enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Repository,
    Organization,
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreScope::Repository => f.write_str("repository"),
            StoreScope::Organization => f.write_str("organization"),
        }
    }
}

/// A secrets-hosting destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStore {
    pub scope: StoreScope,
    /// `owner/repo` for repositories, the organization login otherwise
    pub owner: String,
}

impl TargetStore {
    pub fn repository(owner_repo: impl Into<String>) -> Self {
        Self {
            scope: StoreScope::Repository,
            owner: owner_repo.into(),
        }
    }

    pub fn organization(org: impl Into<String>) -> Self {
        Self {
            scope: StoreScope::Organization,
            owner: org.into(),
        }
    }

    fn secrets_path(&self) -> String {
        match self.scope {
            StoreScope::Repository => format!("/repos/{}/actions/secrets", self.owner),
            StoreScope::Organization => format!("/orgs/{}/dependabot/secrets", self.owner),
        }
    }

    pub fn public_key_path(&self) -> String {
        format!("{}/public-key", self.secrets_path())
    }

    pub fn secret_path(&self, name: &str) -> String {
        format!("{}/{}", self.secrets_path(), name)
    }

    /// Visibility sent with uploads, if the store takes one
    pub fn visibility(&self) -> Option<&'static str> {
        match self.scope {
            StoreScope::Repository => None,
            StoreScope::Organization => Some("private"),
        }
    }
}

impl fmt::Display for TargetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.scope, self.owner)
    }
}
