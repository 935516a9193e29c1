use secrecy::ExposeSecret;
use std::fmt;
use tracing::{debug, error, info};

use crate::config::{Config, SecretNames};
use crate::error::{Result, RotationError};
use crate::github::{GitHubClient, TargetStore, UploadOutcome};
use crate::identity::{IdentityService, NewAccessKey};
use crate::sealing;

const KEYS_BEFORE_ROTATION: usize = 1;
const KEYS_AFTER_CREATION: usize = 2;
const DELETE_SUCCESS_STATUS: u16 = 200;

/// Progress of a rotation run; each variant is reached only after the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    IdentityResolved,
    PreconditionOk,
    NewKeyCreated,
    RepoSecretsUploaded,
    OrgSecretsUploaded,
    OldKeyDeleted,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::IdentityResolved => "identity resolved",
            Stage::PreconditionOk => "precondition ok",
            Stage::NewKeyCreated => "new key created",
            Stage::RepoSecretsUploaded => "repository secrets uploaded",
            Stage::OrgSecretsUploaded => "organization secrets uploaded",
            Stage::OldKeyDeleted => "old key deleted",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a rotation run needs besides its clients
#[derive(Debug, Clone)]
pub struct RotationSettings {
    pub iam_username: Option<String>,
    pub repository: String,
    pub organization: String,
    pub secret_names: SecretNames,
}

impl RotationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            iam_username: config.iam_username.clone(),
            repository: config.github.repository.clone(),
            organization: config.github.organization.clone(),
            secret_names: config.secret_names.clone(),
        }
    }
}

/// One accepted secret upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub store: TargetStore,
    pub secret_name: String,
    pub outcome: UploadOutcome,
}

/// Summary of a completed rotation; holds no secret material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    pub username: String,
    pub retired_key_id: String,
    pub new_key_id: String,
    pub uploads: Vec<UploadRecord>,
}

fn identity_error(operation: &'static str) -> impl FnOnce(anyhow::Error) -> RotationError {
    move |source| RotationError::Identity { operation, source }
}

/// Extract the username from the last path segment of an ARN
pub fn username_from_arn(arn: &str) -> Result<String> {
    match arn.rsplit('/').next() {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(RotationError::InvalidCallerArn(arn.to_string())),
    }
}

/// Use the explicit username if given, otherwise ask the identity service who we are
pub async fn resolve_username(
    identity: &dyn IdentityService,
    explicit: Option<&str>,
) -> Result<String> {
    if let Some(username) = explicit {
        debug!("Using configured username: {}", username);
        return Ok(username.to_string());
    }

    let arn = identity
        .caller_arn()
        .await
        .map_err(identity_error("get caller identity"))?;
    username_from_arn(&arn)
}

/// Require exactly one existing key and return its ID
pub async fn check_precondition(identity: &dyn IdentityService, username: &str) -> Result<String> {
    let keys = identity
        .list_access_keys(username)
        .await
        .map_err(identity_error("list access keys"))?;

    if keys.len() != KEYS_BEFORE_ROTATION {
        return Err(RotationError::PreconditionFailed {
            username: username.to_string(),
            found: keys.len(),
        });
    }

    let current = &keys[0];
    debug!(
        "Current access key {} has status {}",
        current.access_key_id,
        current.status.as_deref().unwrap_or("unknown")
    );
    info!("Found a single access key for user: {}, proceeding", username);
    Ok(current.access_key_id.clone())
}

/// Create a new key and confirm the user now holds exactly two
pub async fn generate_key(identity: &dyn IdentityService, username: &str) -> Result<NewAccessKey> {
    let new_key = identity
        .create_access_key(username)
        .await
        .map_err(identity_error("create access key"))?;

    let found = identity
        .list_access_keys(username)
        .await
        .map_err(identity_error("list access keys"))?
        .len();

    if found != KEYS_AFTER_CREATION {
        return Err(RotationError::KeyCreationUnverified {
            username: username.to_string(),
            found,
        });
    }

    info!(
        "Created access key {} for user: {}",
        new_key.access_key_id, username
    );
    Ok(new_key)
}

/// Values sealed under one store's public key, ready to upload
#[derive(Debug, Clone)]
pub struct SealedSecrets {
    pub store: TargetStore,
    /// ID of the public key the values were sealed with
    pub key_id: String,
    /// (secret name, base64 ciphertext) in upload order
    pub values: Vec<(String, String)>,
}

/// Fetch the store's public key and seal both halves of the key under it
pub async fn seal_for_store(
    github: &GitHubClient,
    store: &TargetStore,
    names: &SecretNames,
    key: &NewAccessKey,
) -> Result<SealedSecrets> {
    let public_key = github.public_key(store).await?;

    let values = vec![
        (
            names.access_key.clone(),
            sealing::seal(&public_key.key, &key.access_key_id)?,
        ),
        (
            names.secret_key.clone(),
            sealing::seal(&public_key.key, key.secret_access_key.expose_secret())?,
        ),
    ];

    debug!("Sealed {} values for {}", values.len(), store);
    Ok(SealedSecrets {
        store: store.clone(),
        key_id: public_key.key_id,
        values,
    })
}

/// Upload previously sealed values, stopping at the first rejection
pub async fn upload_sealed(
    github: &GitHubClient,
    sealed: &SealedSecrets,
) -> Result<Vec<UploadRecord>> {
    let mut uploads = Vec::with_capacity(sealed.values.len());
    for (name, value) in &sealed.values {
        let outcome = github
            .put_secret(&sealed.store, name, value, &sealed.key_id)
            .await?;
        uploads.push(UploadRecord {
            store: sealed.store.clone(),
            secret_name: name.clone(),
            outcome,
        });
    }

    Ok(uploads)
}

/// Delete the key that was active before rotation
pub async fn retire_old_key(
    identity: &dyn IdentityService,
    username: &str,
    old_key_id: &str,
) -> Result<()> {
    let status = identity
        .delete_access_key(username, old_key_id)
        .await
        .map_err(identity_error("delete access key"))?;

    if status != DELETE_SUCCESS_STATUS {
        return Err(RotationError::DeleteFailed {
            key_id: old_key_id.to_string(),
            status,
        });
    }

    info!("Deleted original key {}", old_key_id);
    Ok(())
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!("Rotation stage: {} -> {}", stage, next);
    *stage = next;
}

/// Run every phase in order, stopping at the first failure
pub async fn rotate(
    identity: &dyn IdentityService,
    github: &GitHubClient,
    settings: &RotationSettings,
) -> Result<RotationReport> {
    let mut stage = Stage::Start;
    let result = run_phases(identity, github, settings, &mut stage).await;

    if let Err(ref e) = result {
        error!("Rotation failed after stage '{}': {}", stage, e);
    }
    result
}

async fn run_phases(
    identity: &dyn IdentityService,
    github: &GitHubClient,
    settings: &RotationSettings,
    stage: &mut Stage,
) -> Result<RotationReport> {
    info!("Rotating access key via {}", identity.service_type());

    let username = resolve_username(identity, settings.iam_username.as_deref()).await?;
    info!("Rotating access key for user: {}", username);
    advance(stage, Stage::IdentityResolved);

    let old_key_id = check_precondition(identity, &username).await?;
    debug!("Captured key {} for retirement", old_key_id);
    advance(stage, Stage::PreconditionOk);

    let new_key = generate_key(identity, &username).await?;
    advance(stage, Stage::NewKeyCreated);

    // Seal for both stores before the first upload
    let organization = TargetStore::organization(&settings.organization);
    let repository = TargetStore::repository(&settings.repository);
    let org_sealed =
        seal_for_store(github, &organization, &settings.secret_names, &new_key).await?;
    let repo_sealed =
        seal_for_store(github, &repository, &settings.secret_names, &new_key).await?;

    let mut uploads = upload_sealed(github, &repo_sealed).await?;
    advance(stage, Stage::RepoSecretsUploaded);

    uploads.extend(upload_sealed(github, &org_sealed).await?);
    advance(stage, Stage::OrgSecretsUploaded);

    retire_old_key(identity, &username, &old_key_id).await?;
    advance(stage, Stage::OldKeyDeleted);

    advance(stage, Stage::Done);
    info!("Successfully rotated access key for {}", username);

    Ok(RotationReport {
        username,
        retired_key_id: old_key_id,
        new_key_id: new_key.access_key_id,
        uploads,
    })
}
