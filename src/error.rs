use thiserror::Error;

/// Failures that halt a rotation run
#[derive(Error, Debug)]
pub enum RotationError {
    #[error("user {username} has {found} access key(s), expected exactly 1; cannot rotate")]
    PreconditionFailed { username: String, found: usize },

    #[error("new key failed to generate: user {username} has {found} access key(s), expected 2")]
    KeyCreationUnverified { username: String, found: usize },

    #[error("public key request for {store} failed with status {status}: {body}")]
    PublicKeyFetch {
        store: String,
        status: u16,
        body: String,
    },

    #[error("got status code {status} on updating {secret_name} in {store}")]
    UploadRejected {
        secret_name: String,
        store: String,
        status: u16,
    },

    #[error("deletion of original key {key_id} failed with status {status}")]
    DeleteFailed { key_id: String, status: u16 },

    #[error("identity service call '{operation}' failed")]
    Identity {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot derive a username from caller ARN '{0}'")]
    InvalidCallerArn(String),

    #[error("invalid store public key: {0}")]
    InvalidPublicKey(String),

    #[error("failed to seal secret value")]
    Sealing,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RotationError>;
