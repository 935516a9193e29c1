//! AWS access key rotation
//!
//! Rotates the access key of a single IAM user and publishes the new key to a GitHub
//! repository's Actions secrets and an organization's Dependabot secrets before retiring
//! the old key.

pub mod cli;
pub mod config;
pub mod error;
pub mod github;
pub mod identity;
pub mod rotation;
pub mod sealing;

pub use config::Config;
pub use error::RotationError;
pub use identity::IdentityService;
pub use rotation::{rotate, RotationReport, RotationSettings, Stage};
