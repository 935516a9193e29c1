//! CLI parsing and command execution
//!
//! The binary takes no options; everything is configured through the environment.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::config::Config;
use crate::github::{GitHubClient, UploadOutcome};
use crate::identity::AwsIdentityClient;
use crate::rotation::{self, RotationReport, RotationSettings};

const ENVIRONMENT_HELP: &str = "\
Environment:
  AWS_ACCESS_KEY_ID        Credential key of the identity being rotated
  AWS_SECRET_ACCESS_KEY    Credential secret of the identity being rotated
  AWS_SESSION_TOKEN        Optional session token
  AWS_REGION               SDK region [default: us-east-1]
  IAM_USERNAME             User to rotate [default: caller identity]
  PERSONAL_ACCESS_TOKEN    GitHub token allowed to write secrets
  OWNER_REPOSITORY         Repository receiving Actions secrets (owner/repo)
  OWNER_ORGANIZATION       Organization receiving Dependabot secrets
  GITHUB_ACCESS_KEY_NAME   Secret name for the key ID [default: access_key_id]
  GITHUB_SECRET_KEY_NAME   Secret name for the secret key [default: secret_key_id]
  GITHUB_API_URL           GitHub API base URL [default: https://api.github.com]
  KEY_ROTATOR_CONFIG       Optional TOML file used instead of the variables above";

#[derive(Parser)]
#[command(name = "rotate-keys")]
#[command(about = "Rotate an AWS IAM access key and publish it to GitHub secrets", long_about = None)]
#[command(version, after_help = ENVIRONMENT_HELP)]
pub struct Cli {}

/// Execute a rotation run
pub async fn execute(_cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let settings = RotationSettings::from_config(&config);

    let identity = AwsIdentityClient::new(&config.aws)
        .await
        .context("Failed to create AWS identity client")?;
    let github = GitHubClient::new(config.github.api_url.clone(), config.github.token)
        .context("Failed to create GitHub client")?;

    let report = rotation::rotate(&identity, &github, &settings).await?;
    print_report(&report);
    info!("Rotation complete");
    Ok(())
}

fn print_report(report: &RotationReport) {
    for upload in &report.uploads {
        let verb = match upload.outcome {
            UploadOutcome::Created => "Created",
            UploadOutcome::Updated => "Updated",
        };
        println!("{} {} in {}", verb, upload.secret_name, upload.store);
    }
    println!(
        "Rotated access key for {}: {} -> {}",
        report.username, report.retired_key_id, report.new_key_id
    );
}
