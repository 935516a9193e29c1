use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Environment variable naming an optional TOML configuration file
pub const CONFIG_PATH_VAR: &str = "KEY_ROTATOR_CONFIG";

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug)]
pub struct Config {
    pub aws: AwsConfig,
    pub github: GithubConfig,
    /// Explicit principal; when absent the caller identity is looked up
    pub iam_username: Option<String>,
    pub secret_names: SecretNames,
}

#[derive(Debug)]
pub struct AwsConfig {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
    pub region: String,
}

#[derive(Debug)]
pub struct GithubConfig {
    pub token: SecretString,
    pub repository: String,
    pub organization: String,
    pub api_url: String,
}

/// Names the rotated values are stored under in every target store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecretNames {
    #[serde(default = "default_access_key_name")]
    pub access_key: String,
    #[serde(default = "default_secret_key_name")]
    pub secret_key: String,
}

fn default_access_key_name() -> String {
    "access_key_id".to_string()
}

fn default_secret_key_name() -> String {
    "secret_key_id".to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            access_key: default_access_key_name(),
            secret_key: default_secret_key_name(),
        }
    }
}

// On-disk layout; converted into `Config` so secrets are wrapped right after parsing.
#[derive(Deserialize)]
struct ConfigFile {
    aws: AwsSection,
    github: GithubSection,
    iam_username: Option<String>,
    #[serde(default)]
    secret_names: SecretNames,
}

#[derive(Deserialize)]
struct AwsSection {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    #[serde(default = "default_region")]
    region: String,
}

#[derive(Deserialize)]
struct GithubSection {
    token: String,
    repository: String,
    organization: String,
    #[serde(default = "default_github_api_url")]
    api_url: String,
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        Self {
            aws: AwsConfig {
                access_key_id: file.aws.access_key_id,
                secret_access_key: SecretString::from(file.aws.secret_access_key),
                session_token: file.aws.session_token.map(SecretString::from),
                region: file.aws.region,
            },
            github: GithubConfig {
                token: SecretString::from(file.github.token),
                repository: file.github.repository,
                organization: file.github.organization,
                api_url: file.github.api_url,
            },
            iam_username: file.iam_username,
            secret_names: file.secret_names,
        }
    }
}

impl Config {
    /// Load from the file named by `KEY_ROTATOR_CONFIG`, falling back to the environment
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.is_empty() => Self::from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path)),
            _ => Self::from_env().context("Failed to load config from environment"),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let file: ConfigFile = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(file.into())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from any variable source; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let require = |name: &str| {
            get(name).with_context(|| format!("{} environment variable not set", name))
        };

        let aws = AwsConfig {
            access_key_id: require("AWS_ACCESS_KEY_ID")?,
            secret_access_key: SecretString::from(require("AWS_SECRET_ACCESS_KEY")?),
            session_token: get("AWS_SESSION_TOKEN").map(SecretString::from),
            region: get("AWS_REGION").unwrap_or_else(default_region),
        };

        let github = GithubConfig {
            token: SecretString::from(require("PERSONAL_ACCESS_TOKEN")?),
            repository: require("OWNER_REPOSITORY")?,
            organization: require("OWNER_ORGANIZATION")?,
            api_url: get("GITHUB_API_URL").unwrap_or_else(default_github_api_url),
        };

        let secret_names = SecretNames {
            access_key: get("GITHUB_ACCESS_KEY_NAME").unwrap_or_else(default_access_key_name),
            secret_key: get("GITHUB_SECRET_KEY_NAME").unwrap_or_else(default_secret_key_name),
        };

        Ok(Self {
            aws,
            github,
            iam_username: get("IAM_USERNAME"),
            secret_names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;

    fn required_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("AWS_ACCESS_KEY_ID", "AKIA_OLD"),
            ("AWS_SECRET_ACCESS_KEY", "old-secret"),
            ("PERSONAL_ACCESS_TOKEN", "ghp_token"),
            ("OWNER_REPOSITORY", "org/repo"),
            ("OWNER_ORGANIZATION", "org"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = load(&required_vars()).unwrap();

        assert_eq!(config.aws.access_key_id, "AKIA_OLD");
        assert_eq!(config.aws.secret_access_key.expose_secret(), "old-secret");
        assert!(config.aws.session_token.is_none());
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.repository, "org/repo");
        assert_eq!(config.github.organization, "org");
        assert!(config.iam_username.is_none());
        assert_eq!(config.secret_names, SecretNames::default());
        assert_eq!(config.secret_names.access_key, "access_key_id");
        assert_eq!(config.secret_names.secret_key, "secret_key_id");
    }

    #[test]
    fn test_from_lookup_overrides() {
        let mut vars = required_vars();
        vars.insert("AWS_SESSION_TOKEN", "session");
        vars.insert("IAM_USERNAME", "svc-bot");
        vars.insert("GITHUB_ACCESS_KEY_NAME", "AWS_KEY");
        vars.insert("GITHUB_SECRET_KEY_NAME", "AWS_SECRET");
        vars.insert("GITHUB_API_URL", "http://localhost:1234");

        let config = load(&vars).unwrap();

        assert_eq!(
            config.aws.session_token.as_ref().map(|t| t.expose_secret()),
            Some("session")
        );
        assert_eq!(config.iam_username.as_deref(), Some("svc-bot"));
        assert_eq!(config.secret_names.access_key, "AWS_KEY");
        assert_eq!(config.secret_names.secret_key, "AWS_SECRET");
        assert_eq!(config.github.api_url, "http://localhost:1234");
    }

    #[test]
    fn test_from_lookup_missing_required() {
        let mut vars = required_vars();
        vars.remove("PERSONAL_ACCESS_TOKEN");

        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("PERSONAL_ACCESS_TOKEN"));
    }

    #[test]
    fn test_from_lookup_empty_counts_as_unset() {
        let mut vars = required_vars();
        vars.insert("IAM_USERNAME", "");

        let config = load(&vars).unwrap();
        assert!(config.iam_username.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&required_vars()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("old-secret"));
        assert!(!rendered.contains("ghp_token"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
iam_username = "svc-bot"

[aws]
access_key_id = "AKIA_OLD"
secret_access_key = "old-secret"

[github]
token = "ghp_token"
repository = "org/repo"
organization = "org"

[secret_names]
access_key = "AWS_KEY"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.iam_username.as_deref(), Some("svc-bot"));
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.github.token.expose_secret(), "ghp_token");
        assert_eq!(config.secret_names.access_key, "AWS_KEY");
        assert_eq!(config.secret_names.secret_key, "secret_key_id");
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
