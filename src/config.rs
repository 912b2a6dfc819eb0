use std::time::Duration;

use anyhow::Context;

use crate::cli::RemoteArgs;

const USER_AGENT: &str = concat!("photoroll/", env!("CARGO_PKG_VERSION"));

/// Validated runtime configuration.
pub struct Config {
    pub database_url: Option<String>,
    pub auth_token: Option<String>,
    pub mars_endpoint: String,
    pub picsum_endpoint: String,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("mars_endpoint", &self.mars_endpoint)
            .field("picsum_endpoint", &self.picsum_endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    pub fn from_cli(args: RemoteArgs) -> anyhow::Result<Self> {
        let database_url = args
            .database_url
            .as_deref()
            .map(|url| normalize_url("--database-url", url))
            .transpose()?;
        let auth_token = args.auth_token.filter(|t| !t.trim().is_empty());
        let mars_endpoint = normalize_url("--mars-endpoint", &args.mars_endpoint)?;
        let picsum_endpoint = normalize_url("--picsum-endpoint", &args.picsum_endpoint)?;
        let timeout = match args.timeout_secs {
            Some(0) => anyhow::bail!("--timeout-secs must be greater than zero"),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(Self {
            database_url,
            auth_token,
            mars_endpoint,
            picsum_endpoint,
            timeout,
        })
    }

    /// The datastore URL, required by every command that touches saved state.
    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No database configured. Pass --database-url or set PHOTOROLL_DATABASE_URL."
            )
        })
    }

    /// One HTTP client shared by the photo sources and the datastore.
    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().context("Failed to build HTTP client")
    }
}

/// Require an http(s) URL and drop trailing slashes.
fn normalize_url(flag: &str, url: &str) -> anyhow::Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() => Ok(trimmed.to_string()),
        Some(_) => anyhow::bail!("{} is missing a host: '{}'", flag, url),
        None => anyhow::bail!("{} must be an http(s) URL, got '{}'", flag, url),
    }
}
