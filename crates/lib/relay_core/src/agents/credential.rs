//! Ambient credential resolution for the agent service.
//!
//! The relay holds no secrets of its own. A bearer token is taken from
//! whatever identity the process already runs under, trying in order:
//!
//! 1. `AZURE_AI_ACCESS_TOKEN` — a pre-issued token (local development)
//! 2. Managed identity — `IDENTITY_ENDPOINT` + `IDENTITY_HEADER`, as set by
//!    App Service and Functions hosts
//! 3. Azure CLI — `az account get-access-token`
//!
//! Tokens that report an expiry are cached until shortly before it.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

/// Resource (audience) the agent service accepts tokens for.
pub const AI_RESOURCE: &str = "https://ai.azure.com";

const STATIC_TOKEN_ENV: &str = "AZURE_AI_ACCESS_TOKEN";
const IDENTITY_ENDPOINT_ENV: &str = "IDENTITY_ENDPOINT";
const IDENTITY_HEADER_ENV: &str = "IDENTITY_HEADER";
const MANAGED_IDENTITY_API_VERSION: &str = "2019-08-01";

/// Refresh cached tokens this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Maximum time to wait for `az account get-access-token`.
const CLI_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the credential chain.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Managed identity token request failed: {0}")]
    ManagedIdentity(String),

    #[error("Azure CLI token request failed: {0}")]
    AzureCli(String),

    #[error("No credential available ({0})")]
    Unavailable(String),
}

/// A bearer token and, when known, the moment it stops being valid.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Option<SystemTime>,
}

impl AccessToken {
    /// Only tokens with a known expiry outside the refresh margin are reused.
    fn is_fresh(&self, now: SystemTime) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now + EXPIRY_MARGIN < expires_at)
    }
}

/// Token response from the App Service managed identity endpoint.
#[derive(Debug, Deserialize)]
struct ManagedIdentityToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
}

/// Output of `az account get-access-token --output json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default, rename = "expires_on")]
    expires_on: Option<serde_json::Value>,
}

/// Credential chain backed by the process environment.
pub struct AmbientCredential {
    http: reqwest::Client,
    resource: String,
    fixed: Option<String>,
    cached: Mutex<Option<AccessToken>>,
}

impl Default for AmbientCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl AmbientCredential {
    /// Credential chain for [`AI_RESOURCE`].
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            resource: AI_RESOURCE.to_string(),
            fixed: None,
            cached: Mutex::new(None),
        }
    }

    /// Credential that always yields `token`, skipping the chain.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            resource: AI_RESOURCE.to_string(),
            fixed: Some(token.into()),
            cached: Mutex::new(None),
        }
    }

    /// Returns a bearer token for the agent service.
    pub async fn token(&self) -> Result<String, CredentialError> {
        if let Some(token) = &self.fixed {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_fresh(SystemTime::now())
        {
            return Ok(token.token.clone());
        }

        let fresh = self.acquire().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn acquire(&self) -> Result<AccessToken, CredentialError> {
        if let Ok(token) = std::env::var(STATIC_TOKEN_ENV)
            && !token.is_empty()
        {
            debug!("using access token from {STATIC_TOKEN_ENV}");
            return Ok(AccessToken {
                token,
                expires_at: None,
            });
        }

        let mut failures = Vec::new();

        if let (Ok(endpoint), Ok(header)) = (
            std::env::var(IDENTITY_ENDPOINT_ENV),
            std::env::var(IDENTITY_HEADER_ENV),
        ) {
            match self.managed_identity(&endpoint, &header).await {
                Ok(token) => {
                    debug!("acquired access token from managed identity");
                    return Ok(token);
                }
                Err(e) => failures.push(e.to_string()),
            }
        } else {
            failures.push("managed identity not configured".to_string());
        }

        match self.azure_cli().await {
            Ok(token) => {
                debug!("acquired access token from Azure CLI");
                Ok(token)
            }
            Err(e) => {
                failures.push(e.to_string());
                Err(CredentialError::Unavailable(failures.join("; ")))
            }
        }
    }

    async fn managed_identity(
        &self,
        endpoint: &str,
        header: &str,
    ) -> Result<AccessToken, CredentialError> {
        let resp = self
            .http
            .get(endpoint)
            .query(&[
                ("resource", self.resource.as_str()),
                ("api-version", MANAGED_IDENTITY_API_VERSION),
            ])
            .header("X-IDENTITY-HEADER", header)
            .send()
            .await
            .map_err(|e| CredentialError::ManagedIdentity(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(CredentialError::ManagedIdentity(format!("{status} {body}")));
        }

        let token: ManagedIdentityToken = resp
            .json()
            .await
            .map_err(|e| CredentialError::ManagedIdentity(e.to_string()))?;

        Ok(AccessToken {
            token: token.access_token,
            expires_at: token.expires_on.as_ref().and_then(parse_expires_on),
        })
    }

    async fn azure_cli(&self) -> Result<AccessToken, CredentialError> {
        let output = timeout(
            CLI_TIMEOUT,
            Command::new("az")
                .args(["account", "get-access-token", "--output", "json"])
                .arg("--resource")
                .arg(&self.resource)
                .output(),
        )
        .await
        .map_err(|_| CredentialError::AzureCli(format!("timed out after {CLI_TIMEOUT:?}")))?
        .map_err(|e| CredentialError::AzureCli(format!("az not runnable: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CredentialError::AzureCli(stderr));
        }

        parse_cli_output(&output.stdout)
    }
}

fn parse_cli_output(stdout: &[u8]) -> Result<AccessToken, CredentialError> {
    let token: CliToken =
        serde_json::from_slice(stdout).map_err(|e| CredentialError::AzureCli(e.to_string()))?;
    Ok(AccessToken {
        token: token.access_token,
        expires_at: token.expires_on.as_ref().and_then(parse_expires_on),
    })
}

/// `expires_on` is unix seconds, sent as a number or a numeric string
/// depending on the issuer.
fn parse_expires_on(value: &serde_json::Value) -> Option<SystemTime> {
    let secs = match value {
        serde_json::Value::Number(n) => n.as_u64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    UNIX_EPOCH.checked_add(Duration::from_secs(secs))
}
