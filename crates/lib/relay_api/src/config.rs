//! API server configuration.

use std::time::Duration;

use relay_core::agents::client::DEFAULT_POLL_INTERVAL;

/// Environment variable holding the agent service project endpoint.
pub const PROJECT_ENDPOINT_ENV: &str = "AIProjectConnString";

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:7071").
    pub bind_addr: String,
    /// Agent service project endpoint. The relay route answers 500 while
    /// this is unset; the documentation routes keep working.
    pub project_endpoint: Option<String>,
    /// Delay between run status polls.
    pub run_poll_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7071".into(),
            project_endpoint: None,
            run_poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Treats a blank value the same as a missing one.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_endpoint_counts_as_missing() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("".into())), None);
        assert_eq!(non_empty(Some("   ".into())), None);
        assert_eq!(
            non_empty(Some("https://x.services.ai.azure.com/api/projects/p".into())).as_deref(),
            Some("https://x.services.ai.azure.com/api/projects/p")
        );
    }

    #[test]
    fn default_has_no_endpoint() {
        let config = ApiConfig::default();
        assert!(config.project_endpoint.is_none());
        assert_eq!(config.run_poll_interval, DEFAULT_POLL_INTERVAL);
    }
}
