// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Storage backends
//!
//! A node's volume operations go through the [`StorageBackend`] selected at
//! registration time via [`foundry_types::StorageInterface`]: the in-band
//! agent on the node itself, or the external block-storage service. The
//! backends are composed, not subclassed; both classify failures into the
//! same unreachable/protocol/command taxonomy.

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

use foundry_types::{Node, Port};

use crate::agent::{AgentClient, AgentError, RetryPolicy};

/// Storage backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transient: the backend could not be reached after the retry budget.
    #[error("storage backend unreachable: {0}")]
    Unreachable(String),

    /// Terminal: malformed exchange with the backend.
    #[error("storage backend protocol error: {0}")]
    Protocol(String),

    /// The backend executed the command and reported a failure.
    #[error("storage command failed: {0}")]
    Command(String),

    /// The operation has no meaning for this backend.
    #[error("operation not supported by this backend: {0}")]
    Unsupported(String),

    /// The backend is not configured in this conductor.
    #[error("storage backend not configured: {0}")]
    NotConfigured(String),
}

impl From<AgentError> for BackendError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Unreachable(msg) => BackendError::Unreachable(msg),
            other => BackendError::Protocol(other.to_string()),
        }
    }
}

/// Volume operations a storage backend must provide.
///
/// `connector` is the node's registered host-side identity serialized as
/// JSON; `connection_info` on detach is the payload recorded when the
/// attachment was established.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Probe the connector identity the backend reports for the node.
    async fn get_volume_connector(
        &self,
        node: &Node,
        ports: &[Port],
    ) -> Result<Value, BackendError>;

    /// Attach `volume_id`, returning the connection payload to persist.
    async fn attach(
        &self,
        node: &Node,
        ports: &[Port],
        volume_id: &str,
        connector: &Value,
    ) -> Result<Value, BackendError>;

    /// Detach `volume_id`. Returns only once the backend confirms.
    async fn detach(
        &self,
        node: &Node,
        ports: &[Port],
        volume_id: &str,
        connection_info: &Value,
    ) -> Result<(), BackendError>;
}

// ============================================================================
// Agent backend
// ============================================================================

/// Storage backend driving the in-band agent on the node.
#[derive(Debug)]
pub struct AgentBackend {
    client: AgentClient,
}

impl AgentBackend {
    pub fn new(client: AgentClient) -> Self {
        Self { client }
    }

    /// Fail if the agent executed the command but reported an error.
    fn check_command_error(method: &str, result: &Value) -> Result<(), BackendError> {
        match result.get("command_error") {
            None | Some(Value::Null) => Ok(()),
            Some(error) => Err(BackendError::Command(format!(
                "agent command {} reported an error: {}",
                method, error
            ))),
        }
    }
}

#[async_trait]
impl StorageBackend for AgentBackend {
    async fn get_volume_connector(
        &self,
        node: &Node,
        ports: &[Port],
    ) -> Result<Value, BackendError> {
        let result = self
            .client
            .invoke(node, ports, "get_volume_connector", None)
            .await?;
        Self::check_command_error("get_volume_connector", &result)?;
        Ok(result
            .get("command_result")
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn attach(
        &self,
        node: &Node,
        ports: &[Port],
        volume_id: &str,
        connector: &Value,
    ) -> Result<Value, BackendError> {
        let params = [
            ("volume_id".to_string(), volume_id.to_string()),
            ("data".to_string(), connector.to_string()),
        ];
        let result = self
            .client
            .invoke(node, ports, "connect_volume", Some(&params[..]))
            .await?;
        Self::check_command_error("connect_volume", &result)?;

        // The connection payload lives under command_result.connection_info;
        // older agents return it as the whole command_result.
        let connection_info = result
            .pointer("/command_result/connection_info")
            .cloned()
            .or_else(|| result.get("command_result").cloned())
            .unwrap_or(Value::Null);

        Ok(connection_info)
    }

    async fn detach(
        &self,
        node: &Node,
        ports: &[Port],
        volume_id: &str,
        connection_info: &Value,
    ) -> Result<(), BackendError> {
        let params = [
            ("volume_id".to_string(), volume_id.to_string()),
            ("data".to_string(), connection_info.to_string()),
        ];
        let result = self
            .client
            .invoke(node, ports, "disconnect_volume", Some(&params[..]))
            .await?;
        Self::check_command_error("disconnect_volume", &result)
    }
}

// ============================================================================
// Cinder backend
// ============================================================================

/// Storage backend driving the external block-storage service.
///
/// Uses the volume-action endpoints (`initialize_connection` /
/// `terminate_connection`); failures classify exactly like the agent
/// backend's so callers see one taxonomy.
#[derive(Debug)]
pub struct CinderBackend {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl CinderBackend {
    pub fn new(
        base_url: String,
        timeout: std::time::Duration,
        retry: RetryPolicy,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Protocol(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            retry,
        })
    }

    async fn volume_action(&self, volume_id: &str, body: &Value) -> Result<Value, BackendError> {
        let url = format!(
            "{}/volumes/{}/action",
            self.base_url.trim_end_matches('/'),
            volume_id
        );

        self.retry
            .run(
                |e: &BackendError| matches!(e, BackendError::Unreachable(_)),
                || self.volume_action_once(&url, body),
            )
            .await
    }

    async fn volume_action_once(&self, url: &str, body: &Value) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    BackendError::Unreachable(e.to_string())
                } else {
                    BackendError::Protocol(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let value: Value = response.json().await.map_err(|e| {
            BackendError::Protocol(format!(
                "unable to decode response as JSON (url={}, status={}): {}",
                url, status, e
            ))
        })?;

        if !status.is_success() {
            return Err(BackendError::Command(format!(
                "block-storage service returned {}: {}",
                status, value
            )));
        }

        Ok(value)
    }
}

#[async_trait]
impl StorageBackend for CinderBackend {
    async fn get_volume_connector(
        &self,
        node: &Node,
        _ports: &[Port],
    ) -> Result<Value, BackendError> {
        Err(BackendError::Unsupported(format!(
            "node {} has no in-band connector probe",
            node.uuid
        )))
    }

    async fn attach(
        &self,
        _node: &Node,
        _ports: &[Port],
        volume_id: &str,
        connector: &Value,
    ) -> Result<Value, BackendError> {
        let body = json!({ "initialize_connection": { "connector": connector } });
        let result = self.volume_action(volume_id, &body).await?;
        Ok(result
            .get("connection_info")
            .cloned()
            .unwrap_or(result))
    }

    async fn detach(
        &self,
        _node: &Node,
        _ports: &[Port],
        volume_id: &str,
        connector: &Value,
    ) -> Result<(), BackendError> {
        let body = json!({ "terminate_connection": { "connector": connector } });
        self.volume_action(volume_id, &body).await?;
        Ok(())
    }
}
