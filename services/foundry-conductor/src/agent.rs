// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Remote agent client
//!
//! HTTP client for the in-band agent running on a node. Commands are issued
//! against `http://{management_ip}:{listen_port}/{api_version}/volumes/{method}`,
//! where the management address comes from the node's management-network
//! port. Connection-level failures (agent process not listening, network
//! unreachable) are retried under an explicit [`RetryPolicy`]; everything
//! else (non-connection transport errors, undecodable response bodies) is
//! terminal and propagates immediately with full request/response context.
//!
//! The client returns the decoded JSON object verbatim. Interpreting the
//! embedded `command_result` / `command_error` pair is the caller's job.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use foundry_types::{Node, Port};

/// Agent invocation errors
#[derive(Debug, Error)]
pub enum AgentError {
    /// Connection-level failure; retried up to the policy's attempt budget.
    #[error("agent not available: {0}")]
    Unreachable(String),

    /// Request-level failure; never retried. Carries the full exchange for
    /// diagnosability.
    #[error("agent protocol error: {detail} (url={url}, body={body:?}, status={status:?})")]
    Protocol {
        url: String,
        body: Option<String>,
        status: Option<u16>,
        detail: String,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl AgentError {
    /// Whether this failure is transient and worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::Unreachable(_))
    }
}

/// Fixed-delay retry policy.
///
/// `max_retries` counts extra attempts after the first, so a policy with
/// `max_retries = N` makes at most `N + 1` attempts in total. Retrying is
/// gated on a caller-supplied predicate over the error; an error the
/// predicate rejects propagates immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Run `op`, retrying while `should_retry` accepts the error and
    /// attempts remain. The delay between attempts is fixed.
    pub async fn run<T, E, P, F, Fut>(&self, should_retry: P, mut op: F) -> Result<T, E>
    where
        P: Fn(&E) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_retries && should_retry(&error) => {
                    attempt += 1;
                    tokio::time::sleep(self.interval).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Configuration for the agent client, passed explicitly to the constructor.
#[derive(Debug, Clone)]
pub struct AgentClientConfig {
    /// Port the agents listen on
    pub listen_port: u16,
    /// API version path segment
    pub api_version: String,
    /// HTTP timeout for a single request
    pub timeout: Duration,
    /// Retry policy for connection-level failures
    pub retry: RetryPolicy,
}

/// HTTP client for node agents.
#[derive(Debug)]
pub struct AgentClient {
    client: reqwest::Client,
    config: AgentClientConfig,
}

impl AgentClient {
    pub fn new(config: AgentClientConfig) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Build the command URL for `method` on `node`.
    ///
    /// The agent is reached through the node's management network; a node
    /// with no management-network port is unreachable by definition, and no
    /// request is attempted.
    pub fn command_url(
        &self,
        node: &Node,
        ports: &[Port],
        method: &str,
    ) -> Result<String, AgentError> {
        let management_ip = ports
            .iter()
            .find_map(|p| p.management_ip.as_deref())
            .ok_or_else(|| {
                AgentError::Unreachable(format!(
                    "node {} has no management-network port",
                    node.uuid
                ))
            })?;

        Ok(format!(
            "http://{}:{}/{}/volumes/{}",
            management_ip, self.config.listen_port, self.config.api_version, method
        ))
    }

    /// Invoke an agent command.
    ///
    /// GET when `params` is absent, POST with form-encoded parameters
    /// otherwise. Returns the decoded response object verbatim.
    pub async fn invoke(
        &self,
        node: &Node,
        ports: &[Port],
        method: &str,
        params: Option<&[(String, String)]>,
    ) -> Result<Value, AgentError> {
        let url = self.command_url(node, ports, method)?;

        self.config
            .retry
            .run(AgentError::is_retryable, || {
                self.invoke_once(node, &url, method, params)
            })
            .await
    }

    async fn invoke_once(
        &self,
        node: &Node,
        url: &str,
        method: &str,
        params: Option<&[(String, String)]>,
    ) -> Result<Value, AgentError> {
        let request = match params {
            Some(form) => self.client.post(url).form(&form),
            None => self.client.get(url),
        };

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(url, params, e))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| AgentError::Protocol {
            url: url.to_string(),
            body: params_display(params),
            status: Some(status),
            detail: format!("failed to read response body: {}", e),
        })?;

        let result: Value =
            serde_json::from_str(&text).map_err(|_| AgentError::Protocol {
                url: url.to_string(),
                body: params_display(params),
                status: Some(status),
                detail: format!("unable to decode response as JSON: {:?}", text),
            })?;

        if !result.is_object() {
            return Err(AgentError::Protocol {
                url: url.to_string(),
                body: params_display(params),
                status: Some(status),
                detail: format!("agent response is not a JSON object: {:?}", text),
            });
        }

        tracing::debug!(
            node_id = %node.uuid,
            method = %method,
            status = status,
            command_result = ?result.get("command_result"),
            command_error = ?result.get("command_error"),
            "Agent command returned"
        );

        Ok(result)
    }
}

fn classify_transport(
    url: &str,
    params: Option<&[(String, String)]>,
    error: reqwest::Error,
) -> AgentError {
    if error.is_connect() {
        AgentError::Unreachable(error.to_string())
    } else {
        AgentError::Protocol {
            url: url.to_string(),
            body: params_display(params),
            status: error.status().map(|s| s.as_u16()),
            detail: format!("request failed: {}", error),
        }
    }
}

fn params_display(params: Option<&[(String, String)]>) -> Option<String> {
    params.map(|p| {
        p.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn retry_exhaustion_makes_max_retries_plus_one_attempts() {
        let policy = fast_policy(3);
        let mut attempts = 0u32;

        let result: Result<(), &str> = policy
            .run(
                |_| true,
                || {
                    attempts += 1;
                    async { Err("down") }
                },
            )
            .await;

        assert_eq!(result, Err("down"));
        assert_eq!(attempts, 4);
    }

    #[tokio::test]
    async fn success_on_attempt_k_makes_exactly_k_attempts() {
        let policy = fast_policy(5);
        let mut attempts = 0u32;

        let result: Result<u32, &str> = policy
            .run(
                |_| true,
                || {
                    attempts += 1;
                    let n = attempts;
                    async move { if n < 3 { Err("down") } else { Ok(n) } }
                },
            )
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_propagate_after_one_attempt() {
        let policy = fast_policy(5);
        let mut attempts = 0u32;

        let result: Result<(), &str> = policy
            .run(
                |e| *e == "transient",
                || {
                    attempts += 1;
                    async { Err("fatal") }
                },
            )
            .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn zero_retries_means_a_single_attempt() {
        let policy = fast_policy(0);
        let mut attempts = 0u32;

        let result: Result<(), &str> = policy
            .run(
                |_| true,
                || {
                    attempts += 1;
                    async { Err("down") }
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }
}
