// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! API context for the conductor

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use foundry_types::{
    CreateConnectorRequest, CreateNodeRequest, CreatePortGroupRequest, CreatePortRequest, Node,
    Port, PortGroup, StorageInterface, UpdatePortRequest, VolumeConnection, VolumeConnector,
};

use crate::agent::{AgentClient, AgentClientConfig, RetryPolicy};
use crate::backend::{AgentBackend, BackendError, CinderBackend, StorageBackend};
use crate::config::ConductorConfig;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::inventory::{Inventory, InventoryError};
use crate::lock::NodeLockManager;
use crate::ports::{PortError, PortOps};
use crate::volume::{VolumeError, VolumeOps};

/// Faults surfaced by the API context, aggregated for HTTP mapping.
#[derive(Debug, Error)]
pub enum ConductorError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The node is owned by a different conductor and no forwarding bus is
    /// configured.
    #[error("node is managed by {topic}, not this conductor")]
    WrongConductor { topic: String },
}

/// API context shared across all request handlers
pub struct ApiContext {
    config: ConductorConfig,
    inventory: Arc<Inventory>,
    locks: Arc<NodeLockManager>,
    dispatcher: Dispatcher,
    volumes: VolumeOps,
    ports: PortOps,
    agent_backend: AgentBackend,
    cinder_backend: Option<CinderBackend>,
}

impl ApiContext {
    /// Create a new API context
    pub fn new(config: ConductorConfig) -> Result<Self> {
        let inventory = Arc::new(Inventory::new());
        let locks = Arc::new(NodeLockManager::new());
        let dispatcher = Dispatcher::new(Arc::clone(&inventory));

        let retry = RetryPolicy::new(config.agent_retry_max, config.agent_retry_interval);
        let agent_client = AgentClient::new(AgentClientConfig {
            listen_port: config.agent_listen_port,
            api_version: config.agent_api_version.clone(),
            timeout: config.agent_timeout,
            retry: retry.clone(),
        })?;
        let agent_backend = AgentBackend::new(agent_client);

        let cinder_backend = match &config.block_storage_url {
            Some(url) => Some(CinderBackend::new(
                url.clone(),
                config.agent_timeout,
                retry,
            )?),
            None => None,
        };

        let volumes = VolumeOps::new(
            Arc::clone(&inventory),
            Arc::clone(&locks),
            config.host.clone(),
        );
        let ports = PortOps::new(
            Arc::clone(&inventory),
            Arc::clone(&locks),
            config.host.clone(),
        );

        Ok(Self {
            config,
            inventory,
            locks,
            dispatcher,
            volumes,
            ports,
            agent_backend,
            cinder_backend,
        })
    }

    /// The reservation manager (exposed for tests and liveness sweeps).
    pub fn locks(&self) -> &Arc<NodeLockManager> {
        &self.locks
    }

    /// The record store (exposed for tests and external sync tooling).
    pub fn inventory(&self) -> &Arc<Inventory> {
        &self.inventory
    }

    fn backend_for(&self, node: &Node) -> Result<&dyn StorageBackend, ConductorError> {
        match node.storage_interface {
            StorageInterface::Agent => Ok(&self.agent_backend),
            StorageInterface::Cinder => self
                .cinder_backend
                .as_ref()
                .map(|b| b as &dyn StorageBackend)
                .ok_or_else(|| {
                    ConductorError::Backend(BackendError::NotConfigured(
                        "no block-storage service configured (BLOCK_STORAGE_URL)".to_string(),
                    ))
                }),
        }
    }

    /// Resolve an identifier to a node record, with the current reservation
    /// holder filled in. Does not check ownership; used for reads.
    async fn lookup_node(&self, ident: &str) -> Result<Node, ConductorError> {
        let (mut node, _topic) = self.dispatcher.topic_for(ident).await?;
        node.reservation = self.locks.holder(node.uuid);
        Ok(node)
    }

    /// Resolve an identifier to a node this conductor owns. Operations that
    /// act on the node (mutations, agent calls) route through here; a node
    /// owned elsewhere cannot be served without a forwarding bus.
    async fn resolve_owned(&self, ident: &str) -> Result<Node, ConductorError> {
        let (node, topic) = self.dispatcher.topic_for(ident).await?;
        if topic != self.config.topic() {
            return Err(ConductorError::WrongConductor { topic });
        }
        Ok(node)
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    pub async fn create_node(&self, req: CreateNodeRequest) -> Result<Node, ConductorError> {
        let node = Node {
            uuid: Uuid::new_v4(),
            name: req.name,
            conductor: self.config.host.clone(),
            storage_interface: req.storage_interface,
            reservation: None,
            created_at: Utc::now(),
        };
        self.inventory.insert_node(node.clone()).await?;

        tracing::info!(node_id = %node.uuid, name = %node.name, "Registered node");

        Ok(node)
    }

    pub async fn list_nodes(&self) -> Vec<Node> {
        let mut nodes = self.inventory.list_nodes().await;
        for node in &mut nodes {
            node.reservation = self.locks.holder(node.uuid);
        }
        nodes
    }

    pub async fn get_node(&self, ident: &str) -> Result<Node, ConductorError> {
        self.lookup_node(ident).await
    }

    // ------------------------------------------------------------------
    // Volumes
    // ------------------------------------------------------------------

    pub async fn attach_volume(
        &self,
        ident: &str,
        volume_id: &str,
        connector_uuid: Uuid,
    ) -> Result<VolumeConnection, ConductorError> {
        let node = self.resolve_owned(ident).await?;
        let backend = self.backend_for(&node)?;
        Ok(self
            .volumes
            .attach(backend, &node, volume_id, connector_uuid)
            .await?)
    }

    pub async fn detach_volume(&self, ident: &str, volume_id: &str) -> Result<(), ConductorError> {
        let node = self.resolve_owned(ident).await?;
        let backend = self.backend_for(&node)?;
        Ok(self.volumes.detach(backend, &node, volume_id).await?)
    }

    pub async fn get_volume_connector(
        &self,
        ident: &str,
    ) -> Result<Option<Value>, ConductorError> {
        let node = self.resolve_owned(ident).await?;
        let backend = self.backend_for(&node)?;
        Ok(self.volumes.get_volume_connector(backend, &node).await?)
    }

    pub async fn list_volume_connections(
        &self,
        ident: &str,
    ) -> Result<Vec<VolumeConnection>, ConductorError> {
        let node = self.lookup_node(ident).await?;
        Ok(self.inventory.connections_of(node.uuid).await)
    }

    pub async fn create_connector(
        &self,
        ident: &str,
        req: CreateConnectorRequest,
    ) -> Result<VolumeConnector, ConductorError> {
        let node = self.lookup_node(ident).await?;
        let connector = VolumeConnector {
            uuid: Uuid::new_v4(),
            node_uuid: node.uuid,
            kind: req.kind,
            connector_id: req.connector_id,
        };
        self.inventory.insert_connector(connector.clone()).await;

        tracing::info!(
            connector_uuid = %connector.uuid,
            node_id = %node.uuid,
            kind = %connector.kind,
            "Registered volume connector"
        );

        Ok(connector)
    }

    pub async fn list_connectors(
        &self,
        ident: &str,
    ) -> Result<Vec<VolumeConnector>, ConductorError> {
        let node = self.lookup_node(ident).await?;
        Ok(self.inventory.connectors_of(node.uuid).await)
    }

    // ------------------------------------------------------------------
    // Ports
    // ------------------------------------------------------------------

    pub async fn create_port(&self, req: CreatePortRequest) -> Result<Port, ConductorError> {
        Ok(self.ports.create_port(req).await?)
    }

    pub async fn list_ports(&self) -> Vec<Port> {
        self.inventory.list_ports().await
    }

    pub async fn get_port(&self, port_uuid: Uuid) -> Result<Port, ConductorError> {
        self.inventory
            .port(port_uuid)
            .await
            .ok_or(ConductorError::Port(PortError::NotFound(port_uuid)))
    }

    pub async fn update_port(
        &self,
        port_uuid: Uuid,
        req: UpdatePortRequest,
    ) -> Result<Port, ConductorError> {
        Ok(self.ports.update_port(port_uuid, req).await?)
    }

    pub async fn delete_port(&self, port_uuid: Uuid) -> Result<(), ConductorError> {
        Ok(self.ports.delete_port(port_uuid).await?)
    }

    pub async fn create_portgroup(
        &self,
        req: CreatePortGroupRequest,
    ) -> Result<PortGroup, ConductorError> {
        Ok(self.ports.create_portgroup(req).await?)
    }
}
