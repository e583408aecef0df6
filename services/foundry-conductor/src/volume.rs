// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Volume attach/detach operations
//!
//! Mutating operations take the node's exclusive reservation for their full
//! duration; the guard releases it on every exit path. Connection records
//! are persisted only once the backend confirms the attach and removed only
//! once it confirms the detach, so a failed remote call never leaves partial
//! state behind.
//!
//! The connector probe is deliberately best-effort: an unreachable backend
//! yields `None` with a logged error. Attach and detach never degrade this
//! way; a backend failure on a mutating call is an operation failure.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use foundry_types::{Node, VolumeConnection, VolumeConnector};

use crate::backend::{BackendError, StorageBackend};
use crate::inventory::{Inventory, InventoryError};
use crate::lock::{LockError, NodeLockManager};

/// Volume operation errors
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("connector not found: {0}")]
    ConnectorNotFound(Uuid),

    #[error("connector {connector_uuid} does not belong to node {node_uuid}")]
    ConnectorNodeMismatch {
        connector_uuid: Uuid,
        node_uuid: Uuid,
    },

    #[error("volume {volume_id} is already attached to node {node_uuid}")]
    AlreadyAttached { node_uuid: Uuid, volume_id: String },

    #[error("volume {volume_id} is not attached to node {node_uuid}")]
    NotAttached { node_uuid: Uuid, volume_id: String },

    #[error(transparent)]
    Locked(#[from] LockError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<InventoryError> for VolumeError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::AlreadyAttached {
                node_uuid,
                volume_id,
            } => VolumeError::AlreadyAttached {
                node_uuid,
                volume_id,
            },
            InventoryError::NotAttached {
                node_uuid,
                volume_id,
            } => VolumeError::NotAttached {
                node_uuid,
                volume_id,
            },
            // The remaining variants concern ports and never reach the
            // volume path.
            other => VolumeError::Backend(BackendError::Protocol(other.to_string())),
        }
    }
}

/// Storage attachment controller.
pub struct VolumeOps {
    inventory: Arc<Inventory>,
    locks: Arc<NodeLockManager>,
    /// Owner token used for node reservations (this conductor's host)
    owner: String,
}

impl VolumeOps {
    pub fn new(inventory: Arc<Inventory>, locks: Arc<NodeLockManager>, owner: String) -> Self {
        Self {
            inventory,
            locks,
            owner,
        }
    }

    /// Attach a volume to `node` through `backend`.
    ///
    /// Holds the node reservation across the backend call and the record
    /// insert. Duplicate attachment is a conflict, not a no-op.
    pub async fn attach(
        &self,
        backend: &dyn StorageBackend,
        node: &Node,
        volume_id: &str,
        connector_uuid: Uuid,
    ) -> Result<VolumeConnection, VolumeError> {
        let connector = self
            .inventory
            .connector(connector_uuid)
            .await
            .ok_or(VolumeError::ConnectorNotFound(connector_uuid))?;
        if connector.node_uuid != node.uuid {
            return Err(VolumeError::ConnectorNodeMismatch {
                connector_uuid,
                node_uuid: node.uuid,
            });
        }

        let _guard = self.locks.reserve(node.uuid, &self.owner)?;

        if self.inventory.connection(node.uuid, volume_id).await.is_some() {
            return Err(VolumeError::AlreadyAttached {
                node_uuid: node.uuid,
                volume_id: volume_id.to_string(),
            });
        }

        let ports = self.inventory.ports_of(node.uuid).await;
        let connection_info = backend
            .attach(node, &ports, volume_id, &connector_payload(&connector))
            .await?;

        let connection = VolumeConnection {
            node_uuid: node.uuid,
            volume_id: volume_id.to_string(),
            connector_uuid,
            connection_info,
            created_at: Utc::now(),
        };
        self.inventory.insert_connection(connection.clone()).await?;

        info!(
            node_id = %node.uuid,
            volume_id = %volume_id,
            connector_uuid = %connector_uuid,
            "Attached volume"
        );

        Ok(connection)
    }

    /// Detach a volume from `node` through `backend`.
    ///
    /// The connection record is removed only after the backend confirms the
    /// disconnect; re-invoking detach for a volume that is no longer
    /// attached fails with `NotAttached`.
    pub async fn detach(
        &self,
        backend: &dyn StorageBackend,
        node: &Node,
        volume_id: &str,
    ) -> Result<(), VolumeError> {
        let _guard = self.locks.reserve(node.uuid, &self.owner)?;

        let connection = self
            .inventory
            .connection(node.uuid, volume_id)
            .await
            .ok_or_else(|| VolumeError::NotAttached {
                node_uuid: node.uuid,
                volume_id: volume_id.to_string(),
            })?;

        let ports = self.inventory.ports_of(node.uuid).await;
        backend
            .detach(node, &ports, volume_id, &connection.connection_info)
            .await?;

        self.inventory.remove_connection(node.uuid, volume_id).await?;

        info!(node_id = %node.uuid, volume_id = %volume_id, "Detached volume");

        Ok(())
    }

    /// Best-effort connector probe.
    ///
    /// Returns `None` when the backend is unreachable or has no probe;
    /// protocol errors still propagate.
    pub async fn get_volume_connector(
        &self,
        backend: &dyn StorageBackend,
        node: &Node,
    ) -> Result<Option<Value>, VolumeError> {
        let ports = self.inventory.ports_of(node.uuid).await;
        match backend.get_volume_connector(node, &ports).await {
            Ok(connector) => Ok(Some(connector)),
            Err(e @ (BackendError::Unreachable(_) | BackendError::Unsupported(_))) => {
                error!(node_id = %node.uuid, error = %e, "Connector probe failed, returning none");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Serialize a connector record into the payload handed to backends.
fn connector_payload(connector: &VolumeConnector) -> Value {
    json!({
        "kind": connector.kind,
        "connector_id": connector.connector_id,
    })
}
