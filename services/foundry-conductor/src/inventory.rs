// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! In-process record store
//!
//! The conductor's working set of nodes, ports, port groups, volume
//! connectors and established volume connections. Records are keyed by UUID
//! with secondary indexes on node name and port MAC address; the durable
//! store behind the conductor is an external collaborator.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use foundry_types::{Node, Port, PortGroup, VolumeConnection, VolumeConnector};

/// Record store errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("node name already exists: {0}")]
    DuplicateNodeName(String),

    #[error("port address already exists: {0}")]
    DuplicateAddress(String),

    #[error("portgroup name already exists on node {node_uuid}: {name}")]
    DuplicatePortGroupName { node_uuid: Uuid, name: String },

    #[error("port not found: {0}")]
    PortNotFound(Uuid),

    #[error("volume {volume_id} is already attached to node {node_uuid}")]
    AlreadyAttached { node_uuid: Uuid, volume_id: String },

    #[error("volume {volume_id} is not attached to node {node_uuid}")]
    NotAttached { node_uuid: Uuid, volume_id: String },
}

#[derive(Debug, Default)]
struct Records {
    nodes: HashMap<Uuid, Node>,
    node_names: HashMap<String, Uuid>,
    ports: HashMap<Uuid, Port>,
    port_addresses: HashMap<String, Uuid>,
    portgroups: HashMap<Uuid, PortGroup>,
    connectors: HashMap<Uuid, VolumeConnector>,
    connections: HashMap<(Uuid, String), VolumeConnection>,
}

/// Conductor-local inventory of managed records.
#[derive(Debug, Default)]
pub struct Inventory {
    records: RwLock<Records>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    pub async fn insert_node(&self, node: Node) -> Result<(), InventoryError> {
        let mut records = self.records.write().await;
        if records.node_names.contains_key(&node.name) {
            return Err(InventoryError::DuplicateNodeName(node.name));
        }
        records.node_names.insert(node.name.clone(), node.uuid);
        records.nodes.insert(node.uuid, node);
        Ok(())
    }

    pub async fn node_by_uuid(&self, uuid: Uuid) -> Option<Node> {
        self.records.read().await.nodes.get(&uuid).cloned()
    }

    pub async fn node_by_name(&self, name: &str) -> Option<Node> {
        let records = self.records.read().await;
        records
            .node_names
            .get(name)
            .and_then(|uuid| records.nodes.get(uuid))
            .cloned()
    }

    pub async fn list_nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<_> = self.records.read().await.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        nodes
    }

    // ------------------------------------------------------------------
    // Ports
    // ------------------------------------------------------------------

    pub async fn insert_port(&self, port: Port) -> Result<(), InventoryError> {
        let mut records = self.records.write().await;
        if records.port_addresses.contains_key(&port.address) {
            return Err(InventoryError::DuplicateAddress(port.address));
        }
        records.port_addresses.insert(port.address.clone(), port.uuid);
        records.ports.insert(port.uuid, port);
        Ok(())
    }

    /// Replace a port record, keeping the address index consistent.
    pub async fn replace_port(&self, port: Port) -> Result<(), InventoryError> {
        let mut records = self.records.write().await;
        let old = records
            .ports
            .get(&port.uuid)
            .cloned()
            .ok_or(InventoryError::PortNotFound(port.uuid))?;

        if port.address != old.address {
            if records.port_addresses.contains_key(&port.address) {
                return Err(InventoryError::DuplicateAddress(port.address));
            }
            records.port_addresses.remove(&old.address);
            records.port_addresses.insert(port.address.clone(), port.uuid);
        }
        records.ports.insert(port.uuid, port);
        Ok(())
    }

    pub async fn remove_port(&self, uuid: Uuid) -> Result<Port, InventoryError> {
        let mut records = self.records.write().await;
        let port = records
            .ports
            .remove(&uuid)
            .ok_or(InventoryError::PortNotFound(uuid))?;
        records.port_addresses.remove(&port.address);
        Ok(port)
    }

    pub async fn port(&self, uuid: Uuid) -> Option<Port> {
        self.records.read().await.ports.get(&uuid).cloned()
    }

    pub async fn list_ports(&self) -> Vec<Port> {
        let mut ports: Vec<_> = self.records.read().await.ports.values().cloned().collect();
        ports.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        ports
    }

    pub async fn ports_of(&self, node_uuid: Uuid) -> Vec<Port> {
        let mut ports: Vec<_> = self
            .records
            .read()
            .await
            .ports
            .values()
            .filter(|p| p.node_uuid == node_uuid)
            .cloned()
            .collect();
        ports.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        ports
    }

    // ------------------------------------------------------------------
    // Port groups
    // ------------------------------------------------------------------

    pub async fn insert_portgroup(&self, group: PortGroup) -> Result<(), InventoryError> {
        let mut records = self.records.write().await;
        let duplicate = records
            .portgroups
            .values()
            .any(|g| g.node_uuid == group.node_uuid && g.name == group.name);
        if duplicate {
            return Err(InventoryError::DuplicatePortGroupName {
                node_uuid: group.node_uuid,
                name: group.name,
            });
        }
        records.portgroups.insert(group.uuid, group);
        Ok(())
    }

    pub async fn portgroup(&self, uuid: Uuid) -> Option<PortGroup> {
        self.records.read().await.portgroups.get(&uuid).cloned()
    }

    // ------------------------------------------------------------------
    // Volume connectors
    // ------------------------------------------------------------------

    pub async fn insert_connector(&self, connector: VolumeConnector) {
        self.records
            .write()
            .await
            .connectors
            .insert(connector.uuid, connector);
    }

    pub async fn connector(&self, uuid: Uuid) -> Option<VolumeConnector> {
        self.records.read().await.connectors.get(&uuid).cloned()
    }

    pub async fn connectors_of(&self, node_uuid: Uuid) -> Vec<VolumeConnector> {
        self.records
            .read()
            .await
            .connectors
            .values()
            .filter(|c| c.node_uuid == node_uuid)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Volume connections
    // ------------------------------------------------------------------

    pub async fn insert_connection(
        &self,
        connection: VolumeConnection,
    ) -> Result<(), InventoryError> {
        let mut records = self.records.write().await;
        let key = (connection.node_uuid, connection.volume_id.clone());
        if records.connections.contains_key(&key) {
            return Err(InventoryError::AlreadyAttached {
                node_uuid: connection.node_uuid,
                volume_id: connection.volume_id,
            });
        }
        records.connections.insert(key, connection);
        Ok(())
    }

    pub async fn remove_connection(
        &self,
        node_uuid: Uuid,
        volume_id: &str,
    ) -> Result<VolumeConnection, InventoryError> {
        self.records
            .write()
            .await
            .connections
            .remove(&(node_uuid, volume_id.to_string()))
            .ok_or_else(|| InventoryError::NotAttached {
                node_uuid,
                volume_id: volume_id.to_string(),
            })
    }

    pub async fn connection(&self, node_uuid: Uuid, volume_id: &str) -> Option<VolumeConnection> {
        self.records
            .read()
            .await
            .connections
            .get(&(node_uuid, volume_id.to_string()))
            .cloned()
    }

    pub async fn connections_of(&self, node_uuid: Uuid) -> Vec<VolumeConnection> {
        let mut connections: Vec<_> = self
            .records
            .read()
            .await
            .connections
            .values()
            .filter(|c| c.node_uuid == node_uuid)
            .cloned()
            .collect();
        connections.sort_by(|a, b| a.volume_id.cmp(&b.volume_id));
        connections
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::Utc;
    use foundry_types::StorageInterface;

    fn node(name: &str) -> Node {
        Node {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            conductor: "cond-1".to_string(),
            storage_interface: StorageInterface::Agent,
            reservation: None,
            created_at: Utc::now(),
        }
    }

    fn port(node_uuid: Uuid, address: &str) -> Port {
        Port {
            uuid: Uuid::new_v4(),
            node_uuid,
            address: address.to_string(),
            pxe_enabled: false,
            portgroup_uuid: None,
            vif_id: None,
            management_ip: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn node_name_is_unique() {
        let inv = Inventory::new();
        inv.insert_node(node("compute-01")).await.unwrap();
        let err = inv.insert_node(node("compute-01")).await.unwrap_err();
        assert_eq!(
            err,
            InventoryError::DuplicateNodeName("compute-01".to_string())
        );
    }

    #[tokio::test]
    async fn node_lookup_by_name_and_uuid() {
        let inv = Inventory::new();
        let n = node("compute-01");
        let uuid = n.uuid;
        inv.insert_node(n).await.unwrap();

        assert_eq!(inv.node_by_uuid(uuid).await.unwrap().name, "compute-01");
        assert_eq!(inv.node_by_name("compute-01").await.unwrap().uuid, uuid);
        assert!(inv.node_by_name("compute-02").await.is_none());
    }

    #[tokio::test]
    async fn port_address_index_follows_replacement() {
        let inv = Inventory::new();
        let n = node("compute-01");
        let node_uuid = n.uuid;
        inv.insert_node(n).await.unwrap();

        let mut p = port(node_uuid, "aa:bb:cc:dd:ee:01");
        inv.insert_port(p.clone()).await.unwrap();

        // Address change frees the old address and claims the new one.
        p.address = "aa:bb:cc:dd:ee:02".to_string();
        inv.replace_port(p.clone()).await.unwrap();

        let other = port(node_uuid, "aa:bb:cc:dd:ee:01");
        inv.insert_port(other).await.unwrap();

        // The in-use address stays reserved.
        let dup = port(node_uuid, "aa:bb:cc:dd:ee:02");
        assert!(matches!(
            inv.insert_port(dup).await,
            Err(InventoryError::DuplicateAddress(_))
        ));
    }

    #[tokio::test]
    async fn connection_attach_detach_cycle() {
        let inv = Inventory::new();
        let node_uuid = Uuid::new_v4();
        let connection = VolumeConnection {
            node_uuid,
            volume_id: "vol-1".to_string(),
            connector_uuid: Uuid::new_v4(),
            connection_info: serde_json::json!({}),
            created_at: Utc::now(),
        };

        inv.insert_connection(connection.clone()).await.unwrap();
        assert!(matches!(
            inv.insert_connection(connection).await,
            Err(InventoryError::AlreadyAttached { .. })
        ));

        inv.remove_connection(node_uuid, "vol-1").await.unwrap();
        // Second removal must not double-remove.
        assert!(matches!(
            inv.remove_connection(node_uuid, "vol-1").await,
            Err(InventoryError::NotAttached { .. })
        ));
    }
}
