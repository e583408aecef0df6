// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Port and port group management
//!
//! Changing a node's port layout is lifecycle-affecting state, so port
//! mutations take the node reservation like volume operations do. MAC
//! addresses are validated and normalized to canonical lower-case colon
//! form on create and on update; duplicates are a conflict.
//!
//! Port group membership is constrained to the port's own node, and a group
//! that does not support standalone ports refuses boot-enabled or
//! vif-carrying members.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use foundry_types::{
    CreatePortGroupRequest, CreatePortRequest, Port, PortGroup, UpdatePortRequest,
};

use crate::inventory::{Inventory, InventoryError};
use crate::lock::{LockError, NodeLockManager};

/// Port operation errors
#[derive(Debug, Error)]
pub enum PortError {
    #[error("invalid MAC address: {0}")]
    InvalidAddress(String),

    #[error("port address already exists: {0}")]
    DuplicateAddress(String),

    #[error("node not found: {0}")]
    NodeNotFound(Uuid),

    #[error("portgroup not found: {0}")]
    PortGroupNotFound(Uuid),

    #[error("portgroup {portgroup_uuid} is not on node {node_uuid}")]
    PortGroupWrongNode {
        portgroup_uuid: Uuid,
        node_uuid: Uuid,
    },

    #[error(
        "portgroup {portgroup_uuid} does not support standalone ports; \
         member ports may not be boot-enabled or carry a vif"
    )]
    StandaloneViolation { portgroup_uuid: Uuid },

    #[error("portgroup name already exists on node {node_uuid}: {name}")]
    DuplicatePortGroupName { node_uuid: Uuid, name: String },

    #[error("port not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Locked(#[from] LockError),
}

impl From<InventoryError> for PortError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::DuplicateAddress(addr) => PortError::DuplicateAddress(addr),
            InventoryError::PortNotFound(uuid) => PortError::NotFound(uuid),
            InventoryError::DuplicatePortGroupName { node_uuid, name } => {
                PortError::DuplicatePortGroupName { node_uuid, name }
            }
            // Node-name and volume variants never reach the port path.
            other => PortError::InvalidAddress(other.to_string()),
        }
    }
}

/// Validate a MAC address and normalize it to lower-case colon form.
///
/// Accepts colon or hyphen delimiters; the canonical form always uses
/// colons.
pub fn normalize_mac(raw: &str) -> Result<String, PortError> {
    let groups: Vec<&str> = if raw.contains(':') {
        raw.split(':').collect()
    } else {
        raw.split('-').collect()
    };

    let valid = groups.len() == 6
        && groups
            .iter()
            .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid {
        return Err(PortError::InvalidAddress(raw.to_string()));
    }

    Ok(groups.join(":").to_lowercase())
}

/// Port and port group controller.
pub struct PortOps {
    inventory: Arc<Inventory>,
    locks: Arc<NodeLockManager>,
    /// Owner token used for node reservations (this conductor's host)
    owner: String,
}

impl PortOps {
    pub fn new(inventory: Arc<Inventory>, locks: Arc<NodeLockManager>, owner: String) -> Self {
        Self {
            inventory,
            locks,
            owner,
        }
    }

    /// Enforce the standalone-ports rule for a prospective member port.
    async fn check_portgroup(
        &self,
        node_uuid: Uuid,
        portgroup_uuid: Uuid,
        pxe_enabled: bool,
        has_vif: bool,
    ) -> Result<(), PortError> {
        let group = self
            .inventory
            .portgroup(portgroup_uuid)
            .await
            .ok_or(PortError::PortGroupNotFound(portgroup_uuid))?;

        if group.node_uuid != node_uuid {
            return Err(PortError::PortGroupWrongNode {
                portgroup_uuid,
                node_uuid,
            });
        }

        if !group.standalone_ports_supported && (pxe_enabled || has_vif) {
            return Err(PortError::StandaloneViolation { portgroup_uuid });
        }

        Ok(())
    }

    pub async fn create_port(&self, req: CreatePortRequest) -> Result<Port, PortError> {
        let node = self
            .inventory
            .node_by_uuid(req.node_uuid)
            .await
            .ok_or(PortError::NodeNotFound(req.node_uuid))?;

        let address = normalize_mac(&req.address)?;

        let _guard = self.locks.reserve(node.uuid, &self.owner)?;

        if let Some(portgroup_uuid) = req.portgroup_uuid {
            self.check_portgroup(
                node.uuid,
                portgroup_uuid,
                req.pxe_enabled,
                req.vif_id.is_some(),
            )
            .await?;
        }

        let port = Port {
            uuid: Uuid::new_v4(),
            node_uuid: node.uuid,
            address,
            pxe_enabled: req.pxe_enabled,
            portgroup_uuid: req.portgroup_uuid,
            vif_id: req.vif_id,
            management_ip: req.management_ip,
            created_at: Utc::now(),
        };
        self.inventory.insert_port(port.clone()).await?;

        info!(port_uuid = %port.uuid, node_id = %port.node_uuid, address = %port.address, "Created port");

        Ok(port)
    }

    pub async fn update_port(
        &self,
        port_uuid: Uuid,
        req: UpdatePortRequest,
    ) -> Result<Port, PortError> {
        let mut port = self
            .inventory
            .port(port_uuid)
            .await
            .ok_or(PortError::NotFound(port_uuid))?;

        // Validate before reserving; a malformed address never takes the lock.
        let new_address = req.address.as_deref().map(normalize_mac).transpose()?;

        let _guard = self.locks.reserve(port.node_uuid, &self.owner)?;

        if let Some(address) = new_address {
            port.address = address;
        }
        if let Some(pxe_enabled) = req.pxe_enabled {
            port.pxe_enabled = pxe_enabled;
        }
        if let Some(portgroup_uuid) = req.portgroup_uuid {
            port.portgroup_uuid = portgroup_uuid;
        }
        if let Some(vif_id) = req.vif_id {
            port.vif_id = vif_id;
        }

        if let Some(portgroup_uuid) = port.portgroup_uuid {
            self.check_portgroup(
                port.node_uuid,
                portgroup_uuid,
                port.pxe_enabled,
                port.vif_id.is_some(),
            )
            .await?;
        }

        self.inventory.replace_port(port.clone()).await?;

        info!(port_uuid = %port.uuid, address = %port.address, "Updated port");

        Ok(port)
    }

    pub async fn delete_port(&self, port_uuid: Uuid) -> Result<(), PortError> {
        let port = self
            .inventory
            .port(port_uuid)
            .await
            .ok_or(PortError::NotFound(port_uuid))?;

        let _guard = self.locks.reserve(port.node_uuid, &self.owner)?;

        self.inventory.remove_port(port_uuid).await?;

        info!(port_uuid = %port_uuid, node_id = %port.node_uuid, "Deleted port");

        Ok(())
    }

    pub async fn create_portgroup(
        &self,
        req: CreatePortGroupRequest,
    ) -> Result<PortGroup, PortError> {
        let node = self
            .inventory
            .node_by_uuid(req.node_uuid)
            .await
            .ok_or(PortError::NodeNotFound(req.node_uuid))?;

        let group = PortGroup {
            uuid: Uuid::new_v4(),
            node_uuid: node.uuid,
            name: req.name,
            standalone_ports_supported: req.standalone_ports_supported,
            created_at: Utc::now(),
        };
        self.inventory.insert_portgroup(group.clone()).await?;

        info!(portgroup_uuid = %group.uuid, node_id = %group.node_uuid, name = %group.name, "Created portgroup");

        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::Utc;
    use foundry_types::{Node, StorageInterface};

    fn fixture() -> (Arc<Inventory>, Arc<NodeLockManager>, PortOps) {
        let inventory = Arc::new(Inventory::new());
        let locks = Arc::new(NodeLockManager::new());
        let ops = PortOps::new(Arc::clone(&inventory), Arc::clone(&locks), "cond-1".to_string());
        (inventory, locks, ops)
    }

    async fn register_node(inventory: &Inventory, name: &str) -> Uuid {
        let node = Node {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            conductor: "cond-1".to_string(),
            storage_interface: StorageInterface::Agent,
            reservation: None,
            created_at: Utc::now(),
        };
        let uuid = node.uuid;
        inventory.insert_node(node).await.unwrap();
        uuid
    }

    fn create_req(node_uuid: Uuid, address: &str) -> CreatePortRequest {
        CreatePortRequest {
            node_uuid,
            address: address.to_string(),
            pxe_enabled: false,
            portgroup_uuid: None,
            vif_id: None,
            management_ip: None,
        }
    }

    // ------------------------------------------------------------------
    // MAC validation and normalization
    // ------------------------------------------------------------------

    #[test]
    fn mac_normalizes_to_lower_case() {
        assert_eq!(
            normalize_mac("AA:BB:CC:DD:EE:FF").unwrap(),
            "aa:bb:cc:dd:ee:ff"
        );
        assert_eq!(
            normalize_mac("aa:bb:cc:dd:ee:ff").unwrap(),
            "aa:bb:cc:dd:ee:ff"
        );
    }

    #[test]
    fn mac_accepts_hyphen_delimiters() {
        assert_eq!(
            normalize_mac("AA-BB-CC-DD-EE-FF").unwrap(),
            "aa:bb:cc:dd:ee:ff"
        );
    }

    #[test]
    fn mac_rejects_malformed_addresses() {
        for bad in [
            "",
            "not-a-mac",
            "aa:bb:cc:dd:ee",
            "aa:bb:cc:dd:ee:ff:00",
            "aa:bb:cc:dd:ee:fg",
            "aabb:cc:dd:ee:ff",
        ] {
            assert!(normalize_mac(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[tokio::test]
    async fn create_normalizes_address() {
        let (inventory, _locks, ops) = fixture();
        let node = register_node(&inventory, "compute-01").await;

        let port = ops
            .create_port(create_req(node, "AA:BB:CC:DD:EE:FF"))
            .await
            .unwrap();
        assert_eq!(port.address, "aa:bb:cc:dd:ee:ff");
    }

    #[tokio::test]
    async fn update_normalizes_address() {
        let (inventory, _locks, ops) = fixture();
        let node = register_node(&inventory, "compute-01").await;
        let port = ops
            .create_port(create_req(node, "aa:bb:cc:dd:ee:01"))
            .await
            .unwrap();

        let updated = ops
            .update_port(
                port.uuid,
                UpdatePortRequest {
                    address: Some("AA:BB:CC:DD:EE:02".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.address, "aa:bb:cc:dd:ee:02");
    }

    #[tokio::test]
    async fn duplicate_address_is_a_conflict() {
        let (inventory, _locks, ops) = fixture();
        let node = register_node(&inventory, "compute-01").await;

        ops.create_port(create_req(node, "aa:bb:cc:dd:ee:ff"))
            .await
            .unwrap();
        // Same address in a different case is still the same address.
        let err = ops
            .create_port(create_req(node, "AA:BB:CC:DD:EE:FF"))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::DuplicateAddress(_)));
    }

    #[tokio::test]
    async fn create_requires_an_existing_node() {
        let (_inventory, _locks, ops) = fixture();
        let err = ops
            .create_port(create_req(Uuid::new_v4(), "aa:bb:cc:dd:ee:ff"))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NodeNotFound(_)));
    }

    #[tokio::test]
    async fn create_fails_fast_on_a_locked_node() {
        let (inventory, locks, ops) = fixture();
        let node = register_node(&inventory, "compute-01").await;

        let _guard = locks.reserve(node, "cond-other").unwrap();

        let err = ops
            .create_port(create_req(node, "aa:bb:cc:dd:ee:ff"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PortError::Locked(LockError::AlreadyLocked { .. })
        ));
    }

    // ------------------------------------------------------------------
    // Portgroup membership
    // ------------------------------------------------------------------

    async fn portgroup(ops: &PortOps, node: Uuid, standalone: bool) -> Uuid {
        ops.create_portgroup(CreatePortGroupRequest {
            node_uuid: node,
            name: format!("bond-{}", standalone),
            standalone_ports_supported: standalone,
        })
        .await
        .unwrap()
        .uuid
    }

    async fn try_grouped_port(
        ops: &PortOps,
        node: Uuid,
        group: Uuid,
        pxe_enabled: bool,
        vif: bool,
        address: &str,
    ) -> Result<Port, PortError> {
        ops.create_port(CreatePortRequest {
            node_uuid: node,
            address: address.to_string(),
            pxe_enabled,
            portgroup_uuid: Some(group),
            vif_id: vif.then(|| "vif-1".to_string()),
            management_ip: None,
        })
        .await
    }

    #[tokio::test]
    async fn standalone_group_accepts_any_member() {
        let (inventory, _locks, ops) = fixture();
        let node = register_node(&inventory, "compute-01").await;
        let group = portgroup(&ops, node, true).await;

        for (i, (pxe, vif)) in [(false, false), (true, false), (false, true), (true, true)]
            .into_iter()
            .enumerate()
        {
            let address = format!("aa:bb:cc:dd:ee:0{}", i);
            try_grouped_port(&ops, node, group, pxe, vif, &address)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn nostandalone_group_rejects_pxe_and_vif_members() {
        let (inventory, _locks, ops) = fixture();
        let node = register_node(&inventory, "compute-01").await;
        let group = portgroup(&ops, node, false).await;

        // Plain member is fine.
        try_grouped_port(&ops, node, group, false, false, "aa:bb:cc:dd:ee:00")
            .await
            .unwrap();

        for (pxe, vif) in [(true, false), (false, true), (true, true)] {
            let err = try_grouped_port(&ops, node, group, pxe, vif, "aa:bb:cc:dd:ee:09")
                .await
                .unwrap_err();
            assert!(
                matches!(err, PortError::StandaloneViolation { .. }),
                "pxe={} vif={} got {:?}",
                pxe,
                vif,
                err
            );
        }
    }

    #[tokio::test]
    async fn portgroup_must_be_on_the_same_node() {
        let (inventory, _locks, ops) = fixture();
        let node_a = register_node(&inventory, "compute-01").await;
        let node_b = register_node(&inventory, "compute-02").await;
        let group_b = portgroup(&ops, node_b, true).await;

        let err = try_grouped_port(&ops, node_a, group_b, false, false, "aa:bb:cc:dd:ee:ff")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::PortGroupWrongNode { .. }));
    }

    #[tokio::test]
    async fn update_into_nostandalone_group_is_checked() {
        let (inventory, _locks, ops) = fixture();
        let node = register_node(&inventory, "compute-01").await;
        let group = portgroup(&ops, node, false).await;

        let port = ops
            .create_port(CreatePortRequest {
                node_uuid: node,
                address: "aa:bb:cc:dd:ee:ff".to_string(),
                pxe_enabled: true,
                portgroup_uuid: None,
                vif_id: None,
                management_ip: None,
            })
            .await
            .unwrap();

        // Moving a boot-enabled port into the group is a conflict...
        let err = ops
            .update_port(
                port.uuid,
                UpdatePortRequest {
                    portgroup_uuid: Some(Some(group)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::StandaloneViolation { .. }));

        // ...but disabling boot in the same update is accepted.
        let updated = ops
            .update_port(
                port.uuid,
                UpdatePortRequest {
                    pxe_enabled: Some(false),
                    portgroup_uuid: Some(Some(group)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.portgroup_uuid, Some(group));
        assert!(!updated.pxe_enabled);
    }

    #[tokio::test]
    async fn delete_removes_and_frees_the_address() {
        let (inventory, _locks, ops) = fixture();
        let node = register_node(&inventory, "compute-01").await;
        let port = ops
            .create_port(create_req(node, "aa:bb:cc:dd:ee:ff"))
            .await
            .unwrap();

        ops.delete_port(port.uuid).await.unwrap();
        assert!(matches!(
            ops.delete_port(port.uuid).await,
            Err(PortError::NotFound(_))
        ));

        // The address is reusable after deletion.
        ops.create_port(create_req(node, "aa:bb:cc:dd:ee:ff"))
            .await
            .unwrap();
    }
}
