// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Shared types for the foundry conductor service.
//!
//! This crate contains the data model exchanged between the conductor's REST
//! surface and its clients: nodes, their network ports and port groups, and
//! the volume connector/connection records managed by the storage attachment
//! path.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};
use uuid::Uuid;

// ============================================================================
// Type Aliases
// ============================================================================

/// Volume identifier (opaque, assigned by the block-storage service)
pub type VolumeId = String;

/// Routing key identifying the conductor that owns a node
pub type Topic = String;

// ============================================================================
// Nodes
// ============================================================================

/// Storage backend selected for a node at registration time.
///
/// `Agent` drives volume attachment through the in-band agent running on the
/// node; `Cinder` drives it through the external block-storage service.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StorageInterface {
    /// Volume operations go through the node's in-band agent
    #[default]
    Agent,
    /// Volume operations go through the external block-storage service
    Cinder,
}

/// A registered bare-metal node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    /// Unique identifier
    pub uuid: Uuid,
    /// Human-readable name (unique, DNS-like)
    pub name: String,
    /// Host of the conductor that owns this node
    pub conductor: String,
    /// Storage backend used for volume operations on this node
    pub storage_interface: StorageInterface,
    /// Current reservation holder, if the node is locked
    #[serde(default)]
    pub reservation: Option<String>,
    /// When the node was registered
    pub created_at: DateTime<Utc>,
}

/// Payload for registering a new node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateNodeRequest {
    /// Human-readable name (unique, DNS-like)
    pub name: String,
    /// Storage backend for volume operations (defaults to the agent)
    #[serde(default)]
    pub storage_interface: StorageInterface,
}

// ============================================================================
// Ports
// ============================================================================

/// A physical network interface belonging to a node.
///
/// The `address` is always stored in canonical lower-case MAC form and is
/// globally unique. A port carrying a `management_ip` is part of the
/// management network and is used to reach the node's in-band agent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Port {
    /// Unique identifier
    pub uuid: Uuid,
    /// Owning node
    pub node_uuid: Uuid,
    /// Canonical lower-case MAC address, globally unique
    pub address: String,
    /// Whether this port may be used for network boot
    pub pxe_enabled: bool,
    /// Port group this port belongs to, if any (same node only)
    #[serde(default)]
    pub portgroup_uuid: Option<Uuid>,
    /// Attached virtual interface, if any
    #[serde(default)]
    pub vif_id: Option<String>,
    /// Management network address, if this port is on the management network
    #[serde(default)]
    pub management_ip: Option<String>,
    /// When the port was created
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a port.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreatePortRequest {
    /// Owning node
    pub node_uuid: Uuid,
    /// MAC address; normalized to lower-case on creation
    pub address: String,
    /// Whether this port may be used for network boot
    #[serde(default)]
    pub pxe_enabled: bool,
    /// Port group to join, if any
    #[serde(default)]
    pub portgroup_uuid: Option<Uuid>,
    /// Attached virtual interface, if any
    #[serde(default)]
    pub vif_id: Option<String>,
    /// Management network address, if any
    #[serde(default)]
    pub management_ip: Option<String>,
}

/// Payload for updating a port. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UpdatePortRequest {
    /// New MAC address; normalized to lower-case
    #[serde(default)]
    pub address: Option<String>,
    /// New network-boot enablement
    #[serde(default)]
    pub pxe_enabled: Option<bool>,
    /// New port group membership; `Some(None)` clears it
    #[serde(default, with = "double_option")]
    #[schemars(with = "Option<Uuid>")]
    pub portgroup_uuid: Option<Option<Uuid>>,
    /// New virtual interface attachment; `Some(None)` clears it
    #[serde(default, with = "double_option")]
    #[schemars(with = "Option<String>")]
    pub vif_id: Option<Option<String>>,
}

/// Serde helper distinguishing "field absent" from "field set to null".
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

// ============================================================================
// Port Groups
// ============================================================================

/// A bonded group of ports on a single node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PortGroup {
    /// Unique identifier
    pub uuid: Uuid,
    /// Owning node
    pub node_uuid: Uuid,
    /// Group name, unique per node
    pub name: String,
    /// Whether member ports may operate standalone.
    ///
    /// When false, a member port may neither be boot-enabled nor carry a
    /// virtual interface.
    pub standalone_ports_supported: bool,
    /// When the group was created
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a port group.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreatePortGroupRequest {
    /// Owning node
    pub node_uuid: Uuid,
    /// Group name, unique per node
    pub name: String,
    /// Whether member ports may operate standalone (defaults to true)
    #[serde(default = "default_true")]
    pub standalone_ports_supported: bool,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Volumes
// ============================================================================

/// Host-side connection identity registered for a node.
///
/// The connector tells the storage backend how the node reaches block
/// storage (e.g. an iSCSI initiator IQN or a fibre-channel WWPN).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VolumeConnector {
    /// Unique identifier
    pub uuid: Uuid,
    /// Owning node
    pub node_uuid: Uuid,
    /// Connector kind (e.g. "iqn", "ip", "wwpn")
    pub kind: String,
    /// Connector value (the initiator identity itself)
    pub connector_id: String,
}

/// Payload for registering a volume connector on a node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateConnectorRequest {
    /// Connector kind (e.g. "iqn", "ip", "wwpn")
    pub kind: String,
    /// Connector value
    pub connector_id: String,
}

/// An established volume attachment on a node.
///
/// Created only once the storage backend confirms the attach; removed only
/// once it confirms the detach. No partial state is recorded for failed
/// operations.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VolumeConnection {
    /// Node the volume is attached to
    pub node_uuid: Uuid,
    /// The attached volume
    pub volume_id: VolumeId,
    /// Connector the attachment was made through
    pub connector_uuid: Uuid,
    /// Opaque connection payload returned by the storage backend
    pub connection_info: serde_json::Value,
    /// When the attachment was established
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Tests
// ============================================================================
