// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Dropshot API trait for the foundry conductor service.
//!
//! The conductor owns a set of registered bare-metal nodes and performs
//! mutating operations against them: attaching and detaching storage volumes
//! through the node's storage backend, and managing the node's network port
//! configuration. Mutating operations on a node are serialized by an
//! exclusive per-node reservation; a second mutating request for a locked
//! node fails immediately with 409 rather than queueing.
//!
//! ## Endpoints
//!
//! - `POST /nodes` - Register a node
//! - `GET /nodes` - List nodes
//! - `GET /nodes/{node_ident}` - Get a node by UUID or name
//! - `POST /nodes/{node_ident}/volume/attach` - Attach a volume
//! - `DELETE /nodes/{node_ident}/volume/detach` - Detach a volume
//! - `GET /nodes/{node_ident}/volume/connector` - Best-effort connector probe
//! - `GET /nodes/{node_ident}/volume/connections` - List attachments
//! - `POST /nodes/{node_ident}/connectors` - Register a volume connector
//! - `GET /nodes/{node_ident}/connectors` - List volume connectors
//! - `POST /ports` - Create a port
//! - `GET /ports` - List ports
//! - `GET /ports/{port_uuid}` - Get a port
//! - `PUT /ports/{port_uuid}` - Update a port
//! - `DELETE /ports/{port_uuid}` - Delete a port
//! - `POST /portgroups` - Create a port group

use dropshot::{
    HttpError, HttpResponseCreated, HttpResponseDeleted, HttpResponseOk, Path, Query,
    RequestContext, TypedBody,
};
use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;

use foundry_types::{
    CreateConnectorRequest, CreateNodeRequest, CreatePortGroupRequest, CreatePortRequest, Node,
    Port, PortGroup, UpdatePortRequest, VolumeConnection, VolumeConnector,
};

/// Path parameters for node-scoped endpoints.
///
/// The identifier may be the node's UUID or its name; UUID-shaped
/// identifiers are always resolved as UUIDs.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NodePath {
    /// Node UUID or name
    pub node_ident: String,
}

/// Path parameters for port-specific endpoints.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PortPath {
    /// The port UUID
    pub port_uuid: Uuid,
}

/// Query parameters for the volume attach action.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AttachQuery {
    /// The volume to attach
    pub volume_id: String,
    /// The registered connector to attach through
    pub connector_uuid: Uuid,
}

/// Query parameters for the volume detach action.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DetachQuery {
    /// The volume to detach
    pub volume_id: String,
}

/// Foundry Conductor API
///
/// Inbound REST surface of a conductor process. Requests referencing a node
/// are routed by the conductor's dispatcher; requests for nodes owned by a
/// different conductor fail with 503.
#[dropshot::api_description]
pub trait ConductorApi {
    /// Context type for request handlers
    type Context: Send + Sync + 'static;

    /// Register a node
    ///
    /// Registers a bare-metal node with this conductor. The conductor
    /// records itself as the node's owner and assigns the node a UUID.
    ///
    /// Returns 409 if a node with the same name already exists.
    #[endpoint {
        method = POST,
        path = "/nodes",
        tags = ["nodes"],
    }]
    async fn create_node(
        rqctx: RequestContext<Self::Context>,
        body: TypedBody<CreateNodeRequest>,
    ) -> Result<HttpResponseCreated<Node>, HttpError>;

    /// List nodes
    #[endpoint {
        method = GET,
        path = "/nodes",
        tags = ["nodes"],
    }]
    async fn list_nodes(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<HttpResponseOk<Vec<Node>>, HttpError>;

    /// Get a node
    ///
    /// Looks the node up by UUID or name. The response includes the current
    /// reservation holder when the node is locked.
    ///
    /// Returns 400 for identifiers that are neither UUID-shaped nor valid
    /// names, 404 if no node matches.
    #[endpoint {
        method = GET,
        path = "/nodes/{node_ident}",
        tags = ["nodes"],
    }]
    async fn get_node(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
    ) -> Result<HttpResponseOk<Node>, HttpError>;

    /// Attach a volume
    ///
    /// Attaches a volume to the node through its configured storage backend.
    /// The node's exclusive reservation is held for the full duration of the
    /// operation and released on every exit path.
    ///
    /// Returns the established connection, including the connection payload
    /// reported by the backend.
    ///
    /// Returns 404 if the node or connector does not exist.
    /// Returns 409 if the node is locked by another operation, or the volume
    /// is already attached.
    /// Returns 503 if the backend is unreachable after the retry budget.
    #[endpoint {
        method = POST,
        path = "/nodes/{node_ident}/volume/attach",
        tags = ["volumes"],
    }]
    async fn attach_volume(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
        query: Query<AttachQuery>,
    ) -> Result<HttpResponseOk<VolumeConnection>, HttpError>;

    /// Detach a volume
    ///
    /// Detaches a volume from the node. The connection record is removed
    /// only after the backend confirms disconnection.
    ///
    /// Returns 404 if the node does not exist or the volume is not attached.
    /// Returns 409 if the node is locked by another operation.
    /// Returns 503 if the backend is unreachable after the retry budget.
    #[endpoint {
        method = DELETE,
        path = "/nodes/{node_ident}/volume/detach",
        tags = ["volumes"],
    }]
    async fn detach_volume(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
        query: Query<DetachQuery>,
    ) -> Result<HttpResponseDeleted, HttpError>;

    /// Probe the node's volume connector
    ///
    /// Best-effort read of the connector information reported by the node's
    /// storage backend. Returns null (not an error) when the backend is
    /// unreachable.
    #[endpoint {
        method = GET,
        path = "/nodes/{node_ident}/volume/connector",
        tags = ["volumes"],
    }]
    async fn get_volume_connector(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
    ) -> Result<HttpResponseOk<Option<serde_json::Value>>, HttpError>;

    /// List volume attachments on a node
    #[endpoint {
        method = GET,
        path = "/nodes/{node_ident}/volume/connections",
        tags = ["volumes"],
    }]
    async fn list_volume_connections(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
    ) -> Result<HttpResponseOk<Vec<VolumeConnection>>, HttpError>;

    /// Register a volume connector
    ///
    /// Records the host-side connection identity (e.g. iSCSI initiator IQN)
    /// that attach operations on this node hand to the storage backend.
    #[endpoint {
        method = POST,
        path = "/nodes/{node_ident}/connectors",
        tags = ["volumes"],
    }]
    async fn create_connector(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
        body: TypedBody<CreateConnectorRequest>,
    ) -> Result<HttpResponseCreated<VolumeConnector>, HttpError>;

    /// List volume connectors registered on a node
    #[endpoint {
        method = GET,
        path = "/nodes/{node_ident}/connectors",
        tags = ["volumes"],
    }]
    async fn list_connectors(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
    ) -> Result<HttpResponseOk<Vec<VolumeConnector>>, HttpError>;

    /// Create a port
    ///
    /// The MAC address is validated and normalized to lower-case. Creating a
    /// port mutates the owning node's configuration and therefore takes the
    /// node's reservation.
    ///
    /// Returns 400 for malformed addresses.
    /// Returns 404 if the owning node or port group does not exist.
    /// Returns 409 for duplicate addresses, cross-node port groups, the
    /// standalone-ports rule, or a locked node.
    #[endpoint {
        method = POST,
        path = "/ports",
        tags = ["ports"],
    }]
    async fn create_port(
        rqctx: RequestContext<Self::Context>,
        body: TypedBody<CreatePortRequest>,
    ) -> Result<HttpResponseCreated<Port>, HttpError>;

    /// List ports
    #[endpoint {
        method = GET,
        path = "/ports",
        tags = ["ports"],
    }]
    async fn list_ports(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<HttpResponseOk<Vec<Port>>, HttpError>;

    /// Get a port
    #[endpoint {
        method = GET,
        path = "/ports/{port_uuid}",
        tags = ["ports"],
    }]
    async fn get_port(
        rqctx: RequestContext<Self::Context>,
        path: Path<PortPath>,
    ) -> Result<HttpResponseOk<Port>, HttpError>;

    /// Update a port
    ///
    /// Fields absent from the body are left unchanged; a null
    /// `portgroup_uuid` or `vif_id` clears the respective association. An
    /// updated address is validated and normalized like on creation.
    #[endpoint {
        method = PUT,
        path = "/ports/{port_uuid}",
        tags = ["ports"],
    }]
    async fn update_port(
        rqctx: RequestContext<Self::Context>,
        path: Path<PortPath>,
        body: TypedBody<UpdatePortRequest>,
    ) -> Result<HttpResponseOk<Port>, HttpError>;

    /// Delete a port
    ///
    /// Returns 409 if the owning node is locked by another operation.
    #[endpoint {
        method = DELETE,
        path = "/ports/{port_uuid}",
        tags = ["ports"],
    }]
    async fn delete_port(
        rqctx: RequestContext<Self::Context>,
        path: Path<PortPath>,
    ) -> Result<HttpResponseDeleted, HttpError>;

    /// Create a port group
    ///
    /// Returns 404 if the owning node does not exist, 409 for a duplicate
    /// name on the same node.
    #[endpoint {
        method = POST,
        path = "/portgroups",
        tags = ["ports"],
    }]
    async fn create_portgroup(
        rqctx: RequestContext<Self::Context>,
        body: TypedBody<CreatePortGroupRequest>,
    ) -> Result<HttpResponseCreated<PortGroup>, HttpError>;
}
