// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Foundry Conductor Library
//!
//! The conductor owns a set of registered bare-metal nodes and performs
//! mutating operations against them under an exclusive per-node reservation:
//! volume attach/detach through the node's storage backend, and network port
//! management.
//!
//! # Modules
//!
//! - [`config`] - Conductor configuration
//! - [`context`] - API context for request handlers
//! - [`lock`] - Exclusive per-node reservations
//! - [`dispatch`] - Node identifier parsing and topic resolution
//! - [`agent`] - HTTP client for node agents, with bounded retry
//! - [`backend`] - Storage backend selection (agent / block-storage)
//! - [`inventory`] - In-process record store
//! - [`volume`] - Volume attach/detach operations
//! - [`ports`] - Port and port group management

pub mod agent;
pub mod backend;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod inventory;
pub mod lock;
pub mod ports;
pub mod volume;

use dropshot::{
    ClientErrorStatusCode, HttpError, HttpResponseCreated, HttpResponseDeleted, HttpResponseOk,
    Path, Query, RequestContext, TypedBody,
};

use foundry_conductor_api::{AttachQuery, ConductorApi, DetachQuery, NodePath, PortPath};
use foundry_types::{
    CreateConnectorRequest, CreateNodeRequest, CreatePortGroupRequest, CreatePortRequest, Node,
    Port, PortGroup, UpdatePortRequest, VolumeConnection, VolumeConnector,
};

use crate::backend::BackendError;
use crate::context::{ApiContext, ConductorError};
use crate::dispatch::DispatchError;
use crate::inventory::InventoryError;
use crate::lock::LockError;
use crate::ports::PortError;
use crate::volume::VolumeError;

/// Map a conductor fault onto its HTTP status.
///
/// Lock and dispatch errors arrive here unchanged from where they occurred;
/// each taxonomy kind has a fixed status: malformed input 400, missing
/// records 404, conflicts (locked node, duplicate attach, duplicate MAC,
/// standalone-ports rule) 409, unreachable backend or conductor 503,
/// everything else 500.
fn fault_to_http(error: ConductorError) -> HttpError {
    let message = error.to_string();
    match &error {
        ConductorError::Dispatch(DispatchError::InvalidIdentifier(_)) => {
            HttpError::for_bad_request(None, message)
        }
        ConductorError::Dispatch(DispatchError::NodeNotFound(_)) => {
            HttpError::for_not_found(None, message)
        }

        ConductorError::Volume(e) => match e {
            VolumeError::ConnectorNotFound(_) | VolumeError::NotAttached { .. } => {
                HttpError::for_not_found(None, message)
            }
            VolumeError::ConnectorNodeMismatch { .. } => HttpError::for_bad_request(None, message),
            VolumeError::AlreadyAttached { .. } => conflict(message),
            VolumeError::Locked(LockError::AlreadyLocked { .. }) => conflict(message),
            VolumeError::Locked(LockError::NotOwner { .. }) => {
                HttpError::for_internal_error(message)
            }
            VolumeError::Backend(b) => backend_to_http(b, message),
        },

        ConductorError::Port(e) => match e {
            PortError::InvalidAddress(_) => HttpError::for_bad_request(None, message),
            PortError::NodeNotFound(_) | PortError::PortGroupNotFound(_) | PortError::NotFound(_) => {
                HttpError::for_not_found(None, message)
            }
            PortError::DuplicateAddress(_)
            | PortError::PortGroupWrongNode { .. }
            | PortError::StandaloneViolation { .. }
            | PortError::DuplicatePortGroupName { .. } => conflict(message),
            PortError::Locked(LockError::AlreadyLocked { .. }) => conflict(message),
            PortError::Locked(LockError::NotOwner { .. }) => HttpError::for_internal_error(message),
        },

        ConductorError::Inventory(e) => match e {
            InventoryError::DuplicateNodeName(_)
            | InventoryError::DuplicateAddress(_)
            | InventoryError::DuplicatePortGroupName { .. }
            | InventoryError::AlreadyAttached { .. } => conflict(message),
            InventoryError::PortNotFound(_) | InventoryError::NotAttached { .. } => {
                HttpError::for_not_found(None, message)
            }
        },

        ConductorError::Backend(b) => backend_to_http(b, message),

        ConductorError::WrongConductor { .. } => HttpError::for_unavail(None, message),
    }
}

fn conflict(message: String) -> HttpError {
    HttpError::for_client_error(None, ClientErrorStatusCode::CONFLICT, message)
}

fn backend_to_http(error: &BackendError, message: String) -> HttpError {
    match error {
        BackendError::Unreachable(_) => HttpError::for_unavail(None, message),
        // Protocol, command, unsupported and unconfigured backends are all
        // server-side faults.
        _ => HttpError::for_internal_error(message),
    }
}

/// Foundry Conductor API implementation
///
/// This enum serves as the implementation type for the `ConductorApi` trait.
/// It contains no data - all state is stored in the `ApiContext`.
pub enum ConductorImpl {}

impl ConductorApi for ConductorImpl {
    type Context = ApiContext;

    async fn create_node(
        rqctx: RequestContext<Self::Context>,
        body: TypedBody<CreateNodeRequest>,
    ) -> Result<HttpResponseCreated<Node>, HttpError> {
        let ctx = rqctx.context();
        let node = ctx.create_node(body.into_inner()).await.map_err(fault_to_http)?;
        Ok(HttpResponseCreated(node))
    }

    async fn list_nodes(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<HttpResponseOk<Vec<Node>>, HttpError> {
        let ctx = rqctx.context();
        Ok(HttpResponseOk(ctx.list_nodes().await))
    }

    async fn get_node(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
    ) -> Result<HttpResponseOk<Node>, HttpError> {
        let ctx = rqctx.context();
        let node = ctx
            .get_node(&path.into_inner().node_ident)
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseOk(node))
    }

    async fn attach_volume(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
        query: Query<AttachQuery>,
    ) -> Result<HttpResponseOk<VolumeConnection>, HttpError> {
        let ctx = rqctx.context();
        let ident = path.into_inner().node_ident;
        let query = query.into_inner();

        tracing::info!(
            node_ident = %ident,
            volume_id = %query.volume_id,
            connector_uuid = %query.connector_uuid,
            "Received volume attach request"
        );

        let connection = ctx
            .attach_volume(&ident, &query.volume_id, query.connector_uuid)
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseOk(connection))
    }

    async fn detach_volume(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
        query: Query<DetachQuery>,
    ) -> Result<HttpResponseDeleted, HttpError> {
        let ctx = rqctx.context();
        let ident = path.into_inner().node_ident;
        let query = query.into_inner();

        tracing::info!(
            node_ident = %ident,
            volume_id = %query.volume_id,
            "Received volume detach request"
        );

        ctx.detach_volume(&ident, &query.volume_id)
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseDeleted())
    }

    async fn get_volume_connector(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
    ) -> Result<HttpResponseOk<Option<serde_json::Value>>, HttpError> {
        let ctx = rqctx.context();
        let connector = ctx
            .get_volume_connector(&path.into_inner().node_ident)
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseOk(connector))
    }

    async fn list_volume_connections(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
    ) -> Result<HttpResponseOk<Vec<VolumeConnection>>, HttpError> {
        let ctx = rqctx.context();
        let connections = ctx
            .list_volume_connections(&path.into_inner().node_ident)
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseOk(connections))
    }

    async fn create_connector(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
        body: TypedBody<CreateConnectorRequest>,
    ) -> Result<HttpResponseCreated<VolumeConnector>, HttpError> {
        let ctx = rqctx.context();
        let connector = ctx
            .create_connector(&path.into_inner().node_ident, body.into_inner())
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseCreated(connector))
    }

    async fn list_connectors(
        rqctx: RequestContext<Self::Context>,
        path: Path<NodePath>,
    ) -> Result<HttpResponseOk<Vec<VolumeConnector>>, HttpError> {
        let ctx = rqctx.context();
        let connectors = ctx
            .list_connectors(&path.into_inner().node_ident)
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseOk(connectors))
    }

    async fn create_port(
        rqctx: RequestContext<Self::Context>,
        body: TypedBody<CreatePortRequest>,
    ) -> Result<HttpResponseCreated<Port>, HttpError> {
        let ctx = rqctx.context();
        let port = ctx.create_port(body.into_inner()).await.map_err(fault_to_http)?;
        Ok(HttpResponseCreated(port))
    }

    async fn list_ports(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<HttpResponseOk<Vec<Port>>, HttpError> {
        let ctx = rqctx.context();
        Ok(HttpResponseOk(ctx.list_ports().await))
    }

    async fn get_port(
        rqctx: RequestContext<Self::Context>,
        path: Path<PortPath>,
    ) -> Result<HttpResponseOk<Port>, HttpError> {
        let ctx = rqctx.context();
        let port = ctx
            .get_port(path.into_inner().port_uuid)
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseOk(port))
    }

    async fn update_port(
        rqctx: RequestContext<Self::Context>,
        path: Path<PortPath>,
        body: TypedBody<UpdatePortRequest>,
    ) -> Result<HttpResponseOk<Port>, HttpError> {
        let ctx = rqctx.context();
        let port = ctx
            .update_port(path.into_inner().port_uuid, body.into_inner())
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseOk(port))
    }

    async fn delete_port(
        rqctx: RequestContext<Self::Context>,
        path: Path<PortPath>,
    ) -> Result<HttpResponseDeleted, HttpError> {
        let ctx = rqctx.context();
        ctx.delete_port(path.into_inner().port_uuid)
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseDeleted())
    }

    async fn create_portgroup(
        rqctx: RequestContext<Self::Context>,
        body: TypedBody<CreatePortGroupRequest>,
    ) -> Result<HttpResponseCreated<PortGroup>, HttpError> {
        let ctx = rqctx.context();
        let group = ctx
            .create_portgroup(body.into_inner())
            .await
            .map_err(fault_to_http)?;
        Ok(HttpResponseCreated(group))
    }
}
