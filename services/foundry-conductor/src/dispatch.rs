// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Operation routing
//!
//! Incoming requests reference a node by UUID or name. The dispatcher
//! resolves the identifier to a node record and the routing topic of the
//! conductor that owns it. Resolution is a pure lookup executed once per
//! request, before any state mutation; it takes no locks.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use foundry_types::{Node, Topic};

use crate::inventory::Inventory;

/// Maximum length of a node name.
const MAX_NAME_LEN: usize = 255;

/// Routing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("invalid node identifier: {0}")]
    InvalidIdentifier(String),
}

/// A parsed node identifier.
///
/// UUID-shaped identifiers always resolve as UUIDs; everything else must be
/// a valid node name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeIdent {
    Uuid(Uuid),
    Name(String),
}

/// Parse a raw identifier, preferring the UUID convention.
pub fn parse_node_ident(raw: &str) -> Result<NodeIdent, DispatchError> {
    if let Ok(uuid) = Uuid::parse_str(raw) {
        return Ok(NodeIdent::Uuid(uuid));
    }
    if is_valid_node_name(raw) {
        return Ok(NodeIdent::Name(raw.to_string()));
    }
    Err(DispatchError::InvalidIdentifier(raw.to_string()))
}

fn is_valid_node_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Resolves node identifiers to the owning conductor's topic.
#[derive(Debug)]
pub struct Dispatcher {
    inventory: Arc<Inventory>,
}

impl Dispatcher {
    pub fn new(inventory: Arc<Inventory>) -> Self {
        Self { inventory }
    }

    /// Resolve `raw` to the node record and its owning conductor's topic.
    pub async fn topic_for(&self, raw: &str) -> Result<(Node, Topic), DispatchError> {
        let node = match parse_node_ident(raw)? {
            NodeIdent::Uuid(uuid) => self.inventory.node_by_uuid(uuid).await,
            NodeIdent::Name(name) => self.inventory.node_by_name(&name).await,
        }
        .ok_or_else(|| DispatchError::NodeNotFound(raw.to_string()))?;

        let topic = format!("conductor.{}", node.conductor);
        Ok((node, topic))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::Utc;
    use foundry_types::StorageInterface;

    fn node(name: &str, conductor: &str) -> Node {
        Node {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            conductor: conductor.to_string(),
            storage_interface: StorageInterface::Agent,
            reservation: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn uuid_shaped_identifiers_parse_as_uuids() {
        let raw = "8e1c2f8e-45ab-4d01-9b2c-5f0a4a6e9d11";
        let ident = parse_node_ident(raw).unwrap();
        assert_eq!(ident, NodeIdent::Uuid(Uuid::parse_str(raw).unwrap()));
    }

    #[test]
    fn plain_names_parse_as_names() {
        assert_eq!(
            parse_node_ident("compute-01.rack2").unwrap(),
            NodeIdent::Name("compute-01.rack2".to_string())
        );
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        assert!(matches!(
            parse_node_ident(""),
            Err(DispatchError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            parse_node_ident("bad name with spaces"),
            Err(DispatchError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            parse_node_ident("node/with/slashes"),
            Err(DispatchError::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn topic_resolves_by_uuid_and_name() {
        let inventory = Arc::new(Inventory::new());
        let n = node("compute-01", "cond-1.example.com");
        let uuid = n.uuid;
        inventory.insert_node(n).await.unwrap();

        let dispatcher = Dispatcher::new(Arc::clone(&inventory));

        let (by_uuid, topic) = dispatcher.topic_for(&uuid.to_string()).await.unwrap();
        assert_eq!(by_uuid.uuid, uuid);
        assert_eq!(topic, "conductor.cond-1.example.com");

        let (by_name, topic) = dispatcher.topic_for("compute-01").await.unwrap();
        assert_eq!(by_name.uuid, uuid);
        assert_eq!(topic, "conductor.cond-1.example.com");
    }

    #[tokio::test]
    async fn unknown_nodes_are_not_found() {
        let inventory = Arc::new(Inventory::new());
        let dispatcher = Dispatcher::new(inventory);

        assert!(matches!(
            dispatcher.topic_for("compute-99").await,
            Err(DispatchError::NodeNotFound(_))
        ));
        assert!(matches!(
            dispatcher.topic_for(&Uuid::new_v4().to_string()).await,
            Err(DispatchError::NodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn uuid_convention_wins_over_name_lookup() {
        // A node whose *name* is UUID-shaped is never found by that name;
        // the identifier resolves through the UUID index instead.
        let inventory = Arc::new(Inventory::new());
        let mut n = node("placeholder", "cond-1");
        n.name = Uuid::new_v4().to_string();
        let name = n.name.clone();
        inventory.insert_node(n).await.unwrap();

        let dispatcher = Dispatcher::new(inventory);
        assert!(matches!(
            dispatcher.topic_for(&name).await,
            Err(DispatchError::NodeNotFound(_))
        ));
    }
}
