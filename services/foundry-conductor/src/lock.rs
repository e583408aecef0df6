// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Exclusive per-node reservations
//!
//! Every operation that mutates a node's lifecycle-affecting state must hold
//! that node's reservation for the full duration of the mutation. The
//! reservation is fail-fast: a second `reserve` while one is held fails with
//! [`LockError::AlreadyLocked`] immediately, pushing retry-or-wait policy to
//! the caller rather than queueing internally.
//!
//! [`NodeLockGuard`] releases the reservation when dropped, so every exit
//! path of a holder (success, validation failure, remote-agent failure)
//! releases without explicit bookkeeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Reservation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("node {node_id} is locked by {holder}")]
    AlreadyLocked { node_id: Uuid, holder: String },

    #[error("node {node_id} is not reserved by {owner}")]
    NotOwner { node_id: Uuid, owner: String },
}

/// An active reservation on a node.
#[derive(Debug, Clone)]
pub struct Reservation {
    /// Owner token (the reserving conductor's host)
    pub owner: String,
    /// Monotonically increasing per-node reservation version
    pub version: u64,
    /// When the reservation was taken
    pub acquired_at: DateTime<Utc>,
}

/// Per-node lock state. The version outlives individual reservations so it
/// keeps increasing across reserve/release cycles.
#[derive(Debug, Default)]
struct LockSlot {
    holder: Option<Reservation>,
    version: u64,
}

/// Exclusive reservation manager for all nodes this conductor touches.
#[derive(Debug, Default)]
pub struct NodeLockManager {
    slots: Mutex<HashMap<Uuid, LockSlot>>,
}

impl NodeLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<Uuid, LockSlot>> {
        // A poisoned mutex means a panic while holding it; the map itself
        // is still structurally sound, so take it back.
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Reserve `node_id` for `owner`.
    ///
    /// Fails fast with `AlreadyLocked` (carrying the current holder) if any
    /// reservation is active, including one held by `owner` itself; the
    /// reservation is not reentrant.
    pub fn reserve(
        self: &Arc<Self>,
        node_id: Uuid,
        owner: &str,
    ) -> Result<NodeLockGuard, LockError> {
        let mut slots = self.slots();
        let slot = slots.entry(node_id).or_default();

        if let Some(current) = &slot.holder {
            return Err(LockError::AlreadyLocked {
                node_id,
                holder: current.owner.clone(),
            });
        }

        slot.version += 1;
        slot.holder = Some(Reservation {
            owner: owner.to_string(),
            version: slot.version,
            acquired_at: Utc::now(),
        });

        tracing::debug!(node_id = %node_id, owner = %owner, version = slot.version, "Reserved node");

        Ok(NodeLockGuard {
            manager: Arc::clone(self),
            node_id,
            owner: owner.to_string(),
        })
    }

    /// Release the reservation on `node_id` held by `owner`.
    ///
    /// Releasing with a mismatched owner (or with no reservation active)
    /// fails with `NotOwner` and does not alter state.
    pub fn release(&self, node_id: Uuid, owner: &str) -> Result<(), LockError> {
        let mut slots = self.slots();
        let slot = slots.get_mut(&node_id).ok_or_else(|| LockError::NotOwner {
            node_id,
            owner: owner.to_string(),
        })?;

        match &slot.holder {
            Some(current) if current.owner == owner => {
                slot.holder = None;
                tracing::debug!(node_id = %node_id, owner = %owner, "Released node");
                Ok(())
            }
            _ => Err(LockError::NotOwner {
                node_id,
                owner: owner.to_string(),
            }),
        }
    }

    /// Current reservation holder, if the node is locked.
    pub fn holder(&self, node_id: Uuid) -> Option<String> {
        self.slots()
            .get(&node_id)
            .and_then(|slot| slot.holder.as_ref().map(|r| r.owner.clone()))
    }

    /// Reservation version of the node (0 if it was never reserved).
    pub fn version(&self, node_id: Uuid) -> u64 {
        self.slots().get(&node_id).map(|s| s.version).unwrap_or(0)
    }
}

/// RAII guard for a node reservation.
///
/// Dropping the guard releases the reservation; `release()` does the same
/// explicitly for callers that want to surface release ordering in the code.
#[derive(Debug)]
pub struct NodeLockGuard {
    manager: Arc<NodeLockManager>,
    node_id: Uuid,
    owner: String,
}

impl NodeLockGuard {
    /// Node this guard reserves.
    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    /// Release the reservation now.
    pub fn release(self) {
        // Drop does the work.
    }
}

impl Drop for NodeLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.manager.release(self.node_id, &self.owner) {
            // Only reachable if the reservation was torn down externally
            // (e.g. a staleness sweep); nothing left to release.
            tracing::warn!(node_id = %self.node_id, error = %e, "Reservation already gone at release");
        }
    }
}
