// src/neighbor.rs
//! Neighbor discovery and liveness.
//!
//! This module handles:
//! - Tracking neighbors heard via HELLO messages
//! - Bidirectional confirmation (the neighbor lists us in its seen set)
//! - Periodic HELLO broadcast
//! - Pruning neighbors that went silent for longer than the hold time
//! - Maintaining and publishing this router's own link state
//!
//! A candidate neighbor is unknown (no record), seen one-way, or established.
//! Changes to the advertised peer set only surface on the next `tick`.

use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::Level;

use crate::adapter::{ALL_PEERS, Adapter};
use crate::config::RouterConfig;
use crate::data::{ControlMessage, LinkState, MessageHello, RouterId};
use crate::error::ConfigError;

/// What we know about one router we have heard a HELLO from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub id: RouterId,
    /// Time of the last received HELLO.
    pub last_hello_rx: Duration,
    /// Whether that HELLO listed us as seen.
    pub established: bool,
}

impl Neighbor {
    pub fn new(id: RouterId, now: Duration) -> Self {
        Neighbor {
            id,
            last_hello_rx: now,
            established: false,
        }
    }

    /// Called when a HELLO is received from this neighbor.
    pub fn note_hello(&mut self, sees_us: bool, now: Duration) {
        self.last_hello_rx = now;
        self.established = sees_us;
    }

    /// Whether the neighbor has been silent for longer than `hold_time`.
    pub fn is_stale(&self, now: Duration, hold_time: Duration) -> bool {
        now.saturating_sub(self.last_hello_rx) > hold_time
    }
}

/// Table of all neighbors heard from and not yet expired, in first-heard order.
#[derive(Debug, Default)]
pub struct NeighborTable {
    neighbors: IndexMap<RouterId, Neighbor>,
}

impl NeighborTable {
    pub fn new() -> Self {
        NeighborTable {
            neighbors: IndexMap::new(),
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.values()
    }

    pub fn get(&self, id: &str) -> Option<&Neighbor> {
        self.neighbors.get(id)
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Ids of every neighbor heard from, established or not.
    pub fn ids(&self) -> impl Iterator<Item = &RouterId> {
        self.neighbors.keys()
    }

    pub fn established(&self) -> impl Iterator<Item = &RouterId> {
        self.neighbors
            .values()
            .filter(|n| n.established)
            .map(|n| &n.id)
    }

    /// Upsert the record for `id` according to a received HELLO.
    pub fn update_on_hello(&mut self, id: RouterId, sees_us: bool, now: Duration) {
        let n = self
            .neighbors
            .entry(id.clone())
            .or_insert_with(|| Neighbor::new(id, now));
        n.note_hello(sees_us, now);
    }

    /// Remove all stale neighbors and return them.
    pub fn prune_stale(&mut self, now: Duration, hold_time: Duration) -> Vec<Neighbor> {
        let mut removed = Vec::new();
        self.neighbors.retain(|_, n| {
            if n.is_stale(now, hold_time) {
                removed.push(n.clone());
                false
            } else {
                true
            }
        });
        removed
    }
}

/// Runs the HELLO protocol for one router and owns its link state.
pub struct NeighborEngine<A: Adapter> {
    id: RouterId,
    area: String,
    hello_interval: Duration,
    hold_time: Duration,
    last_hello_tx: Duration,
    table: NeighborTable,
    link_state: LinkState,
    adapter: A,
}

impl<A: Adapter> NeighborEngine<A> {
    pub fn new(config: &RouterConfig, adapter: A) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(NeighborEngine {
            id: config.router_id.clone(),
            area: config.area.clone(),
            hello_interval: config.hello_interval,
            hold_time: config.hold_time,
            last_hello_tx: Duration::ZERO,
            table: NeighborTable::new(),
            link_state: LinkState::new(config.router_id.clone(), config.area.clone(), 0, Vec::new()),
            adapter,
        })
    }

    pub fn id(&self) -> &RouterId {
        &self.id
    }

    /// This router's current link state (sequence 0 until first published).
    pub fn link_state(&self) -> &LinkState {
        &self.link_state
    }

    pub fn neighbors(&self) -> impl Iterator<Item = &Neighbor> {
        self.table.all()
    }

    pub fn established_peers(&self) -> impl Iterator<Item = &RouterId> {
        self.table.established()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Record a received HELLO. Never sends and never touches the link state.
    pub fn handle_hello(&mut self, msg: &MessageHello, now: Duration) {
        if let Err(e) = msg.check() {
            self.adapter.log(Level::WARN, &format!("dropping hello: {e}"));
            return;
        }
        if msg.id == self.id {
            return;
        }
        if msg.area != self.area {
            self.adapter.log(
                Level::DEBUG,
                &format!("ignoring hello from {} in area {}", msg.id, msg.area),
            );
            return;
        }

        let sees_us = msg.is_seen(self.id.as_str());
        self.table.update_on_hello(msg.id.clone(), sees_us, now);
    }

    /// Decode a keyed HELLO body and handle it; undecodable bodies are logged.
    pub fn handle_encoded_hello(&mut self, body: &Value, now: Duration) {
        match MessageHello::from_value(body) {
            Ok(msg) => self.handle_hello(&msg, now),
            Err(e) => self
                .adapter
                .log(Level::WARN, &format!("dropping malformed hello: {e}")),
        }
    }

    /// Expire silent neighbors, send a HELLO if one is due, and publish the
    /// link state if the established set changed.
    pub fn tick(&mut self, now: Duration) {
        for n in self.table.prune_stale(now, self.hold_time) {
            self.adapter
                .log(Level::DEBUG, &format!("neighbor {} expired", n.id));
        }

        if now.saturating_sub(self.last_hello_tx) >= self.hello_interval {
            self.send_hello();
            self.last_hello_tx = now;
        }

        self.refresh_link_state();
    }

    fn send_hello(&mut self) {
        let hello = MessageHello::new(
            self.id.clone(),
            self.area.clone(),
            self.table.ids().cloned(),
        );
        self.adapter.send(ALL_PEERS, &ControlMessage::Hello(hello));
    }

    fn refresh_link_state(&mut self) {
        let established: Vec<RouterId> = self.table.established().cloned().collect();
        let lost: Vec<RouterId> = self
            .link_state
            .peers
            .iter()
            .filter(|p| !established.contains(p))
            .cloned()
            .collect();

        let mut changed = false;
        for id in lost {
            if self.link_state.del_peer(id.as_str()) {
                changed = true;
                self.adapter.log(Level::INFO, &format!("neighbor {id} lost"));
            }
        }
        for id in established {
            let label = id.to_string();
            if self.link_state.add_peer(id) {
                changed = true;
                self.adapter
                    .log(Level::INFO, &format!("neighbor {label} established"));
            }
        }

        if changed {
            self.link_state.bump_sequence();
            self.adapter
                .log(Level::DEBUG, &format!("local {}", self.link_state.summary()));
            self.adapter.local_link_state_changed(&self.link_state);
        }
    }
}
