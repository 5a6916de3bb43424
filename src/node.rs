// src/node.rs
//! High-level router node.
//!
//! This wires NeighborEngine + PathEngine + MobileAddressEngine and one
//! BindingTable per key class into one component that a driver feeds with
//! received control messages, remote link states, local address changes and
//! clock ticks, and drains for outbound events.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapter::{ALL_PEERS, RecordingAdapter, TOPO_PREFIX};
use crate::config::RouterConfig;
use crate::data::{ControlMessage, LinkState, LinkStateCollection, MobileKeys, NextHops, RouterId};
use crate::error::ConfigError;
use crate::event::Event;
use crate::mobile::MobileAddressEngine;
use crate::neighbor::NeighborEngine;
use crate::path::PathEngine;
use crate::routing::{BindingTable, KeyRoutes, mobile_key_routes};

/// A single router's control plane.
pub struct RouterNode {
    id: RouterId,
    area: String,
    neighbors: NeighborEngine<RecordingAdapter>,
    paths: PathEngine<RecordingAdapter>,
    mobile: MobileAddressEngine<RecordingAdapter>,
    collection: LinkStateCollection,
    collection_dirty: bool,
    mobile_keys: MobileKeys,
    bindings: BindingTable,
    key_bindings: BindingTable<String>,
    events: Vec<Event>,
}

impl RouterNode {
    pub fn new(config: RouterConfig) -> Result<Self, ConfigError> {
        let neighbors = NeighborEngine::new(&config, RecordingAdapter::new())?;
        let paths = PathEngine::new(
            config.router_id.clone(),
            config.area.clone(),
            RecordingAdapter::new(),
        );
        let mobile = MobileAddressEngine::new(&config, RecordingAdapter::new())?;
        info!(id = %config.router_id, area = %config.area, "router node instantiated");
        debug!(?config, "router config");

        Ok(RouterNode {
            id: config.router_id,
            area: config.area,
            neighbors,
            paths,
            mobile,
            collection: LinkStateCollection::new(),
            collection_dirty: false,
            mobile_keys: MobileKeys::new(),
            bindings: BindingTable::new(),
            key_bindings: BindingTable::new(),
            events: Vec::new(),
        })
    }

    pub fn id(&self) -> &RouterId {
        &self.id
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    pub fn link_state(&self) -> &LinkState {
        self.neighbors.link_state()
    }

    /// Every link state currently fed to path computation, ours included.
    pub fn collection(&self) -> &LinkStateCollection {
        &self.collection
    }

    pub fn next_hops(&self) -> &NextHops {
        self.paths.next_hops()
    }

    pub fn neighbors(&self) -> &NeighborEngine<RecordingAdapter> {
        &self.neighbors
    }

    pub fn mobile(&self) -> &MobileAddressEngine<RecordingAdapter> {
        &self.mobile
    }

    /// Installed mobile key bindings.
    pub fn key_routes(&self) -> &KeyRoutes {
        self.key_bindings.all()
    }

    /// A client bound `key` at this router.
    ///
    /// Control destinations are never mobile and are skipped.
    pub fn add_local_address(&mut self, key: &str) {
        if is_control_key(key) {
            debug!(key, "skipping control address");
            return;
        }
        self.mobile.add_local_address(key);
    }

    pub fn del_local_address(&mut self, key: &str) {
        if is_control_key(key) {
            debug!(key, "skipping control address");
            return;
        }
        self.mobile.del_local_address(key);
    }

    /// A router advertisement relayed by the flooding layer announced `id`'s
    /// current mobile sequence.
    pub fn router_advertised(&mut self, id: &RouterId, area: &str, mobile_seq: u64, now: Duration) {
        self.mobile.handle_advertisement(id, area, mobile_seq, now);
    }

    /// Decode and dispatch one received control message. Malformed or
    /// unknown messages are logged and dropped.
    pub fn handle_control_message(&mut self, opcode: &str, body: &Value, now: Duration) {
        match ControlMessage::decode(opcode, body) {
            Ok(ControlMessage::Hello(msg)) => {
                self.neighbors.handle_hello(&msg, now);
            }
            Ok(ControlMessage::Mau(msg)) => {
                self.mobile.handle_mau(&msg, now);
            }
            Ok(ControlMessage::Mar(msg)) => {
                self.mobile.handle_mar(&msg);
            }
            Err(e) => {
                warn!(opcode, error = %e, "dropping control message");
            }
        }
    }

    /// Fold in a remote router's link state delivered by the flooding layer.
    ///
    /// Only strictly newer sequence numbers from our own area are accepted.
    /// Returns whether the collection changed.
    pub fn link_state_received(&mut self, ls: LinkState) -> bool {
        if ls.id == self.id {
            return false;
        }
        if ls.area != self.area {
            debug!(id = %ls.id, area = %ls.area, "ignoring link state from other area");
            return false;
        }
        if let Some(current) = self.collection.get(&ls.id) {
            if current.ls_seq >= ls.ls_seq {
                return false;
            }
        }
        debug!("remote {}", ls.summary());
        self.collection.insert(ls.id.clone(), ls);
        self.collection_dirty = true;
        true
    }

    /// Drop a remote router's link state, e.g. when it aged out upstream.
    pub fn link_state_withdrawn(&mut self, id: &str) -> bool {
        if self.id == id {
            return false;
        }
        let removed = self.collection.shift_remove(id).is_some();
        self.collection_dirty |= removed;
        removed
    }

    /// Run one timer iteration of every engine and queue the resulting events.
    pub fn tick(&mut self, now: Duration) {
        self.neighbors.tick(now);

        let out = self.neighbors.adapter_mut();
        let sent = out.take_sent();
        let local = out.take_link_state();
        out.logs.clear();

        for (dest, message) in sent {
            self.events.push(Event::Send { dest, message });
        }
        if let Some(ls) = local {
            self.collection.insert(ls.id.clone(), ls.clone());
            self.collection_dirty = true;
            self.events.push(Event::LinkStateChanged(ls));
        }

        if self.collection_dirty {
            self.collection_dirty = false;
            self.paths.ls_collection_changed(self.collection.clone());
        }
        self.paths.tick(now);

        let out = self.paths.adapter_mut();
        let next_hops = out.take_next_hops();
        out.logs.clear();

        self.mobile.tick(now);
        let out = self.mobile.adapter_mut();
        let sent = out.take_sent();
        let mobile_seq = out.take_mobile_seq();
        let mobile_keys = out.take_mobile_keys();
        out.logs.clear();

        for (dest, message) in sent {
            self.events.push(Event::Send { dest, message });
        }
        if let Some(seq) = mobile_seq {
            self.events.push(Event::MobileSeqChanged(seq));
        }
        if let Some(keys) = mobile_keys {
            self.mobile_keys = keys;
        }

        if let Some(next_hops) = next_hops {
            let changes = self.bindings.update(&next_hops);
            if !changes.is_empty() {
                info!(routes = next_hops.len(), "new routing table");
                for (dest, hop) in &next_hops {
                    info!("  {dest} => {hop}");
                }
            }
            self.events.extend(changes.into_iter().map(Event::Binding));

            let routes = mobile_key_routes(&self.mobile_keys, &next_hops);
            let changes = self.key_bindings.update(&routes);
            if !changes.is_empty() {
                info!(keys = routes.len(), "new mobile key table");
                for (key, hop) in &routes {
                    info!("  {key} => {hop}");
                }
            }
            self.events.extend(changes.into_iter().map(Event::KeyBinding));
        }
    }

    /// Take and return all pending events since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Convenience: tick the node and return any events produced.
    pub fn tick_with_events(&mut self, now: Duration) -> Vec<Event> {
        self.tick(now);
        self.drain_events()
    }
}

fn is_control_key(key: &str) -> bool {
    key.starts_with(TOPO_PREFIX) || key.starts_with(ALL_PEERS)
}
