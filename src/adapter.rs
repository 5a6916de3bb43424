// src/adapter.rs
//! The boundary between the routing engines and the host system.
//!
//! Engines push everything outward through an [`Adapter`]: diagnostics,
//! protocol messages, the local link state, the computed next hops and the
//! mobile address state. Every call is synchronous and must return promptly.

use tracing::{Level, debug, error, info, trace, warn};

use crate::data::{ControlMessage, LinkState, MobileKeys, NextHops};

/// Logical destination that reaches every directly attached router.
pub const ALL_PEERS: &str = "_peer";

/// Prefix of the area-wide and per-router control destinations.
pub const TOPO_PREFIX: &str = "_topo";

/// Destination reaching every router of `area`.
pub fn area_dest(area: &str) -> String {
    format!("{TOPO_PREFIX}.{area}.all")
}

/// Destination reaching router `id` in `area`.
pub fn router_dest(area: &str, id: &str) -> String {
    format!("{TOPO_PREFIX}.{area}.{id}")
}

/// Host-side collaborator of the neighbor and path engines.
pub trait Adapter {
    /// Diagnostic sink.
    fn log(&mut self, level: Level, text: &str);

    /// Fire-and-forget transmission of a control message.
    fn send(&mut self, dest: &str, message: &ControlMessage);

    /// This router's own advertised link state has changed.
    fn local_link_state_changed(&mut self, link_state: &LinkState);

    /// A fresh next-hop table has been computed.
    fn next_hops_changed(&mut self, next_hops: &NextHops);

    /// Our mobile address sequence advanced; it belongs in our router
    /// advertisements.
    fn mobile_seq_changed(&mut self, _mobile_seq: u64) {}

    /// The set of remote mobile address keys changed.
    fn mobile_keys_changed(&mut self, _keys: &MobileKeys) {}
}

/// An adapter that forwards logs to `tracing` and queues everything else
/// until the owner drains it.
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    pub logs: Vec<(Level, String)>,
    pub sent: Vec<(String, ControlMessage)>,
    pub link_state: Option<LinkState>,
    pub next_hops: Option<NextHops>,
    pub mobile_seq: Option<u64>,
    pub mobile_keys: Option<MobileKeys>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_sent(&mut self) -> Vec<(String, ControlMessage)> {
        std::mem::take(&mut self.sent)
    }

    pub fn take_link_state(&mut self) -> Option<LinkState> {
        self.link_state.take()
    }

    pub fn take_next_hops(&mut self) -> Option<NextHops> {
        self.next_hops.take()
    }

    pub fn take_mobile_seq(&mut self) -> Option<u64> {
        self.mobile_seq.take()
    }

    pub fn take_mobile_keys(&mut self) -> Option<MobileKeys> {
        self.mobile_keys.take()
    }
}

impl Adapter for RecordingAdapter {
    fn log(&mut self, level: Level, text: &str) {
        match level {
            Level::ERROR => error!("{text}"),
            Level::WARN => warn!("{text}"),
            Level::INFO => info!("{text}"),
            Level::DEBUG => debug!("{text}"),
            _ => trace!("{text}"),
        }
        self.logs.push((level, text.to_owned()));
    }

    fn send(&mut self, dest: &str, message: &ControlMessage) {
        trace!(dest = %dest, opcode = message.opcode(), "queued control message");
        self.sent.push((dest.to_owned(), message.clone()));
    }

    fn local_link_state_changed(&mut self, link_state: &LinkState) {
        self.link_state = Some(link_state.clone());
    }

    fn next_hops_changed(&mut self, next_hops: &NextHops) {
        self.next_hops = Some(next_hops.clone());
    }

    fn mobile_seq_changed(&mut self, mobile_seq: u64) {
        self.mobile_seq = Some(mobile_seq);
    }

    fn mobile_keys_changed(&mut self, keys: &MobileKeys) {
        self.mobile_keys = Some(keys.clone());
    }
}
