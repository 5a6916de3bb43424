// src/event.rs
//! High-level events emitted by a router node.
//!
//! This allows the host to transmit messages, flood link state and program
//! forwarding without polling and diffing internal state.

use crate::data::{ControlMessage, LinkState, RouterId};

/// One change to the forwarding bindings of one key class.
///
/// Topological bindings are keyed by destination router, mobile key bindings
/// by address key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingChange<K = RouterId> {
    /// A destination became reachable.
    Bind { dest: K, next_hop: RouterId },

    /// A destination is no longer reachable.
    Unbind { dest: K, next_hop: RouterId },

    /// A destination is now reached through a different neighbor.
    Rebind { dest: K, old: RouterId, new: RouterId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A control message must be transmitted to `dest`.
    Send { dest: String, message: ControlMessage },

    /// Our own link state changed and should be flooded.
    LinkStateChanged(LinkState),

    /// Our mobile address sequence advanced and should be advertised.
    MobileSeqChanged(u64),

    /// The router bindings must be updated.
    Binding(BindingChange),

    /// The mobile key bindings must be updated.
    KeyBinding(BindingChange<String>),
}
