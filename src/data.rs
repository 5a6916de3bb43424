// src/data.rs
//! Protocol data model: router identities, link states, the HELLO message and
//! the mobile-address update/request pair.
//!
//! Every object here has a keyed encoding (a JSON object) which is what the
//! transport layer carries as a message body. Encoding then decoding must
//! reproduce every field exactly, peer order included.

use std::borrow::Borrow;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::DecodeError;

/// Opaque, comparable router identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouterId(String);

impl RouterId {
    pub fn new(id: impl Into<String>) -> Self {
        RouterId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouterId {
    fn from(s: &str) -> Self {
        RouterId(s.to_owned())
    }
}

impl From<String> for RouterId {
    fn from(s: String) -> Self {
        RouterId(s)
    }
}

impl Borrow<str> for RouterId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for RouterId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RouterId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Next-hop table: destination router -> neighbor to forward through.
pub type NextHops = IndexMap<RouterId, RouterId>;

/// Latest link state per router, as delivered by the flooding layer.
pub type LinkStateCollection = IndexMap<RouterId, LinkState>;

/// Mobile address keys currently bound at each remote router.
pub type MobileKeys = IndexMap<RouterId, IndexSet<String>>;

/// The link state of a single router: the neighbors it currently advertises
/// as established, stamped with a sequence number that advances on change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkState {
    pub id: RouterId,
    pub area: String,
    pub ls_seq: u64,
    /// Directed out-edges of `id`, in advertisement order.
    pub peers: IndexSet<RouterId>,
}

impl LinkState {
    pub fn new(
        id: impl Into<RouterId>,
        area: impl Into<String>,
        ls_seq: u64,
        peers: impl IntoIterator<Item = RouterId>,
    ) -> Self {
        let id = id.into();
        let peers = peers.into_iter().filter(|p| *p != id).collect();
        LinkState {
            id,
            area: area.into(),
            ls_seq,
            peers,
        }
    }

    /// Rebuild a link state from its keyed encoding.
    pub fn from_value(body: &Value) -> Result<Self, DecodeError> {
        let ls = LinkState::deserialize(body)?;
        if ls.id.is_empty() {
            return Err(DecodeError::EmptyField("id"));
        }
        if ls.area.is_empty() {
            return Err(DecodeError::EmptyField("area"));
        }
        if ls.peers.contains(&ls.id) {
            return Err(DecodeError::SelfPeer(ls.id.to_string()));
        }
        Ok(ls)
    }

    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "area": self.area,
            "ls_seq": self.ls_seq,
            "peers": self.peers,
        })
    }

    /// Append `id` to the peer list. Returns false if it was already there
    /// (or is this router's own id).
    pub fn add_peer(&mut self, id: RouterId) -> bool {
        if id == self.id {
            return false;
        }
        self.peers.insert(id)
    }

    /// Remove `id` from the peer list, keeping the order of the rest.
    pub fn del_peer(&mut self, id: &str) -> bool {
        self.peers.shift_remove(id)
    }

    pub fn has_peer(&self, id: &str) -> bool {
        self.peers.contains(id)
    }

    pub fn bump_sequence(&mut self) {
        self.ls_seq += 1;
    }

    /// Short human-ish description for logging.
    pub fn summary(&self) -> String {
        let peers: Vec<&str> = self.peers.iter().map(RouterId::as_str).collect();
        format!(
            "LS(id={} area={} ls_seq={} peers={:?})",
            self.id, self.area, self.ls_seq, peers
        )
    }
}

/// HELLO: one-hop liveness message. `seen_peers` lists every router the
/// sender has itself heard from, which is how the receiver learns the link
/// works in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHello {
    pub id: RouterId,
    pub area: String,
    #[serde(rename = "seen")]
    pub seen_peers: IndexSet<RouterId>,
}

impl MessageHello {
    pub const OPCODE: &'static str = "HELLO";

    pub fn new(
        id: impl Into<RouterId>,
        area: impl Into<String>,
        seen_peers: impl IntoIterator<Item = RouterId>,
    ) -> Self {
        MessageHello {
            id: id.into(),
            area: area.into(),
            seen_peers: seen_peers.into_iter().collect(),
        }
    }

    pub fn from_value(body: &Value) -> Result<Self, DecodeError> {
        let msg = MessageHello::deserialize(body)?;
        msg.check()?;
        Ok(msg)
    }

    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "area": self.area,
            "seen": self.seen_peers,
        })
    }

    pub fn opcode(&self) -> &'static str {
        Self::OPCODE
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen_peers.contains(id)
    }

    /// Reject messages whose mandatory fields are blank.
    pub(crate) fn check(&self) -> Result<(), DecodeError> {
        check_header(&self.id, &self.area)
    }
}

/// MAU: mobile address update.
///
/// With `exist` set the message is absolute and carries the sender's whole
/// key list. Otherwise it is a differential against `mobile_seq - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMau {
    pub id: RouterId,
    pub area: String,
    pub mobile_seq: u64,
    #[serde(default, rename = "add")]
    pub added: Vec<String>,
    #[serde(default, rename = "del")]
    pub deleted: Vec<String>,
    #[serde(default)]
    pub exist: Option<Vec<String>>,
}

impl MessageMau {
    pub const OPCODE: &'static str = "MAU";

    pub fn differential(
        id: impl Into<RouterId>,
        area: impl Into<String>,
        mobile_seq: u64,
        added: Vec<String>,
        deleted: Vec<String>,
    ) -> Self {
        MessageMau {
            id: id.into(),
            area: area.into(),
            mobile_seq,
            added,
            deleted,
            exist: None,
        }
    }

    pub fn absolute(
        id: impl Into<RouterId>,
        area: impl Into<String>,
        mobile_seq: u64,
        exist: Vec<String>,
    ) -> Self {
        MessageMau {
            id: id.into(),
            area: area.into(),
            mobile_seq,
            added: Vec::new(),
            deleted: Vec::new(),
            exist: Some(exist),
        }
    }

    pub fn from_value(body: &Value) -> Result<Self, DecodeError> {
        let msg = MessageMau::deserialize(body)?;
        check_header(&msg.id, &msg.area)?;
        Ok(msg)
    }

    /// Empty lists are left out of the encoding.
    pub fn to_value(&self) -> Value {
        let mut body = json!({
            "id": self.id,
            "area": self.area,
            "mobile_seq": self.mobile_seq,
        });
        if !self.added.is_empty() {
            body["add"] = json!(self.added);
        }
        if !self.deleted.is_empty() {
            body["del"] = json!(self.deleted);
        }
        if let Some(exist) = &self.exist {
            body["exist"] = json!(exist);
        }
        body
    }

    pub fn opcode(&self) -> &'static str {
        Self::OPCODE
    }

    pub fn is_absolute(&self) -> bool {
        self.exist.is_some()
    }
}

/// MAR: mobile address request. Asks `id`'s peer for an absolute MAU when the
/// sender only holds `have_seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMar {
    pub id: RouterId,
    pub area: String,
    pub have_seq: u64,
}

impl MessageMar {
    pub const OPCODE: &'static str = "MAR";

    pub fn new(id: impl Into<RouterId>, area: impl Into<String>, have_seq: u64) -> Self {
        MessageMar {
            id: id.into(),
            area: area.into(),
            have_seq,
        }
    }

    pub fn from_value(body: &Value) -> Result<Self, DecodeError> {
        let msg = MessageMar::deserialize(body)?;
        check_header(&msg.id, &msg.area)?;
        Ok(msg)
    }

    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "area": self.area,
            "have_seq": self.have_seq,
        })
    }

    pub fn opcode(&self) -> &'static str {
        Self::OPCODE
    }
}

fn check_header(id: &RouterId, area: &str) -> Result<(), DecodeError> {
    if id.is_empty() {
        return Err(DecodeError::EmptyField("id"));
    }
    if area.is_empty() {
        return Err(DecodeError::EmptyField("area"));
    }
    Ok(())
}

/// Any control message this core originates or consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Hello(MessageHello),
    Mau(MessageMau),
    Mar(MessageMar),
}

impl ControlMessage {
    pub fn opcode(&self) -> &'static str {
        match self {
            ControlMessage::Hello(m) => m.opcode(),
            ControlMessage::Mau(m) => m.opcode(),
            ControlMessage::Mar(m) => m.opcode(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ControlMessage::Hello(m) => m.to_value(),
            ControlMessage::Mau(m) => m.to_value(),
            ControlMessage::Mar(m) => m.to_value(),
        }
    }

    /// Dispatch on `opcode` and decode `body` accordingly.
    pub fn decode(opcode: &str, body: &Value) -> Result<Self, DecodeError> {
        match opcode {
            MessageHello::OPCODE => Ok(ControlMessage::Hello(MessageHello::from_value(body)?)),
            MessageMau::OPCODE => Ok(ControlMessage::Mau(MessageMau::from_value(body)?)),
            MessageMar::OPCODE => Ok(ControlMessage::Mar(MessageMar::from_value(body)?)),
            other => Err(DecodeError::UnknownOpcode(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(list: &[&str]) -> Vec<RouterId> {
        list.iter().map(|s| RouterId::from(*s)).collect()
    }

    fn peers_of(ls: &LinkState) -> Vec<&str> {
        ls.peers.iter().map(RouterId::as_str).collect()
    }

    #[test]
    fn link_state_peer_operations() {
        let mut ls = LinkState::new("R1", "area", 1, ids(&["R2", "R3"]));
        assert_eq!(ls.id, "R1");
        assert_eq!(ls.area, "area");
        assert_eq!(ls.ls_seq, 1);
        assert_eq!(peers_of(&ls), ["R2", "R3"]);

        ls.bump_sequence();
        assert_eq!(ls.ls_seq, 2);
        assert_eq!(peers_of(&ls), ["R2", "R3"]);

        assert!(ls.add_peer("R4".into()));
        assert_eq!(peers_of(&ls), ["R2", "R3", "R4"]);
        assert!(!ls.add_peer("R2".into()));
        assert_eq!(peers_of(&ls), ["R2", "R3", "R4"]);

        assert!(ls.del_peer("R3"));
        assert_eq!(peers_of(&ls), ["R2", "R4"]);
        assert!(!ls.del_peer("R5"));
        assert_eq!(peers_of(&ls), ["R2", "R4"]);
        assert_eq!(ls.ls_seq, 2);
    }

    #[test]
    fn link_state_keyed_roundtrip() {
        let mut ls = LinkState::new("R1", "area", 1, ids(&["R4", "R2"]));
        ls.bump_sequence();

        let encoded = ls.to_value();
        assert_eq!(encoded["ls_seq"], 2);
        assert_eq!(encoded["peers"], json!(["R4", "R2"]));

        let decoded = LinkState::from_value(&encoded).unwrap();
        assert_eq!(decoded, ls);
        assert_eq!(peers_of(&decoded), ["R4", "R2"]);
    }

    #[test]
    fn link_state_never_lists_itself() {
        let mut ls = LinkState::new("R1", "area", 1, ids(&["R1", "R2"]));
        assert_eq!(peers_of(&ls), ["R2"]);
        assert!(!ls.add_peer("R1".into()));

        let body = json!({"id": "R1", "area": "area", "ls_seq": 3, "peers": ["R1"]});
        assert!(matches!(
            LinkState::from_value(&body),
            Err(DecodeError::SelfPeer(_))
        ));
    }

    #[test]
    fn link_state_missing_field_rejected() {
        let body = json!({"id": "R1", "area": "area", "peers": []});
        assert!(matches!(
            LinkState::from_value(&body),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn hello_message_roundtrip() {
        let msg1 = MessageHello::new("R1", "area", ids(&["R2", "R3", "R4"]));
        assert_eq!(msg1.opcode(), "HELLO");

        let encoded = msg1.to_value();
        assert_eq!(encoded["seen"], json!(["R2", "R3", "R4"]));

        let msg2 = MessageHello::from_value(&encoded).unwrap();
        assert_eq!(msg2.opcode(), "HELLO");
        assert_eq!(msg2, msg1);
        assert!(msg2.is_seen("R3"));
        assert!(!msg2.is_seen("R9"));
    }

    #[test]
    fn hello_without_id_is_malformed() {
        let missing = json!({"area": "area", "seen": []});
        assert!(MessageHello::from_value(&missing).is_err());

        let blank = json!({"id": "", "area": "area", "seen": []});
        assert!(matches!(
            MessageHello::from_value(&blank),
            Err(DecodeError::EmptyField("id"))
        ));
    }

    #[test]
    fn control_message_dispatches_on_opcode() {
        let body = json!({"id": "R2", "area": "area", "seen": ["R1"]});
        let msg = ControlMessage::decode("HELLO", &body).unwrap();
        assert_eq!(msg.opcode(), "HELLO");
        assert_eq!(msg.to_value(), body);

        assert!(matches!(
            ControlMessage::decode("LSU", &body),
            Err(DecodeError::UnknownOpcode(op)) if op == "LSU"
        ));
    }

    #[test]
    fn mau_encoding_omits_empty_lists() {
        let diff = MessageMau::differential("R1", "area", 4, vec!["a.b".into()], Vec::new());
        assert_eq!(
            diff.to_value(),
            json!({"id": "R1", "area": "area", "mobile_seq": 4, "add": ["a.b"]})
        );
        assert!(!diff.is_absolute());

        let body = json!({"id": "R1", "area": "area", "mobile_seq": 5, "exist": []});
        let abs = MessageMau::from_value(&body).unwrap();
        assert!(abs.is_absolute());
        assert!(abs.added.is_empty() && abs.deleted.is_empty());
        assert_eq!(abs.to_value(), body);
    }

    #[test]
    fn mobile_messages_dispatch_on_opcode() {
        let mar = json!({"id": "R2", "area": "area", "have_seq": 3});
        let msg = ControlMessage::decode("MAR", &mar).unwrap();
        assert_eq!(msg, ControlMessage::Mar(MessageMar::new("R2", "area", 3)));
        assert_eq!(msg.to_value(), mar);

        let mau = json!({"id": "R2", "area": "area", "mobile_seq": 1, "del": ["x"]});
        assert!(matches!(
            ControlMessage::decode("MAU", &mau),
            Ok(ControlMessage::Mau(m)) if m.deleted == ["x"]
        ));

        assert!(ControlMessage::decode("MAR", &json!({"id": "R2", "area": "area"})).is_err());
        assert!(matches!(
            ControlMessage::decode("MAU", &json!({"id": "R2", "area": "", "mobile_seq": 1})),
            Err(DecodeError::EmptyField("area"))
        ));
    }

    proptest! {
        #[test]
        fn peers_stay_duplicate_free(ops in prop::collection::vec((any::<bool>(), 0u8..6), 0..40)) {
            let mut ls = LinkState::new("R0", "area", 1, Vec::new());
            for (add, n) in ops {
                let id = format!("R{n}");
                let before = ls.peers.len();
                let present = ls.has_peer(&id);
                if add {
                    let changed = ls.add_peer(id.into());
                    prop_assert_eq!(changed, !present && n != 0);
                } else {
                    let changed = ls.del_peer(&id);
                    prop_assert_eq!(changed, present);
                }
                prop_assert!(ls.peers.len().abs_diff(before) <= 1);
                prop_assert!(!ls.has_peer("R0"));
                prop_assert_eq!(ls.ls_seq, 1);
            }
            let unique: std::collections::HashSet<_> = ls.peers.iter().collect();
            prop_assert_eq!(unique.len(), ls.peers.len());
        }
    }
}
