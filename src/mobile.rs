// src/mobile.rs
//! Mobile address tracking.
//!
//! Local address keys come and go as clients attach to this router. Changes
//! are batched until the next tick and then announced area-wide as a single
//! differential MAU under a new mobile sequence number. Remote key lists are
//! learned from MAUs, repaired with a MAR whenever a differential does not
//! follow the stored sequence, and forgotten once a router has been silent for
//! longer than `mobile_addr_max_age`.

use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use tracing::Level;

use crate::adapter::{Adapter, area_dest, router_dest};
use crate::config::RouterConfig;
use crate::data::{ControlMessage, MessageMar, MessageMau, MobileKeys, RouterId};
use crate::error::ConfigError;

/// What we currently hold for one remote router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteKeys {
    pub mobile_seq: u64,
    pub keys: IndexSet<String>,
    pub last_seen: Duration,
}

/// Runs the mobile address protocol for one router.
pub struct MobileAddressEngine<A: Adapter> {
    id: RouterId,
    area: String,
    max_age: Duration,
    mobile_seq: u64,
    local_keys: IndexSet<String>,
    added_keys: IndexSet<String>,
    deleted_keys: IndexSet<String>,
    remotes: IndexMap<RouterId, RemoteKeys>,
    remotes_changed: bool,
    /// Router -> (its area, the sequence we hold for it).
    needed_mars: IndexMap<RouterId, (String, u64)>,
    adapter: A,
}

impl<A: Adapter> MobileAddressEngine<A> {
    pub fn new(config: &RouterConfig, adapter: A) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(MobileAddressEngine {
            id: config.router_id.clone(),
            area: config.area.clone(),
            max_age: config.mobile_addr_max_age,
            mobile_seq: 0,
            local_keys: IndexSet::new(),
            added_keys: IndexSet::new(),
            deleted_keys: IndexSet::new(),
            remotes: IndexMap::new(),
            remotes_changed: false,
            needed_mars: IndexMap::new(),
            adapter,
        })
    }

    /// Sequence of the last announced change to our own keys.
    pub fn mobile_seq(&self) -> u64 {
        self.mobile_seq
    }

    /// Keys already announced as bound here. Pending changes are not included.
    pub fn local_keys(&self) -> impl Iterator<Item = &str> {
        self.local_keys.iter().map(String::as_str)
    }

    pub fn remote(&self, id: &str) -> Option<&RemoteKeys> {
        self.remotes.get(id)
    }

    /// Key lists of every remote router we hold, in first-learned order.
    pub fn remote_keys(&self) -> MobileKeys {
        self.remotes
            .iter()
            .map(|(id, remote)| (id.clone(), remote.keys.clone()))
            .collect()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// A key became bound locally. Undoes a pending delete of the same key.
    pub fn add_local_address(&mut self, key: &str) {
        if self.local_keys.contains(key) {
            self.deleted_keys.shift_remove(key);
        } else {
            self.added_keys.insert(key.to_owned());
        }
    }

    /// A key is no longer bound locally. Undoes a pending add of the same key.
    pub fn del_local_address(&mut self, key: &str) {
        if self.local_keys.contains(key) {
            self.deleted_keys.insert(key.to_owned());
        } else {
            self.added_keys.shift_remove(key);
        }
    }

    /// A router advertisement carried `id`'s current mobile sequence.
    pub fn handle_advertisement(&mut self, id: &RouterId, area: &str, mobile_seq: u64, now: Duration) {
        if *id == self.id || mobile_seq == 0 {
            return;
        }
        if area != self.area {
            self.adapter.log(
                Level::DEBUG,
                &format!("ignoring mobile sequence of {id} from area {area}"),
            );
            return;
        }
        match self.remotes.get_mut(id) {
            Some(remote) => {
                remote.last_seen = now;
                if remote.mobile_seq < mobile_seq {
                    self.needed_mars
                        .insert(id.clone(), (area.to_owned(), remote.mobile_seq));
                }
            }
            None => {
                self.needed_mars.insert(id.clone(), (area.to_owned(), 0));
            }
        }
    }

    pub fn handle_mau(&mut self, msg: &MessageMau, now: Duration) {
        if msg.id == self.id {
            return;
        }
        if msg.area != self.area {
            self.adapter.log(
                Level::DEBUG,
                &format!("ignoring mobile update of {} from area {}", msg.id, msg.area),
            );
            return;
        }

        if let Some(exist) = &msg.exist {
            if self
                .remotes
                .get(&msg.id)
                .is_some_and(|r| r.mobile_seq >= msg.mobile_seq)
            {
                return;
            }
            self.adapter.log(
                Level::DEBUG,
                &format!("{} binds {} mobile keys at seq {}", msg.id, exist.len(), msg.mobile_seq),
            );
            self.remotes.insert(
                msg.id.clone(),
                RemoteKeys {
                    mobile_seq: msg.mobile_seq,
                    keys: exist.iter().cloned().collect(),
                    last_seen: now,
                },
            );
            self.remotes_changed = true;
            return;
        }

        let Some(remote) = self.remotes.get_mut(&msg.id) else {
            self.needed_mars.insert(msg.id.clone(), (msg.area.clone(), 0));
            return;
        };
        if remote.mobile_seq == msg.mobile_seq {
            return;
        }
        remote.last_seen = now;
        if remote.mobile_seq.checked_add(1) == Some(msg.mobile_seq) {
            remote.keys.extend(msg.added.iter().cloned());
            for key in &msg.deleted {
                remote.keys.shift_remove(key);
            }
            remote.mobile_seq = msg.mobile_seq;
            self.remotes_changed = true;
        } else if msg.mobile_seq > remote.mobile_seq {
            self.needed_mars
                .insert(msg.id.clone(), (msg.area.clone(), remote.mobile_seq));
        }
    }

    /// Answer a peer that is behind with our complete key list.
    pub fn handle_mar(&mut self, msg: &MessageMar) {
        if msg.id == self.id || msg.area != self.area {
            return;
        }
        if msg.have_seq < self.mobile_seq {
            let mau = MessageMau::absolute(
                self.id.clone(),
                self.area.clone(),
                self.mobile_seq,
                self.local_keys.iter().cloned().collect(),
            );
            self.adapter
                .send(&router_dest(&msg.area, msg.id.as_str()), &ControlMessage::Mau(mau));
        }
    }

    /// Expire silent routers, send pending requests, then announce local
    /// changes and publish the remote key lists if either moved.
    pub fn tick(&mut self, now: Duration) {
        self.expire_remotes(now);
        self.send_mars();

        if !self.added_keys.is_empty() || !self.deleted_keys.is_empty() {
            self.mobile_seq += 1;
            let added: Vec<String> = self.added_keys.drain(..).collect();
            let deleted: Vec<String> = self.deleted_keys.drain(..).collect();
            self.local_keys.extend(added.iter().cloned());
            for key in &deleted {
                self.local_keys.shift_remove(key);
            }
            self.adapter.log(
                Level::DEBUG,
                &format!(
                    "mobile seq {}: +{:?} -{:?}",
                    self.mobile_seq, added, deleted
                ),
            );

            let mau = MessageMau::differential(
                self.id.clone(),
                self.area.clone(),
                self.mobile_seq,
                added,
                deleted,
            );
            self.adapter
                .send(&area_dest(&self.area), &ControlMessage::Mau(mau));
            self.adapter.mobile_seq_changed(self.mobile_seq);
        }

        if self.remotes_changed {
            self.remotes_changed = false;
            let keys = self.remote_keys();
            self.adapter.mobile_keys_changed(&keys);
        }
    }

    fn expire_remotes(&mut self, now: Duration) {
        let max_age = self.max_age;
        let before = self.remotes.len();
        let adapter = &mut self.adapter;
        self.remotes.retain(|id, remote| {
            let alive = now.saturating_sub(remote.last_seen) <= max_age;
            if !alive {
                adapter.log(Level::INFO, &format!("mobile keys of {id} expired"));
            }
            alive
        });
        if self.remotes.len() != before {
            self.remotes_changed = true;
        }
    }

    fn send_mars(&mut self) {
        for (id, (area, have_seq)) in std::mem::take(&mut self.needed_mars) {
            let mar = MessageMar::new(self.id.clone(), self.area.clone(), have_seq);
            self.adapter
                .send(&router_dest(&area, id.as_str()), &ControlMessage::Mar(mar));
        }
    }
}
