// src/path.rs
//! Shortest-path-first next-hop computation.
//!
//! The adjacency database is the last link-state collection delivered by the
//! flooding layer, replaced wholesale on every delivery. Each link state's
//! peers are directed out-edges; a breadth-first search from the local router
//! yields, for every reachable router, the neighbor to forward through.
//!
//! Equal-length paths are resolved by discovery order: queue order first,
//! then the stored order of each router's peer list.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tracing::Level;

use crate::adapter::Adapter;
use crate::data::{LinkStateCollection, NextHops, RouterId};

/// Computes next hops for one router.
pub struct PathEngine<A: Adapter> {
    id: RouterId,
    area: String,
    collection: LinkStateCollection,
    next_hops: NextHops,
    adapter: A,
}

impl<A: Adapter> PathEngine<A> {
    pub fn new(id: impl Into<RouterId>, area: impl Into<String>, adapter: A) -> Self {
        PathEngine {
            id: id.into(),
            area: area.into(),
            collection: LinkStateCollection::new(),
            next_hops: NextHops::new(),
            adapter,
        }
    }

    /// The table published by the most recent `tick`.
    pub fn next_hops(&self) -> &NextHops {
        &self.next_hops
    }

    pub fn collection(&self) -> &LinkStateCollection {
        &self.collection
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Replace the adjacency database. Nothing is merged.
    pub fn ls_collection_changed(&mut self, collection: LinkStateCollection) {
        for ls in collection.values().filter(|ls| ls.area != self.area) {
            self.adapter.log(
                Level::DEBUG,
                &format!("ignoring link state of {} from area {}", ls.id, ls.area),
            );
        }
        self.collection = collection;
    }

    /// Recompute the next-hop table and publish it.
    pub fn tick(&mut self, _now: Duration) {
        self.next_hops = self.calculate_next_hops();
        self.adapter.log(
            Level::TRACE,
            &format!("computed {} next hops", self.next_hops.len()),
        );
        self.adapter.next_hops_changed(&self.next_hops);
    }

    fn in_other_area(&self, id: &RouterId) -> bool {
        self.collection
            .get(id)
            .is_some_and(|ls| ls.area != self.area)
    }

    fn calculate_next_hops(&self) -> NextHops {
        let mut next_hops = NextHops::new();
        let mut visited: HashSet<&RouterId> = HashSet::from([&self.id]);
        let mut queue: VecDeque<&RouterId> = VecDeque::from([&self.id]);

        while let Some(node) = queue.pop_front() {
            // Routers without a link state are leaves.
            let Some(ls) = self.collection.get(node) else {
                continue;
            };
            if ls.area != self.area {
                continue;
            }

            for peer in &ls.peers {
                if self.in_other_area(peer) || !visited.insert(peer) {
                    continue;
                }
                // Every queued router other than ourselves already has a hop.
                let first_hop = if *node == self.id {
                    peer.clone()
                } else {
                    next_hops[node].clone()
                };
                next_hops.insert(peer.clone(), first_hop);
                queue.push_back(peer);
            }
        }

        next_hops
    }
}
