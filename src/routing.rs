// src/routing.rs
//! Forwarding bindings derived from next-hop tables.
//!
//! The path engine always publishes a complete table. The data plane wants
//! deltas, so this keeps a mirror of what has been installed and turns each
//! new table into the bind / unbind / rebind operations needed to get there.
//!
//! One mirror is kept per key class: destination routers for topological
//! routes, address keys for mobile routes. The classes never share entries.

use std::hash::Hash;

use indexmap::{Equivalent, IndexMap};

use crate::data::{MobileKeys, NextHops, RouterId};
use crate::event::BindingChange;

/// Mobile address key -> next hop.
pub type KeyRoutes = IndexMap<String, RouterId>;

/// Route every remote mobile key through the next hop of the router that
/// binds it. Routers without a next hop are unreachable and contribute
/// nothing. A key bound at several routers goes to the one nearest to us,
/// which is the first of them in the breadth-first ordered `next_hops`.
pub fn mobile_key_routes(keys: &MobileKeys, next_hops: &NextHops) -> KeyRoutes {
    let mut routes = KeyRoutes::new();
    for (router, hop) in next_hops {
        let Some(bound) = keys.get(router) else {
            continue;
        };
        for key in bound {
            routes.entry(key.clone()).or_insert_with(|| hop.clone());
        }
    }
    routes
}

/// Mirror of the installed key -> next-hop bindings of one key class.
#[derive(Debug)]
pub struct BindingTable<K = RouterId> {
    installed: IndexMap<K, RouterId>,
}

impl<K> Default for BindingTable<K> {
    fn default() -> Self {
        BindingTable {
            installed: IndexMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> BindingTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently installed bindings.
    pub fn all(&self) -> &IndexMap<K, RouterId> {
        &self.installed
    }

    pub fn next_hop<Q>(&self, dest: &Q) -> Option<&RouterId>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.installed.get(dest)
    }

    /// Adopt `table` and return the changes needed to reach it.
    ///
    /// Unbinds come first so that two bindings never overlap for a destination.
    pub fn update(&mut self, table: &IndexMap<K, RouterId>) -> Vec<BindingChange<K>> {
        let mut changes = Vec::new();

        for (dest, old) in &self.installed {
            if !table.contains_key(dest) {
                changes.push(BindingChange::Unbind {
                    dest: dest.clone(),
                    next_hop: old.clone(),
                });
            }
        }

        for (dest, new) in table {
            match self.installed.get(dest) {
                None => changes.push(BindingChange::Bind {
                    dest: dest.clone(),
                    next_hop: new.clone(),
                }),
                Some(old) if old != new => changes.push(BindingChange::Rebind {
                    dest: dest.clone(),
                    old: old.clone(),
                    new: new.clone(),
                }),
                Some(_) => {}
            }
        }

        self.installed = table.clone();
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexSet;

    fn table(pairs: &[(&str, &str)]) -> NextHops {
        pairs
            .iter()
            .map(|(d, h)| (RouterId::from(*d), RouterId::from(*h)))
            .collect()
    }

    #[test]
    fn first_table_binds_everything() {
        let mut bt: BindingTable = BindingTable::new();
        let changes = bt.update(&table(&[("R2", "R2"), ("R3", "R2")]));
        assert_eq!(
            changes,
            vec![
                BindingChange::Bind { dest: "R2".into(), next_hop: "R2".into() },
                BindingChange::Bind { dest: "R3".into(), next_hop: "R2".into() },
            ]
        );
        assert_eq!(bt.next_hop("R3").map(RouterId::as_str), Some("R2"));
    }

    #[test]
    fn unchanged_table_is_a_noop() {
        let mut bt: BindingTable = BindingTable::new();
        let nh = table(&[("R2", "R2")]);
        bt.update(&nh);
        assert!(bt.update(&nh).is_empty());
    }

    #[test]
    fn delta_unbinds_before_binds() {
        let mut bt: BindingTable = BindingTable::new();
        bt.update(&table(&[("R2", "R2"), ("R3", "R2"), ("R4", "R2")]));

        let changes = bt.update(&table(&[("R3", "R5"), ("R4", "R2"), ("R6", "R5")]));
        assert_eq!(
            changes,
            vec![
                BindingChange::Unbind { dest: "R2".into(), next_hop: "R2".into() },
                BindingChange::Rebind { dest: "R3".into(), old: "R2".into(), new: "R5".into() },
                BindingChange::Bind { dest: "R6".into(), next_hop: "R5".into() },
            ]
        );
        assert_eq!(bt.all().len(), 3);
        assert!(bt.next_hop("R2").is_none());
    }

    fn mobile(entries: &[(&str, &[&str])]) -> MobileKeys {
        entries
            .iter()
            .map(|(router, keys)| {
                let keys: IndexSet<String> = keys.iter().map(|k| k.to_string()).collect();
                (RouterId::from(*router), keys)
            })
            .collect()
    }

    #[test]
    fn mobile_keys_follow_router_next_hops() {
        let nh = table(&[("R2", "R2"), ("R3", "R2"), ("R5", "R5")]);
        let keys = mobile(&[("R3", &["a", "b"]), ("R5", &["c"]), ("R9", &["lost"])]);
        let routes = mobile_key_routes(&keys, &nh);
        assert_eq!(
            routes.iter().map(|(k, h)| (k.as_str(), h.as_str())).collect::<Vec<_>>(),
            [("a", "R2"), ("b", "R2"), ("c", "R5")]
        );
    }

    #[test]
    fn shared_key_uses_nearest_router() {
        // R4 is two hops out through R5, R2 is adjacent.
        let nh = table(&[("R2", "R2"), ("R5", "R5"), ("R4", "R5")]);
        let keys = mobile(&[("R4", &["shared"]), ("R2", &["shared"])]);
        let routes = mobile_key_routes(&keys, &nh);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes["shared"], "R2");
    }

    #[test]
    fn key_class_is_separate_from_routers() {
        let mut routers: BindingTable = BindingTable::new();
        let mut mobile_keys: BindingTable<String> = BindingTable::new();
        let nh = table(&[("R2", "R2")]);
        routers.update(&nh);

        let mut routes = KeyRoutes::new();
        routes.insert("R2".to_string(), "R2".into());
        let changes = mobile_keys.update(&routes);
        assert_eq!(
            changes,
            vec![BindingChange::Bind { dest: "R2".to_string(), next_hop: RouterId::from("R2") }]
        );

        let changes = mobile_keys.update(&KeyRoutes::new());
        assert!(matches!(&changes[..], [BindingChange::Unbind { dest, .. }] if dest == "R2"));
        assert!(mobile_keys.all().is_empty());
        assert_eq!(routers.next_hop("R2").map(RouterId::as_str), Some("R2"));
    }
}
