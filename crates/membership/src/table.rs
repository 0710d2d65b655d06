// Copyright 2025 ScopeDB <contact@scopedb.io>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;

use quorumkv_core::Address;
use quorumkv_transport::EventSink;

/// `{ heartbeat, last_seen }` for one peer. `heartbeat` is monotonically
/// non-decreasing per identity across updates; `last_seen` is the local
/// clock value at the time of the last accepted update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberEntry {
    pub addr: Address,
    pub heartbeat: u64,
    pub last_seen: u64,
}

/// Two disjoint address-hash-keyed maps (`active`, `failed`) plus an
/// ordered `member_list` mirroring `active`, used by the disseminator for
/// random sampling. The local node's own entry is never stored here.
#[derive(Debug, Default)]
pub struct MembershipTable {
    self_addr_hash: Option<u64>,
    active: HashMap<u64, MemberEntry>,
    failed: HashMap<u64, MemberEntry>,
    member_list: Vec<u64>,
}

impl MembershipTable {
    pub fn new(self_addr: Address) -> Self {
        Self {
            self_addr_hash: Some(self_addr.hash()),
            active: HashMap::new(),
            failed: HashMap::new(),
            member_list: Vec::new(),
        }
    }

    /// A deterministic snapshot of active member addresses, sorted
    /// ascending by `(id, port)`. The ring partitioner is built from this
    /// rather than from `member_list`'s gossip-arrival order, so that any
    /// two nodes observing the same active set build an identical ring.
    pub fn active_addrs(&self) -> Vec<Address> {
        let mut addrs: Vec<Address> = self.active.values().map(|e| e.addr).collect();
        addrs.sort();
        addrs
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, addr: Address) -> bool {
        self.active.contains_key(&addr.hash())
    }

    pub fn is_failed(&self, addr: Address) -> bool {
        self.failed.contains_key(&addr.hash())
    }

    pub fn get_active(&self, addr: Address) -> Option<&MemberEntry> {
        self.active.get(&addr.hash())
    }

    fn is_self(&self, hash: u64) -> bool {
        self.self_addr_hash == Some(hash)
    }

    /// Unconditionally inserts `addr` into `active` with the given
    /// heartbeat, used when a JOINREQ names a brand-new sender.
    pub fn insert_active(&mut self, addr: Address, heartbeat: u64, now: u64, sink: &dyn EventSink, origin: Address) {
        let hash = addr.hash();
        if self.is_self(hash) {
            return;
        }
        if self.active.contains_key(&hash) {
            return;
        }
        self.failed.remove(&hash);
        self.active.insert(
            hash,
            MemberEntry {
                addr,
                heartbeat,
                last_seen: now,
            },
        );
        self.member_list.push(hash);
        sink.node_add(origin, addr);
    }

    /// The merge rule from spec.md §4.1: incorporate one received entry.
    /// Equal heartbeats are ignored, preserving monotonicity and
    /// idempotence under re-gossip.
    pub fn merge_entry(
        &mut self,
        addr: Address,
        heartbeat: u64,
        now: u64,
        sink: &dyn EventSink,
        origin: Address,
    ) {
        let hash = addr.hash();
        if self.is_self(hash) {
            return;
        }

        if let Some(entry) = self.active.get_mut(&hash) {
            if heartbeat > entry.heartbeat {
                entry.heartbeat = heartbeat;
                entry.last_seen = now;
            }
            return;
        }

        if let Some(entry) = self.failed.get(&hash) {
            if heartbeat > entry.heartbeat {
                let mut entry = self.failed.remove(&hash).unwrap();
                entry.heartbeat = heartbeat;
                entry.last_seen = now;
                self.active.insert(hash, entry);
                self.member_list.push(hash);
            }
            return;
        }

        self.active.insert(
            hash,
            MemberEntry {
                addr,
                heartbeat,
                last_seen: now,
            },
        );
        self.member_list.push(hash);
        sink.node_add(origin, addr);
    }

    /// `HEARTBEAT{sender,heartbeat}` handling (spec.md §4.1): unconditionally
    /// drop the sender from `failed` if present there; separately, if the
    /// sender is in `active` and the carried heartbeat is strictly greater
    /// than the stored one, overwrite it and refresh `last_seen`.
    pub fn observe_heartbeat(&mut self, addr: Address, heartbeat: u64, now: u64) {
        let hash = addr.hash();
        if self.is_self(hash) {
            return;
        }
        self.failed.remove(&hash);
        if let Some(entry) = self.active.get_mut(&hash) {
            if heartbeat > entry.heartbeat {
                entry.heartbeat = heartbeat;
                entry.last_seen = now;
            }
        }
    }

    /// Runs the per-tick failure detector sweep (spec.md §4.2): reconcile
    /// `member_list` against `active`, demote timed-out actives to
    /// `failed`, and purge long-failed entries.
    pub fn run_failure_detector(
        &mut self,
        now: u64,
        tfail: u64,
        tremove: u64,
        sink: &dyn EventSink,
        origin: Address,
    ) {
        self.member_list.retain(|h| self.active.contains_key(h));

        let to_fail: Vec<u64> = self
            .active
            .iter()
            .filter(|(_, e)| now.saturating_sub(e.last_seen) >= tfail)
            .map(|(h, _)| *h)
            .collect();
        for hash in to_fail {
            if let Some(entry) = self.active.remove(&hash) {
                self.failed.insert(hash, entry);
            }
        }
        self.member_list.retain(|h| self.active.contains_key(h));

        let to_remove: Vec<u64> = self
            .failed
            .iter()
            .filter(|(_, e)| now.saturating_sub(e.last_seen) >= tremove)
            .map(|(h, _)| *h)
            .collect();
        for hash in to_remove {
            if let Some(entry) = self.failed.remove(&hash) {
                sink.node_remove(origin, entry.addr);
            }
        }
    }

    pub fn member_list_addrs(&self) -> Vec<Address> {
        self.member_list.iter().filter_map(|h| self.active.get(h)).map(|e| e.addr).collect()
    }

    /// The `member_list` snapshot carried by `ADD_MEMBERS_REQ`: each active
    /// peer's address paired with its currently stored heartbeat.
    pub fn member_list_entries(&self) -> Vec<(Address, u64)> {
        self.member_list
            .iter()
            .filter_map(|h| self.active.get(h))
            .map(|e| (e.addr, e.heartbeat))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl EventSink for Noop {}

    fn addr(id: u32) -> Address {
        Address::new(id, 0)
    }

    #[test]
    fn test_unknown_entry_inserted_and_added() {
        let mut table = MembershipTable::new(addr(1));
        table.merge_entry(addr(2), 5, 0, &Noop, addr(1));
        assert!(table.is_active(addr(2)));
        assert_eq!(table.get_active(addr(2)).unwrap().heartbeat, 5);
    }

    #[test]
    fn test_stale_heartbeat_ignored() {
        let mut table = MembershipTable::new(addr(1));
        table.merge_entry(addr(2), 5, 0, &Noop, addr(1));
        table.merge_entry(addr(2), 5, 10, &Noop, addr(1));
        assert_eq!(table.get_active(addr(2)).unwrap().last_seen, 0);
    }

    #[test]
    fn test_greater_heartbeat_updates_last_seen() {
        let mut table = MembershipTable::new(addr(1));
        table.merge_entry(addr(2), 5, 0, &Noop, addr(1));
        table.merge_entry(addr(2), 6, 10, &Noop, addr(1));
        let entry = table.get_active(addr(2)).unwrap();
        assert_eq!(entry.heartbeat, 6);
        assert_eq!(entry.last_seen, 10);
    }

    #[test]
    fn test_self_entry_never_stored() {
        let mut table = MembershipTable::new(addr(1));
        table.merge_entry(addr(1), 5, 0, &Noop, addr(1));
        assert!(!table.is_active(addr(1)));
        assert_eq!(table.active_len(), 0);
    }

    #[test]
    fn test_failure_detector_moves_active_to_failed_at_tfail() {
        let mut table = MembershipTable::new(addr(1));
        table.merge_entry(addr(2), 1, 0, &Noop, addr(1));
        table.run_failure_detector(5, 5, 20, &Noop, addr(1));
        assert!(table.is_failed(addr(2)));
        assert!(!table.is_active(addr(2)));
    }

    #[test]
    fn test_failure_detector_removes_at_tremove() {
        let mut table = MembershipTable::new(addr(1));
        table.merge_entry(addr(2), 1, 0, &Noop, addr(1));
        table.run_failure_detector(5, 5, 20, &Noop, addr(1));
        table.run_failure_detector(20, 5, 20, &Noop, addr(1));
        assert!(!table.is_failed(addr(2)));
        assert!(!table.is_active(addr(2)));
    }

    #[test]
    fn test_stale_entry_in_failed_ignored() {
        let mut table = MembershipTable::new(addr(1));
        table.merge_entry(addr(2), 5, 0, &Noop, addr(1));
        table.run_failure_detector(5, 5, 20, &Noop, addr(1));
        table.merge_entry(addr(2), 5, 10, &Noop, addr(1));
        assert!(table.is_failed(addr(2)));
    }

    #[test]
    fn test_resurrection_from_failed_on_greater_heartbeat() {
        let mut table = MembershipTable::new(addr(1));
        table.merge_entry(addr(2), 5, 0, &Noop, addr(1));
        table.run_failure_detector(5, 5, 20, &Noop, addr(1));
        table.merge_entry(addr(2), 6, 10, &Noop, addr(1));
        assert!(table.is_active(addr(2)));
        assert!(!table.is_failed(addr(2)));
    }

    #[test]
    fn test_active_at_most_one_of_active_or_failed() {
        let mut table = MembershipTable::new(addr(1));
        table.merge_entry(addr(2), 1, 0, &Noop, addr(1));
        table.run_failure_detector(5, 5, 20, &Noop, addr(1));
        assert!(table.is_failed(addr(2)) ^ table.is_active(addr(2)) || !table.is_failed(addr(2)));
        assert!(!(table.is_active(addr(2)) && table.is_failed(addr(2))));
    }
}
