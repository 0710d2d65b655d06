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

//! A flat consistent-hash ring over the current active membership set.
//!
//! Unlike a virtual-node ring, every member occupies exactly one ring slot:
//! the spec's Knuth multiplicative hash already spreads a few thousand
//! members evenly enough across a `RING_SIZE` of `2^16` or larger that
//! virtual nodes buy nothing but complexity.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use quorumkv_core::Address;

/// The multiplier from Knuth's multiplicative hashing method.
const KNUTH_MULTIPLIER: u64 = 2654435761;

/// `pos(addr) = ((H(addr) * 2654435761) >> 32) mod RING_SIZE`.
pub fn pos_addr(addr: Address, ring_size: u32) -> u32 {
    knuth_pos(addr.hash(), ring_size)
}

/// `pos(key) = ((stdhash(key) * 2654435761) >> 32) mod RING_SIZE`.
pub fn pos_key(key: &str, ring_size: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    knuth_pos(hasher.finish(), ring_size)
}

fn knuth_pos(h: u64, ring_size: u32) -> u32 {
    let folded = (h.wrapping_mul(KNUTH_MULTIPLIER) >> 32) as u32;
    folded % ring_size
}

/// One member's arc on the ring: it owns every key whose position falls in
/// `(range_begin, range_end]`, wrapping at `RING_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSlot {
    pub range_begin: u32,
    pub range_end: u32,
    pub member: Address,
}

/// The consistent-hash ring built from a snapshot of active member
/// addresses. Deterministic for a given address set and `ring_size`;
/// position ties are broken by the order addresses were supplied in.
#[derive(Debug, Clone, Default)]
pub struct Ring {
    ring_size: u32,
    slots: Vec<RingSlot>,
}

impl Ring {
    /// Builds a ring from a snapshot of active member addresses. The order
    /// of `members` is the tie-break order for colliding ring positions.
    pub fn build(members: &[Address], ring_size: u32) -> Self {
        let mut positioned: Vec<(u32, Address)> = members
            .iter()
            .map(|&addr| (pos_addr(addr, ring_size), addr))
            .collect();
        // `sort_by_key` is stable, so addresses that collide on position
        // keep their relative insertion order, matching the tie-break rule.
        positioned.sort_by_key(|(pos, _)| *pos);

        let len = positioned.len();
        let slots = positioned
            .iter()
            .enumerate()
            .map(|(i, &(pos, addr))| {
                let prev = if i == 0 { len - 1 } else { i - 1 };
                let range_begin = if len == 1 { pos } else { positioned[prev].0 };
                RingSlot {
                    range_begin,
                    range_end: pos,
                    member: addr,
                }
            })
            .collect();

        Self { ring_size, slots }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn ring_size(&self) -> u32 {
        self.ring_size
    }

    pub fn slots(&self) -> &[RingSlot] {
        &self.slots
    }

    /// The index of the first slot whose `range_end` is `>= pos`, wrapping
    /// to slot 0 if every slot's arc ends before `pos` (i.e. `pos` falls in
    /// the arc that wraps around the end of the ring).
    fn lower_bound(&self, pos: u32) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        Some(
            self.slots
                .iter()
                .position(|slot| slot.range_end >= pos)
                .unwrap_or(0),
        )
    }

    fn index_of(&self, addr: Address) -> Option<usize> {
        self.slots.iter().position(|slot| slot.member == addr)
    }

    /// Returns the first `rf` distinct members starting from the owner of
    /// `key`, wrapping. Degrades gracefully to `self.len()` members when
    /// there are fewer than `rf` active members.
    pub fn natural_nodes(&self, key: &str, rf: usize) -> Vec<Address> {
        let Some(start) = self.lower_bound(pos_key(key, self.ring_size)) else {
            return Vec::new();
        };
        let n = self.slots.len();
        let take = rf.min(n);
        (0..take).map(|i| self.slots[(start + i) % n].member).collect()
    }

    /// Returns a contiguous window of up to `2*rf - 1` ring positions
    /// centered on `addr`, together with `addr`'s index within that window.
    /// Built by alternately extending left and right from `addr` until the
    /// window holds `rf` distinct members on each side or the ring is
    /// exhausted.
    pub fn replica_set(&self, addr: Address, rf: usize) -> Option<(Vec<Address>, usize)> {
        let n = self.slots.len();
        let center = self.index_of(addr)?;
        if n == 0 {
            return None;
        }

        let max_each_side = rf.saturating_sub(1).min(n.saturating_sub(1));
        let mut left = 0usize;
        let mut right = 0usize;
        while left < max_each_side || right < max_each_side {
            if left < max_each_side && left + right + 1 < n {
                left += 1;
            }
            if right < max_each_side && left + right + 1 < n {
                right += 1;
            }
            if left + right + 1 >= n {
                break;
            }
        }

        let window_len = left + right + 1;
        let window: Vec<Address> = (0..window_len)
            .map(|i| {
                let offset = i as isize - left as isize;
                let idx = (center as isize + offset).rem_euclid(n as isize) as usize;
                self.slots[idx].member
            })
            .collect();
        Some((window, left))
    }

    /// The strict successors of `addr` in ring order (excluding `addr`
    /// itself), truncated to `rf - 1` entries — the replicas that must hold
    /// a copy of data owned by `addr`.
    pub fn strict_successors(&self, addr: Address, rf: usize) -> Vec<Address> {
        let Some((window, center)) = self.replica_set(addr, rf) else {
            return Vec::new();
        };
        window.into_iter().skip(center + 1).collect()
    }

    /// The ring arc `(predecessor.range_end, slot.range_end]` owned by the
    /// member at ring index `idx`.
    pub fn arc_of(&self, idx: usize) -> (u32, u32) {
        let slot = self.slots[idx];
        (slot.range_begin, slot.range_end)
    }

    /// Whether a key position `pos` falls within the arc `(begin, end]`,
    /// accounting for wrap-around arcs where `begin > end`.
    pub fn arc_contains(begin: u32, end: u32, pos: u32) -> bool {
        if begin < end {
            pos > begin && pos <= end
        } else {
            pos > begin || pos <= end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(id: u32) -> Address {
        Address::new(id, 0)
    }

    #[test]
    fn test_build_is_sorted_and_wraps() {
        let members = [addr(1), addr(2), addr(3), addr(4)];
        let ring = Ring::build(&members, 1 << 16);
        assert_eq!(ring.len(), 4);
        for i in 0..ring.len() {
            let prev = if i == 0 { ring.len() - 1 } else { i - 1 };
            assert_eq!(ring.slots()[i].range_begin, ring.slots()[prev].range_end);
        }
    }

    #[test]
    fn test_natural_nodes_deterministic() {
        let members = [addr(1), addr(2), addr(3), addr(4), addr(5)];
        let ring = Ring::build(&members, 1 << 16);
        let a = ring.natural_nodes("some-key", 3);
        let b = ring.natural_nodes("some-key", 3);
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        let unique: std::collections::HashSet<_> = a.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_natural_nodes_degrades_below_rf() {
        let members = [addr(1), addr(2)];
        let ring = Ring::build(&members, 1 << 16);
        let nodes = ring.natural_nodes("k", 3);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_single_node_ring() {
        let members = [addr(1)];
        let ring = Ring::build(&members, 1 << 16);
        let nodes = ring.natural_nodes("k", 3);
        assert_eq!(nodes, vec![addr(1)]);
        let (window, center) = ring.replica_set(addr(1), 3).unwrap();
        assert_eq!(window, vec![addr(1)]);
        assert_eq!(center, 0);
    }

    #[test]
    fn test_replica_set_centered() {
        let members = [addr(1), addr(2), addr(3), addr(4), addr(5)];
        let ring = Ring::build(&members, 1 << 16);
        for &a in &members {
            let (window, center) = ring.replica_set(a, 3).unwrap();
            assert_eq!(window[center], a);
            assert!(window.len() <= 5);
        }
    }

    #[test]
    fn test_strict_successors_excludes_self() {
        let members = [addr(1), addr(2), addr(3), addr(4), addr(5)];
        let ring = Ring::build(&members, 1 << 16);
        for &a in &members {
            let succ = ring.strict_successors(a, 3);
            assert!(!succ.contains(&a));
            assert!(succ.len() <= 2);
        }
    }

    #[test]
    fn test_arc_contains_wraps() {
        assert!(Ring::arc_contains(10, 5, 2));
        assert!(Ring::arc_contains(10, 5, 20));
        assert!(!Ring::arc_contains(10, 5, 7));
        assert!(Ring::arc_contains(5, 10, 7));
        assert!(!Ring::arc_contains(5, 10, 2));
    }
}
