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

//! The gossip disseminator: every tick, independent of change detection, it
//! pushes a membership snapshot and a bare heartbeat to a random subset of
//! peers (spec.md §4.3). Both fan-outs are sampled independently.

use quorumkv_core::Address;
use rand::seq::SliceRandom;

use crate::wire::MemberEntryWire;
use crate::wire::Message;

/// `k = max(⌈log₂(N)⌉, floor)`, the reference's `⌊log(N)⌋+2` clamped to
/// `N`, sized so a handful of nodes still gossip to everyone while large
/// clusters don't flood every peer on every tick.
pub fn fanout_size(member_count: usize, floor: usize) -> usize {
    if member_count == 0 {
        return 0;
    }
    let log_based = (member_count as f64).log2().floor() as usize + 2;
    log_based.max(floor).min(member_count)
}

/// Owns its own serialization buffer so repeated calls never alias a
/// shared static scratch vector.
#[derive(Default)]
pub struct Disseminator {
    scratch: Vec<u8>,
}

impl Disseminator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the per-tick gossip fan-out: an `ADD_MEMBERS_REQ` carrying
    /// the full `member_list` to one random subset, and a bare `HEARTBEAT`
    /// to an independently-sampled random subset of the same size. Samples
    /// uniformly without replacement from `member_list`, never picking
    /// `self_addr`.
    pub fn build_pushes(
        &mut self,
        self_addr: Address,
        self_heartbeat: u64,
        member_entries: &[(Address, u64)],
        fanout_floor: usize,
    ) -> Vec<(Address, Vec<u8>)> {
        let mut out = Vec::new();
        if member_entries.is_empty() {
            return out;
        }

        let addrs: Vec<Address> = member_entries.iter().map(|(addr, _)| *addr).collect();
        let k = fanout_size(addrs.len(), fanout_floor);
        let mut rng = rand::thread_rng();

        let entries: Vec<MemberEntryWire> = member_entries
            .iter()
            .map(|&(addr, heartbeat)| MemberEntryWire { addr, heartbeat })
            .collect();

        let membership_msg = Message::AddMembersRequest {
            sender: self_addr,
            heartbeat: self_heartbeat,
            entries,
        };
        self.scratch.clear();
        self.scratch.extend(crate::wire::encode(&membership_msg));
        let membership_targets = sample(&addrs, k, &mut rng);
        for target in &membership_targets {
            out.push((*target, self.scratch.clone()));
        }

        let heartbeat_msg = Message::Heartbeat {
            sender: self_addr,
            heartbeat: self_heartbeat,
        };
        let heartbeat_bytes = crate::wire::encode(&heartbeat_msg);
        let heartbeat_targets = sample(&addrs, k, &mut rng);
        for target in &heartbeat_targets {
            out.push((*target, heartbeat_bytes.clone()));
        }

        out
    }
}

fn sample(pool: &[Address], k: usize, rng: &mut impl rand::Rng) -> Vec<Address> {
    pool.choose_multiple(rng, k).copied().collect()
}
