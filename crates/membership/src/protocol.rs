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

//! The membership protocol state machine: `start`/`on_tick`/`on_message`,
//! wired together exactly as spec.md §4.1 describes. This is the single
//! entry point the server's tick driver calls into for membership.

use std::time::Duration;

use backon::BackoffBuilder;
use backon::ConstantBuilder;
use quorumkv_core::Address;
use quorumkv_transport::EventSink;

use crate::gossip::Disseminator;
use crate::table::MembershipTable;
use crate::wire;
use crate::wire::Message;

/// Join retry cadence: a bootstrapping node that hasn't heard a `JOINRSP`
/// resends its `JOINREQ` every tick for `DEFAULT_JOIN_RETRIES` attempts
/// (mirroring the teacher's `DEFAULT_RETRY_INTERVAL`/`DEFAULT_RETRIES`
/// shape in `crates/gossip/src/gossip.rs::ping`, adapted from an async
/// `Retryable::retry` combinator into a tick-driven schedule since on_tick
/// never awaits). Once the backoff is exhausted the node keeps retrying at
/// the same floor cadence rather than giving up — spec.md's `start` is
/// silent on retry policy, so bootstrapping never permanently gives up.
const DEFAULT_JOIN_RETRY_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_JOIN_RETRIES: usize = 3;

/// Maps a backoff step's `Duration` onto a tick count (ticks are the only
/// notion of time `on_tick` has); a spent-out backoff (`None`) degrades to
/// a floor retry of one tick.
fn ticks_for(delay: Option<Duration>) -> u64 {
    delay.map_or(1, |d| d.as_secs().max(1))
}

pub struct MembershipConfig {
    pub tfail: u64,
    pub tremove: u64,
    pub gossip_fanout_floor: usize,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            tfail: 5,
            tremove: 20,
            gossip_fanout_floor: 3,
        }
    }
}

/// A node's membership state machine: the table, the disseminator, the
/// local clock, this node's own heartbeat counter, and whether it has
/// joined the group yet.
pub struct Protocol {
    self_addr: Address,
    table: MembershipTable,
    disseminator: Disseminator,
    config: MembershipConfig,
    local_clock: u64,
    self_heartbeat: u64,
    in_group: bool,
    join_addr: Option<Address>,
    join_backoff: Option<Box<dyn Iterator<Item = Duration> + Send>>,
    join_retry_at: u64,
}

impl Protocol {
    pub fn new(self_addr: Address, config: MembershipConfig) -> Self {
        Self {
            self_addr,
            table: MembershipTable::new(self_addr),
            disseminator: Disseminator::new(),
            config,
            local_clock: 0,
            self_heartbeat: 0,
            in_group: false,
            join_addr: None,
            join_backoff: None,
            join_retry_at: 0,
        }
    }

    pub fn self_addr(&self) -> Address {
        self.self_addr
    }

    pub fn in_group(&self) -> bool {
        self.in_group
    }

    pub fn local_clock(&self) -> u64 {
        self.local_clock
    }

    pub fn table(&self) -> &MembershipTable {
        &self.table
    }

    pub fn active_addrs(&self) -> Vec<Address> {
        self.table.active_addrs()
    }

    /// `start(join_addr)`: self-join if `join_addr` is this node's own
    /// address, otherwise emit a `JOINREQ` and arm the retry-with-backoff
    /// schedule `on_tick` drives until a `JOINRSP` arrives.
    pub fn start(&mut self, join_addr: Address) -> Option<(Address, Vec<u8>)> {
        if join_addr == self.self_addr {
            self.in_group = true;
            return None;
        }
        self.join_addr = Some(join_addr);
        let mut backoff: Box<dyn Iterator<Item = Duration> + Send> = Box::new(
            ConstantBuilder::new()
                .with_delay(DEFAULT_JOIN_RETRY_INTERVAL)
                .with_max_times(DEFAULT_JOIN_RETRIES)
                .build(),
        );
        self.join_retry_at = self.local_clock + ticks_for(backoff.next());
        self.join_backoff = Some(backoff);

        let msg = Message::JoinRequest {
            sender: self.self_addr,
            heartbeat: self.self_heartbeat,
        };
        Some((join_addr, wire::encode(&msg)))
    }

    /// `on_tick()`: advance the local clock and this node's heartbeat, run
    /// the failure detector, then the gossip disseminator. Returns every
    /// outbound datagram produced this tick.
    pub fn on_tick(&mut self, sink: &dyn EventSink) -> Vec<(Address, Vec<u8>)> {
        self.local_clock += 1;
        self.self_heartbeat += 1;

        self.table.run_failure_detector(
            self.local_clock,
            self.config.tfail,
            self.config.tremove,
            sink,
            self.self_addr,
        );

        let mut out = self.retry_join_if_due();

        out.extend(self.disseminator.build_pushes(
            self.self_addr,
            self.self_heartbeat,
            &self.table.member_list_entries(),
            self.config.gossip_fanout_floor,
        ));
        out
    }

    /// Resends `JOINREQ` to `join_addr` if this node is still waiting on a
    /// `JOINRSP` and the backoff schedule says it's due. Once the bounded
    /// backoff (`DEFAULT_JOIN_RETRIES` attempts) is exhausted, falls back to
    /// retrying every tick rather than giving up — spec.md's `start` names
    /// no retry limit.
    fn retry_join_if_due(&mut self) -> Vec<(Address, Vec<u8>)> {
        if self.in_group {
            return Vec::new();
        }
        let Some(join_addr) = self.join_addr else {
            return Vec::new();
        };
        if self.local_clock < self.join_retry_at {
            return Vec::new();
        }

        let next_delay = self.join_backoff.as_mut().and_then(|b| b.next());
        self.join_retry_at = self.local_clock + ticks_for(next_delay);

        let msg = Message::JoinRequest {
            sender: self.self_addr,
            heartbeat: self.self_heartbeat,
        };
        vec![(join_addr, wire::encode(&msg))]
    }

    /// `on_message(bytes)`: classify by `msg_type` and dispatch. Malformed
    /// or unknown frames are dropped silently, per spec.md §7.
    pub fn on_message(&mut self, bytes: &[u8], sink: &dyn EventSink) -> Vec<(Address, Vec<u8>)> {
        let Ok(msg) = wire::decode(bytes) else {
            return Vec::new();
        };

        let sender = msg.sender();
        if sender == self.self_addr {
            return Vec::new();
        }

        match msg {
            Message::JoinRequest { heartbeat, .. } => {
                self.table.insert_active(sender, heartbeat, self.local_clock, sink, self.self_addr);
                let response = Message::JoinResponse {
                    sender: self.self_addr,
                    heartbeat: self.self_heartbeat,
                    entries: self
                        .table
                        .member_list_entries()
                        .into_iter()
                        .map(|(addr, heartbeat)| wire::MemberEntryWire { addr, heartbeat })
                        .collect(),
                };
                vec![(sender, wire::encode(&response))]
            }
            Message::JoinResponse {
                heartbeat, entries, ..
            } => {
                self.table.insert_active(sender, heartbeat, self.local_clock, sink, self.self_addr);
                for entry in entries {
                    self.table.merge_entry(
                        entry.addr,
                        entry.heartbeat,
                        self.local_clock,
                        sink,
                        self.self_addr,
                    );
                }
                self.in_group = true;
                self.join_addr = None;
                self.join_backoff = None;
                Vec::new()
            }
            Message::AddMembersRequest { entries, .. } => {
                for entry in entries {
                    self.table.merge_entry(
                        entry.addr,
                        entry.heartbeat,
                        self.local_clock,
                        sink,
                        self.self_addr,
                    );
                }
                Vec::new()
            }
            Message::Heartbeat { heartbeat, .. } => {
                self.table.observe_heartbeat(sender, heartbeat, self.local_clock);
                Vec::new()
            }
        }
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
    fn test_single_node_self_join() {
        let mut a = Protocol::new(addr(1), MembershipConfig::default());
        let out = a.start(addr(1));
        assert!(out.is_none());
        assert!(a.in_group());
    }

    #[test]
    fn test_cluster_formation_two_nodes() {
        let mut a = Protocol::new(addr(1), MembershipConfig::default());
        a.start(addr(1));
        let mut b = Protocol::new(addr(2), MembershipConfig::default());
        let (dst, joinreq) = b.start(addr(1)).unwrap();
        assert_eq!(dst, addr(1));

        let outbound = a.on_message(&joinreq, &Noop);
        assert!(a.table().is_active(addr(2)));
        assert_eq!(outbound.len(), 1);
        let (dst, joinrsp) = &outbound[0];
        assert_eq!(*dst, addr(2));

        let outbound = b.on_message(joinrsp, &Noop);
        assert!(outbound.is_empty());
        assert!(b.in_group());
        assert!(b.table().is_active(addr(1)));
    }

    #[test]
    fn test_heartbeat_propagation_strictly_increases() {
        let mut a = Protocol::new(addr(1), MembershipConfig::default());
        a.start(addr(1));
        let mut b = Protocol::new(addr(2), MembershipConfig::default());
        let (_, joinreq) = b.start(addr(1)).unwrap();
        let outbound = a.on_message(&joinreq, &Noop);
        b.on_message(&outbound[0].1, &Noop);

        let hb0 = a.table().get_active(addr(2)).unwrap().heartbeat;
        for _ in 0..3 {
            let pushes = b.on_tick(&Noop);
            for (dst, bytes) in pushes {
                if dst == addr(1) {
                    a.on_message(&bytes, &Noop);
                }
            }
        }
        let hb3 = a.table().get_active(addr(2)).unwrap().heartbeat;
        assert!(hb3 > hb0);
    }

    #[test]
    fn test_failure_detection_and_removal() {
        let mut a = Protocol::new(addr(1), MembershipConfig::default());
        a.start(addr(1));
        a.table.insert_active(addr(2), 1, 0, &Noop, addr(1));

        for _ in 0..5 {
            a.on_tick(&Noop);
        }
        assert!(a.table().is_failed(addr(2)));

        for _ in 0..15 {
            a.on_tick(&Noop);
        }
        assert!(!a.table().is_failed(addr(2)));
        assert!(!a.table().is_active(addr(2)));
    }

    #[test]
    fn test_join_retry_resends_on_backoff_schedule() {
        let mut b = Protocol::new(addr(2), MembershipConfig::default());
        let (dst, first) = b.start(addr(1)).unwrap();
        assert_eq!(dst, addr(1));
        assert!(!b.in_group());

        // No JOINRSP ever arrives; drive ticks and collect every JOINREQ
        // resend aimed at the join coordinator.
        let mut resends = vec![first];
        for _ in 0..(DEFAULT_JOIN_RETRIES as u64 + 2) {
            for (dst, bytes) in b.on_tick(&Noop) {
                if dst == addr(1) {
                    resends.push(bytes);
                }
            }
        }
        // One retry per backoff step plus floor retries once exhausted.
        assert!(resends.len() >= DEFAULT_JOIN_RETRIES + 1);
        for bytes in &resends {
            match wire::decode(bytes).unwrap() {
                Message::JoinRequest { sender, .. } => assert_eq!(sender, addr(2)),
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    #[test]
    fn test_join_retry_stops_once_joinrsp_received() {
        let mut a = Protocol::new(addr(1), MembershipConfig::default());
        a.start(addr(1));
        let mut b = Protocol::new(addr(2), MembershipConfig::default());
        let (_, joinreq) = b.start(addr(1)).unwrap();

        let outbound = a.on_message(&joinreq, &Noop);
        let (_, joinrsp) = &outbound[0];
        b.on_message(joinrsp, &Noop);
        assert!(b.in_group());

        // Once joined, on_tick never re-sends a JOINREQ to the coordinator.
        for _ in 0..10 {
            for (_, bytes) in b.on_tick(&Noop) {
                assert!(!matches!(wire::decode(&bytes), Ok(Message::JoinRequest { .. })));
            }
        }
    }

    #[test]
    fn test_malformed_message_dropped_silently() {
        let mut a = Protocol::new(addr(1), MembershipConfig::default());
        let out = a.on_message(&[0xFF], &Noop);
        assert!(out.is_empty());
    }

    #[test]
    fn test_self_referencing_message_ignored() {
        let mut a = Protocol::new(addr(1), MembershipConfig::default());
        let msg = Message::Heartbeat {
            sender: addr(1),
            heartbeat: 99,
        };
        let out = a.on_message(&wire::encode(&msg), &Noop);
        assert!(out.is_empty());
        assert!(!a.table().is_active(addr(1)));
    }
}
