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

//! The node: wires the membership protocol, ring, DHT backend and
//! coordinator and the substrate together behind a single [`Node::tick`]
//! entry point, in the order spec.md §5 requires — drain inbound,
//! classify and dispatch, membership tasks, DHT cluster update.

use std::sync::Arc;

use quorumkv_core::Address;
use quorumkv_dht::Backend;
use quorumkv_dht::Coordinator;
use quorumkv_dht::DhtMessage;
use quorumkv_membership::MembershipConfig;
use quorumkv_membership::Protocol;
use quorumkv_ring::Ring;
use quorumkv_transport::EventSink;
use quorumkv_transport::Substrate;

/// The tunables spec.md §6 calls out by name, plus the ring size and
/// transaction timeout that govern the DHT layer.
#[derive(Debug, Clone, Copy)]
pub struct ClusterConfig {
    pub tfail: u64,
    pub tremove: u64,
    pub replication_factor: usize,
    pub ring_size: u32,
    pub transaction_timeout_ticks: u64,
    pub gossip_fanout_floor: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            tfail: 5,
            tremove: 20,
            replication_factor: 3,
            ring_size: 1 << 16,
            transaction_timeout_ticks: 10,
            gossip_fanout_floor: 3,
        }
    }
}

/// A running cluster member: one membership table, one ring, one DHT
/// backend plus coordinator, driven by repeated calls to [`Node::tick`].
pub struct Node {
    addr: Address,
    substrate: Arc<dyn Substrate>,
    sink: Arc<dyn EventSink>,
    membership: Protocol,
    ring: Ring,
    backend: Backend,
    coordinator: Coordinator,
    config: ClusterConfig,
}

impl Node {
    pub fn new(addr: Address, substrate: Arc<dyn Substrate>, sink: Arc<dyn EventSink>, config: ClusterConfig) -> Self {
        let membership_config = MembershipConfig {
            tfail: config.tfail,
            tremove: config.tremove,
            gossip_fanout_floor: config.gossip_fanout_floor,
        };
        Self {
            addr,
            substrate,
            sink,
            membership: Protocol::new(addr, membership_config),
            ring: Ring::build(&[], config.ring_size),
            backend: Backend::new(),
            coordinator: Coordinator::new(addr, config.replication_factor)
                .with_transaction_timeout_ticks(config.transaction_timeout_ticks),
            config,
        }
    }

    pub fn addr(&self) -> Address {
        self.addr
    }

    pub fn in_group(&self) -> bool {
        self.membership.in_group()
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn membership(&self) -> &Protocol {
        &self.membership
    }

    /// `start(join_addr)`: joins the cluster at `join_addr`, sending a
    /// `JOINREQ` unless `join_addr` is this node's own address.
    pub fn start(&mut self, join_addr: Address) {
        if let Some((dst, buf)) = self.membership.start(join_addr) {
            self.substrate.send(self.addr, dst, buf);
        }
    }

    /// The single periodic entry point: drain inbound, classify and
    /// dispatch each datagram, run membership tasks, then the DHT cluster
    /// update. This is the only place a tick fires from.
    pub fn tick(&mut self) {
        let inbound = self.substrate.drain(self.addr);
        for buf in inbound {
            self.dispatch(&buf);
        }

        for (dst, buf) in self.membership.on_tick(&*self.sink) {
            self.substrate.send(self.addr, dst, buf);
        }

        self.ring = Ring::build(&self.membership.active_addrs(), self.config.ring_size);
        let syncs = self.backend.on_cluster_update(&self.ring, self.addr, self.config.replication_factor);
        for (dst, msg) in syncs {
            self.substrate.send(self.addr, dst, quorumkv_dht::encode(&msg));
        }

        self.coordinator.on_tick(&*self.sink);
    }

    fn dispatch(&mut self, buf: &[u8]) {
        if quorumkv_dht::looks_like_dht_frame(buf) {
            let Ok(msg) = quorumkv_dht::decode(buf) else {
                return;
            };
            if msg.msg_type.is_response() {
                self.coordinator.on_response(&msg, &*self.sink);
            } else if let Some(response) = self.backend.handle(&msg, self.addr, &*self.sink) {
                self.substrate.send(self.addr, msg.src, quorumkv_dht::encode(&response));
            }
        } else {
            for (dst, out) in self.membership.on_message(buf, &*self.sink) {
                self.substrate.send(self.addr, dst, out);
            }
        }
    }

    /// `CREATE(key, value)`: allocates a transaction, resolves the
    /// natural nodes for `key` off the last-built ring, and multicasts.
    pub fn create(&mut self, key: &str, value: &str) -> u32 {
        let (tid, messages) = self.coordinator.create(&self.ring, key, value);
        self.send_all(messages);
        tid
    }

    pub fn read(&mut self, key: &str) -> u32 {
        let (tid, messages) = self.coordinator.read(&self.ring, key);
        self.send_all(messages);
        tid
    }

    pub fn update(&mut self, key: &str, value: &str) -> u32 {
        let (tid, messages) = self.coordinator.update(&self.ring, key, value);
        self.send_all(messages);
        tid
    }

    pub fn delete(&mut self, key: &str) -> u32 {
        let (tid, messages) = self.coordinator.delete(&self.ring, key);
        self.send_all(messages);
        tid
    }

    fn send_all(&self, messages: Vec<(Address, DhtMessage)>) {
        for (dst, msg) in messages {
            self.substrate.send(self.addr, dst, quorumkv_dht::encode(&msg));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quorumkv_transport::InMemorySubstrate;
    use quorumkv_transport::LogEventSink;

    use super::*;

    fn make_node(id: u32, substrate: &Arc<InMemorySubstrate>, config: ClusterConfig) -> Node {
        Node::new(Address::new(id, 0), substrate.clone(), Arc::new(LogEventSink), config)
    }

    fn run_tick_all(nodes: &mut [Node]) {
        for node in nodes.iter_mut() {
            node.tick();
        }
    }

    #[test]
    fn test_cluster_formation_end_to_end() {
        let substrate = Arc::new(InMemorySubstrate::new());
        let config = ClusterConfig::default();
        let mut a = make_node(1, &substrate, config);
        let mut b = make_node(2, &substrate, config);

        a.start(Address::new(1, 0));
        assert!(a.in_group());

        b.start(Address::new(1, 0));
        a.tick();
        b.tick();

        assert!(b.in_group());
        assert!(a.membership().table().is_active(Address::new(2, 0)));
        assert!(b.membership().table().is_active(Address::new(1, 0)));
    }

    #[test]
    fn test_create_read_quorum_five_node_cluster() {
        let substrate = Arc::new(InMemorySubstrate::new());
        let config = ClusterConfig {
            ring_size: 1 << 12,
            ..ClusterConfig::default()
        };
        let mut nodes: Vec<Node> = (1..=5).map(|id| make_node(id, &substrate, config)).collect();

        nodes[0].start(Address::new(1, 0));
        for node in nodes.iter_mut().skip(1) {
            node.start(Address::new(1, 0));
        }
        for _ in 0..6 {
            run_tick_all(&mut nodes);
        }
        for node in &nodes {
            assert!(node.in_group());
        }

        nodes[0].create("k", "v");
        for _ in 0..3 {
            run_tick_all(&mut nodes);
        }

        let owners = nodes[0].ring().natural_nodes("k", 3);
        assert_eq!(owners.len(), 3);
        let present = nodes.iter().filter(|n| n.backend().get("k").is_some()).count();
        assert!(present >= 3, "expected every natural node to have applied the CREATE");
    }
}
