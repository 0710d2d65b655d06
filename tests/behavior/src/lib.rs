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

//! A small harness for driving several [`Node`]s over one shared
//! [`InMemorySubstrate`], the way a real deployment drives them over UDP.
//! Scenario tests build a [`Cluster`], join nodes onto it and tick it
//! forward a fixed number of rounds; nothing here depends on wall-clock
//! time since the whole system is tick-driven.

use std::sync::Arc;
use std::sync::Mutex;

use quorumkv_core::Address;
use quorumkv_server::ClusterConfig;
use quorumkv_server::Node;
use quorumkv_transport::EventSink;
use quorumkv_transport::InMemorySubstrate;

/// Records every outcome event a node's coordinator and backend report,
/// so scenario tests can assert on CREATE/READ/UPDATE/DELETE outcomes
/// without poking at coordinator internals.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<String>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl EventSink for RecordingEventSink {
    fn node_add(&self, observer: Address, added: Address) {
        self.record(format!("NodeAdd({observer},{added})"));
    }
    fn node_remove(&self, observer: Address, removed: Address) {
        self.record(format!("NodeRemove({observer},{removed})"));
    }
    fn create_success(&self, _observer: Address, _coordinator: bool, _tid: u32, key: &str) {
        self.record(format!("CreateSuccess({key})"));
    }
    fn create_fail(&self, _observer: Address, _coordinator: bool, _tid: u32, key: &str) {
        self.record(format!("CreateFail({key})"));
    }
    fn read_success(&self, _observer: Address, _coordinator: bool, _tid: u32, key: &str, value: &str) {
        self.record(format!("ReadSuccess({key},{value})"));
    }
    fn read_fail(&self, _observer: Address, _coordinator: bool, _tid: u32, key: &str) {
        self.record(format!("ReadFail({key})"));
    }
    fn update_success(&self, _observer: Address, _coordinator: bool, _tid: u32, key: &str) {
        self.record(format!("UpdateSuccess({key})"));
    }
    fn update_fail(&self, _observer: Address, _coordinator: bool, _tid: u32, key: &str) {
        self.record(format!("UpdateFail({key})"));
    }
    fn delete_success(&self, _observer: Address, _coordinator: bool, _tid: u32, key: &str) {
        self.record(format!("DeleteSuccess({key})"));
    }
    fn delete_fail(&self, _observer: Address, _coordinator: bool, _tid: u32, key: &str) {
        self.record(format!("DeleteFail({key})"));
    }
}

/// A set of nodes sharing one in-memory substrate, addressed `1..=n`.
pub struct Cluster {
    pub nodes: Vec<Node>,
    sinks: Vec<Arc<RecordingEventSink>>,
    substrate: Arc<InMemorySubstrate>,
}

impl Cluster {
    /// Builds `n` nodes, each configured with `config`, none of them
    /// joined yet.
    pub fn new(n: u32, config: ClusterConfig) -> Self {
        let substrate = Arc::new(InMemorySubstrate::new());
        let sinks: Vec<Arc<RecordingEventSink>> = (1..=n).map(|_| Arc::new(RecordingEventSink::default())).collect();
        let nodes = (1..=n)
            .map(|id| {
                Node::new(
                    Address::new(id, 0),
                    substrate.clone(),
                    sinks[(id - 1) as usize].clone(),
                    config,
                )
            })
            .collect();
        Self { nodes, sinks, substrate }
    }

    pub fn events(&self, id: u32) -> Vec<String> {
        self.sinks[(id - 1) as usize].events()
    }

    pub fn substrate(&self) -> &Arc<InMemorySubstrate> {
        &self.substrate
    }

    pub fn addr(&self, id: u32) -> Address {
        Address::new(id, 0)
    }

    /// Node 1 seeds the cluster; every other node joins through it.
    pub fn join_all(&mut self) {
        let seed = self.addr(1);
        for node in &mut self.nodes {
            node.start(seed);
        }
    }

    pub fn tick_all(&mut self) {
        for node in &mut self.nodes {
            node.tick();
        }
    }

    pub fn settle(&mut self, rounds: usize) {
        for _ in 0..rounds {
            self.tick_all();
        }
    }

    pub fn all_in_group(&self) -> bool {
        self.nodes.iter().all(|n| n.in_group())
    }

    pub fn node_mut(&mut self, id: u32) -> &mut Node {
        &mut self.nodes[(id - 1) as usize]
    }

    pub fn node(&self, id: u32) -> &Node {
        &self.nodes[(id - 1) as usize]
    }

    /// Count of nodes whose backend has applied the given key.
    pub fn replicas_holding(&self, key: &str) -> usize {
        self.nodes.iter().filter(|n| n.backend().get(key).is_some()).count()
    }
}
