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

//! The client-side DHT coordinator: generates transactions, multicasts to
//! the natural nodes for a key, tallies quorum responses, and times out
//! unfinished transactions (spec.md §4.6).

use std::collections::HashMap;

use quorumkv_core::Address;
use quorumkv_ring::Ring;
use quorumkv_transport::EventSink;

use crate::codec::DhtMessage;
use crate::codec::MsgType;

const DEFAULT_TRANSACTION_TIMEOUT_TICKS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Read,
    Update,
    Delete,
}

impl Op {
    fn request_type(self) -> MsgType {
        match self {
            Op::Create => MsgType::Create,
            Op::Read => MsgType::Read,
            Op::Update => MsgType::Update,
            Op::Delete => MsgType::Delete,
        }
    }

    /// Whether this operation requires every replica to succeed (CREATE,
    /// DELETE) or only a majority (READ, UPDATE) — the asymmetry spec.md
    /// §9 resolves explicitly for idempotence-sensitive operations.
    fn requires_all_replicas(self) -> bool {
        matches!(self, Op::Create | Op::Delete)
    }
}

struct Endpoint {
    responded: bool,
    succeeded: bool,
    response: Option<DhtMessage>,
}

struct Transaction {
    op: Op,
    key: String,
    endpoints: HashMap<Address, Endpoint>,
    time_left: u64,
    finished: bool,
}

impl Transaction {
    fn success_count(&self) -> usize {
        self.endpoints.values().filter(|e| e.succeeded).count()
    }

    fn response_count(&self) -> usize {
        self.endpoints.values().filter(|e| e.responded).count()
    }

    fn fail_count(&self) -> usize {
        self.endpoints.values().filter(|e| e.responded && !e.succeeded).count()
    }
}

/// Generates and tallies client transactions. Owned by a node alongside
/// its [`crate::Backend`]; both read the same ring snapshot but never
/// share mutable state directly.
pub struct Coordinator {
    self_addr: Address,
    replication_factor: usize,
    transaction_timeout_ticks: u64,
    tid_counter: u32,
    pending: HashMap<u32, Transaction>,
}

impl Coordinator {
    pub fn new(self_addr: Address, replication_factor: usize) -> Self {
        Self {
            self_addr,
            replication_factor,
            transaction_timeout_ticks: DEFAULT_TRANSACTION_TIMEOUT_TICKS,
            tid_counter: 0,
            pending: HashMap::new(),
        }
    }

    pub fn with_transaction_timeout_ticks(mut self, ticks: u64) -> Self {
        self.transaction_timeout_ticks = ticks;
        self
    }

    fn start_transaction(
        &mut self,
        ring: &Ring,
        op: Op,
        key: &str,
        value: Option<String>,
    ) -> (u32, Vec<(Address, DhtMessage)>) {
        self.tid_counter += 1;
        let tid = self.tid_counter;
        let endpoints_addrs = ring.natural_nodes(key, self.replication_factor);

        let endpoints = endpoints_addrs
            .iter()
            .map(|&addr| {
                (
                    addr,
                    Endpoint {
                        responded: false,
                        succeeded: false,
                        response: None,
                    },
                )
            })
            .collect();

        self.pending.insert(
            tid,
            Transaction {
                op,
                key: key.to_string(),
                endpoints,
                time_left: self.transaction_timeout_ticks,
                finished: false,
            },
        );

        let messages = endpoints_addrs
            .into_iter()
            .map(|addr| {
                let req = DhtMessage::request(op.request_type(), tid, self.self_addr, key.to_string(), value.clone());
                (addr, req)
            })
            .collect();

        (tid, messages)
    }

    pub fn create(&mut self, ring: &Ring, key: &str, value: &str) -> (u32, Vec<(Address, DhtMessage)>) {
        self.start_transaction(ring, Op::Create, key, Some(value.to_string()))
    }

    pub fn read(&mut self, ring: &Ring, key: &str) -> (u32, Vec<(Address, DhtMessage)>) {
        self.start_transaction(ring, Op::Read, key, None)
    }

    pub fn update(&mut self, ring: &Ring, key: &str, value: &str) -> (u32, Vec<(Address, DhtMessage)>) {
        self.start_transaction(ring, Op::Update, key, Some(value.to_string()))
    }

    pub fn delete(&mut self, ring: &Ring, key: &str) -> (u32, Vec<(Address, DhtMessage)>) {
        self.start_transaction(ring, Op::Delete, key, None)
    }

    /// Records one inbound response. Ignores responses for unknown or
    /// already-finished transactions (duplicates are expected under an
    /// unreliable substrate and must be harmless).
    pub fn on_response(&mut self, resp: &DhtMessage, sink: &dyn EventSink) {
        let Some(txn) = self.pending.get_mut(&resp.transaction) else {
            return;
        };
        if txn.finished {
            return;
        }
        let Some(endpoint) = txn.endpoints.get_mut(&resp.src) else {
            return;
        };
        if endpoint.responded {
            // Duplicate response from the same endpoint; ignore.
            return;
        }
        endpoint.responded = true;
        endpoint.succeeded = resp.is_ok();
        endpoint.response = Some(resp.clone());

        Self::finalize_if_decided(txn, self.self_addr, resp.transaction, sink);
    }

    fn finalize_if_decided(txn: &mut Transaction, self_addr: Address, tid: u32, sink: &dyn EventSink) {
        let total = txn.endpoints.len();
        if total == 0 {
            return;
        }
        let quorum = total / 2 + 1;

        let decided = if txn.op.requires_all_replicas() {
            if txn.success_count() == total {
                Some(true)
            } else if txn.response_count() == total {
                Some(false)
            } else {
                None
            }
        } else if txn.success_count() >= quorum {
            Some(true)
        } else if txn.op == Op::Read && txn.fail_count() >= quorum {
            // Only READ fails early on a fail-quorum; UPDATE of an absent
            // key must wait out the transaction timeout per spec §4.6.
            Some(false)
        } else {
            None
        };

        let Some(success) = decided else { return };
        txn.finished = true;
        Self::log_outcome(txn, self_addr, tid, success, sink);
    }

    fn log_outcome(txn: &Transaction, self_addr: Address, tid: u32, success: bool, sink: &dyn EventSink) {
        let key = &txn.key;
        match (txn.op, success) {
            (Op::Create, true) => sink.create_success(self_addr, true, tid, key),
            (Op::Create, false) => sink.create_fail(self_addr, true, tid, key),
            (Op::Read, true) => {
                let value = txn
                    .endpoints
                    .values()
                    .filter_map(|e| e.response.as_ref())
                    .find(|r| r.is_ok())
                    .and_then(|r| r.value.clone())
                    .unwrap_or_default();
                sink.read_success(self_addr, true, tid, key, &value);
            }
            (Op::Read, false) => sink.read_fail(self_addr, true, tid, key),
            (Op::Update, true) => sink.update_success(self_addr, true, tid, key),
            (Op::Update, false) => sink.update_fail(self_addr, true, tid, key),
            (Op::Delete, true) => sink.delete_success(self_addr, true, tid, key),
            (Op::Delete, false) => sink.delete_fail(self_addr, true, tid, key),
        }
    }

    /// Decrements `time_left` on every unfinished transaction; at zero,
    /// logs failure (timeout is treated as `QuorumFailure`) and finishes.
    pub fn on_tick(&mut self, sink: &dyn EventSink) {
        for (&tid, txn) in self.pending.iter_mut() {
            if txn.finished {
                continue;
            }
            txn.time_left = txn.time_left.saturating_sub(1);
            if txn.time_left == 0 {
                txn.finished = true;
                Self::log_outcome(txn, self.self_addr, tid, false, sink);
            }
        }
        self.pending.retain(|_, txn| !txn.finished);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    fn is_finished(&self, tid: u32) -> Option<bool> {
        self.pending.get(&tid).map(|t| t.finished)
    }
}
