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

//! The DHT backend: owns the local shard (`hash_table`) and serves
//! CREATE/READ/UPDATE/DELETE/SYNC_BEGIN on behalf of remote coordinators,
//! and runs anti-entropy re-sync whenever the ring's successor set for
//! this node changes (spec.md §4.5).

use std::collections::HashMap;

use quorumkv_core::Address;
use quorumkv_ring::Ring;
use quorumkv_transport::EventSink;

use crate::codec::DhtMessage;
use crate::codec::MsgType;

/// Owns a node's shard of the key-value space. CREATE is not idempotent,
/// UPDATE never upserts, DELETE only removes an existing key — every
/// operation replies with exactly one response.
#[derive(Default)]
pub struct Backend {
    hash_table: HashMap<String, String>,
    last_successors: Vec<Address>,
}

impl Backend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hash_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash_table.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.hash_table.get(key)
    }

    /// Handles one inbound request, mutates the shard as needed, logs the
    /// outcome as a non-coordinator event, and returns the response to
    /// send back to `req.src`.
    pub fn handle(&mut self, req: &DhtMessage, self_addr: Address, sink: &dyn EventSink) -> Option<DhtMessage> {
        let key = req.key.clone().unwrap_or_default();
        match req.msg_type {
            MsgType::Create => {
                let ok = match self.hash_table.entry(key.clone()) {
                    std::collections::hash_map::Entry::Vacant(slot) => {
                        slot.insert(req.value.clone().unwrap_or_default());
                        true
                    }
                    std::collections::hash_map::Entry::Occupied(_) => false,
                };
                if ok {
                    sink.create_success(self_addr, false, req.transaction, &key);
                } else {
                    sink.create_fail(self_addr, false, req.transaction, &key);
                }
                Some(DhtMessage::response(MsgType::CreateRsp, req.transaction, self_addr, ok, key, None))
            }
            MsgType::Read => {
                if let Some(value) = self.hash_table.get(&key).cloned() {
                    sink.read_success(self_addr, false, req.transaction, &key, &value);
                    Some(DhtMessage::response(
                        MsgType::ReadRsp,
                        req.transaction,
                        self_addr,
                        true,
                        key,
                        Some(value),
                    ))
                } else {
                    sink.read_fail(self_addr, false, req.transaction, &key);
                    Some(DhtMessage::response(MsgType::ReadRsp, req.transaction, self_addr, false, key, None))
                }
            }
            MsgType::Update => {
                let ok = if let Some(slot) = self.hash_table.get_mut(&key) {
                    *slot = req.value.clone().unwrap_or_default();
                    true
                } else {
                    false
                };
                if ok {
                    sink.update_success(self_addr, false, req.transaction, &key);
                } else {
                    sink.update_fail(self_addr, false, req.transaction, &key);
                }
                Some(DhtMessage::response(MsgType::UpdateRsp, req.transaction, self_addr, ok, key, None))
            }
            MsgType::Delete => {
                let ok = self.hash_table.remove(&key).is_some();
                if ok {
                    sink.delete_success(self_addr, false, req.transaction, &key);
                } else {
                    sink.delete_fail(self_addr, false, req.transaction, &key);
                }
                Some(DhtMessage::response(MsgType::DeleteRsp, req.transaction, self_addr, ok, key, None))
            }
            MsgType::SyncBegin => {
                if let Some(pairs) = &req.replica {
                    self.apply_sync(pairs);
                }
                None
            }
            MsgType::CreateRsp | MsgType::ReadRsp | MsgType::UpdateRsp | MsgType::DeleteRsp => None,
        }
    }

    /// Insert-if-absent merge of a `SYNC_BEGIN` batch. Idempotent: applying
    /// the same batch twice never overwrites an existing value.
    pub fn apply_sync(&mut self, pairs: &[(String, String)]) {
        for (k, v) in pairs {
            self.hash_table.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    /// Runs once per tick after the ring has been rebuilt from the current
    /// active members. If this node's strict-successor window hasn't
    /// changed since the last call, does nothing. Otherwise, for each new
    /// strict successor, builds a `SYNC_BEGIN` carrying every local
    /// `(k, v)` whose ring position falls in the arc that successor now
    /// owns.
    pub fn on_cluster_update(
        &mut self,
        ring: &Ring,
        self_addr: Address,
        replication_factor: usize,
    ) -> Vec<(Address, DhtMessage)> {
        let successors = ring.strict_successors(self_addr, replication_factor);
        if successors == self.last_successors {
            return Vec::new();
        }
        self.last_successors = successors.clone();

        if !ring.slots().iter().any(|s| s.member == self_addr) {
            return Vec::new();
        }

        let mut out = Vec::new();
        for successor in &successors {
            let Some(succ_idx) = ring.slots().iter().position(|s| s.member == *successor) else {
                continue;
            };
            let (arc_begin, arc_end) = ring.arc_of(succ_idx);

            let pairs: Vec<(String, String)> = self
                .hash_table
                .iter()
                .filter(|(k, _)| {
                    let pos = quorumkv_ring::pos_key(k, ring.ring_size());
                    Ring::arc_contains(arc_begin, arc_end, pos)
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            if !pairs.is_empty() {
                out.push((*successor, DhtMessage::sync_begin(self_addr, pairs)));
            }
        }
        out
    }
}
