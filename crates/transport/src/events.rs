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

use quorumkv_core::Address;

/// The observability sink a node reports membership and DHT events to.
///
/// Every event carries the origin address, whether the reporting node was
/// acting as coordinator or backend for the operation, the transaction id
/// (membership events have none), the key, and the value where relevant.
pub trait EventSink: Send + Sync {
    fn node_add(&self, origin: Address, peer: Address) {
        let _ = (origin, peer);
    }

    fn node_remove(&self, origin: Address, peer: Address) {
        let _ = (origin, peer);
    }

    fn create_success(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        let _ = (origin, is_coordinator, tid, key);
    }

    fn create_fail(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        let _ = (origin, is_coordinator, tid, key);
    }

    fn read_success(
        &self,
        origin: Address,
        is_coordinator: bool,
        tid: u32,
        key: &str,
        value: &str,
    ) {
        let _ = (origin, is_coordinator, tid, key, value);
    }

    fn read_fail(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        let _ = (origin, is_coordinator, tid, key);
    }

    fn update_success(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        let _ = (origin, is_coordinator, tid, key);
    }

    fn update_fail(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        let _ = (origin, is_coordinator, tid, key);
    }

    fn delete_success(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        let _ = (origin, is_coordinator, tid, key);
    }

    fn delete_fail(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        let _ = (origin, is_coordinator, tid, key);
    }
}

/// An [`EventSink`] that forwards every event to the `log` crate as a
/// structured key-value record. This is the sink `cmd/quorumkv` wires up in
/// production; tests typically use an in-memory sink that records events for
/// assertions instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn node_add(&self, origin: Address, peer: Address) {
        log::info!(origin:display = origin, peer:display = peer; "NodeAdd");
    }

    fn node_remove(&self, origin: Address, peer: Address) {
        log::info!(origin:display = origin, peer:display = peer; "NodeRemove");
    }

    fn create_success(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        log::info!(origin:display = origin, is_coordinator, tid, key; "CreateSuccess");
    }

    fn create_fail(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        log::warn!(origin:display = origin, is_coordinator, tid, key; "CreateFail");
    }

    fn read_success(
        &self,
        origin: Address,
        is_coordinator: bool,
        tid: u32,
        key: &str,
        value: &str,
    ) {
        log::info!(origin:display = origin, is_coordinator, tid, key, value; "ReadSuccess");
    }

    fn read_fail(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        log::warn!(origin:display = origin, is_coordinator, tid, key; "ReadFail");
    }

    fn update_success(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        log::info!(origin:display = origin, is_coordinator, tid, key; "UpdateSuccess");
    }

    fn update_fail(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        log::warn!(origin:display = origin, is_coordinator, tid, key; "UpdateFail");
    }

    fn delete_success(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        log::info!(origin:display = origin, is_coordinator, tid, key; "DeleteSuccess");
    }

    fn delete_fail(&self, origin: Address, is_coordinator: bool, tid: u32, key: &str) {
        log::warn!(origin:display = origin, is_coordinator, tid, key; "DeleteFail");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingEventSink {
        pub events: Mutex<Vec<String>>,
    }

    impl EventSink for RecordingEventSink {
        fn node_add(&self, _origin: Address, peer: Address) {
            self.events.lock().unwrap().push(format!("NodeAdd({peer})"));
        }

        fn create_success(&self, _origin: Address, is_coordinator: bool, _tid: u32, key: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("CreateSuccess({key},{is_coordinator})"));
        }
    }

    #[test]
    fn test_default_methods_are_inert() {
        struct Noop;
        impl EventSink for Noop {}
        let sink = Noop;
        sink.node_add(Address::new(1, 0), Address::new(2, 0));
        sink.create_fail(Address::new(1, 0), true, 0, "k");
    }

    #[test]
    fn test_recording_sink_captures_overridden_events() {
        let sink = RecordingEventSink::default();
        sink.node_add(Address::new(1, 0), Address::new(2, 0));
        sink.create_success(Address::new(1, 0), true, 0, "k");
        assert_eq!(
            *sink.events.lock().unwrap(),
            vec!["NodeAdd(2:0)".to_string(), "CreateSuccess(k,true)".to_string()]
        );
    }
}
