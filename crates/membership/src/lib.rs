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

//! Gossip-based membership and failure detection.
//!
//! A [`Protocol`] is the single entry point a node's tick driver calls
//! into: `start` to join a cluster, `on_tick` to advance the local clock
//! and run the failure detector and gossip disseminator, `on_message` to
//! incorporate an inbound membership frame.

mod gossip;
mod protocol;
mod table;
mod wire;

pub use gossip::Disseminator;
pub use gossip::fanout_size;
pub use protocol::MembershipConfig;
pub use protocol::Protocol;
pub use table::MemberEntry;
pub use table::MembershipTable;
pub use wire::CodecError;
pub use wire::MemberEntryWire;
pub use wire::Message;
pub use wire::looks_like_membership_frame;
