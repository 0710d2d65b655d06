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

//! The replicated key-value DHT layered on top of the ring partitioner: a
//! wire codec, the replica-side [`Backend`], and the client-side
//! [`Coordinator`].

mod backend;
mod codec;
mod coordinator;

pub use backend::Backend;
pub use codec::CodecError;
pub use codec::DhtMessage;
pub use codec::MsgType;
pub use codec::decode;
pub use codec::encode;
pub use codec::looks_like_dht_frame;
pub use coordinator::Coordinator;
pub use coordinator::Op;
