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

//! The two external collaborators a node drives at arm's length: the
//! unreliable datagram substrate and the observability event sink.

mod events;
mod substrate;

pub use events::EventSink;
pub use events::LogEventSink;
pub use substrate::InMemorySubstrate;
pub use substrate::Substrate;
pub use substrate::UdpSubstrate;
