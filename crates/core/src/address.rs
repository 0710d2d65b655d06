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

use std::fmt;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::net::SocketAddrV4;

/// A node's stable identity: a 32-bit member id and a 16-bit port, packed
/// into 6 bytes on the wire. `id` doubles as the node's IPv4 address (as the
/// original membership protocol this system descends from encodes it), so an
/// `Address` converts directly to a [`SocketAddr`] without a side lookup
/// table. Every membership and DHT message is addressed by this pair, never
/// by a bare socket address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    pub id: u32,
    pub port: u16,
}

impl Address {
    pub const fn new(id: u32, port: u16) -> Self {
        Self { id, port }
    }

    /// `H(id,port) = (id << 32) | port`, the stable map key used by the
    /// membership table and the ring partitioner.
    pub const fn hash(self) -> u64 {
        ((self.id as u64) << 32) | (self.port as u64)
    }

    /// The well-known join-coordinator address, `(id=1, port=0)`.
    pub const fn join_coordinator() -> Self {
        Self::new(1, 0)
    }
}

impl From<Address> for SocketAddr {
    fn from(addr: Address) -> Self {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(addr.id), addr.port))
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Address::new(u32::from(*v4.ip()), v4.port()),
            SocketAddr::V6(v6) => {
                // Fold to the low 32 bits; this system only ever binds IPv4.
                let octets = v6.ip().octets();
                let id = u32::from_be_bytes([octets[12], octets[13], octets[14], octets[15]]);
                Address::new(id, v6.port())
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_distinguishes_port() {
        let a = Address::new(1, 100);
        let b = Address::new(1, 101);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), Address::new(1, 100).hash());
    }

    #[test]
    fn test_join_coordinator() {
        assert_eq!(Address::join_coordinator(), Address::new(1, 0));
    }
}
