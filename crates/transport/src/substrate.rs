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

use std::collections::HashMap;
use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;

use quorumkv_core::Address;
use tokio::net::UdpSocket;

/// The unreliable datagram channel a node's tick driver drains on every
/// tick and sends through. Delivery is best-effort: a send may drop, and
/// duplicates are possible but must never break protocol invariants (both
/// subsystems are built to tolerate that).
pub trait Substrate: Send + Sync {
    /// Best-effort send of `buf` from `src` to `dst`. Errors are logged by
    /// the implementation and otherwise swallowed — there is no retry at
    /// this layer, per the spec's `SubstrateFailure` policy.
    fn send(&self, src: Address, dst: Address, buf: Vec<u8>);

    /// Drains every datagram currently queued for `dst`, in arrival order.
    fn drain(&self, dst: Address) -> Vec<Vec<u8>>;
}

/// A real substrate binding: one `UdpSocket` bound to the local node's own
/// address. `send` is a non-blocking `try_send_to`; `drain` loops
/// `try_recv_from` until it would block. Both are safe to call from a
/// synchronous tick — neither ever awaits.
pub struct UdpSubstrate {
    socket: UdpSocket,
    self_addr: Address,
}

impl UdpSubstrate {
    /// Binds a non-blocking UDP socket for `self_addr`. Must be called from
    /// within a tokio runtime context (the socket is registered with the
    /// reactor even though it is driven synchronously afterwards).
    pub fn bind(self_addr: Address) -> io::Result<Self> {
        let socket = std::net::UdpSocket::bind(std::net::SocketAddr::from(self_addr))?;
        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket)?;
        Ok(Self { socket, self_addr })
    }

    pub fn local_addr(&self) -> io::Result<Address> {
        self.socket.local_addr().map(Address::from)
    }
}

impl Substrate for UdpSubstrate {
    fn send(&self, src: Address, dst: Address, buf: Vec<u8>) {
        debug_assert_eq!(src, self.self_addr, "UdpSubstrate only sends as itself");
        match self.socket.try_send_to(&buf, std::net::SocketAddr::from(dst)) {
            Ok(_) => {}
            Err(err) => {
                log::warn!(dst:display = dst; "substrate send failed, dropping: {err}")
            }
        }
    }

    fn drain(&self, dst: Address) -> Vec<Vec<u8>> {
        debug_assert_eq!(dst, self.self_addr, "UdpSubstrate only drains its own socket");
        let mut datagrams = Vec::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            match self.socket.try_recv_from(&mut buf) {
                Ok((len, _from)) => datagrams.push(buf[..len].to_vec()),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    log::warn!("substrate recv failed: {err}");
                    break;
                }
            }
        }
        datagrams
    }
}

/// An in-process substrate for tests and local multi-node simulation: every
/// node registered with the same `InMemorySubstrate` shares one set of
/// per-destination FIFO queues, guarded by a single mutex (there is no
/// concurrency inside a tick, so this is never contended across ticks).
#[derive(Default)]
pub struct InMemorySubstrate {
    queues: Mutex<HashMap<Address, VecDeque<Vec<u8>>>>,
}

impl InMemorySubstrate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Substrate for InMemorySubstrate {
    fn send(&self, _src: Address, dst: Address, buf: Vec<u8>) {
        self.queues.lock().unwrap().entry(dst).or_default().push_back(buf);
    }

    fn drain(&self, dst: Address) -> Vec<Vec<u8>> {
        self.queues
            .lock()
            .unwrap()
            .get_mut(&dst)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_substrate_fifo_per_destination() {
        let substrate = InMemorySubstrate::new();
        let a = Address::new(1, 0);
        let b = Address::new(2, 0);
        substrate.send(a, b, vec![1]);
        substrate.send(a, b, vec![2]);
        substrate.send(b, a, vec![9]);

        assert_eq!(substrate.drain(b), vec![vec![1], vec![2]]);
        assert_eq!(substrate.drain(a), vec![vec![9]]);
        assert!(substrate.drain(b).is_empty());
    }

    #[tokio::test]
    async fn test_udp_substrate_round_trip() {
        let a = UdpSubstrate::bind(Address::new(u32::from(std::net::Ipv4Addr::LOCALHOST), 0))
            .unwrap();
        let a_addr = a.local_addr().unwrap();
        let b = UdpSubstrate::bind(Address::new(u32::from(std::net::Ipv4Addr::LOCALHOST), 0))
            .unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send(a_addr, b_addr, vec![42]);
        // Give the loopback datagram a moment to land.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(b.drain(b_addr), vec![vec![42]]);
    }
}
