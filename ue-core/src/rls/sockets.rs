//! Owns the pair of UDP file descriptors the RLS layer sends/receives on,
//! one per address family (§4.C "The sender selects between IPv4 and IPv6
//! file descriptors based on the target address family"). Grounded on
//! `FdBase::RLS_IP4`/`RLS_IP6` in `udp_layer.cpp`, where the fd role is a
//! small integer index into one allocator; here each role is simply a
//! named `UdpSocket` field, since Rust's ownership already gives each
//! `UeTask` its own descriptors without a shared allocator.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::error::UeTaskError;

pub struct Sockets {
    pub ip4: UdpSocket,
    pub ip6: UdpSocket,
}

impl Sockets {
    pub async fn bind_ephemeral() -> std::io::Result<Self> {
        let ip4 = UdpSocket::bind("0.0.0.0:0").await?;
        let ip6 = UdpSocket::bind("[::]:0").await?;
        Ok(Self { ip4, ip6 })
    }

    /// Sends are non-blocking and best-effort: per §5 "Suspension points...
    /// only one: the readiness selector," a send never blocks the loop.
    /// A kernel send-buffer-full condition is logged by the caller and
    /// otherwise has no effect on core state (UDP is already
    /// best-effort; RLS's own ack/retransmit logic is what provides
    /// reliability, per §4.D).
    pub fn send_to(&self, addr: SocketAddr, bytes: &[u8]) -> Result<(), UeTaskError> {
        let result = match addr {
            SocketAddr::V4(_) => self.ip4.try_send_to(bytes, addr),
            SocketAddr::V6(_) => self.ip6.try_send_to(bytes, addr),
        };
        result
            .map(|_| ())
            .map_err(|source| UeTaskError::Socket {
                role: if addr.is_ipv4() { "RLS_IP4" } else { "RLS_IP6" },
                source,
            })
    }
}
