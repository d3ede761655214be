//! Wrapper for a Tokio [`UdpSocket`][`tokio::net::UdpSocket`] that is bound
//! to a particular socket address, with the kernel receive buffer sized from
//! the configuration.
use std::fmt::Debug;
use std::net::SocketAddr;
use std::ops::Deref;

use socket2::{Domain, Protocol, Socket, Type};
use url::Url;

use crate::servers::udp::UDP_TRACKER_LOG_TARGET;

pub struct BoundSocket {
    socket: tokio::net::UdpSocket,
}

impl BoundSocket {
    /// Binds a non-blocking UDP socket. A `read_buffer_size` of `0` keeps
    /// the kernel default.
    ///
    /// # Errors
    ///
    /// Will return an error if the socket can't be created, configured or
    /// bound to the provided address.
    pub fn new(addr: SocketAddr, read_buffer_size: usize) -> std::io::Result<Self> {
        let bind_addr = format!("udp://{addr}");
        tracing::debug!(target: UDP_TRACKER_LOG_TARGET, bind_addr, "BoundSocket::new (binding)");

        let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        if read_buffer_size > 0 {
            socket.set_recv_buffer_size(read_buffer_size)?;
        }

        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;

        let socket = tokio::net::UdpSocket::from_std(socket.into())?;

        let local_addr = format!("udp://{}", socket.local_addr()?);
        tracing::debug!(target: UDP_TRACKER_LOG_TARGET, local_addr, "BoundSocket::new (bound)");

        Ok(Self { socket })
    }

    /// # Panics
    ///
    /// Will panic if the socket can't get the address it was bound to.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.socket.local_addr().expect("it should get the local address")
    }

    /// # Panics
    ///
    /// Will panic if the address the socket was bound to is not a valid
    /// address to be used in a URL.
    #[must_use]
    pub fn url(&self) -> Url {
        Url::parse(&format!("udp://{}", self.address())).expect("UDP socket address should be valid")
    }
}

impl Deref for BoundSocket {
    type Target = tokio::net::UdpSocket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl Debug for BoundSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let local_addr = match self.socket.local_addr() {
            Ok(socket) => format!("Receiving From: {socket}"),
            Err(err) => format!("Socket Broken: {err}"),
        };

        f.debug_struct("BoundSocket").field("addr", &local_addr).finish_non_exhaustive()
    }
}
