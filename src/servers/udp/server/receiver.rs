//! A stream of incoming datagrams.
//!
//! The receiver owns the read side of the socket. Each datagram is read into
//! a buffer leased from the shared pool; ownership of the buffer travels
//! with the [`RawRequest`] to the processor task, which releases it once the
//! response has been written (or the packet dropped).
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use super::bound_socket::BoundSocket;
use crate::servers::udp::{RawRequest, MAX_PACKET_SIZE};
use crate::shared::pool::Pool;

pub struct Receiver {
    pub bound_socket: Arc<BoundSocket>,
    pool: Arc<Pool<Vec<u8>>>,
}

impl Receiver {
    #[must_use]
    pub fn new(bound_socket: Arc<BoundSocket>, pool: Arc<Pool<Vec<u8>>>) -> Self {
        Receiver { bound_socket, pool }
    }

    #[must_use]
    pub fn bound_socket_address(&self) -> SocketAddr {
        self.bound_socket.address()
    }
}

impl Stream for Receiver {
    type Item = std::io::Result<RawRequest>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let mut buffer = this.pool.acquire();
        buffer.resize(MAX_PACKET_SIZE, 0);

        let mut buf = tokio::io::ReadBuf::new(&mut buffer);

        let ready = match this.bound_socket.poll_recv_from(cx, &mut buf) {
            Poll::Ready(ready) => ready,
            Poll::Pending => {
                this.pool.release(buffer);
                return Poll::Pending;
            }
        };

        match ready {
            Ok(from) => {
                let filled = buf.filled().len();
                buffer.truncate(filled);
                Poll::Ready(Some(Ok(RawRequest { payload: buffer, from })))
            }
            Err(err) => {
                this.pool.release(buffer);
                Poll::Ready(Some(Err(err)))
            }
        }
    }
}
