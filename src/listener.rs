//! Ingestion side of the relay: receives datagrams, decodes and persists them.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{Stream, StreamExt};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::{self, Clock};
use crate::error::Error;
use crate::storage::Sink;

/// Largest payload read per datagram; anything beyond is cut off by the
/// transport.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Receives relayed submissions on a fixed local address.
///
/// Datagrams are handled one at a time in the order the socket delivers
/// them. A datagram that fails to decode or persist is logged and dropped;
/// only an unrecoverable socket error or shutdown ends [`RelayListener::run`].
pub struct RelayListener {
    socket: UdpSocket,
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
}

impl RelayListener {
    pub async fn bind(
        addr: SocketAddr,
        sink: Arc<dyn Sink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;

        Ok(Self {
            socket,
            sink,
            clock,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<(), Error> {
        info!("Relay listener started on {}", self.local_addr()?);

        let result = {
            let datagrams = incoming(&self.socket);
            tokio::pin!(datagrams);

            loop {
                let next = tokio::select! {
                    _ = shutdown.cancelled() => break Ok(()),
                    next = datagrams.next() => next,
                };

                match next {
                    Some(Ok((payload, from))) => {
                        info!("Received {} bytes from {}", payload.len(), from);
                        debug!("Payload: {}", String::from_utf8_lossy(&payload));
                        if let Err(e) = self.ingest(&payload).await {
                            error!("Dropping datagram from {}: {}", from, e);
                        }
                    }
                    Some(Err(e)) if is_transient(&e) => {
                        warn!("Receive failed, continuing: {}", e);
                    }
                    Some(Err(e)) => break Err(Error::TransportFailure(e)),
                    None => break Ok(()),
                }
            }
        };

        info!("Relay listener stopped");
        result
    }

    /// Decodes one payload and hands the record to the sink.
    pub async fn ingest(&self, payload: &[u8]) -> Result<(), Error> {
        let record = codec::decode(payload, self.clock.as_ref())?;
        debug!("Persisting record: {:?}", record.fields());
        self.sink.insert(record).await
    }
}

fn incoming(socket: &UdpSocket) -> impl Stream<Item = io::Result<(Vec<u8>, SocketAddr)>> + '_ {
    async_stream::stream! {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            yield socket
                .recv_from(&mut buf)
                .await
                .map(|(n, from)| (buf[..n].to_vec(), from));
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}
