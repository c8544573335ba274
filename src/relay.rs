//! Fire-and-forget datagram handoff from the HTTP front end to the listener.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

use crate::error::Error;

/// Sends each payload as a single datagram on a socket opened for that send.
///
/// Nothing is acknowledged or retried: a successful send only means the
/// payload left this process.
#[derive(Debug, Clone, Copy)]
pub struct DatagramRelay {
    target: SocketAddr,
}

impl DatagramRelay {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub async fn send(&self, payload: &[u8]) -> Result<usize, Error> {
        let local: SocketAddr = match self.target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local).await?;
        let sent = socket.send_to(payload, self.target).await?;
        drop(socket);

        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_payload_unmodified() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay = DatagramRelay::new(receiver.local_addr().unwrap());

        let sent = relay.send(b"name=Alice&msg=Hi+there").await.unwrap();
        assert_eq!(sent, 23);

        let mut buf = [0u8; 64];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"name=Alice&msg=Hi+there");
    }

    #[tokio::test]
    async fn send_without_listener_still_succeeds() {
        let vacated = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = vacated.local_addr().unwrap();
        drop(vacated);

        let relay = DatagramRelay::new(target);
        assert!(relay.send(b"a=1").await.is_ok());
    }

    #[tokio::test]
    async fn send_to_broadcast_is_a_transport_failure() {
        let relay = DatagramRelay::new("255.255.255.255:5000".parse().unwrap());

        let err = relay.send(b"a=1").await.unwrap_err();
        assert!(matches!(err, Error::TransportFailure(_)));
    }
}
