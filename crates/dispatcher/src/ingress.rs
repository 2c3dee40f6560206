//! UdpIngress - inbound messages from outside the process
//!
//! Each datagram is one JSON object `{"topic": "...", "message": {...}}`
//! where `message` is a tagged `BusMessage`. Valid datagrams are republished
//! on the bus; malformed ones are logged and dropped.

use std::net::SocketAddr;

use contracts::BusMessage;
use serde::Deserialize;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::bus::MessageBus;
use crate::error::DispatcherError;

const MAX_DATAGRAM: usize = 65_536;

#[derive(Debug, Deserialize)]
struct IngressFrame {
    topic: String,
    message: BusMessage,
}

/// UDP listener feeding the bus
pub struct UdpIngress {
    socket: UdpSocket,
    bus: MessageBus,
}

impl UdpIngress {
    #[instrument(name = "udp_ingress_bind", skip(bus))]
    pub async fn bind(addr: &str, bus: MessageBus) -> Result<Self, DispatcherError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| DispatcherError::ingress(addr, e.to_string()))?;
        info!(addr = %socket.local_addr()?, "UDP ingress listening");
        Ok(Self { socket, bus })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DispatcherError> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until the socket fails
    #[instrument(name = "udp_ingress_run", skip(self))]
    pub async fn run(self) -> Result<(), DispatcherError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            self.handle_datagram(&buf[..len], peer);
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<(), DispatcherError>> {
        tokio::spawn(self.run())
    }

    fn handle_datagram(&self, data: &[u8], peer: SocketAddr) {
        match serde_json::from_slice::<IngressFrame>(data) {
            Ok(frame) => {
                let kind = frame.message.kind();
                let seq = self.bus.publish(&frame.topic, frame.message);
                debug!(topic = %frame.topic, kind, seq, peer = %peer, "ingress message published");
            }
            Err(e) => {
                warn!(peer = %peer, bytes = data.len(), error = %e, "malformed ingress datagram dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_ingress_republishes_on_bus() {
        let bus = MessageBus::new(4, 16);
        let mut sub = bus.subscribe("cmd_vel");

        let ingress = UdpIngress::bind("127.0.0.1:0", bus.clone()).await.unwrap();
        let addr = ingress.local_addr().unwrap();
        let task = ingress.spawn();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"not json", addr).await.unwrap();
        let datagram = r#"{"topic":"cmd_vel","message":{"kind":"twist",
            "linear":{"x":-1.0,"y":0.0,"z":0.0},"angular":{"x":0.0,"y":0.0,"z":0.5}}}"#;
        sender.send_to(datagram.as_bytes(), addr).await.unwrap();

        let envelope = timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        match envelope.message {
            BusMessage::Twist(twist) => {
                assert_eq!(twist.linear.x, -1.0);
                assert_eq!(twist.angular.z, 0.5);
            }
            other => panic!("unexpected message {other:?}"),
        }

        task.abort();
    }
}
