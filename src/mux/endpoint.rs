use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use util::{Buffer, Conn};

use super::Transport;

/// Endpoint exposes one classified packet stream of the shared socket as a
/// `Conn`, so protocol stacks (DTLS) can read only their own traffic. The
/// session loop feeds it; sends go out over the shared transport.
pub struct Endpoint {
    pub(crate) buffer: Buffer,
    pub(crate) transport: Arc<Transport>,
}

impl Endpoint {
    pub(crate) fn new(transport: Arc<Transport>) -> Self {
        Endpoint {
            buffer: Buffer::new(0, 0),
            transport,
        }
    }

    /// Queues one inbound datagram for the consumer.
    pub(crate) async fn feed(&self, data: &[u8]) -> Result<(), util::Error> {
        self.buffer.write(data).await.map(|_| ())
    }

    pub(crate) async fn close(&self) {
        self.buffer.close().await;
    }
}

#[async_trait]
impl Conn for Endpoint {
    async fn connect(&self, _addr: SocketAddr) -> Result<(), util::Error> {
        Err(util::Error::Other("not applicable".to_owned()))
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize, util::Error> {
        self.buffer.read(buf, None).await
    }

    async fn recv_from(&self, _buf: &mut [u8]) -> Result<(usize, SocketAddr), util::Error> {
        Err(util::Error::Other("not applicable".to_owned()))
    }

    async fn send(&self, buf: &[u8]) -> Result<usize, util::Error> {
        self.transport
            .write(buf)
            .await
            .map_err(|e| util::Error::Other(e.to_string()))?;
        Ok(buf.len())
    }

    async fn send_to(&self, _buf: &[u8], _target: SocketAddr) -> Result<usize, util::Error> {
        Err(util::Error::Other("not applicable".to_owned()))
    }

    fn local_addr(&self) -> Result<SocketAddr, util::Error> {
        self.transport.conn.local_addr()
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        Some(self.transport.peer())
    }

    async fn close(&self) -> Result<(), util::Error> {
        self.buffer.close().await;
        Ok(())
    }
}
