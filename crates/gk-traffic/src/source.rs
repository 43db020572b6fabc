//! Flow sources: where observed origins come from.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::TrafficError;

/// A stream of inbound flow origins.
///
/// `next_origin` must be cancel safe: the monitor races it against its
/// shutdown signal and drops the pending future on stop.
#[async_trait]
pub trait FlowSource: Send + 'static {
    /// Short label used in logs and metrics.
    fn kind(&self) -> &'static str;

    /// Wait for the next flow. `Ok(None)` means the source is exhausted.
    async fn next_origin(&mut self) -> Result<Option<IpAddr>, TrafficError>;
}

/// Observes TCP connections accepted on a local port.
///
/// Each accepted connection is reported by its peer address and closed
/// immediately.
#[derive(Debug)]
pub struct TcpAcceptSource {
    listener: TcpListener,
}

impl TcpAcceptSource {
    /// Bind `0.0.0.0:port`. Port `0` picks an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns `TrafficError::Bind` if the port cannot be opened.
    pub async fn bind(port: u16) -> Result<Self, TrafficError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TrafficError::Bind { port, source })?;
        Ok(Self { listener })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns the underlying socket error.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[async_trait]
impl FlowSource for TcpAcceptSource {
    fn kind(&self) -> &'static str {
        "tcp"
    }

    async fn next_origin(&mut self) -> Result<Option<IpAddr>, TrafficError> {
        let (stream, peer) = self.listener.accept().await.map_err(TrafficError::Accept)?;
        drop(stream);
        Ok(Some(peer.ip()))
    }
}

/// Origins pushed in by the application, for replay and tests.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<IpAddr>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it.
    #[must_use]
    pub fn new(buffer: usize) -> (mpsc::Sender<IpAddr>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }
}

#[async_trait]
impl FlowSource for ChannelSource {
    fn kind(&self) -> &'static str {
        "channel"
    }

    async fn next_origin(&mut self) -> Result<Option<IpAddr>, TrafficError> {
        Ok(self.rx.recv().await)
    }
}

/// Principal string for an origin address.
///
/// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) collapse to dotted IPv4 so a
/// dual-stack listener and an IPv4 one agree on the key.
#[must_use]
pub fn normalize_origin(addr: IpAddr) -> String {
    match addr {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or_else(|| v6.to_string(), |v4| v4.to_string()),
        IpAddr::V4(v4) => v4.to_string(),
    }
}
