//! Listening side of the socket bridge.
//!
//! # Connection Flow
//!
//! 1. Bind to `127.0.0.1:0` and hand [`BridgeServer::ws_url`] to the host
//! 2. The host connects and upgrades to a WebSocket
//! 3. [`BridgeServer::accept`] returns a ready [`SocketBridge`]

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::SocketBridge;

// ============================================================================
// Constants
// ============================================================================

/// Time the host has to connect after binding.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// BridgeServer
// ============================================================================

/// A bound listener waiting for the host runtime to connect.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use image_discovery::bridge::BridgeServer;
///
/// let server = BridgeServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// let ws_url = server.ws_url();
///
/// // Hand ws_url to the host...
///
/// let bridge = server.accept().await?;
/// ```
#[derive(Debug)]
pub struct BridgeServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    connect_timeout: Duration,
}

impl BridgeServer {
    /// Binds to `ip:port`. Port 0 lets the OS pick one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = listener.local_addr()?;

        debug!(port = local_addr.port(), "Bridge server bound");

        Ok(Self {
            listener,
            local_addr,
            connect_timeout: CONNECTION_TIMEOUT,
        })
    }

    /// Sets how long [`accept`](Self::accept) waits for the host.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Returns the local socket address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the host to connect and upgrades the socket.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the host does not connect in time
    /// - [`Error::WebSocket`] if the upgrade fails
    pub async fn accept(self) -> Result<SocketBridge> {
        let (stream, addr) = timeout(self.connect_timeout, self.listener.accept())
            .await
            .map_err(|_| {
                Error::timeout("bridge accept", self.connect_timeout.as_millis() as u64)
            })??;

        debug!(?addr, "Host TCP connection accepted");

        let ws_stream = tokio_tungstenite::accept_async(stream).await?;

        info!(port = self.local_addr.port(), "Bridge connection established");

        Ok(SocketBridge::new(ws_stream))
    }
}

// ============================================================================
// Tests
// ============================================================================
