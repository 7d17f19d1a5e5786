//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Resolve the configured hostname and port
//! - Bind with `SO_REUSEPORT` so every worker of the pool shares one port
//! - Reserve an ephemeral port in the primary when port 0 is requested
//! - Enforce max_connections limit via semaphore

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;

/// Pending connection backlog passed to `listen(2)`.
const BACKLOG: u32 = 1024;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Hostname did not resolve to any address.
    #[error("Failed to resolve {host}:{port}")]
    Resolve { host: String, port: u16 },
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),
    /// The connection semaphore was closed.
    #[error("Listener is closed")]
    Closed,
}

/// Resolve the bind address for `host:port`.
pub async fn resolve_bind_addr(host: &str, port: u16) -> Result<SocketAddr, ListenerError> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(ListenerError::Bind)?
        .next()
        .ok_or_else(|| ListenerError::Resolve {
            host: host.to_string(),
            port,
        })
}

fn shared_socket(addr: SocketAddr) -> io::Result<TcpSocket> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.set_reuseport(true)?;
    socket.bind(addr)?;
    Ok(socket)
}

/// A port held by the primary so all workers can bind the same ephemeral port.
///
/// The socket is bound but never listens, so it receives no connections.
#[derive(Debug)]
pub struct PortReservation {
    _socket: TcpSocket,
    port: u16,
}

impl PortReservation {
    /// Reserve an OS-assigned port on the configured host.
    pub async fn acquire(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = resolve_bind_addr(config.host(), 0).await?;
        let socket = shared_socket(addr).map_err(ListenerError::Bind)?;
        let port = socket.local_addr().map_err(ListenerError::Bind)?.port();
        tracing::debug!(port, "Reserved ephemeral port for the worker pool");
        Ok(Self {
            _socket: socket,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Bind to `config.host():port` with connection limits.
    pub async fn bind(config: &ListenerConfig, port: u16) -> Result<Self, ListenerError> {
        let addr = resolve_bind_addr(config.host(), port).await?;
        let inner = shared_socket(addr)
            .and_then(|socket| socket.listen(BACKLOG))
            .map_err(ListenerError::Bind)?;

        let local_addr = inner.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::trace!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(max_connections: usize) -> ListenerConfig {
        ListenerConfig {
            hostname: Some("127.0.0.1".to_string()),
            port: 0,
            max_connections,
            ..ListenerConfig::default()
        }
    }

    #[tokio::test]
    async fn two_listeners_share_a_reserved_port() {
        let config = local_config(4);
        let reservation = PortReservation::acquire(&config).await.unwrap();

        let first = Listener::bind(&config, reservation.port()).await.unwrap();
        let second = Listener::bind(&config, reservation.port()).await.unwrap();

        assert_eq!(first.local_addr().unwrap().port(), reservation.port());
        assert_eq!(second.local_addr().unwrap().port(), reservation.port());
    }

    #[tokio::test]
    async fn permits_are_released_on_drop() {
        let listener = Listener::bind(&local_config(1), 0).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (_stream, _peer, permit) = listener.accept().await.unwrap();
        let _client = client.await.unwrap();
        assert_eq!(listener.available_permits(), 0);

        drop(permit);
        assert_eq!(listener.available_permits(), listener.max_connections());
    }

    #[tokio::test]
    async fn unknown_host_fails_to_resolve() {
        let err = resolve_bind_addr("host.invalid", 80).await.unwrap_err();
        assert!(matches!(
            err,
            ListenerError::Resolve { .. } | ListenerError::Bind(_)
        ));
    }
}
