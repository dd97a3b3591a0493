//! TCP socket options shared by the server listener and client connections.

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use tokio::net::{TcpListener, TcpStream};

/// OS-level keepalive probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    /// Idle time before the first probe.
    pub idle: Duration,
    /// Interval between probes.
    pub interval: Duration,
}

/// Options applied to every accepted or connected stream.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Disable Nagle's algorithm. Default: true.
    pub tcp_nodelay: bool,
    /// OS keepalive probing. Default: off; a silent peer is noticed only
    /// when the socket errors or closes.
    pub keepalive: Option<Keepalive>,
    /// `SO_REUSEADDR` on listeners. Default: true except on Windows.
    pub reuse_addr: bool,
    /// Listen backlog.
    pub backlog: i32,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            keepalive: None,
            reuse_addr: !cfg!(target_os = "windows"),
            backlog: 128,
        }
    }
}

/// Apply socket configuration to a connected [`TcpStream`].
pub fn configure_stream(stream: &TcpStream, config: &SocketConfig) -> std::io::Result<()> {
    stream.set_nodelay(config.tcp_nodelay)?;

    if let Some(keepalive) = config.keepalive {
        let params = TcpKeepalive::new()
            .with_time(keepalive.idle)
            .with_interval(keepalive.interval);
        SockRef::from(stream).set_tcp_keepalive(&params)?;
    }

    Ok(())
}

/// Bind a listener at `addr` with the configured options.
///
/// IPv6 listeners accept IPv4 clients too (dual-stack).
pub async fn create_listener(addr: SocketAddr, config: &SocketConfig) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    if config.reuse_addr {
        socket.set_reuse_address(true)?;
    }
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(config.backlog)?;

    TcpListener::from_std(socket.into())
}

/// Resolve `host:port`, preferring the first address the resolver returns.
pub async fn resolve_address(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("{host}:{port} did not resolve"),
            )
        })
}
