//! SSDP discovery of devices on the local network.

use crate::connection::Endpoint;
use crate::error::ClientError;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;

/// Search target advertised by devices.
pub const SEARCH_TARGET: &str = "urn:schemas-denon-com:device:ACT-Denon:1";

/// SSDP multicast group and port.
pub const SSDP_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);

pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Discovery options.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Stop after this many devices; 0 waits for the full timeout.
    pub max_devices: usize,
    pub timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_devices: 1,
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

impl DiscoveryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_devices(mut self, max_devices: usize) -> Self {
        self.max_devices = max_devices;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The M-SEARCH datagram.
pub fn search_request() -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\nHOST: {}\r\nST: {}\r\nMX: 5\r\nMAN: \"ssdp:discover\"\r\n\r\n",
        SSDP_ADDR, SEARCH_TARGET
    )
}

/// Returns the device endpoint for a search response from `from`, if it is one.
pub fn parse_response(datagram: &[u8], from: SocketAddr) -> Option<Endpoint> {
    let text = String::from_utf8_lossy(datagram);
    if !text.contains(SEARCH_TARGET) {
        return None;
    }
    Some(Endpoint::new(from.ip()))
}

/// Searches the local network for devices.
///
/// Returns what was found when `max_devices` is reached or the timeout
/// expires; the list may be empty.
pub async fn discover(options: &DiscoveryOptions) -> Result<Vec<Endpoint>, ClientError> {
    discover_at(SocketAddr::V4(SSDP_ADDR), options).await
}

pub(crate) async fn discover_at(
    target: SocketAddr,
    options: &DiscoveryOptions,
) -> Result<Vec<Endpoint>, ClientError> {
    let bind: SocketAddr = if target.ip().is_loopback() {
        (Ipv4Addr::LOCALHOST, 0).into()
    } else {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind).await?;
    tracing::debug!("Sending search request to {}", target);
    socket.send_to(search_request().as_bytes(), target).await?;

    let deadline = Instant::now() + options.timeout;
    let mut devices: Vec<Endpoint> = Vec::new();
    let mut buf = vec![0u8; 2048];

    loop {
        let (n, from) = match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Ok(received) => received?,
            Err(_) => {
                tracing::debug!("Discovery timed out with {} device(s)", devices.len());
                break;
            }
        };

        let Some(endpoint) = parse_response(&buf[..n], from) else {
            tracing::trace!("Ignoring unrelated SSDP response from {}", from);
            continue;
        };
        if devices.contains(&endpoint) {
            continue;
        }

        tracing::debug!("Discovered device at {}", endpoint);
        devices.push(endpoint);
        if options.max_devices > 0 && devices.len() >= options.max_devices {
            break;
        }
    }

    Ok(devices)
}
