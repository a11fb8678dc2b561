//! UDP broadcast discovery.
//!
//! A single datagram is broadcast to the discovery port; the client then
//! blocks for a bounded window awaiting exactly one reply on the local reply
//! port. The reply's source address becomes the service host.

use crate::error::DiscoveryError;
use lanctl_protocol::{datagram, CAPABILITY_DATAGRAM_LEN, DISCOVERY_PORT, DISCOVERY_REPLY_PORT};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

/// A discovered service. Built once on successful discovery and immutable
/// thereafter.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// Address the reply came from.
    pub host: IpAddr,
    /// Listening port for the persistent connection (tagged lookups only).
    pub port: Option<u16>,
    /// Capability names advertised during capability discovery.
    pub capabilities: Vec<String>,
}

impl ServiceDescriptor {
    /// The address to open the persistent connection to, if the discovery
    /// kind reported one.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.port.map(|port| SocketAddr::new(self.host, port))
    }
}

/// Discovery configuration.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Port the service listens on for discovery datagrams.
    pub discovery_port: u16,
    /// Local port replies arrive on. Zero selects an ephemeral port.
    pub reply_port: u16,
    /// Reply window for capability discovery.
    pub capability_timeout: Duration,
    /// Reply window for tagged lookup.
    pub tagged_timeout: Duration,
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self {
            discovery_port: DISCOVERY_PORT,
            reply_port: DISCOVERY_REPLY_PORT,
            capability_timeout: Duration::from_millis(5000),
            tagged_timeout: Duration::from_millis(1000),
        }
    }

    pub fn with_discovery_port(mut self, port: u16) -> Self {
        self.discovery_port = port;
        self
    }

    pub fn with_reply_port(mut self, port: u16) -> Self {
        self.reply_port = port;
        self
    }

    pub fn with_capability_timeout(mut self, timeout: Duration) -> Self {
        self.capability_timeout = timeout;
        self
    }

    pub fn with_tagged_timeout(mut self, timeout: Duration) -> Self {
        self.tagged_timeout = timeout;
        self
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a subnet prefix like `"192.168.0"` into its broadcast address.
pub fn subnet_broadcast(subnet: &str) -> Result<IpAddr, DiscoveryError> {
    format!("{}.255", subnet)
        .parse::<Ipv4Addr>()
        .map(IpAddr::V4)
        .map_err(|_| DiscoveryError::MalformedAddress(subnet.to_string()))
}

/// Client side of the discovery exchange.
pub struct DiscoveryClient {
    socket: UdpSocket,
    config: DiscoveryConfig,
}

impl DiscoveryClient {
    /// Binds the local discovery socket.
    ///
    /// Failure here means discovery cannot work at all and is fatal at
    /// startup; everything after a successful bind is a recoverable
    /// [`DiscoveryError`].
    pub async fn bind(config: DiscoveryConfig) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", config.reply_port)).await?;
        socket.set_broadcast(true)?;
        tracing::debug!("discovery socket bound on {}", socket.local_addr()?);
        Ok(Self { socket, config })
    }

    /// Capability discovery: broadcasts an `"interface"` request and waits
    /// up to the capability window for one reply listing the service's
    /// capability names.
    pub async fn discover(
        &self,
        broadcast: IpAddr,
    ) -> Result<ServiceDescriptor, DiscoveryError> {
        let request = datagram::capability_request();
        let target = SocketAddr::new(broadcast, self.config.discovery_port);
        tracing::debug!("sending capability request to {}", target);
        self.socket.send_to(&request, target).await?;

        let (reply, from) = self.recv_reply(self.config.capability_timeout).await?;
        let capabilities = datagram::parse_capability_response(&reply)?;
        tracing::debug!(
            "capability reply from {}: {} capabilities",
            from,
            capabilities.len()
        );

        Ok(ServiceDescriptor {
            host: from.ip(),
            port: None,
            capabilities,
        })
    }

    /// Tagged lookup: broadcasts a tagged request and waits up to the lookup
    /// window for a reply carrying the service's listening port.
    pub async fn lookup(
        &self,
        tag: &str,
        broadcast: IpAddr,
    ) -> Result<ServiceDescriptor, DiscoveryError> {
        let request = datagram::tagged_request(tag)?;
        let target = SocketAddr::new(broadcast, self.config.discovery_port);
        tracing::debug!("sending tagged lookup for {:?} to {}", tag, target);
        self.socket.send_to(&request, target).await?;

        let (reply, from) = self.recv_reply(self.config.tagged_timeout).await?;
        let port = datagram::parse_tagged_response(&reply)?;
        tracing::debug!("tagged reply from {}: port {}", from, port);

        Ok(ServiceDescriptor {
            host: from.ip(),
            port: Some(port),
            capabilities: Vec::new(),
        })
    }

    /// Capability press: broadcasts a `"button"` datagram carrying the
    /// packed capability argument. Fire-and-forget; the matching handshake
    /// arrives on the persistent session, not here.
    pub async fn press(&self, broadcast: IpAddr, button_id: i32) -> Result<(), DiscoveryError> {
        let request = datagram::press_request(button_id);
        let target = SocketAddr::new(broadcast, self.config.discovery_port);
        tracing::debug!("pressing capability {} via {}", button_id, target);
        self.socket.send_to(&request, target).await?;
        Ok(())
    }

    async fn recv_reply(
        &self,
        window: Duration,
    ) -> Result<(Vec<u8>, SocketAddr), DiscoveryError> {
        let mut buf = vec![0u8; CAPABILITY_DATAGRAM_LEN];
        let (n, from) = tokio::time::timeout(window, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| {
                tracing::debug!("discovery window expired");
                DiscoveryError::Timeout
            })??;
        buf.truncate(n);
        Ok((buf, from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanctl_protocol::wire::{pack_i32, put_str};
    use lanctl_protocol::{SERVICE_TYPE_CAPABILITY, SERVICE_TYPE_TAGGED, TAGGED_DATAGRAM_LEN};

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn test_config(discovery_port: u16) -> DiscoveryConfig {
        DiscoveryConfig::new()
            .with_discovery_port(discovery_port)
            .with_reply_port(0)
            .with_capability_timeout(Duration::from_millis(200))
            .with_tagged_timeout(Duration::from_millis(200))
    }

    async fn bind_responder() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    #[test]
    fn test_subnet_broadcast() {
        assert_eq!(
            subnet_broadcast("192.168.0").unwrap(),
            IpAddr::V4(Ipv4Addr::new(192, 168, 0, 255))
        );
        assert!(matches!(
            subnet_broadcast("not-a-subnet"),
            Err(DiscoveryError::MalformedAddress(_))
        ));
        assert!(matches!(
            subnet_broadcast("10.0.0.0"),
            Err(DiscoveryError::MalformedAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_capability_discovery() {
        let (responder, port) = bind_responder().await;
        tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            let (n, from) = responder.recv_from(&mut buf).await.unwrap();
            assert!(buf[..n].starts_with(SERVICE_TYPE_CAPABILITY.as_bytes()));

            let mut reply = Vec::new();
            reply.extend_from_slice(&pack_i32(2));
            put_str(&mut reply, "A");
            put_str(&mut reply, "BB");
            responder.send_to(&reply, from).await.unwrap();
        });

        let client = DiscoveryClient::bind(test_config(port)).await.unwrap();
        let descriptor = client.discover(LOCALHOST).await.unwrap();
        assert_eq!(descriptor.capabilities, vec!["A", "BB"]);
        assert_eq!(descriptor.host, LOCALHOST);
        assert!(descriptor.socket_addr().is_none());
    }

    #[tokio::test]
    async fn test_tagged_lookup() {
        let (responder, port) = bind_responder().await;
        tokio::spawn(async move {
            let mut buf = vec![0u8; TAGGED_DATAGRAM_LEN];
            let (n, from) = responder.recv_from(&mut buf).await.unwrap();
            assert_eq!(n, TAGGED_DATAGRAM_LEN);
            assert!(buf.starts_with(SERVICE_TYPE_TAGGED.as_bytes()));
            assert_eq!(&buf[128..133], b"wall\0");

            responder.send_to(b"4620\0", from).await.unwrap();
        });

        let client = DiscoveryClient::bind(test_config(port)).await.unwrap();
        let descriptor = client.lookup("wall", LOCALHOST).await.unwrap();
        assert_eq!(descriptor.port, Some(4620));
        assert_eq!(
            descriptor.socket_addr().unwrap(),
            SocketAddr::new(LOCALHOST, 4620)
        );
    }

    #[tokio::test]
    async fn test_timeout_leaves_socket_reusable() {
        let (responder, port) = bind_responder().await;

        let client = DiscoveryClient::bind(test_config(port)).await.unwrap();

        // First attempt: the responder stays silent.
        let result = client.discover(LOCALHOST).await;
        assert!(matches!(result, Err(DiscoveryError::Timeout)));

        // Second attempt on the same client succeeds.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            // drain the first, unanswered request
            let _ = responder.recv_from(&mut buf).await.unwrap();
            let (_, from) = responder.recv_from(&mut buf).await.unwrap();

            let mut reply = Vec::new();
            reply.extend_from_slice(&pack_i32(1));
            put_str(&mut reply, "GO");
            responder.send_to(&reply, from).await.unwrap();
        });

        let descriptor = client.discover(LOCALHOST).await.unwrap();
        assert_eq!(descriptor.capabilities, vec!["GO"]);
    }

    #[tokio::test]
    async fn test_press_is_fire_and_forget() {
        let (responder, port) = bind_responder().await;
        let client = DiscoveryClient::bind(test_config(port)).await.unwrap();
        client.press(LOCALHOST, 3).await.unwrap();

        let mut buf = vec![0u8; 2048];
        let (n, _) = responder.recv_from(&mut buf).await.unwrap();
        assert_eq!(n, 1024);
        assert!(buf[..n].starts_with(b"button\0"));
        assert_eq!(&buf[128..132], &[0x03, 0x00, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_typed_error() {
        let (responder, port) = bind_responder().await;
        tokio::spawn(async move {
            let mut buf = vec![0u8; TAGGED_DATAGRAM_LEN];
            let (_, from) = responder.recv_from(&mut buf).await.unwrap();
            // no terminator in the port field
            responder.send_to(&[b'9'; 16], from).await.unwrap();
        });

        let client = DiscoveryClient::bind(test_config(port)).await.unwrap();
        let result = client.lookup("wall", LOCALHOST).await;
        assert!(matches!(result, Err(DiscoveryError::Protocol(_))));
    }
}
