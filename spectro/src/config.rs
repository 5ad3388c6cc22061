//! Driver and session configuration

use std::time::Duration;

#[cfg(feature = "serial")]
use spectro_core::constants::DEFAULT_BAUD_RATE;
use spectro_core::constants::{DEFAULT_TCP_PORT, DEFAULT_TIMEOUT};
#[cfg(feature = "serial")]
use spectro_transport::SerialTransport;
use spectro_transport::{MockTransport, TcpTransport, Transport};

/// Per-session behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound for one request/response exchange
    pub timeout: Duration,
    /// Read the instrument's settings as part of `initialize()`
    pub query_status_on_init: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
            query_status_on_init: false,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set exchange timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_status_query_on_init(mut self, enabled: bool) -> Self {
        self.query_status_on_init = enabled;
        self
    }
}

/// Where a wire driver finds its instrument
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Raw TCP, typically a serial device server
    Tcp { host: String, port: u16 },
    /// Local serial port
    #[cfg(feature = "serial")]
    Serial { path: String, baud_rate: u32 },
    /// Scripted transport
    Mock(MockTransport),
}

impl Endpoint {
    /// TCP endpoint on the default serial-server port
    pub fn tcp(host: impl Into<String>) -> Self {
        Self::Tcp {
            host: host.into(),
            port: DEFAULT_TCP_PORT,
        }
    }

    /// Serial endpoint at the default baud rate
    #[cfg(feature = "serial")]
    pub fn serial(path: impl Into<String>) -> Self {
        Self::Serial {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    /// Build a fresh, unconnected transport for this endpoint
    pub fn open(&self, connect_timeout: Duration) -> Box<dyn Transport> {
        match self {
            Self::Tcp { host, port } => {
                Box::new(TcpTransport::new(host.clone(), *port).with_connect_timeout(connect_timeout))
            }
            #[cfg(feature = "serial")]
            Self::Serial { path, baud_rate } => Box::new(SerialTransport::new(path.clone(), *baud_rate)),
            Self::Mock(script) => Box::new(script.clone()),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::tcp("127.0.0.1")
    }
}

/// Everything a builtin driver needs to reach its instrument
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    pub endpoint: Endpoint,
    pub session: SessionConfig,
}

impl DriverConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            session: SessionConfig::default(),
        }
    }

    /// Config using a scripted transport
    pub fn mock(script: MockTransport) -> Self {
        Self::new(Endpoint::Mock(script))
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set exchange timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.session.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.session.timeout, Duration::from_secs(DEFAULT_TIMEOUT));
        assert!(!config.session.query_status_on_init);
        assert!(matches!(config.endpoint, Endpoint::Tcp { port: DEFAULT_TCP_PORT, .. }));
    }

    #[test]
    fn test_builders() {
        let config = DriverConfig::new(Endpoint::tcp("10.0.0.7"))
            .with_timeout(Duration::from_millis(750))
            .with_session(SessionConfig::new().with_status_query_on_init(true).with_timeout(Duration::from_secs(2)));

        assert_eq!(config.session.timeout, Duration::from_secs(2));
        assert!(config.session.query_status_on_init);
    }

    #[test]
    fn test_open_mock_shares_script() {
        let script = MockTransport::new();
        let transport = DriverConfig::mock(script.clone()).endpoint.open(Duration::from_secs(1));
        assert_eq!(transport.remote_addr(), "mock");
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_open_tcp() {
        let transport = Endpoint::Tcp {
            host: "192.168.0.20".into(),
            port: 4002,
        }
        .open(Duration::from_secs(1));
        assert_eq!(transport.remote_addr(), "192.168.0.20:4002");
    }
}
