//! Session configuration

use std::time::Duration;

/// Overall bound on one tracker exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound on each individual read from the tracker
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Silent resends allowed after a clean EOF on an idempotent command
pub const DEFAULT_MAX_RECONNECTS: u32 = 3;

/// Order in which tracker hosts are dialled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostOrder {
    /// A fresh random permutation on every reconnect
    #[default]
    Shuffled,
    /// The configured order, first host preferred
    InOrder,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Tracker addresses as `host:port`
    pub hosts: Vec<String>,
    pub timeout: Duration,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_reconnects: u32,
    pub host_order: HostOrder,
}

impl ClientConfig {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClientConfig {
            hosts: hosts.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_reconnects: DEFAULT_MAX_RECONNECTS,
            host_order: HostOrder::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_reconnects(mut self, max_reconnects: u32) -> Self {
        self.max_reconnects = max_reconnects;
        self
    }

    pub fn with_host_order(mut self, order: HostOrder) -> Self {
        self.host_order = order;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new(["127.0.0.1:7001"]);
        assert_eq!(config.hosts, vec!["127.0.0.1:7001".to_string()]);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.max_reconnects, 3);
        assert_eq!(config.host_order, HostOrder::Shuffled);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new(vec!["a:1".to_string(), "b:2".to_string()])
            .with_timeout(Duration::from_secs(2))
            .with_read_timeout(Duration::from_millis(250))
            .with_max_reconnects(0)
            .with_host_order(HostOrder::InOrder);

        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.max_reconnects, 0);
        assert_eq!(config.host_order, HostOrder::InOrder);
    }
}
