//! Client session and request engine

use std::net::SocketAddr;
use std::sync::Arc;

use mogfs_core::{DomainName, FieldSet};
use mogfs_net::{
    commands, decode_response, encode_request, fields, validate_command, Idempotency, Params,
    Response, TrackerError,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ReadOutcome};
use crate::storage::StorageClient;
use crate::{ClientError, DomainHandle, Result};

/// Tracker client session.
///
/// Cheap to clone; every clone shares the one tracker connection, and requests
/// from concurrent tasks are serialized on it.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    session: Mutex<Session>,
    storage: StorageClient,
}

/// State guarded by the request lock
struct Session {
    connection: ConnectionManager,
    last_error: Option<TrackerError>,
}

impl Client {
    /// Resolve the configured hosts. No connection is made until the first
    /// request.
    pub async fn new(config: ClientConfig) -> Result<Self> {
        if config.hosts.is_empty() {
            return Err(ClientError::NoHostsConfigured);
        }

        let mut hosts = Vec::with_capacity(config.hosts.len());
        for host in &config.hosts {
            hosts.push(resolve(host).await?);
        }

        let connection = ConnectionManager::new(hosts, config.host_order, config.connect_timeout);
        Ok(Client {
            inner: Arc::new(Inner {
                config,
                session: Mutex::new(Session {
                    connection,
                    last_error: None,
                }),
                storage: StorageClient::new(),
            }),
        })
    }

    /// Resolve the configured hosts and connect to one of them right away
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config).await?;
        client.inner.session.lock().await.connection.ensure_connection().await?;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Handle for a domain on this tracker
    pub fn domain(&self, name: &str) -> Result<DomainHandle> {
        Ok(DomainHandle::new(self.clone(), DomainName::new(name)?))
    }

    /// Issue one tracker command and return its fields.
    ///
    /// Idempotent commands are resent transparently when the tracker closes
    /// the connection before replying; anything else surfaces that as
    /// [`ClientError::TruncatedRequest`].
    pub async fn request(
        &self,
        command: &str,
        params: &Params,
        idempotency: Idempotency,
    ) -> Result<FieldSet> {
        validate_command(command)?;
        let line = encode_request(command, params);

        let mut session = self.inner.session.lock().await;
        let raw = self.exchange(&mut session.connection, &line, idempotency).await?;

        match decode_response(&raw)? {
            Response::Ok(fields) => {
                debug!(command, fields = fields.len(), "tracker request completed");
                Ok(fields)
            }
            Response::Err(err) => {
                debug!(command, code = %err.code, "tracker rejected request");
                session.last_error = Some(err.clone());
                Err(ClientError::Tracker(err))
            }
        }
    }

    /// Most recent `ERR` reply seen on this session, for diagnostics only
    pub async fn last_error(&self) -> Option<TrackerError> {
        self.inner.session.lock().await.last_error.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.session.lock().await.connection.is_connected()
    }

    /// Address of the tracker currently connected to
    pub async fn peer(&self) -> Option<SocketAddr> {
        self.inner.session.lock().await.connection.peer()
    }

    /// Close the tracker connection. The next request reconnects.
    pub async fn disconnect(&self) {
        self.inner.session.lock().await.connection.invalidate();
    }

    pub async fn noop(&self) -> Result<()> {
        self.request(commands::NOOP, &Params::new(), Idempotency::Idempotent)
            .await
            .map(drop)
    }

    /// Ask the tracker to hold this connection for `seconds`
    pub async fn sleep(&self, seconds: u32) -> Result<()> {
        let params = Params::new().with(fields::DURATION, seconds);
        self.request(commands::SLEEP, &params, Idempotency::Idempotent)
            .await
            .map(drop)
    }

    pub(crate) fn storage(&self) -> &StorageClient {
        &self.inner.storage
    }

    /// One request/response exchange, including the bounded resend paths
    async fn exchange(
        &self,
        conn: &mut ConnectionManager,
        line: &str,
        idempotency: Idempotency,
    ) -> Result<String> {
        let config = &self.inner.config;
        let deadline = Instant::now() + config.timeout;
        let mut resends = 0;

        loop {
            conn.ensure_connection().await?;
            send(conn, line, deadline).await?;

            match conn.read_line(config.read_timeout, deadline).await {
                Ok(ReadOutcome::Line(response)) => return Ok(response),
                Ok(ReadOutcome::Partial(data)) => {
                    conn.invalidate();
                    return Err(ClientError::BadServerResponse(data));
                }
                Ok(ReadOutcome::Eof) => {
                    conn.invalidate();
                    if !idempotency.is_idempotent() {
                        return Err(ClientError::TruncatedRequest(line.trim_end().to_string()));
                    }
                    if resends >= config.max_reconnects {
                        return Err(ClientError::RetriesExhausted(resends));
                    }
                    if Instant::now() >= deadline {
                        return Err(ClientError::Timeout("tracker request"));
                    }
                    resends += 1;
                    debug!(resends, "tracker closed connection before replying, resending");
                }
                Err(e) => {
                    conn.invalidate();
                    return Err(e);
                }
            }
        }
    }
}

/// Write `line`, reconnecting and rewriting exactly once on failure
async fn send(conn: &mut ConnectionManager, line: &str, deadline: Instant) -> Result<()> {
    let Err(first) = conn.write_request(line, deadline).await else {
        return Ok(());
    };

    warn!(error = %first, "tracker write failed, reconnecting");
    conn.invalidate();
    conn.ensure_connection().await?;

    if let Err(second) = conn.write_request(line, deadline).await {
        conn.invalidate();
        return Err(ClientError::Socket(format!(
            "write failed after reconnect: {}",
            second
        )));
    }

    Ok(())
}

async fn resolve(host: &str) -> Result<SocketAddr> {
    let invalid = |reason: String| ClientError::InvalidHost {
        host: host.to_string(),
        reason,
    };

    tokio::net::lookup_host(host)
        .await
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("no addresses".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_host_list_rejected() {
        let err = Client::new(ClientConfig::new(Vec::<String>::new()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::NoHostsConfigured));
    }

    #[tokio::test]
    async fn test_unresolvable_host_rejected() {
        let err = Client::new(ClientConfig::new(["not a host"]))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::InvalidHost { .. }));
    }

    #[tokio::test]
    async fn test_new_is_lazy() {
        // Nothing listens on port 1
        let client = Client::new(ClientConfig::new(["127.0.0.1:1"])).await.unwrap();
        assert!(!client.is_connected().await);
        assert_eq!(client.peer().await, None);
        assert!(client.last_error().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_command_never_reaches_the_wire() {
        let client = Client::new(ClientConfig::new(["127.0.0.1:1"])).await.unwrap();
        let err = client
            .request("get paths", &Params::new(), Idempotency::Idempotent)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_unreachable_tracker() {
        let client = Client::new(ClientConfig::new(["127.0.0.1:1"])).await.unwrap();
        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, ClientError::NoHostReachable { attempted: 1 }));
        assert!(err.is_connectivity());
    }
}
