//! Tracker connection lifecycle
//!
//! Owns at most one live TCP connection. Reconnection is lazy: after an I/O
//! failure the connection is only marked dead, and the next request dials
//! again through the whole host list.
//!
//! A connection is only reused when it is idle: no request written on it is
//! still waiting for its reply, and the tracker has sent nothing unasked.
//! A request future dropped between write and read leaves its exchange open,
//! so the connection is discarded rather than handing that reply to the next
//! caller.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use mogfs_net::MAX_RESPONSE_LINE;
use rand::seq::SliceRandom;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, warn};

use crate::config::HostOrder;
use crate::{ClientError, Result};

/// What a single read attempt produced
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// A full line including its terminator
    Line(String),
    /// Bytes followed by EOF, or a line longer than the protocol allows
    Partial(String),
    /// The peer closed the connection without sending anything
    Eof,
}

pub(crate) struct ConnectionManager {
    hosts: Vec<SocketAddr>,
    order: HostOrder,
    connect_timeout: Duration,
    stream: Option<BufReader<TcpStream>>,
    peer: Option<SocketAddr>,
    /// A request was written and its reply has not been read yet
    in_flight: bool,
}

impl ConnectionManager {
    pub fn new(hosts: Vec<SocketAddr>, order: HostOrder, connect_timeout: Duration) -> Self {
        ConnectionManager {
            hosts,
            order,
            connect_timeout,
            stream: None,
            peer: None,
            in_flight: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Make sure a connection is live, dialling every host once if needed
    pub async fn ensure_connection(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_ref() {
            if self.in_flight {
                warn!("previous tracker exchange was abandoned, dropping connection");
                self.invalidate();
            } else if has_unsolicited_input(stream) {
                warn!("tracker sent data nobody asked for, dropping connection");
                self.invalidate();
            } else {
                return Ok(());
            }
        }

        let candidates = self.candidates();
        for addr in &candidates {
            match dial(*addr, self.connect_timeout).await {
                Ok(stream) => {
                    debug!(peer = %addr, "connected to tracker");
                    self.stream = Some(BufReader::new(stream));
                    self.peer = Some(*addr);
                    return Ok(());
                }
                Err(e) => {
                    warn!(host = %addr, error = %e, "tracker dial failed");
                }
            }
        }

        Err(ClientError::NoHostReachable {
            attempted: candidates.len(),
        })
    }

    /// Drop the current connection; the next request reconnects
    pub fn invalidate(&mut self) {
        if let Some(peer) = self.peer.take() {
            debug!(peer = %peer, "tracker connection invalidated");
        }
        self.stream = None;
        self.in_flight = false;
    }

    /// Write a whole request line before `deadline`
    pub async fn write_request(&mut self, line: &str, deadline: Instant) -> io::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        self.in_flight = true;

        match timeout_at(deadline, stream.get_mut().write_all(line.as_bytes())).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "tracker write timed out")),
        }
    }

    /// Read one response line, waiting at most `read_timeout` and never
    /// past `deadline`
    pub async fn read_line(&mut self, read_timeout: Duration, deadline: Instant) -> Result<ReadOutcome> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        let read_deadline = std::cmp::min(Instant::now() + read_timeout, deadline);

        let mut buf = Vec::new();
        let mut limited = (&mut *stream).take(MAX_RESPONSE_LINE as u64);
        let read = timeout_at(read_deadline, limited.read_until(b'\n', &mut buf))
            .await
            .map_err(|_| ClientError::Timeout("tracker read"))??;

        if read == 0 {
            return Ok(ReadOutcome::Eof);
        }

        if !buf.ends_with(b"\n") {
            return Ok(ReadOutcome::Partial(String::from_utf8_lossy(&buf).into_owned()));
        }

        let line = String::from_utf8(buf)
            .map_err(|e| ClientError::BadServerResponse(String::from_utf8_lossy(e.as_bytes()).into_owned()))?;
        self.in_flight = false;
        Ok(ReadOutcome::Line(line))
    }

    /// Hosts in the order they should be tried for this attempt
    fn candidates(&self) -> Vec<SocketAddr> {
        let mut hosts = self.hosts.clone();
        if self.order == HostOrder::Shuffled {
            hosts.shuffle(&mut rand::thread_rng());
        }
        hosts
    }
}

async fn dial(addr: SocketAddr, connect_timeout: Duration) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_keepalive(true)?;

    let stream = timeout(connect_timeout, socket.connect(addr))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "tracker connect timed out"))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Buffered bytes past the last reply, or anything (data or a clean close)
/// waiting on the socket while no request is outstanding.
///
/// Errors are left for the next write to discover.
fn has_unsolicited_input(stream: &BufReader<TcpStream>) -> bool {
    if !stream.buffer().is_empty() {
        return true;
    }
    let mut scratch = [0u8; 1];
    matches!(stream.get_ref().try_read(&mut scratch), Ok(_))
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "no live tracker connection")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn refused_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    fn manager(hosts: Vec<SocketAddr>) -> ConnectionManager {
        ConnectionManager::new(hosts, HostOrder::InOrder, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_all_hosts_refused() {
        let hosts = vec![refused_addr().await, refused_addr().await];
        let mut conn = manager(hosts);

        let err = conn.ensure_connection().await.unwrap_err();

        assert!(matches!(err, ClientError::NoHostReachable { attempted: 2 }));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_connects_and_invalidates() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut conn = manager(vec![refused_addr().await, addr]);

        conn.ensure_connection().await.unwrap();
        assert!(conn.is_connected());
        assert_eq!(conn.peer(), Some(addr));

        conn.invalidate();
        assert!(!conn.is_connected());
        assert_eq!(conn.peer(), None);
    }

    #[tokio::test]
    async fn test_write_without_connection_fails() {
        let mut conn = manager(vec![]);
        let err = conn
            .write_request("noop \r\n", Instant::now() + Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_read_outcomes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"OK 1 a=1\r\nOK 1 b=").await.unwrap();
            // closing after an unterminated line
        });

        let mut conn = manager(vec![addr]);
        conn.ensure_connection().await.unwrap();
        server.await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let read_timeout = Duration::from_secs(1);
        assert_eq!(
            conn.read_line(read_timeout, deadline).await.unwrap(),
            ReadOutcome::Line("OK 1 a=1\r\n".to_string())
        );
        assert_eq!(
            conn.read_line(read_timeout, deadline).await.unwrap(),
            ReadOutcome::Partial("OK 1 b=".to_string())
        );
        assert_eq!(conn.read_line(read_timeout, deadline).await.unwrap(), ReadOutcome::Eof);
    }

    #[tokio::test]
    async fn test_unanswered_request_is_not_reused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (first, _) = listener.accept().await.unwrap();
            let (second, _) = listener.accept().await.unwrap();
            (first, second)
        });

        let mut conn = manager(vec![addr]);
        conn.ensure_connection().await.unwrap();
        conn.write_request("noop \r\n", Instant::now() + Duration::from_secs(1))
            .await
            .unwrap();

        // The reply was never read, so the next request must dial again
        conn.ensure_connection().await.unwrap();
        assert!(conn.is_connected());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_answered_request_keeps_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut stream = BufReader::new(stream);
            let mut line = String::new();
            stream.read_line(&mut line).await.unwrap();
            stream.get_mut().write_all(b"OK 1 \r\n").await.unwrap();
            listener.accept().await.is_ok()
        });

        let mut conn = manager(vec![addr]);
        let deadline = Instant::now() + Duration::from_secs(5);
        conn.ensure_connection().await.unwrap();
        conn.write_request("noop \r\n", deadline).await.unwrap();
        assert!(matches!(
            conn.read_line(Duration::from_secs(1), deadline).await.unwrap(),
            ReadOutcome::Line(_)
        ));

        conn.ensure_connection().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!server.is_finished());
        server.abort();
    }

    #[tokio::test]
    async fn test_unsolicited_data_drops_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut first, _) = listener.accept().await.unwrap();
            first.write_all(b"OK 1 key=stale\r\n").await.unwrap();
            let (second, _) = listener.accept().await.unwrap();
            (first, second)
        });

        let mut conn = manager(vec![addr]);
        conn.ensure_connection().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        conn.ensure_connection().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(stream);
        });

        let mut conn = manager(vec![addr]);
        conn.ensure_connection().await.unwrap();

        let err = conn
            .read_line(Duration::from_millis(50), Instant::now() + Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
        server.abort();
    }
}
