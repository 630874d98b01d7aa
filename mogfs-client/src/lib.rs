//! mogfs Rust client SDK
//!
//! Talks to a tracker over its line protocol and moves bytes to and from
//! storage nodes over HTTP.
//!
//! ```no_run
//! use mogfs_client::{Client, ClientConfig};
//!
//! # async fn run() -> mogfs_client::Result<()> {
//! let client = Client::new(ClientConfig::new(["10.0.0.1:7001", "10.0.0.2:7001"])).await?;
//! let key = client.domain("photos")?.key("cats/tabby.jpg")?;
//!
//! let stored = key.store_file("tabby.jpg", "image/jpeg").await?;
//! println!("stored {} bytes as fid {}", stored.size, stored.fid);
//!
//! let bytes = key.fetch().await?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod client;
pub mod config;
mod connection;
pub mod counting;
pub mod domain;
pub mod error;
pub mod key;
pub mod storage;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use admin::HostParams;
pub use client::Client;
pub use config::{ClientConfig, HostOrder};
pub use counting::{ByteCounter, CountingReader};
pub use domain::DomainHandle;
pub use error::ClientError;
pub use key::KeyHandle;
pub use storage::StorageClient;

pub use mogfs_net::{Idempotency, Params, TrackerError};

pub type Result<T> = std::result::Result<T, ClientError>;
