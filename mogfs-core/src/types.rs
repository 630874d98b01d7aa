//! Core data types for mogfs

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::fields::{FieldSet, IndexedEntry};

/// Namespace under which keys are unique on the tracker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainName(String);

impl DomainName {
    /// Create a new domain name with validation
    pub fn new(name: &str) -> crate::Result<Self> {
        if name.is_empty() {
            return Err(crate::MogError::InvalidDomainName("empty name".to_string()));
        }

        if name.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(crate::MogError::InvalidDomainName(format!(
                "invalid characters in '{}'",
                name
            )));
        }

        Ok(DomainName(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DomainName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical name of a stored object within a domain
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(String);

impl Key {
    /// Create a new key with validation
    pub fn new(key: &str) -> crate::Result<Self> {
        if key.is_empty() {
            return Err(crate::MogError::InvalidKey("empty key".to_string()));
        }

        // Keys are percent-encoded on the wire, but a control character is
        // never meaningful in one
        if key.chars().any(|c| c.is_control()) {
            return Err(crate::MogError::InvalidKey(
                "control characters not allowed".to_string(),
            ));
        }

        Ok(Key(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for one open-write-close cycle, issued by `create_open`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHandle {
    pub fid: u64,
    pub devid: u64,
    /// Storage-node URL the bytes must be PUT to
    pub path: String,
}

impl FileHandle {
    /// Reshape a `create_open` reply.
    ///
    /// Multi-destination replies carry `dev_count` with `devid_N`/`path_N`;
    /// the first destination is used.
    pub fn from_fields(fields: &FieldSet) -> crate::Result<Self> {
        let fid = fields.require_parsed("fid")?;

        if fields.contains("dev_count") {
            let mut destinations = fields.indexed("dev_count", "devid_", |entry| {
                let devid = entry.require_parsed("")?;
                let path = entry.fields().require(&format!("path_{}", entry.index()))?;
                Ok((devid, path.to_string()))
            })?;
            if destinations.is_empty() {
                return Err(crate::MogError::MissingField("path_1".to_string()));
            }
            let (devid, path) = destinations.swap_remove(0);
            return Ok(FileHandle { fid, devid, path });
        }

        Ok(FileHandle {
            fid,
            devid: fields.require_parsed("devid")?,
            path: fields.require("path")?.to_string(),
        })
    }
}

/// Result of a completed store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub fid: u64,
    pub devid: u64,
    pub path: String,
    /// Exact number of bytes sent to the storage node
    pub size: u64,
}

/// Storage class within a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassRecord {
    pub name: String,
    pub mindevcount: Option<u32>,
}

/// A domain and its classes, as listed by `get_domains`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainRecord {
    pub name: String,
    pub classes: Vec<ClassRecord>,
}

impl DomainRecord {
    pub fn list_from_fields(fields: &FieldSet) -> crate::Result<Vec<Self>> {
        fields.indexed("domains", "domain", |entry| {
            let class_prefix = entry.key("class");
            let classes = entry
                .fields()
                .indexed(&entry.key("classes"), &class_prefix, |class| {
                    Ok(ClassRecord {
                        name: class.require("name")?.to_string(),
                        mindevcount: class.parse("mindevcount")?,
                    })
                })?;
            Ok(DomainRecord {
                name: entry.value()?.to_string(),
                classes,
            })
        })
    }
}

/// Storage host as reported by `get_hosts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRecord {
    pub id: u32,
    pub name: String,
    pub status: String,
    pub ip: Option<IpAddr>,
    pub alt_ip: Option<IpAddr>,
    pub alt_mask: Option<String>,
    pub http_port: Option<u16>,
    pub http_get_port: Option<u16>,
}

impl HostRecord {
    pub fn list_from_fields(fields: &FieldSet) -> crate::Result<Vec<Self>> {
        fields.indexed("hosts", "host", Self::from_entry)
    }

    fn from_entry(entry: IndexedEntry<'_>) -> crate::Result<Self> {
        Ok(HostRecord {
            id: entry.require_parsed("_hostid")?,
            name: entry.require("_hostname")?.to_string(),
            status: entry.get("_status").unwrap_or_default().to_string(),
            ip: entry.parse("_hostip")?,
            alt_ip: entry.parse("_altip")?,
            alt_mask: entry
                .get("_altmask")
                .filter(|mask| !mask.is_empty())
                .map(str::to_string),
            http_port: entry.parse("_http_port")?,
            http_get_port: entry.parse("_http_get_port")?,
        })
    }
}

/// Storage device as reported by `get_devices`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub id: u32,
    pub host_id: u32,
    pub status: String,
    pub observed_state: Option<String>,
    pub weight: Option<u32>,
    pub mb_total: Option<u64>,
    pub mb_used: Option<u64>,
    pub mb_free: Option<u64>,
    pub mb_asof: Option<String>,
    pub utilization: Option<f64>,
    pub reject_bad_md5: bool,
}

impl DeviceRecord {
    pub fn list_from_fields(fields: &FieldSet) -> crate::Result<Vec<Self>> {
        fields.indexed("devices", "dev", |entry| {
            Ok(DeviceRecord {
                id: entry.require_parsed("_devid")?,
                host_id: entry.require_parsed("_hostid")?,
                status: entry.get("_status").unwrap_or_default().to_string(),
                observed_state: non_empty(entry.get("_observed_state")),
                weight: entry.parse("_weight")?,
                mb_total: entry.parse("_mb_total")?,
                mb_used: entry.parse("_mb_used")?,
                mb_free: entry.parse("_mb_free")?,
                mb_asof: non_empty(entry.get("_mb_asof")),
                utilization: entry.parse("_utilization")?,
                reject_bad_md5: entry.parse::<u8>("_reject_bad_md5")? == Some(1),
            })
        })
    }
}

/// A file id as reported by `list_fids`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FidRecord {
    pub fid: u64,
    pub domain: String,
    pub key: String,
    pub class: String,
    pub length: Option<u64>,
    pub devcount: Option<u32>,
}

impl FidRecord {
    pub fn list_from_fields(fields: &FieldSet) -> crate::Result<Vec<Self>> {
        fields.indexed("fid_count", "fid_", |entry| {
            Ok(FidRecord {
                fid: entry.require_parsed("_fid")?,
                domain: entry.get("_domain").unwrap_or_default().to_string(),
                key: entry.get("_key").unwrap_or_default().to_string(),
                class: entry.get("_class").unwrap_or_default().to_string(),
                length: entry.parse("_length")?,
                devcount: entry.parse("_devcount")?,
            })
        })
    }
}

/// Metadata of a stored object, from `file_info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub fid: u64,
    pub domain: String,
    pub key: String,
    pub class: String,
    pub length: Option<u64>,
    pub devcount: Option<u32>,
}

impl FileInfo {
    pub fn from_fields(fields: &FieldSet) -> crate::Result<Self> {
        Ok(FileInfo {
            fid: fields.require_parsed("fid")?,
            domain: fields.get("domain").unwrap_or_default().to_string(),
            key: fields.get("key").unwrap_or_default().to_string(),
            class: fields.get("class").unwrap_or_default().to_string(),
            length: fields.parse("length")?,
            devcount: fields.parse("devcount")?,
        })
    }
}

/// One page of `list_keys`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyList {
    pub keys: Vec<Key>,
    /// Cursor for the next page, if the tracker returned one
    pub next_after: Option<String>,
}

impl KeyList {
    pub fn from_fields(fields: &FieldSet) -> crate::Result<Self> {
        let keys = fields.indexed("key_count", "key_", |entry| Key::new(entry.value()?))?;
        Ok(KeyList {
            keys,
            next_after: non_empty(fields.get("next_after")),
        })
    }
}

/// Replica URLs of a key, from `get_paths`
pub fn paths_from_fields(fields: &FieldSet) -> crate::Result<Vec<String>> {
    fields.indexed("paths", "path", |entry| entry.value().map(str::to_string))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
