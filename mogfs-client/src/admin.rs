//! Cluster administration commands

use std::net::IpAddr;

use mogfs_core::{DeviceRecord, DomainRecord, FidRecord, FieldSet, HostRecord};
use mogfs_net::{commands, fields, Idempotency, Params};

use crate::{Client, Result};

/// Optional host attributes for `create_host` / `update_host`
#[derive(Debug, Clone, Default)]
pub struct HostParams {
    pub ip: Option<IpAddr>,
    pub port: Option<u16>,
    pub get_port: Option<u16>,
    pub status: Option<String>,
}

impl HostParams {
    fn apply(&self, params: Params) -> Params {
        params
            .with_opt(fields::IP, self.ip)
            .with_opt(fields::PORT, self.port)
            .with_opt(fields::GET_PORT, self.get_port)
            .with_opt(fields::STATUS, self.status.as_deref())
    }
}

impl Client {
    pub async fn get_domains(&self) -> Result<Vec<DomainRecord>> {
        let reply = self
            .request(commands::GET_DOMAINS, &Params::new(), Idempotency::Idempotent)
            .await?;
        Ok(DomainRecord::list_from_fields(&reply)?)
    }

    pub async fn get_hosts(&self) -> Result<Vec<HostRecord>> {
        let reply = self
            .request(commands::GET_HOSTS, &Params::new(), Idempotency::Idempotent)
            .await?;
        Ok(HostRecord::list_from_fields(&reply)?)
    }

    pub async fn get_devices(&self) -> Result<Vec<DeviceRecord>> {
        let reply = self
            .request(commands::GET_DEVICES, &Params::new(), Idempotency::Idempotent)
            .await?;
        Ok(DeviceRecord::list_from_fields(&reply)?)
    }

    /// File ids in `from..=to`
    pub async fn list_fids(&self, from: u64, to: u64) -> Result<Vec<FidRecord>> {
        let params = Params::new().with(fields::FROM, from).with(fields::TO, to);
        let reply = self
            .request(commands::LIST_FIDS, &params, Idempotency::Idempotent)
            .await?;
        Ok(FidRecord::list_from_fields(&reply)?)
    }

    /// Raw tracker debugging dump for a file id
    pub async fn file_debug(&self, fid: u64) -> Result<FieldSet> {
        let params = Params::new().with(fields::FID, fid);
        self.request(commands::FILE_DEBUG, &params, Idempotency::Idempotent)
            .await
    }

    pub async fn create_host(&self, host: &str, attrs: &HostParams) -> Result<()> {
        let params = attrs.apply(Params::new().with(fields::HOST, host));
        self.request(commands::CREATE_HOST, &params, Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    pub async fn update_host(&self, host: &str, attrs: &HostParams) -> Result<()> {
        let params = attrs.apply(Params::new().with(fields::HOST, host));
        self.request(commands::UPDATE_HOST, &params, Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    pub async fn delete_host(&self, host: &str) -> Result<()> {
        let params = Params::new().with(fields::HOST, host);
        self.request(commands::DELETE_HOST, &params, Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    pub async fn create_device(&self, host: &str, devid: u32, state: Option<&str>) -> Result<()> {
        let params = Params::new()
            .with(fields::HOSTNAME, host)
            .with(fields::DEVID, devid)
            .with_opt(fields::STATE, state);
        self.request(commands::CREATE_DEVICE, &params, Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    pub async fn set_state(&self, host: &str, devid: u32, state: &str) -> Result<()> {
        let params = Params::new()
            .with(fields::HOST, host)
            .with(fields::DEVICE, devid)
            .with(fields::STATE, state);
        self.request(commands::SET_STATE, &params, Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    pub async fn set_weight(&self, host: &str, devid: u32, weight: u32) -> Result<()> {
        let params = Params::new()
            .with(fields::HOST, host)
            .with(fields::DEVICE, devid)
            .with(fields::WEIGHT, weight);
        self.request(commands::SET_WEIGHT, &params, Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    pub async fn replicate_now(&self) -> Result<()> {
        self.request(commands::REPLICATE_NOW, &Params::new(), Idempotency::NonIdempotent)
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mogfs_net::encode_request;

    #[test]
    fn test_host_params_skip_unset() {
        let attrs = HostParams {
            ip: Some("10.0.0.5".parse().unwrap()),
            status: Some("down".to_string()),
            ..HostParams::default()
        };

        let params = attrs.apply(Params::new().with(fields::HOST, "store-a"));

        assert_eq!(
            encode_request(commands::UPDATE_HOST, &params),
            "update_host host=store-a&ip=10.0.0.5&status=down\r\n"
        );
    }
}
