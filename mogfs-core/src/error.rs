//! Error types for mogfs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MogError {
    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Missing field in tracker response: {0}")]
    MissingField(String),

    #[error("Invalid value for field {field}: {value:?}")]
    InvalidField { field: String, value: String },
}
