//! Protocol definitions for the tracker wire format

/// Longest response line accepted from a tracker
pub const MAX_RESPONSE_LINE: usize = 1024 * 1024; // 1MB

/// Line terminator for requests
pub const LINE_TERMINATOR: &str = "\r\n";

/// Protocol error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed response: {0:?}")]
    MalformedResponse(String),

    #[error("Invalid command name: {0:?}")]
    InvalidCommand(String),
}

/// Whether a command may be silently resent after an ambiguous failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Repeating the command has no additional effect (reads, listings)
    Idempotent,
    /// The command mutates tracker state and must not be resent
    NonIdempotent,
}

impl Idempotency {
    pub fn is_idempotent(self) -> bool {
        matches!(self, Idempotency::Idempotent)
    }
}

/// Tracker command names
pub mod commands {
    pub const NOOP: &str = "noop";
    pub const SLEEP: &str = "sleep";

    pub const CREATE_OPEN: &str = "create_open";
    pub const CREATE_CLOSE: &str = "create_close";
    pub const GET_PATHS: &str = "get_paths";
    pub const FILE_INFO: &str = "file_info";
    pub const FILE_DEBUG: &str = "file_debug";
    pub const DELETE: &str = "delete";
    pub const RENAME: &str = "rename";
    pub const LIST_KEYS: &str = "list_keys";
    pub const LIST_FIDS: &str = "list_fids";

    pub const GET_DOMAINS: &str = "get_domains";
    pub const CREATE_DOMAIN: &str = "create_domain";
    pub const DELETE_DOMAIN: &str = "delete_domain";
    pub const CREATE_CLASS: &str = "create_class";
    pub const UPDATE_CLASS: &str = "update_class";
    pub const DELETE_CLASS: &str = "delete_class";

    pub const GET_HOSTS: &str = "get_hosts";
    pub const CREATE_HOST: &str = "create_host";
    pub const UPDATE_HOST: &str = "update_host";
    pub const DELETE_HOST: &str = "delete_host";
    pub const GET_DEVICES: &str = "get_devices";
    pub const CREATE_DEVICE: &str = "create_device";
    pub const SET_STATE: &str = "set_state";
    pub const SET_WEIGHT: &str = "set_weight";
    pub const REPLICATE_NOW: &str = "replicate_now";
}

/// Request parameter names shared across commands
pub mod fields {
    pub const DOMAIN: &str = "domain";
    pub const KEY: &str = "key";
    pub const CLASS: &str = "class";
    pub const FID: &str = "fid";
    pub const DEVID: &str = "devid";
    pub const PATH: &str = "path";
    pub const SIZE: &str = "size";
    pub const HOST: &str = "host";
    pub const HOSTNAME: &str = "hostname";
    pub const GET_PORT: &str = "getport";
    pub const DEVICE: &str = "device";
    pub const STATE: &str = "state";
    pub const WEIGHT: &str = "weight";
    pub const STATUS: &str = "status";
    pub const IP: &str = "ip";
    pub const PORT: &str = "port";
    pub const MINDEVCOUNT: &str = "mindevcount";
    pub const FROM_KEY: &str = "from_key";
    pub const TO_KEY: &str = "to_key";
    pub const PREFIX: &str = "prefix";
    pub const AFTER: &str = "after";
    pub const LIMIT: &str = "limit";
    pub const NOVERIFY: &str = "noverify";
    pub const DURATION: &str = "duration";
    pub const FROM: &str = "from";
    pub const TO: &str = "to";
}

/// Check that a command name can be written on the wire as-is
pub fn validate_command(command: &str) -> std::result::Result<(), ProtocolError> {
    let valid = !command.is_empty()
        && command
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(ProtocolError::InvalidCommand(command.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_validation() {
        assert!(validate_command(commands::CREATE_OPEN).is_ok());
        assert!(validate_command(commands::NOOP).is_ok());

        assert!(validate_command("").is_err());
        assert!(validate_command("get paths").is_err());
        assert!(validate_command("noop\r\n").is_err());
    }

    #[test]
    fn test_idempotency() {
        assert!(Idempotency::Idempotent.is_idempotent());
        assert!(!Idempotency::NonIdempotent.is_idempotent());
    }
}
