//! Command-line settings, merged from flags and an optional JSON file

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use mogfs_client::ClientConfig;
use serde::Deserialize;

/// Shape of the `--config` file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub trackers: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub domain: Option<String>,
}

impl FileSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Effective settings; flags win over the file
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub trackers: Vec<String>,
    pub timeout: Option<Duration>,
    pub domain: Option<String>,
}

impl Settings {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let file = match matches.get_one::<String>("config") {
            Some(path) => FileSettings::load(Path::new(path))?,
            None => FileSettings::default(),
        };
        Self::merge(matches, file)
    }

    fn merge(matches: &ArgMatches, file: FileSettings) -> Result<Self> {
        let trackers: Vec<String> = match matches.get_many::<String>("trackers") {
            Some(values) => values.cloned().collect(),
            None => file.trackers,
        };
        if trackers.is_empty() {
            bail!("No trackers given; pass --trackers or set \"trackers\" in the config file");
        }

        let timeout = matches
            .get_one::<u64>("timeout")
            .copied()
            .or(file.timeout_secs)
            .map(Duration::from_secs);

        let domain = matches.get_one::<String>("domain").cloned().or(file.domain);

        Ok(Settings {
            trackers,
            timeout,
            domain,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.trackers.iter().cloned());
        match self.timeout {
            Some(timeout) => config.with_timeout(timeout),
            None => config,
        }
    }

    pub fn domain(&self) -> Result<&str> {
        self.domain
            .as_deref()
            .context("No domain given; pass --domain or set \"domain\" in the config file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli;
    use std::io::Write;

    #[test]
    fn test_flags_only() {
        let matches = cli()
            .try_get_matches_from([
                "mogfs",
                "--trackers",
                "10.0.0.1:7001,10.0.0.2:7001",
                "--timeout",
                "3",
                "--domain",
                "photos",
                "noop",
            ])
            .unwrap();

        let settings = Settings::from_matches(&matches).unwrap();
        assert_eq!(settings.trackers, vec!["10.0.0.1:7001", "10.0.0.2:7001"]);
        assert_eq!(settings.timeout, Some(Duration::from_secs(3)));
        assert_eq!(settings.domain().unwrap(), "photos");

        let config = settings.client_config();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.hosts.len(), 2);
    }

    #[test]
    fn test_file_fills_gaps_and_flags_win() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"trackers": ["10.0.0.9:7001"], "timeout_secs": 10, "domain": "backups"}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let matches = cli()
            .try_get_matches_from(["mogfs", "--config", &path, "--domain", "photos", "noop"])
            .unwrap();
        let settings = Settings::from_matches(&matches).unwrap();

        assert_eq!(settings.trackers, vec!["10.0.0.9:7001"]);
        assert_eq!(settings.timeout, Some(Duration::from_secs(10)));
        assert_eq!(settings.domain.as_deref(), Some("photos"));
    }

    #[test]
    fn test_missing_trackers_and_domain() {
        let matches = cli().try_get_matches_from(["mogfs", "noop"]).unwrap();
        assert!(Settings::from_matches(&matches).is_err());

        let matches = cli()
            .try_get_matches_from(["mogfs", "--trackers", "10.0.0.1:7001", "noop"])
            .unwrap();
        let settings = Settings::from_matches(&matches).unwrap();
        assert!(settings.domain().is_err());
        assert_eq!(settings.client_config().timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_unknown_config_keys_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"trackerz": []}}"#).unwrap();
        assert!(FileSettings::load(file.path()).is_err());
    }
}
