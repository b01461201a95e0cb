use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ofp_header::SUPPORTED_VERSIONS;

#[derive(Debug, Fail)]
pub enum SettingsError {
    #[fail(display = "Cannot read settings file {}: {}", path, error)]
    Io {
        path: String,
        error: io::Error,
    },
    #[fail(display = "Invalid settings file {}: {}", path, message)]
    Parse {
        path: String,
        message: String,
    },
    #[fail(display = "Invalid value for '{}': {}", field, message)]
    Invalid {
        field: String,
        message: String,
    },
}

/// Controller configuration. Every field has a default, so a settings file only
/// needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen_address: SocketAddr,
    /// Wire versions offered to switches.
    pub openflow_versions: Vec<u8>,
    /// log4rs configuration file.
    pub log_config: String,
    pub handshake_timeout_secs: u64,
    pub keepalive_interval_secs: u64,
    pub keepalive_timeout_secs: u64,
    pub send_echo_requests: bool,
    pub send_set_config: bool,
    pub stats_interval_secs: u64,
    /// How many polls a still-unanswered 1.3 statistics request may skip.
    pub stats_request_skip: u32,
    pub multipart_timeout_secs: u64,
    pub message_queue_size: usize,
    pub writer_queue_size: usize,
    /// Steady-state messages held back while the handshake finishes.
    pub max_deferred_messages: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 6653)),
            openflow_versions: vec![1, 4],
            log_config: String::from("log4rs.yml"),
            handshake_timeout_secs: 10,
            keepalive_interval_secs: 15,
            keepalive_timeout_secs: 45,
            send_echo_requests: true,
            send_set_config: true,
            stats_interval_secs: 60,
            stats_request_skip: 10,
            multipart_timeout_secs: 30,
            message_queue_size: 1000,
            writer_queue_size: 1000,
            max_deferred_messages: 64,
        }
    }
}

fn invalid(field: &str, message: &str) -> SettingsError {
    SettingsError::Invalid {
        field: field.to_string(),
        message: message.to_string(),
    }
}

impl Settings {
    /// Read and validate a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|error| SettingsError::Io {
            path: path.display().to_string(),
            error,
        })?;
        let settings: Settings = toml::from_str(&contents).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings from `path` if one is given, the defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Settings::from_file(path),
            None => Ok(Settings::default()),
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.openflow_versions.is_empty() {
            return Err(invalid("openflow_versions", "at least one version is required"));
        }
        if let Some(v) = self.openflow_versions.iter().find(|v| !SUPPORTED_VERSIONS.contains(v)) {
            return Err(invalid(
                "openflow_versions",
                &format!("version {} is not one of {:?}", v, SUPPORTED_VERSIONS),
            ));
        }
        let positive = [
            ("handshake_timeout_secs", self.handshake_timeout_secs),
            ("keepalive_interval_secs", self.keepalive_interval_secs),
            ("keepalive_timeout_secs", self.keepalive_timeout_secs),
            ("stats_interval_secs", self.stats_interval_secs),
            ("multipart_timeout_secs", self.multipart_timeout_secs),
            ("message_queue_size", self.message_queue_size as u64),
            ("writer_queue_size", self.writer_queue_size as u64),
        ];
        if let Some(&(field, _)) = positive.iter().find(|&&(_, value)| value == 0) {
            return Err(invalid(field, "must be greater than zero"));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn multipart_timeout(&self) -> Duration {
        Duration::from_secs(self.multipart_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.listen_address, SocketAddr::from(([0, 0, 0, 0], 6653)));
        assert_eq!(settings.openflow_versions, vec![1, 4]);
        assert_eq!(settings.keepalive_interval(), Duration::from_secs(15));
        assert_eq!(settings.max_deferred_messages, 64);
        assert!(settings.send_set_config);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_file_overrides_some_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
listen_address = "127.0.0.1:6633"
openflow_versions = [1]
keepalive_interval_secs = 5
send_echo_requests = false
"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.listen_address, SocketAddr::from(([127, 0, 0, 1], 6633)));
        assert_eq!(settings.openflow_versions, vec![1]);
        assert_eq!(settings.keepalive_interval_secs, 5);
        assert!(!settings.send_echo_requests);
        assert_eq!(settings.keepalive_timeout_secs, 45);
    }

    #[test]
    fn test_unsupported_version_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "openflow_versions = [1, 2]").unwrap();
        match Settings::from_file(file.path()) {
            Err(SettingsError::Invalid { ref field, .. }) if field == "openflow_versions" => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_zero_queue_size_is_rejected() {
        let settings = Settings { writer_queue_size: 0, ..Settings::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "listen_address = 6653").unwrap();
        match Settings::from_file(file.path()) {
            Err(SettingsError::Parse { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_and_no_file() {
        assert!(Settings::from_file(Path::new("/nonexistent/ofcore.toml")).is_err());
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }
}
