//! Test-run configuration
//!
//! The test runner exports its configuration as environment variables; the
//! same values can also be loaded from a JSON file.

use crate::errors::E2eError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SERVER_PORT: u16 = 9980;
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(4000);

/// How the document application is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Integration {
    /// A local server build, opened directly.
    #[default]
    None,
    /// Through the richproxy PHP reverse proxy.
    PhpProxy,
    /// Embedded in Nextcloud.
    Nextcloud,
}

impl Integration {
    pub fn parse(value: &str) -> Result<Self, E2eError> {
        match value.trim() {
            "" => Ok(Integration::None),
            "php-proxy" => Ok(Integration::PhpProxy),
            "nextcloud" => Ok(Integration::Nextcloud),
            other => Err(E2eError::Config(format!("unknown INTEGRATION {other:?}"))),
        }
    }
}

/// Core version family the server was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreVersion {
    Cp62,
    Cp64,
    Master,
}

impl CoreVersion {
    /// Classify a `LO_CORE_VERSION` string.
    pub fn from_version_string(version: &str) -> Self {
        if version.contains("Collabora") {
            if version.contains("_6.2.") {
                return CoreVersion::Cp62;
            } else if version.contains("_6.4.") {
                return CoreVersion::Cp64;
            }
        }
        CoreVersion::Master
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CoreVersion::Cp62 => "cp-6-2",
            CoreVersion::Cp64 => "cp-6-4",
            CoreVersion::Master => "master",
        }
    }
}

fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

fn default_command_timeout_ms() -> u64 {
    DEFAULT_COMMAND_TIMEOUT.as_millis() as u64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEnv {
    #[serde(default)]
    pub integration: Integration,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    pub wsd_version_hash: String,
    /// Pristine test documents, with a trailing slash.
    pub data_folder: String,
    /// Scratch copies the server opens, with a trailing slash.
    pub workdir: String,
    /// Root of the upload fixtures (`desktop/` and `mobile/` live below it).
    /// Empty means the data folder.
    #[serde(default)]
    pub fixtures_folder: String,
    #[serde(default)]
    pub lo_core_version: String,
    #[serde(default)]
    pub interference_test: bool,
    #[serde(default = "default_command_timeout_ms")]
    pub default_command_timeout_ms: u64,
}

impl TestEnv {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, E2eError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; used by `from_env` and by tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, E2eError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| E2eError::Config(format!("{key} is not set")))
        };

        let integration = Integration::parse(&lookup("INTEGRATION").unwrap_or_default())?;
        let server_port = match lookup("SERVER_PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|e| E2eError::Config(format!("invalid SERVER_PORT {port:?}: {e}")))?,
            None => DEFAULT_SERVER_PORT,
        };
        let interference_test = match lookup("INTERFERENCE_TEST").as_deref().map(str::trim) {
            None | Some("") | Some("false") => false,
            Some("true") => true,
            Some(other) => {
                return Err(E2eError::Config(format!(
                    "INTERFERENCE_TEST must be true or false, got {other:?}"
                )))
            }
        };
        let default_command_timeout_ms = match lookup("DEFAULT_COMMAND_TIMEOUT_MS") {
            Some(ms) => ms.trim().parse().map_err(|e| {
                E2eError::Config(format!("invalid DEFAULT_COMMAND_TIMEOUT_MS {ms:?}: {e}"))
            })?,
            None => default_command_timeout_ms(),
        };

        Ok(Self {
            integration,
            server_port,
            wsd_version_hash: required("WSD_VERSION_HASH")?,
            data_folder: required("DATA_FOLDER")?,
            workdir: required("WORKDIR")?,
            fixtures_folder: lookup("FIXTURES_FOLDER").unwrap_or_default(),
            lo_core_version: lookup("LO_CORE_VERSION").unwrap_or_default(),
            interference_test,
            default_command_timeout_ms,
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, E2eError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn fixtures_folder(&self) -> &str {
        if self.fixtures_folder.is_empty() {
            &self.data_folder
        } else {
            &self.fixtures_folder
        }
    }

    pub fn core_version(&self) -> CoreVersion {
        CoreVersion::from_version_string(&self.lo_core_version)
    }

    pub fn default_command_timeout(&self) -> Duration {
        Duration::from_millis(self.default_command_timeout_ms)
    }

    /// Timeout for slow steps such as the initial document load.
    pub fn long_command_timeout(&self) -> Duration {
        self.default_command_timeout() * 2
    }
}
