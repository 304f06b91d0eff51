//! Command-line tool configuration
//!
//! An optional `esprom.toml` in the platform configuration directory
//! provides defaults for the serial connection, so the port does not
//! have to be repeated on every invocation. Command-line arguments
//! always take precedence over the file.

use std::{fs::read_to_string, path::PathBuf};

use directories::ProjectDirs;
use log::debug;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};

/// A configured serial connection
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Connection {
    /// Name of the serial port used for communication
    pub serial: Option<String>,
    /// Baud rate of the serial port
    pub baud: Option<u32>,
}

/// Deserialized contents of the configuration file
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub connection: Connection,
}

impl Config {
    /// Load the configuration file, or the defaults when none exists.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        debug!("Loading configuration from {}", path.display());
        let contents = read_to_string(&path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to parse {}", path.display()))
    }

    fn config_path() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("", "", "esprom")?;
        Some(dirs.config_dir().join("esprom.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_parses_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.connection.serial.is_none());
        assert!(config.connection.baud.is_none());
    }

    #[test]
    fn connection_section_round_trips() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            serial = "/dev/ttyUSB1"
            baud = 74880
            "#,
        )
        .unwrap();
        assert_eq!(config.connection.serial.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(config.connection.baud, Some(74_880));
    }
}
