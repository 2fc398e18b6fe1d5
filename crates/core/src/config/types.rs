use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::campaign::CampaignConfig;
use crate::telephony::SimulatedLineConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub telephony: TelephonyConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("dialer.db")
}

/// Telephony configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelephonyConfig {
    /// Line backend type
    #[serde(default)]
    pub backend: TelephonyBackend,
    /// Simulated-line settings (used when backend = "simulated")
    #[serde(default)]
    pub simulated: SimulatedLineConfig,
}

/// Available telephony backends
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TelephonyBackend {
    #[default]
    Simulated,
    // Future: Sip
}

impl TelephonyBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelephonyBackend::Simulated => "simulated",
        }
    }
}

/// Config projection served by the API
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub campaign: CampaignConfig,
    pub telephony: SanitizedTelephonyConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTelephonyConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated: Option<SimulatedLineConfig>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            campaign: config.campaign.clone(),
            telephony: SanitizedTelephonyConfig {
                backend: config.telephony.backend.as_str().to_string(),
                simulated: match config.telephony.backend {
                    TelephonyBackend::Simulated => Some(config.telephony.simulated.clone()),
                },
            },
        }
    }
}
