//! Configuration types for the ONVIF device server.

use crate::error::ServerError;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Main server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Config version
    pub version: String,

    /// Network and buffer settings
    pub settings: SettingsConfig,

    /// WS-UsernameToken authentication
    pub auth: AuthConfig,

    /// Device identity reported by GetDeviceInformation
    pub device: DeviceInfo,

    /// Optional services
    pub services: ServicesConfig,

    /// Media profiles
    pub profiles: Vec<MediaProfile>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            settings: SettingsConfig::default(),
            auth: AuthConfig::default(),
            device: DeviceInfo::default(),
            services: ServicesConfig::default(),
            profiles: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load a configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ServerError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.auth.nonce_cache_capacity == 0 {
            return Err(ServerError::Config(
                "auth.nonce_cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.settings.max_request_size == 0 || self.settings.max_response_size == 0 {
            return Err(ServerError::Config(
                "settings.max_request_size and settings.max_response_size must be non-zero"
                    .to_string(),
            ));
        }

        let mut usernames = HashSet::new();
        for user in &self.auth.users {
            if user.username.is_empty() {
                return Err(ServerError::Config("user with empty username".to_string()));
            }
            if !usernames.insert(user.username.as_str()) {
                return Err(ServerError::Config(format!(
                    "duplicate user '{}'",
                    user.username
                )));
            }
        }

        let mut tokens = HashSet::new();
        for profile in &self.profiles {
            if !tokens.insert(profile.token.as_str()) {
                return Err(ServerError::Config(format!(
                    "duplicate profile token '{}'",
                    profile.token
                )));
            }
        }

        for pattern in &self.auth.unauthenticated_operations {
            Pattern::new(pattern).map_err(|e| {
                ServerError::Config(format!("invalid operation pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }

    /// Host used in advertised service addresses.
    pub fn advertised_host(&self) -> &str {
        self.settings
            .advertised_host
            .as_deref()
            .unwrap_or(&self.settings.bind_address)
    }
}

/// Network and buffer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Listen address
    pub bind_address: String,

    /// Listen port
    pub port: u16,

    /// Host name or IP placed in service XAddrs (defaults to bind_address)
    pub advertised_host: Option<String>,

    /// Maximum accepted request body (bytes)
    pub max_request_size: usize,

    /// Maximum rendered response envelope (bytes)
    pub max_response_size: usize,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            advertised_host: None,
            max_request_size: 65_536, // 64KB
            max_response_size: 16_384,
        }
    }
}

/// WS-UsernameToken authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require a valid UsernameToken on every request
    pub require_auth: bool,

    /// Maximum distance between Created and server time, in seconds
    pub timestamp_tolerance_secs: u64,

    /// Number of nonces remembered for replay detection
    pub nonce_cache_capacity: usize,

    /// Known users
    pub users: Vec<UserConfig>,

    /// Operations served without authentication (glob patterns). Empty by
    /// default: with `require_auth` set, every operation is authenticated.
    pub unauthenticated_operations: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_auth: false,
            timestamp_tolerance_secs: 300, // 5 minutes
            nonce_cache_capacity: 100,
            users: Vec::new(),
            unauthenticated_operations: Vec::new(),
        }
    }
}

/// A user entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Device identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
    pub firmware_version: String,
    pub serial_number: String,
    pub hardware_id: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            manufacturer: "ONVIF Device".to_string(),
            model: "ONVIF Server v1.0".to_string(),
            firmware_version: "1.0.0".to_string(),
            serial_number: "000000000001".to_string(),
            hardware_id: String::new(),
        }
    }
}

/// Optional service toggles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Advertise the PTZ service endpoint
    pub ptz_enabled: bool,
}

/// Media profile with its video encoder settings and stream URIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaProfile {
    pub token: String,
    pub name: String,
    pub fixed: bool,
    /// H264, MJPEG, ...
    pub encoding: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate_limit: u32,
    pub quality: u32,
    pub bitrate_limit: u32,
    pub rtsp_uri: String,
    pub snapshot_uri: String,
}

impl Default for MediaProfile {
    fn default() -> Self {
        Self {
            token: "profile_1".to_string(),
            name: "MainStream".to_string(),
            fixed: true,
            encoding: "H264".to_string(),
            width: 1920,
            height: 1080,
            frame_rate_limit: 30,
            quality: 5,
            bitrate_limit: 4096,
            rtsp_uri: String::new(),
            snapshot_uri: String::new(),
        }
    }
}
