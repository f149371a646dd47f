//! Device state: identity, users, media profiles and service endpoints.
//!
//! The store is populated from configuration and by the owner's setters.
//! Request processing only reads it.

use crate::config::{DeviceInfo, MediaProfile, ServerConfig, UserConfig};
use crate::error::ServerError;
use parking_lot::RwLock;

/// A stored user credential.
pub type Credential = UserConfig;

pub const DEVICE_NS: &str = "http://www.onvif.org/ver10/device/wsdl";
pub const MEDIA_NS: &str = "http://www.onvif.org/ver10/media/wsdl";
pub const PTZ_NS: &str = "http://www.onvif.org/ver20/ptz/wsdl";
pub const SCHEMA_NS: &str = "http://www.onvif.org/ver10/schema";

/// Lookup of credentials by username.
pub trait CredentialStore {
    /// Exact-match lookup; disabled users are still returned.
    fn find_credential(&self, username: &str) -> Option<Credential>;
}

impl CredentialStore for [Credential] {
    fn find_credential(&self, username: &str) -> Option<Credential> {
        self.iter().find(|c| c.username == username).cloned()
    }
}

impl CredentialStore for Vec<Credential> {
    fn find_credential(&self, username: &str) -> Option<Credential> {
        self.as_slice().find_credential(username)
    }
}

/// An advertised service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub namespace: String,
    pub xaddr: String,
    pub version_major: u32,
    pub version_minor: u32,
}

impl ServiceEndpoint {
    fn new(namespace: &str, base_url: &str, path: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            xaddr: format!("{}/onvif/{}", base_url, path),
            version_major: 2,
            version_minor: 0,
        }
    }
}

/// Endpoints of the services this device exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Services {
    pub device: ServiceEndpoint,
    pub media: ServiceEndpoint,
    /// Present only when PTZ is enabled
    pub ptz: Option<ServiceEndpoint>,
}

#[derive(Debug)]
struct StoreInner {
    device_info: DeviceInfo,
    users: Vec<Credential>,
    profiles: Vec<MediaProfile>,
    services: Services,
}

/// Shared, externally populated device state.
#[derive(Debug)]
pub struct DeviceStore {
    inner: RwLock<StoreInner>,
}

impl DeviceStore {
    /// Build a store from a validated configuration.
    pub fn new(config: &ServerConfig) -> Self {
        let base_url = format!("http://{}:{}", config.advertised_host(), config.settings.port);
        let services = Services {
            device: ServiceEndpoint::new(DEVICE_NS, &base_url, "device_service"),
            media: ServiceEndpoint::new(MEDIA_NS, &base_url, "media_service"),
            ptz: config
                .services
                .ptz_enabled
                .then(|| ServiceEndpoint::new(PTZ_NS, &base_url, "ptz_service")),
        };

        Self {
            inner: RwLock::new(StoreInner {
                device_info: config.device.clone(),
                users: config.auth.users.clone(),
                profiles: config.profiles.clone(),
                services,
            }),
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.inner.read().device_info.clone()
    }

    pub fn set_device_info(&self, info: DeviceInfo) {
        self.inner.write().device_info = info;
    }

    pub fn services(&self) -> Services {
        self.inner.read().services.clone()
    }

    /// Add an enabled user.
    pub fn add_user(&self, username: &str, password: &str) -> Result<(), ServerError> {
        if username.is_empty() {
            return Err(ServerError::Config("username must not be empty".to_string()));
        }

        let mut inner = self.inner.write();
        if inner.users.iter().any(|u| u.username == username) {
            return Err(ServerError::Config(format!("user '{}' already exists", username)));
        }

        inner.users.push(Credential {
            username: username.to_string(),
            password: password.to_string(),
            enabled: true,
        });
        Ok(())
    }

    /// Enable or disable an existing user. Returns false if unknown.
    pub fn set_user_enabled(&self, username: &str, enabled: bool) -> bool {
        let mut inner = self.inner.write();
        match inner.users.iter_mut().find(|u| u.username == username) {
            Some(user) => {
                user.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn add_profile(&self, profile: MediaProfile) -> Result<(), ServerError> {
        let mut inner = self.inner.write();
        if inner.profiles.iter().any(|p| p.token == profile.token) {
            return Err(ServerError::Config(format!(
                "profile '{}' already exists",
                profile.token
            )));
        }
        inner.profiles.push(profile);
        Ok(())
    }

    pub fn profiles(&self) -> Vec<MediaProfile> {
        self.inner.read().profiles.clone()
    }

    pub fn find_profile(&self, token: &str) -> Option<MediaProfile> {
        self.inner
            .read()
            .profiles
            .iter()
            .find(|p| p.token == token)
            .cloned()
    }
}

impl CredentialStore for DeviceStore {
    fn find_credential(&self, username: &str) -> Option<Credential> {
        self.inner.read().users.find_credential(username)
    }
}
