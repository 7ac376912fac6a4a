//! Session configuration and device profiles
//!
//! Device-class dependent values (preview size, whether a second window for
//! remote video is available) are resolved once at startup from a
//! [`DeviceProfile`] and handed to the manager inside a [`SessionConfig`].
//! Nothing here is global state.
//!
//! # Usage Examples
//!
//! ```rust
//! use vidlink_session_core::config::{DeviceProfile, ProfileParams, SessionConfig};
//! use vidlink_session_core::types::{Resolution, TransceiverDirection};
//!
//! let params = ProfileParams::resolve(&DeviceProfile::Mobile);
//! let config = SessionConfig::for_profile(&params)
//!     .with_direction(TransceiverDirection::SendRecv);
//!
//! assert_eq!(config.preview_resolution, Resolution::qvga());
//! assert!(!config.remote_view);
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Loading from a file
//!
//! ```rust,no_run
//! use vidlink_session_core::config::AppConfig;
//!
//! let app = AppConfig::from_file("vidlink.toml").expect("config");
//! let session = app.session_config().expect("valid session config");
//! println!("preview at {}", session.preview_resolution);
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::types::{MediaSourceKind, Resolution, TransceiverDirection};

/// Default deadline for offer/answer negotiation
pub const DEFAULT_NEGOTIATION_TIMEOUT_MS: u64 = 30_000;

/// Device class the application runs on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceProfile {
    /// TVs and other large-screen devices
    Common,
    /// Phones
    Mobile,
    /// Any other reported profile; treated like `Common`
    Other(String),
}

impl Default for DeviceProfile {
    fn default() -> Self {
        DeviceProfile::Common
    }
}

impl From<String> for DeviceProfile {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "common" | "" => DeviceProfile::Common,
            "mobile" => DeviceProfile::Mobile,
            _ => DeviceProfile::Other(name),
        }
    }
}

impl From<DeviceProfile> for String {
    fn from(profile: DeviceProfile) -> Self {
        profile.to_string()
    }
}

impl FromStr for DeviceProfile {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DeviceProfile::from(s.to_string()))
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceProfile::Common => f.write_str("common"),
            DeviceProfile::Mobile => f.write_str("mobile"),
            DeviceProfile::Other(name) => f.write_str(name),
        }
    }
}

/// Presentation parameters derived from a device profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileParams {
    pub profile: DeviceProfile,
    pub font_size: u32,
    pub margin: u32,
    pub preview_resolution: Resolution,
    /// Whether a separate window for remote video can be opened
    pub multi_window_supported: bool,
}

impl ProfileParams {
    /// Resolve the parameters for `profile`
    pub fn resolve(profile: &DeviceProfile) -> Self {
        let params = match profile {
            DeviceProfile::Mobile => Self {
                profile: profile.clone(),
                font_size: 6,
                margin: 20,
                preview_resolution: Resolution::qvga(),
                multi_window_supported: false,
            },
            DeviceProfile::Common | DeviceProfile::Other(_) => Self {
                profile: profile.clone(),
                font_size: 20,
                margin: 30,
                preview_resolution: Resolution::vga(),
                multi_window_supported: true,
            },
        };
        debug!(profile = %profile, preview = %params.preview_resolution, "Resolved device profile");
        params
    }

    /// Remote video window size; matches the local preview
    pub fn window_resolution(&self) -> Resolution {
        self.preview_resolution
    }
}

/// Configuration fixed for the lifetime of a session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Capture source fed into the session
    pub source_kind: MediaSourceKind,
    /// Direction used for every negotiated transceiver
    pub direction: TransceiverDirection,
    /// Local preview resolution
    pub preview_resolution: Resolution,
    /// Whether the application wants to show remote video
    pub remote_view: bool,
    /// Whether the device can show remote video in its own window
    pub multi_window_supported: bool,
    /// Negotiation deadline in milliseconds
    pub negotiation_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source_kind: MediaSourceKind::MediaPacket,
            direction: TransceiverDirection::SendRecv,
            preview_resolution: Resolution::vga(),
            remote_view: false,
            multi_window_supported: true,
            negotiation_timeout_ms: DEFAULT_NEGOTIATION_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a configuration from resolved device parameters
    ///
    /// A remote view is requested whenever the device can show one and the
    /// direction receives media.
    pub fn for_profile(params: &ProfileParams) -> Self {
        let base = Self::default();
        Self {
            preview_resolution: params.preview_resolution,
            multi_window_supported: params.multi_window_supported,
            remote_view: params.multi_window_supported && base.direction.can_receive(),
            ..base
        }
    }

    pub fn with_source_kind(mut self, source_kind: MediaSourceKind) -> Self {
        self.source_kind = source_kind;
        self
    }

    /// Set the direction; drops the remote view wish if it can no longer receive
    pub fn with_direction(mut self, direction: TransceiverDirection) -> Self {
        self.direction = direction;
        if !direction.can_receive() {
            self.remote_view = false;
        }
        self
    }

    pub fn with_preview_resolution(mut self, resolution: Resolution) -> Self {
        self.preview_resolution = resolution;
        self
    }

    pub fn with_remote_view(mut self, remote_view: bool) -> Self {
        self.remote_view = remote_view;
        self
    }

    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout_ms = crate::recovery::millis(timeout);
        self
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }

    /// Reject unsupported combinations before any connection attempt
    pub fn validate(&self) -> SessionResult<()> {
        if self.preview_resolution.is_empty() {
            return Err(SessionError::invalid_config(
                "preview_resolution",
                format!("{} has a zero dimension", self.preview_resolution),
            ));
        }

        if self.negotiation_timeout_ms == 0 {
            return Err(SessionError::invalid_config(
                "negotiation_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.remote_view && !self.direction.can_receive() {
            return Err(SessionError::invalid_config(
                "remote_view",
                format!("direction {} does not receive media", self.direction),
            ));
        }

        if self.remote_view && !self.multi_window_supported {
            return Err(SessionError::invalid_config(
                "remote_view",
                "device profile does not support a remote video window",
            ));
        }

        Ok(())
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// `[session]` table of the configuration file; unset keys keep the
/// profile-derived values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub source_kind: Option<MediaSourceKind>,
    pub direction: Option<TransceiverDirection>,
    pub preview_resolution: Option<Resolution>,
    pub remote_view: Option<bool>,
    pub negotiation_timeout_ms: Option<u64>,
}

/// `[logging]` table of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
        }
    }
}

/// Whole application configuration as read from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub profile: DeviceProfile,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Device parameters for the configured profile
    pub fn profile_params(&self) -> ProfileParams {
        ProfileParams::resolve(&self.profile)
    }

    /// Build and validate the session configuration
    pub fn session_config(&self) -> SessionResult<SessionConfig> {
        let mut config = SessionConfig::for_profile(&self.profile_params());
        let settings = &self.session;

        if let Some(source_kind) = settings.source_kind {
            config = config.with_source_kind(source_kind);
        }
        if let Some(direction) = settings.direction {
            config = config.with_direction(direction);
        }
        if let Some(resolution) = settings.preview_resolution {
            config = config.with_preview_resolution(resolution);
        }
        if let Some(remote_view) = settings.remote_view {
            config = config.with_remote_view(remote_view);
        }
        if let Some(timeout_ms) = settings.negotiation_timeout_ms {
            config.negotiation_timeout_ms = timeout_ms;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_common_profile_defaults() {
        let params = ProfileParams::resolve(&DeviceProfile::Common);
        assert_eq!(params.font_size, 20);
        assert_eq!(params.margin, 30);
        assert_eq!(params.preview_resolution, Resolution::vga());
        assert!(params.multi_window_supported);

        let config = SessionConfig::for_profile(&params);
        assert!(config.remote_view);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mobile_profile_has_no_remote_window() {
        let params = ProfileParams::resolve(&DeviceProfile::Mobile);
        assert_eq!(params.font_size, 6);
        assert_eq!(params.preview_resolution, Resolution::qvga());
        assert!(!params.multi_window_supported);

        let config = SessionConfig::for_profile(&params).with_remote_view(true);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfiguration { ref field, .. } if field == "remote_view"));
    }

    #[test]
    fn test_unknown_profile_behaves_like_common() {
        let profile = DeviceProfile::from("tv".to_string());
        assert_eq!(profile, DeviceProfile::Other("tv".to_string()));
        assert!(ProfileParams::resolve(&profile).multi_window_supported);
    }

    #[test]
    fn test_remote_view_requires_receive_direction() {
        let config = SessionConfig::new()
            .with_direction(TransceiverDirection::SendOnly)
            .with_remote_view(true);
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfiguration { .. })
        ));

        // Switching to a send-only direction drops an earlier remote view wish
        let config = SessionConfig::new()
            .with_remote_view(true)
            .with_direction(TransceiverDirection::SendOnly);
        assert!(!config.remote_view);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_resolution_and_timeout_rejected() {
        let config = SessionConfig::new().with_preview_resolution(Resolution::new(0, 480));
        assert!(config.validate().is_err());

        let config = SessionConfig::new().with_negotiation_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_from_toml() {
        let app = AppConfig::from_toml_str(
            r#"
            profile = "mobile"

            [session]
            source_kind = "camera"
            direction = "send-only"
            negotiation_timeout_ms = 5000

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(app.profile, DeviceProfile::Mobile);
        assert_eq!(app.logging.level, "debug");

        let config = app.session_config().unwrap();
        assert_eq!(config.source_kind, MediaSourceKind::Camera);
        assert_eq!(config.direction, TransceiverDirection::SendOnly);
        assert_eq!(config.preview_resolution, Resolution::qvga());
        assert_eq!(config.negotiation_timeout(), Duration::from_secs(5));
        assert!(!config.remote_view);
    }

    #[test]
    fn test_app_config_rejects_remote_view_on_mobile() {
        let app = AppConfig::from_toml_str(
            r#"
            profile = "mobile"
            [session]
            remote_view = true
            "#,
        )
        .unwrap();
        assert!(app.session_config().is_err());
    }

    #[test]
    fn test_app_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[session.preview_resolution]\nwidth = 1280\nheight = 720"
        )
        .unwrap();

        let app = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(app.profile, DeviceProfile::Common);
        let config = app.session_config().unwrap();
        assert_eq!(config.preview_resolution, Resolution::new(1280, 720));
        assert!(config.remote_view);
    }

    #[test]
    fn test_huge_negotiation_timeout_saturates() {
        let config = SessionConfig::new().with_negotiation_timeout(Duration::MAX);
        assert_eq!(config.negotiation_timeout_ms, u64::MAX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shipped_example_config_is_valid() {
        let app = AppConfig::from_toml_str(include_str!("../../../config/vidlink.example.toml")).unwrap();
        let config = app.session_config().unwrap();
        assert_eq!(config.direction, TransceiverDirection::SendRecv);
        assert_eq!(config.preview_resolution, Resolution::vga());
        assert!(config.remote_view);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = AppConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
