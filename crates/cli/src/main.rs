//! vidlink - headless peer-to-peer video offer client
//!
//! Resolves the device profile and session configuration once at startup,
//! builds the session manager over the simulated media stack, then reads
//! console commands from stdin:
//!
//! ```text
//! connect <peer-id>   Connect button
//! reset               Reset button
//! status              print the session state
//! back | escape       Back key: dispose and exit
//! ```

mod console;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use vidlink_session_core::logging::{setup_logging, LoggingConfig};
use vidlink_session_core::simulated::{SimulatedCamera, SimulatedMediaSession};
use vidlink_session_core::{
    AppConfig, DeviceProfile, MediaSourceKind, PeerId, SessionManager, TransceiverDirection,
};

use crate::console::Console;

#[derive(Parser, Debug)]
#[command(name = "vidlink", version, about = "Headless peer-to-peer video offer client")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "VIDLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Device profile (common, mobile, ...)
    #[arg(long, env = "VIDLINK_PROFILE")]
    profile: Option<DeviceProfile>,

    /// Transceiver direction (send-only, recv-only, send-recv, inactive)
    #[arg(long)]
    direction: Option<TransceiverDirection>,

    /// Capture source (media-packet, camera)
    #[arg(long)]
    source: Option<MediaSourceKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Simulated negotiation latency in milliseconds
    #[arg(long, default_value_t = 500)]
    latency_ms: u64,

    /// Peers that answer; every peer answers when empty
    #[arg(long, value_delimiter = ',')]
    reachable: Vec<i32>,
}

impl Cli {
    /// Merge command-line overrides into the file configuration
    fn app_config(&self) -> Result<AppConfig> {
        let mut app = match &self.config {
            Some(path) => AppConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => AppConfig::default(),
        };

        if let Some(profile) = &self.profile {
            app.profile = profile.clone();
        }
        if let Some(direction) = self.direction {
            app.session.direction = Some(direction);
        }
        if let Some(source) = self.source {
            app.session.source_kind = Some(source);
        }
        if let Some(level) = &self.log_level {
            app.logging.level = level.clone();
        }
        Ok(app)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = cli.app_config()?;

    let logging = LoggingConfig::from_settings(&app.logging)?;
    setup_logging(&logging)?;
    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let params = app.profile_params();
    let config = app
        .session_config()
        .context("Unsupported session configuration for this device")?;

    let transport = SimulatedMediaSession::new()
        .with_latency(Duration::from_millis(cli.latency_ms))
        .with_reachable_peers(cli.reachable.iter().copied().map(PeerId::new));
    let manager = SessionManager::new(config, Arc::new(transport), Arc::new(SimulatedCamera::new()))
        .context("Failed to create session manager")?;

    let console = Console::new(Arc::new(manager), params);
    console.attach_views()?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    console.run(stdin).await
}
