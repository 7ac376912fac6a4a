//! Console front end
//!
//! Plays the role of the offer client's window: a peer id field, Connect and
//! Reset buttons, a local preview and (on devices with multi-window support)
//! a remote video window. Which controls are enabled follows the session
//! state published by the manager.

use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use vidlink_session_core::{
    ControlAffordances, ProfileParams, RemoteSurface, SessionError, SessionEvent, SessionManager,
    SessionState,
};

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect button with the text of the peer id field
    Connect(String),
    /// Reset button
    Reset,
    Status,
    /// Back / Escape key
    Back,
    Help,
    Unknown(String),
}

impl Command {
    /// Parse a line; blank lines yield `None`
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "connect" => Command::Connect(rest.to_string()),
            "reset" => Command::Reset,
            "status" => Command::Status,
            "back" | "escape" | "quit" | "exit" => Command::Back,
            "help" | "?" => Command::Help,
            _ => Command::Unknown(line.to_string()),
        };
        Some(command)
    }
}

pub struct Console {
    manager: Arc<SessionManager>,
    params: ProfileParams,
    watcher: JoinHandle<()>,
}

impl Console {
    pub fn new(manager: Arc<SessionManager>, params: ProfileParams) -> Self {
        let watcher = spawn_affordance_watcher(&manager);
        Self {
            manager,
            params,
            watcher,
        }
    }

    /// Attach the local preview and, when supported, the remote window
    pub fn attach_views(&self) -> Result<()> {
        let camera = self.manager.camera_handle()?;
        println!(
            "[ Local preview ] {} at {} (font {}pt, margin {}px)",
            camera.device(),
            camera.resolution(),
            self.params.font_size,
            self.params.margin
        );

        let config = self.manager.config();
        if self.params.multi_window_supported && config.remote_view {
            let surface = RemoteSurface::new("Video from remote", self.params.window_resolution());
            println!("[ Video from remote ] window at {}", surface.resolution);
            self.manager.set_remote_surface(surface)?;
        }

        print_affordances(self.manager.state());
        Ok(())
    }

    /// Apply one command; `Break` means the application should exit
    pub async fn handle(&self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Connect(peer_text) => self.connect(&peer_text),
            Command::Reset => {
                info!("Reset.");
                if let Err(e) = self.manager.disconnect().await {
                    warn!(error = %e, "Reset ignored");
                }
            }
            Command::Status => {
                let state = self.manager.state();
                match self.manager.peer_id() {
                    Some(peer) => println!("state: {} (peer {})", state, peer),
                    None => println!("state: {}", state),
                }
            }
            Command::Back => {
                self.manager.dispose().await;
                return ControlFlow::Break(());
            }
            Command::Help => {
                println!("commands: connect <peer-id> | reset | status | back");
            }
            Command::Unknown(line) => {
                println!("unknown command: {} (try 'help')", line);
            }
        }
        ControlFlow::Continue(())
    }

    fn connect(&self, peer_text: &str) {
        info!(input = peer_text, "Connect.");
        match self.manager.connect(peer_text) {
            Ok(pending) => {
                let peer = pending.peer_id();
                tokio::spawn(async move {
                    match pending.await {
                        Ok(()) => println!("connected to peer {}", peer),
                        Err(SessionError::Cancelled { .. }) => {
                            info!(%peer, "Connection attempt abandoned");
                        }
                        Err(e) => report_connect_failure(&e),
                    }
                });
            }
            Err(e) => report_connect_failure(&e),
        }
    }

    /// Process commands until Back or end of input; EOF also disposes
    pub async fn run<R>(self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        println!("Enter remote peer Id: connect <peer-id> | reset | status | back");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let Some(command) = Command::parse(&line) else {
                continue;
            };
            if self.handle(command).await.is_break() {
                break;
            }
        }

        if self.manager.state() != SessionState::Disposed {
            self.manager.dispose().await;
        }
        // The watcher stops after reporting the Disposed transition
        if let Err(e) = self.watcher.await {
            warn!(error = %e, "Affordance watcher ended abnormally");
        }
        Ok(())
    }
}

fn report_connect_failure(error: &SessionError) {
    error!(error = %error, "Failed to connect to remote peer. Please check peer id and try again");
}

fn print_affordances(state: SessionState) {
    let controls = ControlAffordances::for_state(state);
    let flag = |enabled: bool| if enabled { "on" } else { "off" };
    println!(
        "[{}] peer-id: {}, connect: {}, reset: {}",
        state,
        flag(controls.peer_input_enabled),
        flag(controls.connect_enabled),
        flag(controls.reset_enabled)
    );
}

fn spawn_affordance_watcher(manager: &SessionManager) -> JoinHandle<()> {
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::StateChanged(change)) => {
                    if let Some(reason) = &change.reason {
                        info!(from = %change.previous, to = %change.current, reason = %reason, "Session state changed");
                    }
                    print_affordances(change.current);
                    if change.current == SessionState::Disposed {
                        break;
                    }
                }
                Ok(SessionEvent::RemoteRenderBound { surface, .. }) => {
                    println!("remote video routed to {}", surface);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Affordance watcher lagged behind session events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vidlink_session_core::simulated::{SimulatedCamera, SimulatedMediaSession};
    use vidlink_session_core::{DeviceProfile, SessionConfig};

    fn console_for(profile: DeviceProfile, latency: Duration) -> (Console, Arc<SessionManager>) {
        let params = ProfileParams::resolve(&profile);
        let manager = Arc::new(
            SessionManager::new(
                SessionConfig::for_profile(&params),
                Arc::new(SimulatedMediaSession::new().with_latency(latency)),
                Arc::new(SimulatedCamera::new()),
            )
            .unwrap(),
        );
        (Console::new(manager.clone(), params), manager)
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("  "), None);
        assert_eq!(
            Command::parse("connect 12345"),
            Some(Command::Connect("12345".to_string()))
        );
        assert_eq!(Command::parse("CONNECT"), Some(Command::Connect(String::new())));
        assert_eq!(Command::parse("reset"), Some(Command::Reset));
        assert_eq!(Command::parse("Escape"), Some(Command::Back));
        assert_eq!(
            Command::parse("dance now"),
            Some(Command::Unknown("dance now".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connect_then_reset() {
        let (console, manager) = console_for(DeviceProfile::Common, Duration::ZERO);
        console.attach_views().unwrap();

        console.handle(Command::Connect("12345".to_string())).await;
        while manager.state() == SessionState::Connecting {
            tokio::task::yield_now().await;
        }
        assert_eq!(manager.state(), SessionState::Connected);

        assert!(console.handle(Command::Reset).await.is_continue());
        assert_eq!(manager.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_bad_peer_id_keeps_session_idle() {
        let (console, manager) = console_for(DeviceProfile::Mobile, Duration::ZERO);
        console.attach_views().unwrap();

        console.handle(Command::Connect("abc".to_string())).await;
        assert_eq!(manager.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_run_disposes_on_back() {
        let (console, manager) = console_for(DeviceProfile::Common, Duration::from_secs(60));
        console.attach_views().unwrap();

        let input: &[u8] = b"connect 7\nstatus\nback\nconnect 8\n";
        console.run(input).await.unwrap();
        assert_eq!(manager.state(), SessionState::Disposed);
    }

    #[tokio::test]
    async fn test_run_disposes_at_end_of_input() {
        let (console, manager) = console_for(DeviceProfile::Common, Duration::ZERO);

        let input: &[u8] = b"help\n\nstatus\n";
        console.run(input).await.unwrap();
        assert_eq!(manager.state(), SessionState::Disposed);
    }
}
