//! Dialect-driven session over SSH or Telnet.

use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use regex::bytes::Regex;
use secrecy::ExposeSecret;

use super::response::Response;
use super::{Session, SessionConfig, SessionState};
use crate::channel::PromptChannel;
use crate::dialect::DialectDefinition;
use crate::error::{Result, SessionError};
use crate::transport::{Transport, TransportConfig};

/// What a login-phase match means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginPrompt {
    Rejected,
    Ready,
    Password,
    Username,
}

/// Session for one device, driven by its dialect's prompt tables.
pub struct DeviceSession {
    transport_config: TransportConfig,
    dialect: DialectDefinition,
    settle_delay: Duration,
    wake_sequence: Vec<u8>,
    search_depth: usize,

    /// Per-prompt timeout.
    timeout: Duration,

    /// Channel (None when disconnected).
    channel: Option<PromptChannel>,

    state: SessionState,
}

impl DeviceSession {
    pub fn new(
        transport_config: TransportConfig,
        dialect: DialectDefinition,
        config: &SessionConfig,
    ) -> Self {
        Self {
            transport_config,
            dialect,
            settle_delay: config.settle_delay,
            wake_sequence: config.wake_sequence.clone(),
            search_depth: config.search_depth,
            timeout: config.timeout,
            channel: None,
            state: SessionState::Disconnected,
        }
    }

    pub fn dialect(&self) -> &DialectDefinition {
        &self.dialect
    }

    pub fn transport_config(&self) -> &TransportConfig {
        &self.transport_config
    }

    /// Run every transition from `Disconnected` to `Ready`.
    async fn establish(&mut self) -> Result<()> {
        let target = self.transport_config.socket_addr();

        // Disconnected -> TransportOpen
        let transport = Transport::connect(&self.transport_config).await?;
        self.channel = Some(PromptChannel::new(
            transport,
            self.search_depth,
            self.transport_config.protocol.line_ending(),
        ));
        self.state = SessionState::TransportOpen;
        debug!("{}: transport open", target);

        // TransportOpen -> AwaitingPrompt
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        self.channel
            .as_mut()
            .ok_or(SessionError::NotConnected)?
            .send_raw(&self.wake_sequence)
            .await?;
        self.state = SessionState::AwaitingPrompt;

        // AwaitingPrompt -> Authenticated
        self.login().await?;
        self.state = SessionState::Authenticated;
        debug!("{}: logged in as {}", target, self.transport_config.username);

        // Authenticated -> Ready
        for command in self.dialect.on_open_commands.clone() {
            let response = self.execute(&command).await?;
            if let Some(message) = response.failure_message {
                // Older images reject some terminal settings; not fatal
                warn!("{}: '{}' failed: {}", target, command, message);
            }
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Answer username and password prompts until the command prompt shows.
    async fn login(&mut self) -> Result<()> {
        let mut table: Vec<(LoginPrompt, &Regex)> = Vec::new();
        table.extend(self.dialect.login_failures.iter().map(|r| (LoginPrompt::Rejected, r)));
        table.push((LoginPrompt::Ready, &self.dialect.prompt));
        table.extend(self.dialect.password_prompts.iter().map(|r| (LoginPrompt::Password, r)));
        table.extend(self.dialect.username_prompts.iter().map(|r| (LoginPrompt::Username, r)));
        let patterns: Vec<&Regex> = table.iter().map(|(_, r)| *r).collect();

        let channel = self.channel.as_mut().ok_or(SessionError::NotConnected)?;
        let username = &self.transport_config.username;
        let rejected = || SessionError::LoginFailed {
            user: username.clone(),
        };

        let mut sent_username = false;
        let mut sent_password = false;
        let mut skipped_repeat = false;
        loop {
            let found = channel
                .read_until(&patterns, self.timeout)
                .await?
                .ok_or(SessionError::ProtocolTimeout {
                    state: self.state,
                    timeout: self.timeout,
                })?;
            let kind = table[found.index].0;
            trace!("login prompt {:?}: {:?}", kind, found.matched);

            match kind {
                LoginPrompt::Rejected => return Err(rejected().into()),
                LoginPrompt::Ready => return Ok(()),
                LoginPrompt::Username => {
                    // Asked again after we answered: credentials refused
                    if sent_password {
                        return Err(rejected().into());
                    }
                    // The wake byte makes a console that already showed the
                    // prompt print it again. The username we sent answers
                    // that second prompt.
                    if sent_username && !skipped_repeat {
                        trace!("repeated username prompt before password, waiting");
                        skipped_repeat = true;
                        continue;
                    }
                    channel.send_line(username).await?;
                    sent_username = true;
                }
                LoginPrompt::Password => {
                    if sent_password {
                        return Err(rejected().into());
                    }
                    if !sent_username {
                        trace!("password prompt without username prompt");
                    }
                    channel
                        .send_line(self.transport_config.password.expose_secret())
                        .await?;
                    sent_password = true;
                }
            }
        }
    }

    /// Send one command and collect its output up to the next prompt.
    async fn execute(&mut self, command: &str) -> Result<Response> {
        let channel = self.channel.as_mut().ok_or(SessionError::NotConnected)?;
        let (state, timeout) = (self.state, self.timeout);

        let start = Instant::now();
        channel.discard();
        channel.send_line(command).await?;

        let mut raw = String::new();
        let mut skipped_stale = false;
        let prompt = loop {
            let found = channel
                .read_until(&[&self.dialect.prompt], timeout)
                .await?
                .ok_or(SessionError::ProtocolTimeout { state, timeout })?;
            raw.push_str(&found.output);

            // A prompt printed before our command arrived (e.g. after the
            // wake byte) carries neither output nor echo.
            if !skipped_stale && raw.trim().is_empty() {
                skipped_stale = true;
                raw.clear();
                continue;
            }
            break found.matched.trim().to_string();
        };

        let response = Response::new(command, raw, prompt, start.elapsed());
        match self.dialect.detect_failure(&response.result).map(str::to_string) {
            Some(pattern) => Ok(response.with_failure(pattern)),
            None => Ok(response),
        }
    }
}

impl Session for DeviceSession {
    async fn open(&mut self) -> Result<()> {
        if self.channel.is_some() {
            return Err(SessionError::AlreadyOpen.into());
        }

        match self.establish().await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(
                    "{}: open failed while {}: {}",
                    self.transport_config.socket_addr(),
                    self.state,
                    e
                );
                if let Some(channel) = self.channel.take() {
                    let _ = channel.close().await;
                }
                self.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    async fn send_command(&mut self, command: &str) -> Result<Response> {
        if self.state != SessionState::Ready {
            return Err(SessionError::NotConnected.into());
        }
        self.execute(command).await
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut channel) = self.channel.take() else {
            return Ok(());
        };

        if self.state == SessionState::Ready {
            if let Err(e) = channel.send_line(&self.dialect.exit_command).await {
                debug!("exit command not delivered: {}", e);
            }
        }
        self.state = SessionState::Disconnected;
        channel.close().await
    }

    fn capture_command(&self) -> &str {
        &self.dialect.capture_command
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_command_requires_open() {
        let table = crate::dialect::DialectTable::builtin().unwrap();
        let (protocol, dialect) = table.resolve("telnet", "ios").unwrap();
        let transport = TransportConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            protocol,
            username: "admin".to_string(),
            password: secrecy::SecretString::from("secret"),
            timeout: Duration::from_millis(100),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: Default::default(),
            known_hosts_path: None,
        };
        let mut session = DeviceSession::new(transport, dialect.clone(), &SessionConfig::default());

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.send_command("show version").await.is_err());
        assert!(session.close().await.is_ok());
    }
}
