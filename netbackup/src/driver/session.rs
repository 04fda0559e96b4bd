//! The backup session state machine.

use std::sync::Arc;

use bytes::BytesMut;
use log::{debug, trace, warn};
use regex::bytes::Regex;
use tokio::time::{Duration, Instant};

use super::artifact::{BackupArtifact, CompletionReason};
use super::completion::{CompletionDetector, Observation, Verdict};
use super::config::SessionConfig;
use super::phase::Phase;
use crate::channel::{AnsiStripper, PatternBuffer};
use crate::device::{Credentials, DeviceDescriptor, TransportKind};
use crate::dialect::Dialect;
use crate::error::{Error, FailureKind, Result, SessionError, TransportError};
use crate::event::{EventSink, SessionEvent};
use crate::transport::{Connector, NetworkConnector, Transport, TransportConfig};

/// Drives one backup session against one device.
///
/// Built by [`SessionBuilder`](super::SessionBuilder). Each call to
/// [`run`](Self::run) opens a fresh stream, walks the phases, and closes
/// the stream before returning, whether it succeeded or not.
pub struct SessionDriver {
    pub(crate) device: DeviceDescriptor,
    pub(crate) credentials: Credentials,
    pub(crate) dialect: &'static Dialect,
    pub(crate) config: SessionConfig,
    pub(crate) transport_config: TransportConfig,
    pub(crate) sink: Arc<dyn EventSink>,
}

impl SessionDriver {
    /// The device this driver talks to.
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// The dialect selected for the device family.
    pub fn dialect(&self) -> &'static Dialect {
        self.dialect
    }

    /// The session timing configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Back up the device over the network.
    pub async fn run(&self) -> Result<BackupArtifact> {
        self.run_with(&NetworkConnector).await
    }

    /// Back up the device using streams from `connector`.
    pub async fn run_with<C: Connector>(&self, connector: &C) -> Result<BackupArtifact> {
        let address = self.device.address.as_str();
        self.sink.record(&SessionEvent::Started {
            address,
            transport: self.device.transport,
        });

        let result = self.drive(connector).await;

        match &result {
            Ok(artifact) => self.sink.record(&SessionEvent::Captured {
                address,
                bytes: artifact.len(),
            }),
            Err(error) => self.sink.record(&SessionEvent::Failed { address, error }),
        }
        result
    }

    async fn drive<C: Connector>(&self, connector: &C) -> Result<BackupArtifact> {
        let started = Instant::now();
        self.enter(Phase::Connecting);

        let stream = connector
            .open(&self.device, &self.credentials, &self.transport_config)
            .await
            .map_err(|e| self.connect_error(e))?;

        let mut session = Session {
            driver: self,
            transport: stream,
            buffer: PatternBuffer::new(self.config.search_depth),
            phase: Phase::Connecting,
            prompt: Vec::new(),
        };

        let outcome = session.execute().await;
        session.shutdown(outcome.is_ok()).await;

        let (data, reason) = outcome.map_err(Error::from)?;
        Ok(BackupArtifact::new(
            self.device.address.clone(),
            data,
            reason,
            started.elapsed(),
        ))
    }

    fn enter(&self, phase: Phase) {
        debug!("{}: entering phase {:?}", self.device.address, phase);
        self.sink.record(&SessionEvent::PhaseEntered {
            address: &self.device.address,
            phase,
        });
    }

    /// Classify a failure to open the stream.
    fn connect_error(&self, err: TransportError) -> Error {
        let (kind, phase) = match &err {
            TransportError::AuthenticationFailed { .. } => {
                (FailureKind::AuthenticationFailed, Phase::Authenticating)
            }
            TransportError::Timeout(_) => (FailureKind::Timeout, Phase::Connecting),
            TransportError::Disconnected => (FailureKind::PeerClosed, Phase::Connecting),
            _ => (FailureKind::ConnectionRefused, Phase::Connecting),
        };
        SessionError::new(kind, phase, self.device.address.clone())
            .with_source(err)
            .into()
    }
}

/// Outcome of waiting for one of several prompts.
enum Wait {
    /// The pattern at this index matched; the output through the match.
    Matched(usize, Vec<u8>),
    /// Nothing matched in time; the output seen so far stays buffered.
    TimedOut,
}

/// Live state of one session. Owned by a single `drive` call.
struct Session<'a, T: Transport> {
    driver: &'a SessionDriver,
    transport: T,
    buffer: PatternBuffer,
    phase: Phase,
    /// The most recently matched command prompt.
    prompt: Vec<u8>,
}

impl<T: Transport> Session<'_, T> {
    async fn execute(&mut self) -> std::result::Result<(Vec<u8>, CompletionReason), SessionError> {
        self.authenticate().await?;
        self.await_user_prompt().await?;
        self.escalate().await?;
        self.suppress_paging().await?;
        self.issue_command().await?;
        let captured = self.collect().await?;
        self.transition(Phase::Done);
        Ok(captured)
    }

    fn dialect(&self) -> &'static Dialect {
        self.driver.dialect
    }

    fn config(&self) -> &SessionConfig {
        &self.driver.config
    }

    fn transition(&mut self, phase: Phase) {
        self.phase = phase;
        self.driver.enter(phase);
    }

    fn fail(&mut self, kind: FailureKind) -> SessionError {
        let phase = self.phase;
        self.transition(Phase::Failed);
        SessionError::new(kind, phase, self.driver.device.address.clone())
    }

    /// Map a transport error to a session failure in the current phase.
    fn transport_failure(&mut self, err: TransportError) -> SessionError {
        let kind = match (&err, self.phase) {
            (_, Phase::Authenticating) => FailureKind::AuthenticationFailed,
            (TransportError::Timeout(_), _) => FailureKind::Timeout,
            _ => FailureKind::PeerClosed,
        };
        self.fail(kind).with_source(err)
    }

    async fn send_line(&mut self, line: &str) -> std::result::Result<(), SessionError> {
        trace!("{}: sending {:?}", self.driver.device.address, line);
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        match self.transport.write(&data).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.transport_failure(e)),
        }
    }

    /// Send a secret without tracing its contents.
    async fn send_secret(&mut self, secret: &str) -> std::result::Result<(), SessionError> {
        trace!("{}: sending <secret>", self.driver.device.address);
        let mut data = Vec::with_capacity(secret.len() + 1);
        data.extend_from_slice(secret.as_bytes());
        data.push(b'\n');
        match self.transport.write(&data).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.transport_failure(e)),
        }
    }

    /// Read until one of `patterns` matches the buffer tail.
    ///
    /// Patterns are tried in order, so more specific ones go first.
    async fn wait_for(
        &mut self,
        patterns: &[&Regex],
        timeout: Duration,
    ) -> std::result::Result<Wait, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            for (idx, pattern) in patterns.iter().enumerate() {
                if let Some(m) = self.buffer.search_tail(pattern) {
                    let output = self.buffer.consume_through(m.end);
                    self.driver.sink.record(&SessionEvent::Output {
                        address: &self.driver.device.address,
                        phase: self.phase,
                        output: &output,
                    });
                    return Ok(Wait::Matched(idx, output));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Wait::TimedOut);
            }
            let max_wait = (deadline - now).min(self.config().poll_interval);
            match self.transport.read_available(max_wait).await {
                Ok(chunk) => self.buffer.extend(&chunk),
                Err(e) => return Err(self.transport_failure(e)),
            }
        }
    }

    /// Remember the prompt at the end of `output`.
    fn record_prompt(&mut self, output: &[u8]) {
        let start = output
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        self.prompt = output[start..].to_vec();
        debug!(
            "{}: prompt {:?}",
            self.driver.device.address,
            String::from_utf8_lossy(&self.prompt).trim()
        );
    }

    async fn authenticate(&mut self) -> std::result::Result<(), SessionError> {
        self.transition(Phase::Authenticating);
        if self.driver.device.transport == TransportKind::Ssh {
            // Authenticated during connect.
            return Ok(());
        }

        let dialect = self.dialect();
        let timeout = self.config().prompt_timeout;
        let username = self.driver.credentials.username();
        let password = self.driver.credentials.password();

        match self.wait_for(&[&dialect.login_prompt], timeout).await? {
            Wait::Matched(..) => self.send_line(username).await?,
            Wait::TimedOut => {
                warn!("{}: no login prompt", self.driver.device.address);
                return Err(self.fail(FailureKind::AuthenticationFailed));
            }
        }

        match self.wait_for(&[&dialect.password_prompt], timeout).await? {
            Wait::Matched(..) => self.send_secret(password).await,
            Wait::TimedOut => {
                warn!("{}: no password prompt", self.driver.device.address);
                Err(self.fail(FailureKind::AuthenticationFailed))
            }
        }
    }

    async fn await_user_prompt(&mut self) -> std::result::Result<(), SessionError> {
        self.transition(Phase::AwaitingUserPrompt);
        let dialect = self.dialect();
        let timeout = self.config().prompt_timeout;

        // Over Telnet a rejected login shows up as an error or a fresh login prompt.
        let checks = [
            &dialect.user_prompt,
            &dialect.login_rejected,
            &dialect.login_prompt,
        ];
        let patterns = match self.driver.device.transport {
            TransportKind::Telnet => &checks[..],
            TransportKind::Ssh => &checks[..1],
        };

        match self.wait_for(patterns, timeout).await? {
            Wait::Matched(0, output) => {
                self.record_prompt(&output);
                Ok(())
            }
            Wait::Matched(..) => Err(self.fail(FailureKind::AuthenticationFailed)),
            Wait::TimedOut => Err(self.fail(FailureKind::Timeout)),
        }
    }

    async fn escalate(&mut self) -> std::result::Result<(), SessionError> {
        let dialect = self.dialect();
        let Some(escalation) = dialect.escalation.as_ref() else {
            return Ok(());
        };
        self.transition(Phase::Escalating);
        let address = self.driver.device.address.as_str();

        if escalation.privileged_prompt.is_match(&self.prompt) {
            debug!("{}: already privileged, skipping {:?}", address, escalation.command);
            return Ok(());
        }

        let timeout = self.config().prompt_timeout;
        self.send_line(escalation.command).await?;

        let wait = self
            .wait_for(
                &[&escalation.privileged_prompt, &escalation.password_prompt],
                timeout,
            )
            .await?;

        match wait {
            Wait::Matched(0, output) => {
                self.record_prompt(&output);
                Ok(())
            }
            Wait::Matched(_, _) => match self.driver.credentials.enable_secret() {
                Some(secret) => {
                    self.send_secret(secret).await?;
                    self.await_escalated(timeout).await
                }
                None => {
                    // Cancel the password prompt and carry on unprivileged.
                    warn!(
                        "{}: {:?} asked for a password but no enable secret is configured",
                        address, escalation.command
                    );
                    self.send_line("").await?;
                    self.await_escalated(timeout).await
                }
            },
            Wait::TimedOut => {
                warn!(
                    "{}: no response to {:?}, continuing in current mode",
                    address, escalation.command
                );
                Ok(())
            }
        }
    }

    /// Wait for the prompt after answering the escalation password prompt.
    async fn await_escalated(&mut self, timeout: Duration) -> std::result::Result<(), SessionError> {
        let dialect = self.dialect();
        let address = self.driver.device.address.as_str();
        let Some(escalation) = dialect.escalation.as_ref() else {
            return Ok(());
        };

        match self
            .wait_for(&[&escalation.privileged_prompt, &dialect.user_prompt], timeout)
            .await?
        {
            Wait::Matched(idx, output) => {
                if idx != 0 {
                    warn!("{}: escalation refused, continuing unprivileged", address);
                }
                self.record_prompt(&output);
            }
            Wait::TimedOut => {
                warn!("{}: no prompt after escalation, continuing", address);
            }
        }
        Ok(())
    }

    async fn suppress_paging(&mut self) -> std::result::Result<(), SessionError> {
        self.transition(Phase::SuppressingPaging);
        let dialect = self.dialect();
        self.send_line(dialect.paging_command).await?;

        match self
            .wait_for(&[&dialect.user_prompt], self.config().paging_timeout)
            .await?
        {
            Wait::Matched(_, output) => self.record_prompt(&output),
            Wait::TimedOut => warn!(
                "{}: no prompt after {:?}, continuing",
                self.driver.device.address, dialect.paging_command
            ),
        }
        Ok(())
    }

    async fn issue_command(&mut self) -> std::result::Result<(), SessionError> {
        self.transition(Phase::IssuingCommand);
        let leftover = self.buffer.take();
        if !leftover.is_empty() {
            trace!(
                "{}: discarding {} bytes before dump",
                self.driver.device.address,
                leftover.len()
            );
        }
        self.send_line(self.dialect().dump_command).await
    }

    async fn collect(&mut self) -> std::result::Result<(Vec<u8>, CompletionReason), SessionError> {
        self.transition(Phase::Collecting);
        let dialect = self.dialect();
        let command = dialect.dump_command;
        let config = self.config().clone();
        let detector = CompletionDetector::new(
            config.completion.unwrap_or(dialect.completion),
            dialect.terminal_prompt.clone(),
            config.idle_window,
        );

        let started = Instant::now();
        let mut captured = BytesMut::with_capacity(64 * 1024);
        // Escape-free copy of the capture's tail, matched against the prompt.
        let mut stripper = AnsiStripper::new();
        let mut visible: Vec<u8> = Vec::new();
        // Arrival of the last body byte. The command echo does not count.
        let mut last_data: Option<Instant> = None;
        let mut body_started = false;

        loop {
            let chunk = match self.transport.read_available(config.poll_interval).await {
                Ok(chunk) => chunk,
                Err(e) => {
                    let partial = captured.to_vec();
                    return Err(self.transport_failure(e).with_partial(partial));
                }
            };

            let now = Instant::now();
            if !chunk.is_empty() {
                captured.extend_from_slice(&chunk);
                visible.extend(stripper.strip(&chunk));
                if visible.len() > 2 * config.search_depth {
                    visible.drain(..visible.len() - config.search_depth);
                }
            }
            if !body_started {
                body_started = body_len(&captured, command) > 0;
            }
            if body_started && !chunk.is_empty() {
                last_data = Some(now);
            }

            let tail_start = visible.len().saturating_sub(config.search_depth);
            let observation = Observation {
                chunk: &chunk,
                tail: &visible[tail_start..],
                idle: last_data.map_or(Duration::ZERO, |t| now - t),
                collected: if body_started { captured.len() } else { 0 },
            };

            match detector.observe(&observation) {
                Verdict::PromptSighted { .. } => {
                    // The prompt is the whole last line, escapes included.
                    let prompt_start = memchr::memrchr(b'\n', &captured).map_or(0, |i| i + 1);
                    captured.truncate(prompt_start);
                    return self.finish(captured.to_vec(), CompletionReason::Prompt);
                }
                Verdict::Quiescent => {
                    return self.finish(captured.to_vec(), CompletionReason::Quiescence);
                }
                Verdict::Continue => {}
            }

            let elapsed = now - started;
            if elapsed >= config.timeout && !body_started {
                // Nothing at all is a timeout; only the echo is an empty dump.
                let kind = if captured.is_empty() {
                    FailureKind::Timeout
                } else {
                    FailureKind::EmptyCapture
                };
                return Err(self.fail(kind));
            }
            if elapsed >= config.collection_timeout {
                warn!(
                    "{}: collection exceeded {:?} with {} bytes",
                    self.driver.device.address,
                    config.collection_timeout,
                    captured.len()
                );
                let partial = captured.to_vec();
                return Err(self.fail(FailureKind::IncompleteCapture).with_partial(partial));
            }
        }
    }

    /// Strip the echoed dump command and validate the capture.
    fn finish(
        &mut self,
        captured: Vec<u8>,
        reason: CompletionReason,
    ) -> std::result::Result<(Vec<u8>, CompletionReason), SessionError> {
        let body = strip_echo(&captured, self.dialect().dump_command);
        if is_blank(body) {
            return Err(self.fail(FailureKind::EmptyCapture));
        }
        Ok((body.to_vec(), reason))
    }

    /// Leave the device and close the stream. Never fails.
    async fn shutdown(&mut self, graceful: bool) {
        let address = self.driver.device.address.as_str();
        if graceful && !self.transport.is_closed() {
            let exit = format!("{}\n", self.dialect().exit_command);
            if let Err(e) = self.transport.write(exit.as_bytes()).await {
                debug!("{}: exit command failed: {}", address, e);
            }
        }
        if let Err(e) = self.transport.close().await {
            debug!("{}: close failed: {}", address, e);
        }
    }
}

/// Remove the device's echo of `command` from the start of a capture.
fn strip_echo<'a>(captured: &'a [u8], command: &str) -> &'a [u8] {
    let Some(nl) = memchr::memchr(b'\n', captured) else {
        return captured;
    };
    let first_line = captured[..nl].trim_ascii();
    if first_line.ends_with(command.as_bytes()) {
        &captured[nl + 1..]
    } else {
        captured
    }
}

fn is_blank(data: &[u8]) -> bool {
    data.iter().all(|b| b.is_ascii_whitespace())
}

/// Bytes of real output after the echo, or zero if there is none yet.
fn body_len(captured: &[u8], command: &str) -> usize {
    let body = strip_echo(captured, command);
    if is_blank(body) { 0 } else { body.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blank() {
        assert!(is_blank(b""));
        assert!(is_blank(b"\r\n  \n"));
        assert!(!is_blank(b"\r\nend\r\n"));
    }

    #[test]
    fn test_strip_echo() {
        let cmd = "show running-config";
        assert_eq!(
            strip_echo(b"show running-config\r\nhostname r1\n", cmd),
            b"hostname r1\n"
        );
        // echo preceded by the prompt on the same line
        assert_eq!(
            strip_echo(b"r1#show running-config\r\nhostname r1\n", cmd),
            b"hostname r1\n"
        );
        assert_eq!(strip_echo(b"hostname r1\n", cmd), b"hostname r1\n");
        assert_eq!(strip_echo(b"no newline", cmd), b"no newline");
    }

    #[test]
    fn test_body_len_ignores_echo() {
        let cmd = "show configuration | no-more";
        assert_eq!(body_len(b"", cmd), 0);
        assert_eq!(body_len(b"show configuration | no-more \r\n", cmd), 0);
        assert_eq!(body_len(b"show configuration | no-more \r\n\r\n", cmd), 0);
        assert_eq!(
            body_len(b"show configuration | no-more \r\nversion 21.4;\r\n", cmd),
            15
        );
    }
}
