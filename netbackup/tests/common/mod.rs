//! Scripted device transport for session tests.
//!
//! A script is a list of turns. Each turn waits for the driver to send a
//! line (or fires immediately when it has no trigger), then plays back its
//! chunks at the given offsets. Time comes from tokio, so tests run with a
//! paused clock and finish instantly.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use netbackup::event::SessionEvent;
use netbackup::{
    Connector, Credentials, DeviceDescriptor, EventSink, Transport, TransportConfig,
    TransportError,
};

/// One exchange with the scripted device.
#[derive(Debug, Clone, Default)]
pub struct Turn {
    trigger: Option<String>,
    chunks: Vec<(Duration, Vec<u8>)>,
    close_after: Option<Duration>,
}

impl Turn {
    /// Output sent as soon as the stream opens.
    pub fn banner() -> Self {
        Self::default()
    }

    /// Output sent after the driver writes `line`.
    pub fn on(line: &str) -> Self {
        Self {
            trigger: Some(line.to_string()),
            ..Self::default()
        }
    }

    /// Send `data` right away.
    pub fn send(self, data: &str) -> Self {
        self.send_after(Duration::ZERO, data)
    }

    /// Send `data` `delay` after the previous chunk.
    pub fn send_after(self, delay: Duration, data: &str) -> Self {
        self.send_bytes_after(delay, data.as_bytes())
    }

    /// Send raw bytes right away.
    pub fn send_bytes(self, data: &[u8]) -> Self {
        self.send_bytes_after(Duration::ZERO, data)
    }

    /// Send raw bytes `delay` after the previous chunk.
    pub fn send_bytes_after(mut self, delay: Duration, data: &[u8]) -> Self {
        let at = self.chunks.last().map_or(Duration::ZERO, |(at, _)| *at) + delay;
        self.chunks.push((at, data.to_vec()));
        self
    }

    /// Close the stream `delay` after the last chunk.
    pub fn close_after(mut self, delay: Duration) -> Self {
        let at = self.chunks.last().map_or(Duration::ZERO, |(at, _)| *at) + delay;
        self.close_after = Some(at);
        self
    }
}

/// What the scripted device saw, shared with the test.
#[derive(Debug, Default)]
pub struct Recording {
    /// Lines written by the driver, with the time they arrived.
    pub writes: Mutex<Vec<(Instant, String)>>,
    /// Chunks delivered to the driver, with the time they were read.
    pub delivered: Mutex<Vec<(Instant, Vec<u8>)>>,
    pub closes: AtomicUsize,
}

impl Recording {
    pub fn lines(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub fn wrote(&self, line: &str) -> bool {
        self.lines().iter().any(|l| l == line)
    }

    pub fn write_time(&self, line: &str) -> Option<Instant> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .find(|(_, l)| l == line)
            .map(|(at, _)| *at)
    }

    pub fn last_delivery(&self) -> Option<Instant> {
        self.delivered.lock().unwrap().last().map(|(at, _)| *at)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// A transport that plays back a script.
pub struct ScriptedTransport {
    turns: VecDeque<Turn>,
    pending: VecDeque<(Instant, Vec<u8>)>,
    close_at: Option<Instant>,
    closed: bool,
    recording: Arc<Recording>,
}

impl ScriptedTransport {
    pub fn new(turns: Vec<Turn>, recording: Arc<Recording>) -> Self {
        let mut transport = Self {
            turns: turns.into(),
            pending: VecDeque::new(),
            close_at: None,
            closed: false,
            recording,
        };
        transport.fire_untriggered();
        transport
    }

    fn fire_untriggered(&mut self) {
        while self.turns.front().is_some_and(|t| t.trigger.is_none()) {
            if let Some(turn) = self.turns.pop_front() {
                self.schedule(turn);
            }
        }
    }

    fn schedule(&mut self, turn: Turn) {
        let now = Instant::now();
        for (at, data) in turn.chunks {
            self.pending.push_back((now + at, data));
        }
        if let Some(at) = turn.close_after {
            self.close_at = Some(now + at);
        }
    }

    fn take_due(&mut self, now: Instant) -> Vec<u8> {
        let mut out = Vec::new();
        while self.pending.front().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, data)) = self.pending.pop_front() {
                out.extend_from_slice(&data);
            }
        }
        if !out.is_empty() {
            self.recording
                .delivered
                .lock()
                .unwrap()
                .push((now, out.clone()));
        }
        out
    }
}

impl Transport for ScriptedTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        let text = String::from_utf8_lossy(data);
        for line in text.lines() {
            self.recording
                .writes
                .lock()
                .unwrap()
                .push((Instant::now(), line.to_string()));
            if self
                .turns
                .front()
                .is_some_and(|t| t.trigger.as_deref() == Some(line))
            {
                if let Some(turn) = self.turns.pop_front() {
                    self.schedule(turn);
                }
                self.fire_untriggered();
            }
        }
        Ok(())
    }

    async fn read_available(&mut self, max_wait: Duration) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        let deadline = Instant::now() + max_wait;
        let next_data = self.pending.front().map(|(at, _)| *at);
        let wake = [next_data, self.close_at]
            .into_iter()
            .flatten()
            .min()
            .filter(|at| *at <= deadline)
            .unwrap_or(deadline);
        tokio::time::sleep_until(wake).await;

        let now = Instant::now();
        let data = self.take_due(now);
        if !data.is_empty() {
            return Ok(data);
        }
        if self.close_at.is_some_and(|at| at <= now) {
            self.closed = true;
            return Err(TransportError::Disconnected);
        }
        Ok(data)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.recording.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Hands out a single scripted transport and counts connection attempts.
pub struct ScriptedConnector {
    script: Mutex<Option<Vec<Turn>>>,
    refuse: bool,
    pub recording: Arc<Recording>,
    pub opens: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Turn>) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            refuse: false,
            recording: Arc::new(Recording::default()),
            opens: AtomicUsize::new(0),
        }
    }

    /// A connector whose device refuses every connection.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    type Stream = ScriptedTransport;

    async fn open(
        &self,
        device: &DeviceDescriptor,
        _credentials: &Credentials,
        _config: &TransportConfig,
    ) -> Result<ScriptedTransport, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(TransportError::ConnectionRefused {
                host: device.address.clone(),
                port: device.port(),
            });
        }
        let script = self.script.lock().unwrap().take().unwrap_or_default();
        Ok(ScriptedTransport::new(script, Arc::clone(&self.recording)))
    }
}

/// Collects event messages for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &SessionEvent<'_>) {
        self.events.lock().unwrap().push(event.to_string());
    }
}

/// Cisco IOS running configuration used across tests.
pub const IOS_CONFIG: &str = "Building configuration...\r\n\
\r\n\
Current configuration : 1024 bytes\r\n\
!\r\n\
hostname R1\r\n\
!\r\n\
interface GigabitEthernet0/0\r\n \
ip address 192.0.2.1 255.255.255.0\r\n\
!\r\n\
end\r\n\
\r\n";

/// NX-OS running configuration.
pub const NXOS_CONFIG: &str = "\r\n\
!Command: show running-config\r\n\
version 9.3(8) Bios:version\r\n\
hostname switch\r\n\
feature lacp\r\n\
\r\n";

/// JUNOS configuration.
pub const JUNOS_CONFIG: &str = "## Last commit: 2024-03-09 07:05:01 UTC by admin\r\n\
version 21.4R3;\r\n\
system {\r\n    \
host-name mx1;\r\n\
}\r\n";
