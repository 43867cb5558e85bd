//! Reconnect supervision
//!
//! The [`Supervisor`] owns every [`Device`], the [`Multiplexer`] holding
//! their handles, and the [`Dispatcher`]. Each call to [`Supervisor::step`]
//! consumes one [`PollReport`]:
//!
//! 1. received bytes are assembled into lines, parsed and dispatched
//! 2. completions and failures schedule a reconnect (once per disconnect)
//! 3. devices whose deadline has passed get a fresh handle
//!
//! Per device:
//!
//! ```text
//! Disconnected --status line--> Connected
//!      ^                            |
//!      |                   completed / failed
//!   re-arm                          |
//!      |                            v
//!      +---- now >= deadline ---- Disconnected (deadline pending)
//! ```

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use dahua_parser::parse_chunk;

use crate::config::{DeviceConfig, WatcherConfig};
use crate::device::{Device, DeviceId};
use crate::dispatcher::{Dispatcher, EventBus};
use crate::error::ConfigError;
use crate::multiplexer::{Multiplexer, PollReport};
use crate::transport::Connector;

/// What one [`Supervisor::step`] did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepSummary {
    /// Records published to the bus
    pub dispatched: usize,
    /// Devices that transitioned to connected
    pub connected: usize,
    /// Disconnects that scheduled a reconnect
    pub disconnected: usize,
    /// Handles re-armed after their deadline
    pub rearmed: usize,
}

impl StepSummary {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Drives all devices from one task
pub struct Supervisor<C, B> {
    devices: Vec<Device>,
    multiplexer: Multiplexer,
    connector: C,
    dispatcher: Dispatcher<B>,
    reconnect_delay: Duration,
}

impl<C: Connector, B: EventBus> Supervisor<C, B> {
    pub fn new(connector: C, bus: B, reconnect_delay: Duration) -> Self {
        Self {
            devices: Vec::new(),
            multiplexer: Multiplexer::new(),
            connector,
            dispatcher: Dispatcher::new(bus),
            reconnect_delay,
        }
    }

    /// Validate `config` and register every device it lists, in order
    pub fn from_config(config: &WatcherConfig, connector: C, bus: B) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut supervisor = Self::new(connector, bus, config.settings.reconnect_delay);
        for device in &config.devices {
            supervisor.add_device(device)?;
        }
        Ok(supervisor)
    }

    /// Register a device. It stays idle until [`Self::arm_all`] is called.
    pub fn add_device(&mut self, config: &DeviceConfig) -> Result<DeviceId, ConfigError> {
        let id = DeviceId::new(self.devices.len());
        let device = Device::from_config(id, config)?;
        tracing::debug!("Registered {} as {} ({})", device.name(), id, device.target().url);
        self.devices.push(device);
        Ok(id)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.index())
    }

    pub fn multiplexer(&self) -> &Multiplexer {
        &self.multiplexer
    }

    pub fn dispatcher(&self) -> &Dispatcher<B> {
        &self.dispatcher
    }

    /// Open a connection for every device that has no handle yet
    pub fn arm_all(&mut self) {
        for device in &self.devices {
            if self.multiplexer.contains(device.id()) {
                continue;
            }
            let handle = self.connector.connect(device.target());
            self.multiplexer.add_handle(device.id(), handle);
            tracing::debug!("Connecting to {}", device.name());
        }
        tracing::info!("Watching {} device(s)", self.devices.len());
    }

    pub async fn poll(&mut self, timeout: Duration) -> PollReport {
        self.multiplexer.poll(timeout).await
    }

    /// Poll once and step with the current time
    pub async fn run_once(&mut self, timeout: Duration) -> StepSummary {
        let report = self.poll(timeout).await;
        self.step(report, Instant::now())
    }

    /// Apply one poll report, then re-arm every device due at `now`
    pub fn step(&mut self, report: PollReport, now: Instant) -> StepSummary {
        let mut summary = StepSummary::default();

        for (id, bytes) in report.received {
            let lines = match self.devices.get_mut(id.index()) {
                Some(device) => device.assemble(&bytes),
                None => continue,
            };
            if let Some(lines) = lines {
                self.ingest(id, &lines, &mut summary);
            }
        }

        for id in report.completed {
            // The stream ended cleanly; an unterminated last line is still a line
            if let Some(tail) = self.devices.get_mut(id.index()).and_then(Device::flush_lines) {
                self.ingest(id, &tail, &mut summary);
            }
            if self.disconnect(id, "Success", false, now) {
                summary.disconnected += 1;
            }
        }

        for (id, failure) in report.failed {
            if self.disconnect(id, &failure.to_string(), true, now) {
                summary.disconnected += 1;
            }
        }

        summary.rearmed = self.rearm_due(now);
        summary
    }

    /// Parse whole lines from a device and publish the records
    fn ingest(&mut self, id: DeviceId, lines: &Bytes, summary: &mut StepSummary) {
        let Some(device) = self.devices.get_mut(id.index()) else {
            return;
        };

        let parsed = parse_chunk(lines, device.name(), device.channels());

        for error in &parsed.errors {
            tracing::warn!("Malformed event from {}: {}", device.name(), error);
        }

        if parsed.connected {
            if device.mark_connected() {
                tracing::info!("Connected to {}", device.name());
                summary.connected += 1;
            } else if device.reconnect_deadline().is_some() {
                tracing::trace!("Ignoring status line from {} while reconnect is pending", device.name());
            }
        }

        summary.dispatched += self.dispatcher.dispatch(&parsed.records);
    }

    /// Schedule a reconnect unless one is already pending
    fn disconnect(&mut self, id: DeviceId, reason: &str, failed: bool, now: Instant) -> bool {
        let delay = self.reconnect_delay;
        let Some(device) = self.devices.get_mut(id.index()) else {
            return false;
        };

        if !device.schedule_reconnect(now, delay) {
            tracing::trace!(
                "Ignoring disconnect of {} ({}), reconnect already pending",
                device.name(),
                reason
            );
            return false;
        }

        if failed {
            tracing::warn!(
                "Disconnected from {}: {}. Reconnecting in {:?}",
                device.name(),
                reason,
                delay
            );
        } else {
            tracing::info!(
                "Disconnected from {}: {}. Reconnecting in {:?}",
                device.name(),
                reason,
                delay
            );
        }
        true
    }

    fn rearm_due(&mut self, now: Instant) -> usize {
        let mut rearmed = 0;

        for device in self.devices.iter_mut() {
            if !device.is_due(now) {
                continue;
            }

            let id = device.id();
            self.multiplexer.remove_handle(id);
            let handle = self.connector.connect(device.target());
            self.multiplexer.add_handle(id, handle);
            device.rearmed();

            tracing::info!("Reconnecting to {}", device.name());
            rearmed += 1;
        }

        rearmed
    }
}

impl<C, B> std::fmt::Debug for Supervisor<C, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("devices", &self.devices)
            .field("multiplexer", &self.multiplexer)
            .field("reconnect_delay", &self.reconnect_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ConnectionState;
    use crate::dispatcher::{BusEvent, ChannelBus};
    use crate::transport::scripted::ScriptedConnector;
    use crate::transport::{FailureKind, TransportFailure};
    use std::sync::mpsc;

    const CAM_A: &str = "10.0.0.1";
    const CAM_B: &str = "10.0.0.2";
    const POLL: Duration = Duration::from_millis(200);
    const DELAY: Duration = Duration::from_secs(5);

    type TestSupervisor = Supervisor<ScriptedConnector, ChannelBus>;

    fn setup(hosts: &[&str]) -> (TestSupervisor, ScriptedConnector, mpsc::Receiver<BusEvent>) {
        let connector = ScriptedConnector::new();
        let (bus, receiver) = ChannelBus::channel();

        let mut config = WatcherConfig::default();
        for host in hosts {
            config = config.with_device(DeviceConfig::new(*host).with_channel(1, "Front Door"));
        }

        let mut supervisor = Supervisor::from_config(&config, connector.clone(), bus).unwrap();
        supervisor.arm_all();
        (supervisor, connector, receiver)
    }

    fn failure_report(id: DeviceId) -> PollReport {
        PollReport {
            failed: vec![(id, TransportFailure::new(FailureKind::Body, "connection reset"))],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_arm_all_connects_each_device_once() {
        let (mut supervisor, connector, _rx) = setup(&[CAM_A, CAM_B]);
        supervisor.arm_all();

        assert_eq!(connector.connect_count(CAM_A), 1);
        assert_eq!(connector.connect_count(CAM_B), 1);
        assert_eq!(supervisor.multiplexer().len(), 2);
    }

    #[tokio::test]
    async fn test_status_line_connects_and_is_idempotent() {
        let (mut supervisor, connector, _rx) = setup(&[CAM_A]);
        let id = DeviceId::new(0);
        assert_eq!(supervisor.device(id).unwrap().state(), ConnectionState::Disconnected);

        connector.accept(CAM_A);
        let summary = supervisor.run_once(POLL).await;
        assert_eq!(summary.connected, 1);
        assert_eq!(supervisor.device(id).unwrap().state(), ConnectionState::Connected);

        connector.accept(CAM_A);
        let summary = supervisor.run_once(POLL).await;
        assert_eq!(summary.connected, 0);
        assert_eq!(supervisor.device(id).unwrap().state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_events_are_dispatched_with_channel() {
        let (mut supervisor, connector, rx) = setup(&[CAM_A]);

        connector.accept(CAM_A);
        connector.send_data(
            CAM_A,
            "Code=VideoMotion;action=Start;index=1\r\nCode=VideoLoss;action=Stop;index=4\r\n",
        );
        let summary = supervisor.run_once(POLL).await;
        assert_eq!(summary.dispatched, 2);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.event_type, "dahua_event_received");
        assert_eq!(first.record.device_name, "10.0.0.1:80");
        assert_eq!(first.record.channel_label.as_deref(), Some("Front Door"));

        let second = rx.try_recv().unwrap();
        assert_eq!(second.record.code(), Some("VideoLoss"));
        assert_eq!(second.record.channel_label, None);
    }

    #[tokio::test]
    async fn test_line_split_across_reads_is_parsed_once() {
        let (mut supervisor, connector, rx) = setup(&[CAM_A]);

        connector.send_data(CAM_A, "Code=VideoMo");
        let summary = supervisor.run_once(POLL).await;
        assert_eq!(summary.dispatched, 0);

        connector.send_data(CAM_A, "tion;action=Start;index=1\r\n");
        let summary = supervisor.run_once(POLL).await;
        assert_eq!(summary.dispatched, 1);
        assert_eq!(rx.try_recv().unwrap().record.code(), Some("VideoMotion"));
    }

    #[tokio::test]
    async fn test_completion_schedules_reconnect_once() {
        let (mut supervisor, connector, _rx) = setup(&[CAM_A]);
        let id = DeviceId::new(0);

        connector.accept(CAM_A);
        supervisor.run_once(POLL).await;

        connector.complete(CAM_A);
        let report = supervisor.poll(POLL).await;
        assert_eq!(report.completed, vec![id]);

        let now = Instant::now();
        let summary = supervisor.step(report, now);
        assert_eq!(summary.disconnected, 1);

        let device = supervisor.device(id).unwrap();
        assert_eq!(device.state(), ConnectionState::Disconnected);
        assert_eq!(device.reconnect_deadline(), Some(now + DELAY));

        // A second signal before the deadline changes nothing
        let summary = supervisor.step(failure_report(id), now + Duration::from_secs(1));
        assert_eq!(summary.disconnected, 0);
        assert_eq!(supervisor.device(id).unwrap().reconnect_deadline(), Some(now + DELAY));
    }

    #[tokio::test]
    async fn test_rearm_happens_once_at_deadline() {
        let (mut supervisor, connector, _rx) = setup(&[CAM_A]);
        let id = DeviceId::new(0);
        let now = Instant::now();

        supervisor.step(failure_report(id), now);

        let summary = supervisor.step(PollReport::default(), now + Duration::from_secs(4));
        assert_eq!(summary.rearmed, 0);
        assert_eq!(connector.connect_count(CAM_A), 1);

        let summary = supervisor.step(PollReport::default(), now + DELAY);
        assert_eq!(summary.rearmed, 1);
        assert_eq!(connector.connect_count(CAM_A), 2);
        assert!(supervisor.device(id).unwrap().reconnect_deadline().is_none());
        assert!(supervisor.multiplexer().contains(id));

        let summary = supervisor.step(PollReport::default(), now + Duration::from_secs(6));
        assert_eq!(summary.rearmed, 0);
        assert_eq!(connector.connect_count(CAM_A), 2);
    }

    #[tokio::test]
    async fn test_rearmed_device_reconnects() {
        let (mut supervisor, connector, _rx) = setup(&[CAM_A]);
        let id = DeviceId::new(0);

        connector.fail(CAM_A, FailureKind::Connect, "Connection refused (os error 111)");
        let report = supervisor.poll(POLL).await;
        let now = Instant::now();
        supervisor.step(report, now);
        supervisor.step(PollReport::default(), now + DELAY);

        connector.accept(CAM_A);
        let summary = supervisor.run_once(POLL).await;
        assert_eq!(summary.connected, 1);
        assert!(supervisor.device(id).unwrap().is_connected());
    }

    #[tokio::test]
    async fn test_status_line_ignored_while_reconnect_pending() {
        let (mut supervisor, _connector, _rx) = setup(&[CAM_A]);
        let id = DeviceId::new(0);
        let now = Instant::now();

        supervisor.step(failure_report(id), now);

        let report = PollReport {
            received: vec![(id, Bytes::from_static(b"HTTP/1.1 200 OK\r\n"))],
            ..Default::default()
        };
        let summary = supervisor.step(report, now + Duration::from_secs(1));
        assert_eq!(summary.connected, 0);

        let device = supervisor.device(id).unwrap();
        assert!(!device.is_connected());
        assert_eq!(device.reconnect_deadline(), Some(now + DELAY));
    }

    #[tokio::test]
    async fn test_devices_are_independent() {
        let (mut supervisor, connector, _rx) = setup(&[CAM_A, CAM_B]);
        let a = DeviceId::new(0);
        let b = DeviceId::new(1);

        connector.accept(CAM_A);
        connector.accept(CAM_B);
        supervisor.run_once(POLL).await;
        assert!(supervisor.device(a).unwrap().is_connected());
        assert!(supervisor.device(b).unwrap().is_connected());

        connector.fail(CAM_B, FailureKind::Body, "connection reset");
        let report = supervisor.poll(POLL).await;
        supervisor.step(report, Instant::now());

        let device_a = supervisor.device(a).unwrap();
        assert!(device_a.is_connected());
        assert!(device_a.reconnect_deadline().is_none());

        let device_b = supervisor.device(b).unwrap();
        assert!(!device_b.is_connected());
        assert!(device_b.reconnect_deadline().is_some());
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_parsed_on_completion() {
        let (mut supervisor, connector, rx) = setup(&[CAM_A]);

        connector.send_data(CAM_A, "Code=AlarmLocal;action=Stop;index=0");
        connector.complete(CAM_A);
        let summary = supervisor.run_once(POLL).await;

        assert_eq!(summary.dispatched, 1);
        assert_eq!(summary.disconnected, 1);
        assert_eq!(rx.try_recv().unwrap().record.code(), Some("AlarmLocal"));
    }

    #[tokio::test]
    async fn test_malformed_segment_still_dispatches() {
        let (mut supervisor, connector, rx) = setup(&[CAM_A]);

        connector.send_data(CAM_A, "Code=VideoBlind;garbage;action=Start\r\n");
        let summary = supervisor.run_once(POLL).await;
        assert_eq!(summary.dispatched, 1);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.record.action(), Some("Start"));
        assert!(event.record.field("garbage").is_none());
    }

    #[test]
    fn test_from_config_rejects_invalid_settings() {
        let config = WatcherConfig::default()
            .with_device(DeviceConfig::new(CAM_A))
            .with_settings(crate::config::WatcherSettings::new().with_poll_timeout(Duration::ZERO));
        let (bus, _rx) = ChannelBus::channel();

        assert!(Supervisor::from_config(&config, ScriptedConnector::new(), bus).is_err());
    }
}
