//! Background worker thread for event processing
//!
//! Spawns a thread that drives the [`Supervisor`] on a current-thread tokio
//! runtime. Every device connection is polled from this one thread; nothing
//! else touches device state.

use std::thread::{self, JoinHandle};

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use dahua_stream::{Connector, EventBus, Supervisor, WatcherSettings};

use crate::error::{EventManagerError, Result};

/// Name given to the worker thread
pub const WORKER_THREAD_NAME: &str = "dahua-event-worker";

/// Build the single-threaded runtime the worker runs on
pub fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(EventManagerError::Runtime)
}

/// Spawns the background event worker thread
///
/// The worker owns the supervisor (and with it every device and connection)
/// and runs until `token` is cancelled.
pub fn spawn_event_worker<C, B>(
    runtime: Runtime,
    supervisor: Supervisor<C, B>,
    settings: WatcherSettings,
    token: CancellationToken,
) -> Result<JoinHandle<()>>
where
    C: Connector + 'static,
    B: EventBus + 'static,
{
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            runtime.block_on(run_event_loop(supervisor, settings, token));
        })
        .map_err(EventManagerError::ThreadSpawn)
}

/// Main event loop running inside the tokio runtime
///
/// The token is checked once per iteration, so a poll already in flight
/// completes before the loop exits. Connections close when the supervisor
/// is dropped on return.
pub async fn run_event_loop<C: Connector, B: EventBus>(
    mut supervisor: Supervisor<C, B>,
    settings: WatcherSettings,
    token: CancellationToken,
) {
    supervisor.arm_all();
    tracing::info!("Event worker started");

    while !token.is_cancelled() {
        tokio::time::sleep(settings.idle_sleep).await;

        let summary = supervisor.run_once(settings.poll_timeout).await;
        if !summary.is_idle() {
            tracing::trace!("Worker step: {:?}", summary);
        }
    }

    tracing::info!("Event worker shut down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use dahua_stream::{ChannelBus, DeviceConfig, ScriptedConnector, WatcherConfig};

    #[test]
    fn test_worker_exits_on_cancel() {
        let connector = ScriptedConnector::new();
        let (bus, _events) = ChannelBus::channel();
        let settings = WatcherSettings::new()
            .with_idle_sleep(Duration::from_millis(5))
            .with_poll_timeout(Duration::from_millis(20));
        let config = WatcherConfig::new(vec![DeviceConfig::new("10.0.0.1")]).with_settings(settings.clone());
        let supervisor = Supervisor::from_config(&config, connector.clone(), bus).unwrap();

        let token = CancellationToken::new();
        let handle = spawn_event_worker(build_runtime().unwrap(), supervisor, settings, token.clone()).unwrap();
        assert_eq!(handle.thread().name(), Some(WORKER_THREAD_NAME));

        token.cancel();
        handle.join().unwrap();

        assert_eq!(connector.connect_count("10.0.0.1"), 1);
    }
}
