//! Sync-first Dahua Event Manager
//!
//! Devices are registered when the manager is created. `start()` hands the
//! supervisor, and with it the only event sender, to the worker thread, so
//! the event iterator ends once the worker exits.

use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use tokio_util::sync::CancellationToken;

use dahua_stream::{BusEvent, ChannelBus, Connector, HttpConnector, Supervisor, WatcherConfig};

use crate::error::{EventManagerError, Result};
use crate::iter::EventManagerIterator;
use crate::worker::{build_runtime, spawn_event_worker};

/// Sync-first event manager for Dahua devices
///
/// # Example
///
/// ```rust,no_run
/// use dahua_event_manager::{DahuaEventManager, DeviceConfig, WatcherConfig};
///
/// let config = WatcherConfig::default()
///     .with_device(DeviceConfig::new("192.168.1.108").with_channel(1, "Front Door"));
///
/// let mut manager = DahuaEventManager::new(config)?;
/// manager.start()?;
///
/// // Ends after stop() once the worker has exited
/// for event in manager.iter() {
///     println!("{}: {:?}", event.event_type, event.record.payload());
/// }
/// # Ok::<(), dahua_event_manager::EventManagerError>(())
/// ```
pub struct DahuaEventManager<C = HttpConnector> {
    config: WatcherConfig,

    /// Handed to the worker on start
    supervisor: Option<Supervisor<C, ChannelBus>>,

    event_rx: Arc<Mutex<mpsc::Receiver<BusEvent>>>,

    token: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl DahuaEventManager {
    /// Create a manager that talks HTTP to the configured devices
    pub fn new(config: WatcherConfig) -> Result<Self> {
        let connector = HttpConnector::new(&config.settings)?;
        Self::with_connector(config, connector)
    }
}

impl<C: Connector + 'static> DahuaEventManager<C> {
    /// Create a manager with a custom transport
    ///
    /// Every device is validated and registered here, so a bad device
    /// configuration fails now rather than at `start()`.
    pub fn with_connector(config: WatcherConfig, connector: C) -> Result<Self> {
        let (bus, event_rx) = ChannelBus::channel();
        let supervisor = Supervisor::from_config(&config, connector, bus)?;

        Ok(Self {
            config,
            supervisor: Some(supervisor),
            event_rx: Arc::new(Mutex::new(event_rx)),
            token: CancellationToken::new(),
            worker: None,
        })
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Spawn the worker and connect to every device
    ///
    /// May be called once; later calls fail with [`EventManagerError::AlreadyStarted`].
    /// A runtime build failure leaves the manager startable.
    pub fn start(&mut self) -> Result<()> {
        if self.supervisor.is_none() {
            return Err(EventManagerError::AlreadyStarted);
        }

        let runtime = build_runtime()?;
        let Some(supervisor) = self.supervisor.take() else {
            return Err(EventManagerError::AlreadyStarted);
        };

        let worker = spawn_event_worker(
            runtime,
            supervisor,
            self.config.settings.clone(),
            self.token.clone(),
        )?;
        self.worker = Some(worker);

        tracing::info!(
            "Event manager started for {} device(s)",
            self.config.devices.len()
        );
        Ok(())
    }

    /// Ask the worker to stop after its current iteration
    ///
    /// Safe to call any number of times, and before `start()`.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("Stopping event manager");
            self.token.cancel();
        }
    }

    /// Wait for the worker thread to exit. Returns immediately if it never started.
    pub fn join(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| EventManagerError::WorkerPanicked),
            None => Ok(()),
        }
    }

    /// Whether the worker thread is alive
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// A token that stops the worker when cancelled, for use from other threads
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Get a blocking iterator over events
    ///
    /// All iterators share one receiver, so each event is seen by one of them.
    /// Iteration ends once the worker has exited and every queued event has
    /// been taken.
    pub fn iter(&self) -> EventManagerIterator {
        EventManagerIterator::new(Arc::clone(&self.event_rx))
    }
}

impl<C> Drop for DahuaEventManager<C> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
