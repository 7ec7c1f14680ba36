// ── Poll coordinator ──
//
// Owns the device snapshot and drives two independent cadences against
// it. Both cycles share one exclusive-access token (the snapshot mutex);
// sub-fetches within a cycle run strictly in order and stop as soon as
// the transport reports it lost the device.

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::Local;
use serde_json::{Value, json};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use omvly_api::transport::{TlsMode, TransportConfig};
use omvly_api::{OmvClient, RpcTransport, device_url};

use crate::config::PollerConfig;
use crate::derived;
use crate::error::CoreError;
use crate::model::{Collection, FieldValue, Record, Snapshot};
use crate::normalize::{normalize_keyed, normalize_record};
use crate::notify::{UpdateSink, update_topic};
use crate::schema::{self, SMART_SKIP_PREFIXES};
use crate::store::SnapshotStore;

type Teardown = Box<dyn FnOnce() + Send>;

// ── Cycle vocabulary ─────────────────────────────────────────────────

/// Result of one scheduled cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The fetch sequence ran (individual sub-fetches may have failed).
    Completed,
    /// The snapshot was busy for the whole wait; nothing was touched.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cadence {
    Fast,
    Slow,
}

/// One RPC call plus the merge into its snapshot slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubFetch {
    Hwinfo,
    Plugin,
    Disk,
    Filesystem,
    Smart,
    Service,
}

impl fmt::Display for SubFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hwinfo => "hwinfo",
            Self::Plugin => "plugin",
            Self::Disk => "disk",
            Self::Filesystem => "fs",
            Self::Smart => "smart",
            Self::Service => "service",
        };
        f.write_str(name)
    }
}

const FAST_SEQUENCE: &[SubFetch] = &[SubFetch::Hwinfo, SubFetch::Plugin, SubFetch::Disk];

const SLOW_SEQUENCE: &[SubFetch] = &[
    SubFetch::Hwinfo,
    SubFetch::Filesystem,
    SubFetch::Smart,
    SubFetch::Service,
];

// ── Poller ───────────────────────────────────────────────────────────

/// Poll coordinator for one device.
///
/// Cheaply cloneable via `Arc<PollerInner>`. Generic over the transport so
/// tests can drive it with a scripted device.
pub struct Poller<T: RpcTransport> {
    inner: Arc<PollerInner<T>>,
}

impl<T: RpcTransport> Clone for Poller<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PollerInner<T> {
    config: PollerConfig,
    transport: T,
    store: SnapshotStore,
    sink: Arc<dyn UpdateSink>,
    topic: String,
    cancel: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    listeners: StdMutex<Vec<Teardown>>,
    /// Most recent sub-fetch failure, for one-shot callers.
    last_error: StdMutex<Option<String>>,
}

impl Poller<OmvClient> {
    /// Build a poller talking to a real device over JSON-RPC.
    pub fn from_config(config: PollerConfig, sink: Arc<dyn UpdateSink>) -> Result<Self, CoreError> {
        let device = &config.device;
        let base_url = device_url(&device.host, device.use_ssl)?;
        let transport = TransportConfig {
            tls: TlsMode::from_verify(device.verify_ssl),
            timeout: device.timeout,
            cookie_jar: None,
        };
        let client = OmvClient::new(
            base_url,
            device.username.clone(),
            device.password.clone(),
            &transport,
        )?;
        Self::new(config, client, sink)
    }
}

impl<T: RpcTransport> Poller<T> {
    /// Create a poller with an empty snapshot. Does NOT start timers.
    ///
    /// Validates the built-in schemas and the cadence settings.
    pub fn new(
        config: PollerConfig,
        transport: T,
        sink: Arc<dyn UpdateSink>,
    ) -> Result<Self, CoreError> {
        schema::validate_all()?;
        if config.fast_interval.is_zero() || config.slow_interval.is_zero() {
            return Err(CoreError::Config {
                message: "poll intervals must be non-zero".into(),
            });
        }

        let topic = update_topic(&config.name);
        Ok(Self {
            inner: Arc::new(PollerInner {
                config,
                transport,
                store: SnapshotStore::new(),
                sink,
                topic,
                cancel: Mutex::new(CancellationToken::new()),
                task_handles: Mutex::new(Vec::new()),
                listeners: StdMutex::new(Vec::new()),
                last_error: StdMutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Topic passed to the update sink after every completed slow cycle.
    pub fn signal_update(&self) -> &str {
        &self.inner.topic
    }

    /// Transport connectivity, uncached.
    pub fn connected(&self) -> bool {
        self.inner.transport.connected()
    }

    /// Last published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.store.current()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.inner.store.subscribe()
    }

    /// Register a callback run (once) by [`stop()`](Self::stop).
    pub fn add_listener(&self, teardown: impl FnOnce() + Send + 'static) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(teardown));
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the two cadence tasks. Returns `false` if already running.
    pub async fn start(&self) -> bool {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return false;
        }

        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().await = cancel.clone();

        handles.push(tokio::spawn(cycle_task(
            self.clone(),
            Cadence::Fast,
            cancel.clone(),
        )));
        handles.push(tokio::spawn(cycle_task(self.clone(), Cadence::Slow, cancel)));

        info!(
            name = %self.inner.config.name,
            fast_secs = self.inner.config.fast_interval.as_secs(),
            slow_secs = self.inner.config.slow_interval.as_secs(),
            "poller started"
        );
        true
    }

    /// Cancel both timers and release listeners. Always returns `true`.
    ///
    /// A cycle already in flight runs to completion before its task exits.
    pub async fn stop(&self) -> bool {
        self.inner.cancel.lock().await.cancel();

        let handles: Vec<JoinHandle<()>> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "cycle task ended abnormally");
            }
        }

        let listeners =
            std::mem::take(&mut *self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner));
        for teardown in listeners {
            teardown();
        }

        debug!(name = %self.inner.config.name, "poller stopped");
        true
    }

    // ── Cycles ───────────────────────────────────────────────────────

    /// Hardware info, plugins and disks. Never notifies.
    pub async fn run_fast_cycle(&self) -> CycleOutcome {
        let wait = self.inner.config.fast_lock_wait;
        let Some(mut snapshot) = self.inner.store.acquire(wait).await else {
            debug!(wait_secs = wait.as_secs(), "fast cycle skipped: snapshot busy");
            return CycleOutcome::Skipped;
        };

        trace!("fast cycle started");
        self.run_sequence(&mut snapshot, FAST_SEQUENCE).await;
        trace!("fast cycle finished");
        CycleOutcome::Completed
    }

    /// Hardware info, filesystems, SMART and services, then publish and
    /// notify exactly once.
    ///
    /// A reconnection since the last cycle first forces a fast cycle so
    /// plugin and disk baselines are rebuilt.
    pub async fn run_slow_cycle(&self) -> CycleOutcome {
        if self.inner.transport.has_reconnected() {
            info!("transport reconnected, resyncing");
            self.run_fast_cycle().await;
        }

        let wait = self.inner.config.slow_lock_wait;
        let Some(mut snapshot) = self.inner.store.acquire(wait).await else {
            debug!(wait_secs = wait.as_secs(), "slow cycle skipped: snapshot busy");
            return CycleOutcome::Skipped;
        };

        trace!("slow cycle started");
        self.run_sequence(&mut snapshot, SLOW_SEQUENCE).await;
        let published = snapshot.clone();
        drop(snapshot);

        self.inner.store.publish(published);
        self.inner.sink.signal(&self.inner.topic);
        trace!("slow cycle finished");
        CycleOutcome::Completed
    }

    /// Initial load: a fast cycle then a slow one.
    ///
    /// Fails if the device could not be reached; the snapshot still holds
    /// whatever was merged before the failure.
    pub async fn refresh_all(&self) -> Result<(), CoreError> {
        self.take_last_error();
        self.run_fast_cycle().await;
        self.run_slow_cycle().await;

        if self.connected() {
            return Ok(());
        }
        let reason = self
            .take_last_error()
            .unwrap_or_else(|| "device unreachable".into());
        Err(CoreError::ConnectionFailed {
            url: self.inner.config.device.host.clone(),
            reason,
        })
    }

    // ── Fetch sequencing ─────────────────────────────────────────────

    async fn run_sequence(&self, snapshot: &mut Snapshot, steps: &[SubFetch]) {
        for (i, &step) in steps.iter().enumerate() {
            if i > 0 && !self.connected() {
                debug!(next = %step, "transport disconnected, skipping remaining sub-fetches");
                break;
            }
            if let Err(e) = self.fetch(step, snapshot).await {
                warn!(fetch = %step, error = %e, "sub-fetch failed");
                self.record_error(&e);
            }
        }
    }

    async fn fetch(&self, step: SubFetch, snapshot: &mut Snapshot) -> Result<(), CoreError> {
        match step {
            SubFetch::Hwinfo => {
                let raw = self.call("System", "getInformation", None).await?;
                snapshot.hwinfo = normalize_record(&snapshot.hwinfo, &raw, &schema::HWINFO);
                if self.connected() {
                    derived::apply_hwinfo(&mut snapshot.hwinfo, Local::now());
                }
            }
            SubFetch::Plugin => {
                let raw = self.call("Plugin", "enumeratePlugins", None).await?;
                snapshot.plugin = normalize_keyed(&snapshot.plugin, &raw, &schema::PLUGIN);
            }
            SubFetch::Disk => {
                let raw = self.call("DiskMgmt", "enumerateDevices", None).await?;
                snapshot.disk = normalize_keyed(&snapshot.disk, &raw, &schema::DISK);
            }
            SubFetch::Filesystem => {
                let raw = self
                    .call("FileSystemMgmt", "enumerateFilesystems", None)
                    .await?;
                snapshot.fs = normalize_keyed(&snapshot.fs, &raw, &schema::FS);
                derived::apply_fs(&mut snapshot.fs);
            }
            SubFetch::Smart => self.fetch_smart(&mut snapshot.disk).await?,
            SubFetch::Service => {
                let raw = self.call("Services", "getStatus", None).await?;
                snapshot.service = normalize_keyed(&snapshot.service, &raw, &schema::SERVICE);
            }
        }
        Ok(())
    }

    /// Per-disk SMART enrichment.
    ///
    /// A device-side error for one disk moves on to the next; losing the
    /// transport ends the sub-fetch.
    async fn fetch_smart(&self, disks: &mut Collection) -> Result<(), CoreError> {
        let targets: Vec<(String, String)> = disks
            .iter()
            .filter_map(|(key, disk)| smart_target(key, disk))
            .collect();

        for (key, devicefile) in targets {
            let params = json!({ "devicefile": devicefile });

            let info = match self
                .call("Smart", "getInformation", Some(params.clone()))
                .await
            {
                Ok(raw) => normalize_record(&Record::new(), &raw, &schema::SMART_INFO),
                Err(e) if self.connected() => {
                    debug!(disk = %key, error = %e, "SMART information unavailable");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if info.is_empty() {
                continue;
            }
            if let Some(disk) = disks.get_mut(&key) {
                derived::apply_smart_info(disk, &info);
            }

            let attributes = match self.call("Smart", "getAttributes", Some(params)).await {
                Ok(raw) => normalize_keyed(&Collection::new(), &raw, &schema::SMART_ATTRIBUTES),
                Err(e) if self.connected() => {
                    debug!(disk = %key, error = %e, "SMART attributes unavailable");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(disk) = disks.get_mut(&key) {
                derived::apply_smart_attributes(disk, &attributes);
            }
        }
        Ok(())
    }

    async fn call(
        &self,
        service: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, CoreError> {
        trace!(service, method, "rpc call");
        self.inner
            .transport
            .query(service, method, params)
            .await
            .map_err(|e| CoreError::rpc(service, method, e))
    }

    fn record_error(&self, err: &CoreError) {
        *self
            .inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
    }

    fn take_last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// `(key, devicefile)` for disks that carry SMART data.
fn smart_target(key: &str, disk: &Record) -> Option<(String, String)> {
    let name = disk
        .get("devicename")
        .and_then(FieldValue::as_str)
        .unwrap_or(key);
    if SMART_SKIP_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return None;
    }
    let devicefile = disk
        .get("canonicaldevicefile")
        .and_then(FieldValue::as_str)
        .filter(|f| !f.is_empty())?;
    Some((key.to_owned(), devicefile.to_owned()))
}

// ── Background tasks ─────────────────────────────────────────────────

async fn cycle_task<T: RpcTransport>(
    poller: Poller<T>,
    cadence: Cadence,
    cancel: CancellationToken,
) {
    let period: Duration = match cadence {
        Cadence::Fast => poller.inner.config.fast_interval,
        Cadence::Slow => poller.inner.config.slow_interval,
    };
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let outcome = match cadence {
                    Cadence::Fast => poller.run_fast_cycle().await,
                    Cadence::Slow => poller.run_slow_cycle().await,
                };
                trace!(?cadence, ?outcome, "cycle tick");
            }
        }
    }
    debug!(?cadence, "cycle task exiting");
}
