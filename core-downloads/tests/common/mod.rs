//! In-memory bridges shared by the download integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AnalyticsEvent, AnalyticsSink, BridgeError, Connectivity, FileSystemAccess,
    ManualClock, MediaKind, MediaTypeSniffer, NetworkChangeStream, NetworkInfo, NetworkMonitor,
    NetworkType, ProgressSender, TransferClient, TransferRequest,
};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use core_downloads::db::create_test_pool;
use core_downloads::{
    DownloadCatalog, DownloadConfig, DownloadEvent, DownloadOrchestrator, DownloadStatus,
    ListenerSubscription, OrchestratorDeps, PostSnapshot, SqliteDownloadCatalog,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const DOCS: &str = "/docs";

// ============================================================================
// File system
// ============================================================================

#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashSet<PathBuf>>,
}

impl MemoryFileSystem {
    pub fn insert(&self, path: &Path) {
        self.files.lock().unwrap().insert(path.to_path_buf());
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.lock().unwrap().contains(path.as_ref())
    }

    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.files.lock().unwrap().iter().cloned().collect();
        files.sort();
        files
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_documents_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from(DOCS))
    }

    async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        if self.files.lock().unwrap().remove(path) {
            Ok(())
        } else {
            Err(BridgeError::Io(std::io::Error::from(
                std::io::ErrorKind::NotFound,
            )))
        }
    }
}

// ============================================================================
// Transfers
// ============================================================================

/// What the fake transfer client does for one request.
#[derive(Debug, Clone)]
pub enum TransferBehavior {
    /// Report each fraction, write the file, succeed.
    Complete(Vec<f64>),
    /// Fail with the given message.
    Fail(String),
    /// Report each fraction, then fail with the given message.
    FailAfter(Vec<f64>, String),
    /// Write partial data, report each fraction, then never finish.
    Hang(Vec<f64>),
}

/// Increments a counter when the transfer future is dropped unfinished.
struct DropSignal(Arc<AtomicUsize>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeTransferClient {
    fs: Arc<MemoryFileSystem>,
    default: Mutex<TransferBehavior>,
    scripted: Mutex<HashMap<String, VecDeque<TransferBehavior>>>,
    requests: Mutex<Vec<TransferRequest>>,
    abandoned: Arc<AtomicUsize>,
}

impl FakeTransferClient {
    pub fn new(fs: Arc<MemoryFileSystem>) -> Self {
        Self {
            fs,
            default: Mutex::new(TransferBehavior::Complete(vec![0.5])),
            scripted: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            abandoned: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_default(&self, behavior: TransferBehavior) {
        *self.default.lock().unwrap() = behavior;
    }

    /// Queue a behavior for the next request of `url`.
    pub fn script(&self, url: &str, behavior: TransferBehavior) {
        self.scripted
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(behavior);
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    /// Transfers dropped before they finished.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, url: &str) -> TransferBehavior {
        self.scripted
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| self.default.lock().unwrap().clone())
    }
}

#[async_trait]
impl TransferClient for FakeTransferClient {
    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressSender,
    ) -> BridgeResult<PathBuf> {
        self.requests.lock().unwrap().push(request.clone());

        match self.behavior_for(&request.url) {
            TransferBehavior::Complete(steps) => {
                for step in steps {
                    let _ = progress.send(step);
                    tokio::task::yield_now().await;
                }
                self.fs.insert(&request.destination);
                Ok(request.destination)
            }
            TransferBehavior::Fail(message) => Err(BridgeError::TransferFailed {
                url: request.url,
                message,
            }),
            TransferBehavior::FailAfter(steps, message) => {
                for step in steps {
                    let _ = progress.send(step);
                    tokio::task::yield_now().await;
                }
                Err(BridgeError::TransferFailed {
                    url: request.url,
                    message,
                })
            }
            TransferBehavior::Hang(steps) => {
                let _signal = DropSignal(Arc::clone(&self.abandoned));
                self.fs.insert(&request.partial_path());
                for step in steps {
                    let _ = progress.send(step);
                }
                futures::future::pending::<()>().await;
                Err(BridgeError::OperationFailed("unreachable".to_string()))
            }
        }
    }
}

// ============================================================================
// Sniffer, analytics, network
// ============================================================================

/// `video` in the URL means video, `broken-sniff` fails, anything else is audio.
pub struct FakeSniffer;

#[async_trait]
impl MediaTypeSniffer for FakeSniffer {
    async fn classify(&self, url: &str) -> BridgeResult<MediaKind> {
        if url.contains("broken-sniff") {
            Err(BridgeError::OperationFailed("HEAD request failed".to_string()))
        } else if url.contains("video") {
            Ok(MediaKind::Video)
        } else {
            Ok(MediaKind::Audio)
        }
    }
}

#[derive(Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingAnalytics {
    pub fn named(&self, name: &str) -> Vec<AnalyticsEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn track(&self, event: AnalyticsEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn info_for(connectivity: Connectivity) -> NetworkInfo {
    match connectivity {
        Connectivity::Connected => NetworkInfo::connected(NetworkType::WiFi),
        Connectivity::ConnectedMetered => NetworkInfo::metered(),
        Connectivity::Unavailable => NetworkInfo::unavailable(),
    }
}

pub struct FakeNetworkMonitor {
    current: Mutex<Connectivity>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<NetworkInfo>>>,
}

impl FakeNetworkMonitor {
    pub fn new(initial: Connectivity) -> Self {
        Self {
            current: Mutex::new(initial),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Change connectivity and publish it to change streams.
    pub fn set(&self, connectivity: Connectivity) {
        *self.current.lock().unwrap() = connectivity;
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(info_for(connectivity)).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

struct ChannelChangeStream(mpsc::UnboundedReceiver<NetworkInfo>);

#[async_trait]
impl NetworkChangeStream for ChannelChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        self.0.recv().await
    }
}

#[async_trait]
impl NetworkMonitor for FakeNetworkMonitor {
    async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
        Ok(info_for(*self.current.lock().unwrap()))
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        Ok(Box::new(ChannelChangeStream(rx)))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
}

pub fn url_for(id: &str) -> String {
    format!("https://cdn.example.com/media/{}.mp3", id)
}

pub fn post(id: &str, channel: &str) -> PostSnapshot {
    PostSnapshot::new(id, channel, t0())
        .with_title(format!("Episode {}", id))
        .with_media_url(url_for(id))
}

pub fn auto_post(id: &str, channel: &str) -> PostSnapshot {
    post(id, channel).with_channel_auto_download(true)
}

pub struct Harness {
    pub fs: Arc<MemoryFileSystem>,
    pub transfers: Arc<FakeTransferClient>,
    pub analytics: Arc<RecordingAnalytics>,
    pub monitor: Arc<FakeNetworkMonitor>,
    pub catalog: Arc<SqliteDownloadCatalog>,
    pub clock: Arc<ManualClock>,
    pub orchestrator: DownloadOrchestrator,
}

pub fn test_config() -> DownloadConfig {
    DownloadConfig::default()
        .with_retry_delays(Duration::from_millis(1), Duration::from_millis(5))
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: DownloadConfig) -> Self {
        let pool = create_test_pool().await.unwrap();
        let catalog = Arc::new(SqliteDownloadCatalog::new(pool));
        catalog.initialize().await.unwrap();
        Self::with_catalog(config, catalog).await
    }

    /// Build on an existing catalog, e.g. one seeded with rows.
    pub async fn with_catalog(config: DownloadConfig, catalog: Arc<SqliteDownloadCatalog>) -> Self {
        let fs = Arc::new(MemoryFileSystem::default());
        let transfers = Arc::new(FakeTransferClient::new(Arc::clone(&fs)));
        let analytics = Arc::new(RecordingAnalytics::default());
        let monitor = Arc::new(FakeNetworkMonitor::new(Connectivity::Connected));
        let clock = Arc::new(ManualClock::with_step(t0(), ChronoDuration::seconds(1)));

        let deps = OrchestratorDeps {
            catalog: catalog.clone(),
            transfer_client: transfers.clone(),
            media_sniffer: Arc::new(FakeSniffer),
            file_system: fs.clone(),
            analytics: analytics.clone(),
            clock: clock.clone(),
        };

        let network: Arc<dyn NetworkMonitor> = monitor.clone();
        let orchestrator = DownloadOrchestrator::spawn(deps, config, Some(network)).unwrap();
        orchestrator.initialize().await.unwrap();

        Self {
            fs,
            transfers,
            analytics,
            monitor,
            catalog,
            clock,
            orchestrator,
        }
    }

    /// Wait until the record reaches `status`.
    pub async fn wait_for_status(&self, id: &str, status: DownloadStatus) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(record) = self.orchestrator.item(id).await {
                if record.status == status {
                    return;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "{} never reached {:?}",
                id,
                status
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn wait_until<F>(&self, what: &str, mut condition: F)
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(tokio::time::Instant::now() < deadline, "timed out: {}", what);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn stored_status(&self, id: &str) -> Option<DownloadStatus> {
        self.catalog.fetch(id).await.unwrap().map(|r| r.status)
    }
}

/// Next event matching `predicate`, failing the test after 5 seconds.
pub async fn next_event<F>(subscription: &mut ListenerSubscription, mut predicate: F) -> DownloadEvent
where
    F: FnMut(&DownloadEvent) -> bool,
{
    let wait = async {
        loop {
            match subscription.receiver.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("listener channel closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for download event")
}

/// Events already queued for the listener, without waiting.
pub fn drain(subscription: &mut ListenerSubscription) -> Vec<DownloadEvent> {
    let mut events = Vec::new();
    while let Ok(event) = subscription.receiver.try_recv() {
        events.push(event);
    }
    events
}
