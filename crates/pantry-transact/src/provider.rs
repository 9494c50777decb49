//! Background lifecycle for the Transact sync.
//!
//! [`TransactProvider`] composes the session, the extractor and the snapshot
//! cache. `connect` logs in once in the foreground and then starts two
//! loops: one refetches the inventory report, the other periodically
//! re-authenticates. Each loop owns a oneshot stop receiver.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pantry_core::TransactConfig;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::cache::{PartialProductSource, SnapshotCache};
use crate::error::{CacheError, TransactError};
use crate::extract::{RecordExtractor, RowExtractor};
use crate::humanize::human_duration;
use crate::report::ReportRequest;
use crate::session::{SessionManager, SessionSettings};
use crate::types::PartialProduct;

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub fetch_period: Duration,
    pub reload_session_period: Duration,
    pub report: ReportRequest,
}

impl ProviderSettings {
    #[must_use]
    pub fn from_config(config: &TransactConfig) -> Self {
        Self {
            fetch_period: Duration::from_secs(config.fetch_period_secs),
            reload_session_period: Duration::from_secs(config.reload_session_period_secs),
            report: ReportRequest::from_config(config),
        }
    }
}

/// Counts from one fetch-and-load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub rows_scanned: usize,
    pub rows_accepted: usize,
    pub locations: usize,
    pub products: usize,
}

/// Everything one fetch cycle needs, cheap to clone into the fetch task.
#[derive(Clone)]
struct FetchPipeline {
    session: Arc<SessionManager>,
    cache: Arc<SnapshotCache>,
    extractor: Arc<dyn RecordExtractor>,
    request: ReportRequest,
}

impl FetchPipeline {
    async fn run(&self) -> Result<FetchSummary, TransactError> {
        let rows = self.session.fetch_report_rows(&self.request).await?;
        let outcome = self.extractor.extract(&rows);

        let summary = FetchSummary {
            rows_scanned: outcome.scanned,
            rows_accepted: outcome.accepted,
            locations: outcome.products.len(),
            products: outcome.products.values().map(HashMap::len).sum(),
        };
        self.cache.load(outcome.products);
        Ok(summary)
    }
}

struct LoopHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    /// Asks the loop to stop and returns the task to wait on.
    fn signal(self) -> JoinHandle<()> {
        // The loop may already have exited; a closed channel is fine.
        let _ = self.stop.send(());
        self.task
    }
}

async fn join(task: JoinHandle<()>, name: &str) {
    if let Err(e) = task.await {
        tracing::warn!(task = name, error = %e, "Transact background task ended abnormally");
    }
}

struct Loops {
    fetch: LoopHandle,
    reauth: LoopHandle,
}

/// Transact-backed partial product provider.
pub struct TransactProvider {
    session: Arc<SessionManager>,
    cache: Arc<SnapshotCache>,
    pipeline: FetchPipeline,
    settings: ProviderSettings,
    loops: Mutex<Option<Loops>>,
}

impl TransactProvider {
    #[must_use]
    pub fn new(
        session: Arc<SessionManager>,
        cache: Arc<SnapshotCache>,
        extractor: Arc<dyn RecordExtractor>,
        settings: ProviderSettings,
    ) -> Self {
        let pipeline = FetchPipeline {
            session: Arc::clone(&session),
            cache: Arc::clone(&cache),
            extractor,
            request: settings.report.clone(),
        };
        Self {
            session,
            cache,
            pipeline,
            settings,
            loops: Mutex::new(None),
        }
    }

    /// Builds a provider with an empty cache and the offset-based extractor.
    ///
    /// # Errors
    ///
    /// Returns [`TransactError::InvalidBaseUrl`] or [`TransactError::Http`]
    /// if the session cannot be constructed.
    pub fn from_config(config: &TransactConfig) -> Result<Self, TransactError> {
        let session = SessionManager::new(SessionSettings::from_config(config))?;
        Ok(Self::new(
            Arc::new(session),
            Arc::new(SnapshotCache::new()),
            Arc::new(RowExtractor::from_config(config)),
            ProviderSettings::from_config(config),
        ))
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Logs in, then starts the fetch and reauth loops.
    ///
    /// The first fetch runs immediately in the background; `connect` does not
    /// wait for it.
    ///
    /// # Errors
    ///
    /// Returns [`TransactError::AlreadyConnected`] if the loops are running,
    /// or the reload error if the initial login fails. No loop is started
    /// in either case.
    pub async fn connect(&self) -> Result<(), TransactError> {
        let mut loops = self.loops.lock().await;
        if loops.is_some() {
            return Err(TransactError::AlreadyConnected);
        }

        let client_version = self.session.reload_session().await?;
        tracing::info!(
            client_version = %client_version,
            fetch_period = %human_duration(self.settings.fetch_period),
            reload_session_period = %human_duration(self.settings.reload_session_period),
            "connected to Transact; starting background loops"
        );

        *loops = Some(Loops {
            fetch: spawn_fetch_loop(self.pipeline.clone(), self.settings.fetch_period),
            reauth: spawn_reauth_loop(
                Arc::clone(&self.session),
                self.settings.reload_session_period,
            ),
        });
        Ok(())
    }

    /// Signals both loops to stop and waits for them to exit. An idle loop
    /// stops at once; a loop in the middle of a cycle finishes that cycle
    /// first. Does nothing when not connected.
    pub async fn disconnect(&self) {
        let Some(loops) = self.loops.lock().await.take() else {
            return;
        };
        tracing::info!("disconnecting from Transact");
        let fetch = loops.fetch.signal();
        let reauth = loops.reauth.signal();
        tokio::join!(join(fetch, "fetch"), join(reauth, "reauth"));
        tracing::info!("Transact background loops stopped");
    }

    /// Whether the background loops are running.
    pub async fn is_connected(&self) -> bool {
        self.loops.lock().await.is_some()
    }

    /// Runs one fetch-and-load cycle in the foreground.
    ///
    /// # Errors
    ///
    /// Any error from [`SessionManager::fetch_report_rows`]. The cache is
    /// left unchanged on failure.
    pub async fn fetch_once(&self) -> Result<FetchSummary, TransactError> {
        self.pipeline.run().await
    }
}

impl PartialProductSource for TransactProvider {
    fn list_locations(&self) -> Result<Vec<String>, CacheError> {
        self.cache.list_locations()
    }

    fn list_products(&self, location: &str) -> Result<Vec<PartialProduct>, CacheError> {
        self.cache.list_products(location)
    }

    fn get_product(&self, location: &str, id: &str) -> Result<PartialProduct, CacheError> {
        self.cache.get_product(location, id)
    }
}

fn spawn_fetch_loop(pipeline: FetchPipeline, period: Duration) -> LoopHandle {
    let (stop, mut stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        loop {
            match pipeline.run().await {
                Ok(summary) => tracing::info!(
                    rows_scanned = summary.rows_scanned,
                    rows_accepted = summary.rows_accepted,
                    locations = summary.locations,
                    products = summary.products,
                    "refreshed Transact inventory cache"
                ),
                Err(e) => tracing::error!(
                    error = %e,
                    delay = %human_duration(period),
                    "failed to fetch Transact inventory; retrying after delay"
                ),
            }

            tokio::select! {
                _ = &mut stopped => break,
                () = tokio::time::sleep(period) => {}
            }
        }
        tracing::debug!("Transact fetch loop exited");
    });
    LoopHandle { stop, task }
}

fn spawn_reauth_loop(session: Arc<SessionManager>, period: Duration) -> LoopHandle {
    let (stop, mut stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stopped => break,
                () = tokio::time::sleep(period) => {}
            }

            match session.reload_session().await {
                Ok(client_version) => tracing::info!(
                    client_version = %client_version,
                    "reloaded Transact session"
                ),
                Err(e) => tracing::error!(
                    error = %e,
                    delay = %human_duration(period),
                    "failed to reload Transact session; retrying after delay"
                ),
            }
        }
        tracing::debug!("Transact reauth loop exited");
    });
    LoopHandle { stop, task }
}
