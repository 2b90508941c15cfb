use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScanRequest;
use crate::explorer;
use crate::probe::Prober;
use crate::types::{ProbeResult, ScanOutcome, ScanResults};

/// Incremental notifications published while a run is in progress.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Started { total: u64 },
    Progress { completed: u64, total: u64 },
    /// A worker finished a port; `results` may be empty.
    PortFinished { port: u16, results: Vec<ProbeResult> },
    Finished { outcome: ScanOutcome, completed: u64, total: u64 },
}

/// Shared, mutable state of one run. Cloning shares the same run.
#[derive(Clone, Debug)]
pub struct RunState {
    pub running: Arc<AtomicBool>,
    pub cancel: CancellationToken,
    pub total: Arc<AtomicU64>,
    pub completed: Arc<AtomicU64>,
    pub results: Arc<Mutex<Vec<ProbeResult>>>,
    events: Option<UnboundedSender<ScanEvent>>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            total: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
            results: Arc::new(Mutex::new(Vec::new())),
            events: None,
        }
    }

    /// Same as `new`, but every progress change is also sent on `events`.
    pub fn with_events(events: UnboundedSender<ScanEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::new()
        }
    }

    /// Request a cooperative stop. In-flight probes still run to their own timeout.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// `(completed, total)`
    pub fn progress(&self) -> (u64, u64) {
        (
            self.completed.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }

    pub async fn snapshot(&self) -> Vec<ProbeResult> {
        self.results.lock().await.clone()
    }

    pub(crate) fn task_completed(&self) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);
        self.emit(ScanEvent::Progress { completed, total });
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(tx) = &self.events {
            // The receiver going away only means nobody is watching.
            let _ = tx.send(event);
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Explore every requested port with `request.concurrency` workers sharing one port queue.
///
/// Clears the results and counters of `state` first, but the stop flag is one-way:
/// a `RunState` that was stopped ends any later run immediately, so every run
/// needs a fresh one. Returns once every worker has either drained the queue
/// or observed the stop flag.
pub async fn run_scan<P: Prober + 'static>(
    prober: Arc<P>,
    request: Arc<ScanRequest>,
    state: RunState,
) -> ScanResults {
    let total = request.total_tasks();
    state.results.lock().await.clear();
    state.completed.store(0, Ordering::SeqCst);
    state.total.store(total, Ordering::SeqCst);
    state.running.store(true, Ordering::SeqCst);

    info!(
        host = %request.target,
        protocol = %request.protocol,
        ports = request.ports.len(),
        base_paths = request.base_paths.len(),
        concurrency = request.concurrency,
        total,
        "starting NMOS exploration"
    );
    state.emit(ScanEvent::Started { total });

    let queue: Arc<Mutex<VecDeque<u16>>> =
        Arc::new(Mutex::new(request.ports.iter().copied().collect()));
    let mut set = JoinSet::new();

    for worker in 0..request.concurrency.max(1) {
        let prober = prober.clone();
        let request = request.clone();
        let state = state.clone();
        let queue = queue.clone();
        set.spawn(async move {
            work(worker, prober.as_ref(), &request, &state, &queue).await;
        });
    }

    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            warn!(error = %e, "scan worker aborted");
        }
    }

    let completed = state.completed.load(Ordering::SeqCst);
    let outcome = if state.is_stop_requested() && completed < total {
        ScanOutcome::Stopped
    } else {
        ScanOutcome::Completed
    };
    let entries = state.snapshot().await;
    state.running.store(false, Ordering::SeqCst);

    match outcome {
        ScanOutcome::Completed => info!(completed, total, found = entries.len(), "exploration completed"),
        ScanOutcome::Stopped => warn!(completed, total, found = entries.len(), "exploration stopped by user"),
    }
    state.emit(ScanEvent::Finished {
        outcome,
        completed,
        total,
    });

    ScanResults {
        outcome,
        total,
        completed,
        entries,
    }
}

async fn work<P: Prober>(
    worker: usize,
    prober: &P,
    request: &ScanRequest,
    state: &RunState,
    queue: &Mutex<VecDeque<u16>>,
) {
    loop {
        if state.is_stop_requested() {
            break;
        }
        let Some(port) = queue.lock().await.pop_front() else {
            break;
        };

        let found = explorer::explore_port(prober, request, port, state).await;
        debug!(worker, port, found = found.len(), "port explored");

        state.results.lock().await.extend(found.iter().cloned());
        state.emit(ScanEvent::PortFinished {
            port,
            results: found,
        });
    }
    debug!(worker, "worker exiting");
}

/// Handle to a scan running in the background.
pub struct ScanHandle {
    state: RunState,
    task: JoinHandle<ScanResults>,
}

impl ScanHandle {
    pub fn stop(&self) {
        self.state.stop();
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub async fn join(self) -> Result<ScanResults> {
        self.task.await.context("scan task failed")
    }
}

/// Spawn a scan and return its handle together with the event stream.
///
/// The stream stays open while the handle lives; `ScanEvent::Finished` is always the last event.
pub fn start_scan<P: Prober + 'static>(
    prober: Arc<P>,
    request: ScanRequest,
) -> (ScanHandle, UnboundedReceiver<ScanEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = RunState::with_events(tx);
    let task = tokio::spawn(run_scan(prober, Arc::new(request), state.clone()));
    (ScanHandle { state, task }, rx)
}
