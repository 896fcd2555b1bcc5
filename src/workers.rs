use crate::probe::{probe, Dialer, ProbeConfig};
use crate::shutdown::select_or_shutdown;
use crate::types::{Endpoint, ProbeResult};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub concurrency: usize,
    pub probe: ProbeConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 20,
            probe: ProbeConfig::default(),
        }
    }
}

struct Progress {
    total: usize,
    tested: AtomicUsize,
    reachable: AtomicUsize,
}

impl Progress {
    fn record(&self, result: &ProbeResult) {
        let tested = self.tested.fetch_add(1, Ordering::SeqCst) + 1;
        let reachable = if result.is_reachable() {
            self.reachable.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.reachable.load(Ordering::SeqCst)
        };
        if result.is_reachable() {
            info!(
                "[{}/{}] {} reachable (last: {} {:?}, jitter {:?})",
                tested, self.total, reachable, result.endpoint, result.latency, result.jitter
            );
        } else {
            info!("[{}/{}] {} reachable", tested, self.total, reachable);
        }
    }
}

/// Probes every endpoint exactly once using `config.concurrency` workers and
/// returns once all of them have drained the queue.
///
/// Results arrive in completion order. If `cancel` fires, workers stop picking
/// up endpoints, in-flight probes are abandoned and only the results gathered
/// so far are returned.
pub async fn schedule_all<D: Dialer>(
    dialer: Arc<D>,
    endpoints: Vec<Endpoint>,
    config: SchedulerConfig,
    cancel: CancellationToken,
) -> Vec<ProbeResult> {
    let total = endpoints.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = config.concurrency.clamp(1, total);
    info!(
        "Testing {} peers with {} attempts each across {} workers",
        total, config.probe.attempts, workers
    );

    let (work_tx, work_rx) = mpsc::channel::<Endpoint>(total);
    for endpoint in endpoints {
        // capacity equals the item count, so this never waits
        if work_tx.send(endpoint).await.is_err() {
            break;
        }
    }
    drop(work_tx);
    let work_rx = Arc::new(Mutex::new(work_rx));

    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<ProbeResult>();
    let progress = Arc::new(Progress {
        total,
        tested: AtomicUsize::new(0),
        reachable: AtomicUsize::new(0),
    });

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let dialer = dialer.clone();
        let work_rx = work_rx.clone();
        let result_tx = result_tx.clone();
        let progress = progress.clone();
        let cancel = cancel.clone();
        let probe_config = config.probe;

        handles.push(task::spawn(async move {
            loop {
                let next = select_or_shutdown(async { work_rx.lock().await.recv().await }, &cancel);
                let endpoint = match next.await {
                    Ok(Some(endpoint)) => endpoint,
                    Ok(None) => break,
                    Err(()) => {
                        debug!("Worker {}: cancelled while idle", worker_id);
                        break;
                    }
                };

                match select_or_shutdown(probe(dialer.as_ref(), &endpoint, &probe_config), &cancel)
                    .await
                {
                    Ok(result) => {
                        progress.record(&result);
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                    Err(()) => {
                        debug!("Worker {}: abandoned probe of {}", worker_id, endpoint);
                        break;
                    }
                }
            }
        }));
    }
    drop(result_tx);

    for outcome in futures_util::future::join_all(handles).await {
        if let Err(e) = outcome {
            warn!("Probe worker failed: {}", e);
        }
    }

    let mut results = Vec::with_capacity(total);
    while let Some(result) = result_rx.recv().await {
        results.push(result);
    }

    if cancel.is_cancelled() {
        warn!("Probing cancelled after {} of {} peers", results.len(), total);
    }
    results
}
