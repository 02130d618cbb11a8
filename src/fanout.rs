/// Fan-out orchestrator.
///
/// Runs one query per station in parallel and collects a station-keyed
/// result map. The worker pool is sized to the batch, one thread per
/// distinct station. A station whose query fails gets its error in the
/// map; its siblings are unaffected.
///
/// Without a task timeout the orchestrator waits for every station. With
/// one, stations still running at the batch deadline are reported as
/// `DataUnavailable` and their workers are left to finish in the
/// background.

use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use threadpool::ThreadPool;

use crate::analysis::merge;
use crate::error::{ExplorerError, ExplorerResult};
use crate::model::{FlowSeries, MergedSeries};
use crate::query::{Fetchable, QueryService};

/// Outcome of one batch.
#[derive(Debug)]
pub struct FetchReport<T> {
    /// One entry per distinct requested station.
    pub results: HashMap<String, ExplorerResult<T>>,
    /// Wall-clock time for the whole batch.
    pub elapsed: Duration,
}

impl<T> FetchReport<T> {
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_ok()).count()
    }

    /// Error messages keyed by station, sorted by station id.
    pub fn errors(&self) -> BTreeMap<String, String> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id.clone(), e.to_string())))
            .collect()
    }
}

impl FetchReport<FlowSeries> {
    /// Merges the successful series, columns in `order`.
    pub fn merged(&self, order: &[String]) -> MergedSeries {
        let mut seen = Vec::with_capacity(order.len());
        let mut series = Vec::with_capacity(order.len());
        for id in order {
            if seen.contains(id) {
                continue;
            }
            seen.push(id.clone());
            if let Some(Ok(s)) = self.results.get(id) {
                series.push(s.clone());
            }
        }
        merge(&series)
    }
}

pub struct Orchestrator<Q: Fetchable> {
    service: Arc<QueryService>,
    query: Arc<Q>,
    task_timeout: Option<Duration>,
}

impl<Q: Fetchable + 'static> Orchestrator<Q> {
    pub fn new(service: Arc<QueryService>, query: Arc<Q>) -> Self {
        Self {
            service,
            query,
            task_timeout: None,
        }
    }

    /// Batch deadline after which unfinished stations are reported as
    /// unavailable.
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn service(&self) -> &QueryService {
        &self.service
    }

    /// Fetches every station in `station_ids` concurrently.
    pub fn fetch_all(&self, station_ids: &[String]) -> FetchReport<Q::Output> {
        let start = Instant::now();

        let mut pending: Vec<String> = Vec::with_capacity(station_ids.len());
        for id in station_ids {
            if !pending.contains(id) {
                pending.push(id.clone());
            }
        }

        let mut results = HashMap::with_capacity(pending.len());
        if pending.is_empty() {
            return FetchReport {
                results,
                elapsed: start.elapsed(),
            };
        }

        let pool = ThreadPool::with_name("fanout".to_string(), pending.len());
        let (tx, rx) = mpsc::channel();

        for station_id in &pending {
            let tx = tx.clone();
            let service = self.service.clone();
            let query = self.query.clone();
            let station_id = station_id.clone();
            pool.execute(move || {
                let result = service.run(query.as_ref(), &station_id);
                // receiver may be gone after a timeout
                let _ = tx.send((station_id, result));
            });
        }
        drop(tx);

        // a deadline past the end of the clock is no deadline
        let deadline = self.task_timeout.and_then(|t| start.checked_add(t));
        while results.len() < pending.len() {
            let received = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    rx.recv_timeout(remaining).ok()
                }
                None => rx.recv().ok(),
            };
            match received {
                Some((station_id, result)) => {
                    if let Err(e) = &result {
                        tracing::warn!(station = %station_id, error = %e, "Station fetch failed");
                    }
                    results.insert(station_id, result);
                }
                // deadline passed, or every worker is gone
                None => break,
            }
        }

        for station_id in &pending {
            if !results.contains_key(station_id) {
                let reason = match self.task_timeout {
                    Some(t) => format!("timed out after {} ms", t.as_millis()),
                    None => "worker exited without a result".to_string(),
                };
                tracing::warn!(station = %station_id, reason = %reason, "Station fetch incomplete");
                results.insert(station_id.clone(), Err(ExplorerError::unavailable(station_id, reason)));
            }
        }

        let elapsed = start.elapsed();
        let failed = results.values().filter(|r| r.is_err()).count();
        tracing::info!(
            stations = pending.len(),
            failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "Fan-out batch complete"
        );

        FetchReport { results, elapsed }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
