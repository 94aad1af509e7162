// src/core/dispatcher.rs

//! Bounded fan-out/fan-in execution of independent probes.
//!
//! Every probe runs in its own task with its own timeout. The dispatcher is
//! the only owner of the results: workers hand back a `ProbeOutcome` through
//! the `JoinSet` and a single loop reduces them.

use crate::core::errors::{ConfigError, ProbeError};
use crate::core::models::DispatchStats;
use futures::FutureExt;
use std::any::Any;
use std::fmt::Debug;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// What a probe function returns: `Ok(Some(_))` when it found something,
/// `Ok(None)` when the target is definitively not there, `Err` when the
/// probe itself broke.
pub type ProbeResult<P> = Result<Option<P>, ProbeError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus<P> {
    Success(P),
    Absent,
    Failure(String),
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome<T, P> {
    pub target: T,
    pub status: ProbeStatus<P>,
}

impl<T, P> ProbeOutcome<T, P> {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ProbeStatus::Success(_))
    }

    pub fn into_payload(self) -> Option<P> {
        match self.status {
            ProbeStatus::Success(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Outcomes of one batch, in completion order.
#[derive(Debug)]
pub struct Dispatch<T, P> {
    pub outcomes: Vec<ProbeOutcome<T, P>>,
    pub stats: DispatchStats,
    pub cancelled: bool,
}

impl<T, P> Dispatch<T, P> {
    fn empty() -> Self {
        Self { outcomes: Vec::new(), stats: DispatchStats::default(), cancelled: false }
    }

    pub fn into_payloads(self) -> Vec<P> {
        self.outcomes.into_iter().filter_map(ProbeOutcome::into_payload).collect()
    }
}

/// Runs probes with at most `concurrency` in flight.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    concurrency: usize,
    per_probe_timeout: Duration,
    keep_failures: bool,
}

impl Dispatcher {
    pub fn new(concurrency: usize, per_probe_timeout: Duration) -> Result<Self, ConfigError> {
        if concurrency == 0 {
            return Err(ConfigError::NonPositiveConcurrency);
        }
        if per_probe_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("per-probe"));
        }
        Ok(Self { concurrency, per_probe_timeout, keep_failures: false })
    }

    /// Also surface `Absent`, `Failure` and `Timeout` outcomes, not only
    /// successes. Stats are always complete either way.
    pub fn with_failures(mut self, keep: bool) -> Self {
        self.keep_failures = keep;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn per_probe_timeout(&self) -> Duration {
        self.per_probe_timeout
    }

    /// Probes every target and waits for all of them.
    pub async fn dispatch<T, P, F, Fut>(&self, targets: Vec<T>, probe: F) -> Dispatch<T, P>
    where
        T: Clone + Debug + Send + 'static,
        P: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult<P>> + Send + 'static,
    {
        self.dispatch_until(targets, probe, std::future::pending::<()>()).await
    }

    /// Like `dispatch`, but stops as soon as `shutdown` resolves.
    ///
    /// On shutdown no new probe is started, outcomes that already finished
    /// are kept, and in-flight probes are aborted without waiting for their
    /// timeout.
    pub async fn dispatch_until<T, P, F, Fut, S>(
        &self,
        targets: Vec<T>,
        probe: F,
        shutdown: S,
    ) -> Dispatch<T, P>
    where
        T: Clone + Debug + Send + 'static,
        P: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult<P>> + Send + 'static,
        S: Future<Output = ()>,
    {
        if targets.is_empty() {
            return Dispatch::empty();
        }

        let submitted = targets.len();
        info!(submitted, concurrency = self.concurrency, "Dispatching probes.");

        let probe = Arc::new(probe);
        let mut pending = targets.into_iter();
        let mut in_flight: JoinSet<ProbeOutcome<T, P>> = JoinSet::new();
        let mut dispatch = Dispatch::empty();
        dispatch.stats.submitted = submitted;

        tokio::pin!(shutdown);

        loop {
            while in_flight.len() < self.concurrency {
                match pending.next() {
                    Some(target) => self.spawn_probe(&mut in_flight, &probe, target),
                    None => break,
                }
            }
            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    while let Some(joined) = in_flight.try_join_next() {
                        if let Ok(outcome) = joined {
                            self.record(&mut dispatch, outcome);
                        }
                    }
                    in_flight.abort_all();
                    dispatch.cancelled = true;
                    break;
                }
                joined = in_flight.join_next() => match joined {
                    Some(Ok(outcome)) => self.record(&mut dispatch, outcome),
                    Some(Err(e)) => {
                        // Probe panics are caught inside the task, so this is
                        // only reachable when the runtime itself shuts down.
                        warn!(error = %e, "Probe task did not complete.");
                        dispatch.stats.failed += 1;
                    }
                    None => break,
                },
            }
        }

        dispatch.stats.abandoned = submitted - dispatch.stats.completed();
        info!(
            succeeded = dispatch.stats.succeeded,
            absent = dispatch.stats.absent,
            failed = dispatch.stats.failed,
            timed_out = dispatch.stats.timed_out,
            abandoned = dispatch.stats.abandoned,
            cancelled = dispatch.cancelled,
            "Dispatch finished."
        );
        dispatch
    }

    fn spawn_probe<T, P, F, Fut>(
        &self,
        in_flight: &mut JoinSet<ProbeOutcome<T, P>>,
        probe: &Arc<F>,
        target: T,
    ) where
        T: Clone + Debug + Send + 'static,
        P: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult<P>> + Send + 'static,
    {
        let probe = Arc::clone(probe);
        let limit = self.per_probe_timeout;
        in_flight.spawn(async move {
            let attempt = {
                let target = target.clone();
                async move { probe(target).await }
            };
            let status = match tokio::time::timeout(limit, AssertUnwindSafe(attempt).catch_unwind()).await {
                Ok(Ok(Ok(Some(payload)))) => ProbeStatus::Success(payload),
                Ok(Ok(Ok(None))) => ProbeStatus::Absent,
                Ok(Ok(Err(e))) => ProbeStatus::Failure(e.to_string()),
                Ok(Err(panic)) => ProbeStatus::Failure(panic_message(panic.as_ref())),
                Err(_) => ProbeStatus::Timeout,
            };
            ProbeOutcome { target, status }
        });
    }

    fn record<T: Debug, P>(&self, dispatch: &mut Dispatch<T, P>, outcome: ProbeOutcome<T, P>) {
        let keep = match &outcome.status {
            ProbeStatus::Success(_) => {
                dispatch.stats.succeeded += 1;
                true
            }
            ProbeStatus::Absent => {
                dispatch.stats.absent += 1;
                self.keep_failures
            }
            ProbeStatus::Failure(reason) => {
                debug!(target = ?outcome.target, reason = %reason, "Probe failed.");
                dispatch.stats.failed += 1;
                self.keep_failures
            }
            ProbeStatus::Timeout => {
                debug!(target = ?outcome.target, "Probe timed out.");
                dispatch.stats.timed_out += 1;
                self.keep_failures
            }
        };
        if keep {
            dispatch.outcomes.push(outcome);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let message = if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown payload".to_string()
    };
    ProbeError::Panicked(message).to_string()
}

// --- Cancellation ---

/// Requests early termination of every scan holding the paired token.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token nobody can cancel.
    pub fn never() -> Self {
        let (_, token) = cancel_pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}
