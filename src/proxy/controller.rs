//! Validation run controller

use crate::error::RunError;
use crate::proxy::aggregator::{PartitionSets, ResultAggregator};
use crate::proxy::checker::Probe;
use crate::proxy::config::RunConfig;
use crate::proxy::gate::ConcurrencyGate;
use crate::proxy::models::ProxyScheme;
use crate::proxy::store::ResultStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Idle => "Idle",
            RunState::Running => "Running",
            RunState::Completed => "Completed",
            RunState::Cancelled => "Cancelled",
        };
        write!(f, "{}", label)
    }
}

/// Summary of one finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub state: RunState,
    pub total: usize,
    pub admitted: usize,
    pub reachable: usize,
    pub unreachable: usize,
    pub pending: usize,
}

#[derive(Debug, Default)]
struct Control {
    state: RunState,
    cancel: Option<CancellationToken>,
}

/// Drives validation runs over the loaded result store.
///
/// At most one run is active at a time. Configuration is captured when a run
/// starts; nothing read afterwards can change it.
pub struct RunController<P> {
    probe: Arc<P>,
    aggregator: ResultAggregator,
    control: Arc<Mutex<Control>>,
}

impl<P: Probe + 'static> RunController<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe: Arc::new(probe),
            aggregator: ResultAggregator::new(),
            control: Arc::new(Mutex::new(Control::default())),
        }
    }

    /// Shared view of the result store
    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    pub async fn state(&self) -> RunState {
        self.control.lock().await.state
    }

    /// Replace the loaded records with a fresh pending list.
    /// Rejected while a run is active.
    pub async fn load<I, S>(&self, addresses: I, scheme: ProxyScheme) -> Result<usize, RunError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut control = self.control.lock().await;
        if control.state == RunState::Running {
            return Err(RunError::AlreadyRunning);
        }

        let store = ResultStore::load(addresses, scheme);
        let count = store.len();
        self.aggregator.replace_store(store).await;
        control.state = RunState::Idle;

        info!(count, %scheme, "address list loaded");
        Ok(count)
    }

    /// Validate `config` and begin probing in the background.
    ///
    /// A configuration error leaves the controller state and the store as they were.
    pub async fn start(&self, config: RunConfig) -> Result<RunHandle, RunError> {
        config.validate()?;

        let mut control = self.control.lock().await;
        if control.state == RunState::Running {
            return Err(RunError::AlreadyRunning);
        }

        let work = self.aggregator.begin_run(config.scheme).await;
        let cancel = CancellationToken::new();
        control.state = RunState::Running;
        control.cancel = Some(cancel.clone());
        drop(control);

        let run = Run {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            probe: Arc::clone(&self.probe),
            aggregator: self.aggregator.clone(),
            control: Arc::clone(&self.control),
        };
        let run_id = run.id;
        let task = tokio::spawn(run.drive(work, cancel.clone()));

        Ok(RunHandle {
            run_id,
            cancel,
            task,
            control: Arc::clone(&self.control),
        })
    }

    /// Start a run and wait for it to settle
    pub async fn run(&self, config: RunConfig) -> Result<RunReport, RunError> {
        self.start(config).await?.wait().await
    }

    /// Request cancellation of the active run. Probes already admitted keep
    /// running; returns `false` if nothing was running.
    pub async fn stop(&self) -> bool {
        let control = self.control.lock().await;
        match (&control.state, &control.cancel) {
            (RunState::Running, Some(cancel)) => {
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Reachable/unreachable partitions of the last run
    pub async fn exports(&self) -> Result<PartitionSets, RunError> {
        let control = self.control.lock().await;
        if control.state == RunState::Running {
            return Err(RunError::AlreadyRunning);
        }
        Ok(self.aggregator.partitions().await)
    }
}

/// Handle to a run in progress
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<RunReport>,
    control: Arc<Mutex<Control>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Stop admitting new probes. No effect once the run has settled.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until every admitted probe has settled
    pub async fn wait(self) -> Result<RunReport, RunError> {
        match self.task.await {
            Ok(report) => Ok(report),
            Err(e) => {
                let mut control = self.control.lock().await;
                control.state = RunState::Cancelled;
                control.cancel = None;
                Err(RunError::Aborted(e.to_string()))
            }
        }
    }
}

struct Run<P> {
    id: Uuid,
    started_at: DateTime<Utc>,
    config: RunConfig,
    probe: Arc<P>,
    aggregator: ResultAggregator,
    control: Arc<Mutex<Control>>,
}

impl<P: Probe + 'static> Run<P> {
    async fn drive(self, work: Vec<(usize, String)>, cancel: CancellationToken) -> RunReport {
        let clock = Instant::now();
        let total = work.len();
        let gate = ConcurrencyGate::new(self.config.max_concurrent, cancel);

        info!(
            run_id = %self.id,
            total,
            max_concurrent = self.config.max_concurrent,
            scheme = %self.config.scheme,
            timeout = ?self.config.timeout,
            "validation run started"
        );

        let mut tasks = JoinSet::new();
        let mut admitted = 0;
        for (index, address) in work {
            let Some(admission) = gate.admit().await else {
                info!(run_id = %self.id, admitted, "stop requested, no further probes admitted");
                break;
            };
            admitted += 1;
            debug!(run_id = %self.id, index, in_flight = gate.in_flight(), "probe admitted");

            let probe = Arc::clone(&self.probe);
            let aggregator = self.aggregator.clone();
            let scheme = self.config.scheme;
            let timeout = self.config.timeout;
            let target = self.config.probe_url.clone();
            tasks.spawn(async move {
                let _admission = admission;
                let outcome = probe.probe(&address, scheme, &target, timeout).await;
                debug!(
                    address = %address,
                    status = %outcome.status,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "probe finished"
                );
                aggregator.record(index, outcome).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(run_id = %self.id, error = %e, "probe task failed");
            }
        }

        let tally = self.aggregator.tally().await;
        // decided under the control lock so a concurrent stop() either lands
        // before this point or sees the run already settled
        let state = {
            let mut control = self.control.lock().await;
            control.state = if gate.is_cancelled() {
                RunState::Cancelled
            } else {
                RunState::Completed
            };
            control.cancel = None;
            control.state
        };

        let report = RunReport {
            run_id: self.id,
            started_at: self.started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
            state,
            total,
            admitted,
            reachable: tally.reachable,
            unreachable: tally.unreachable,
            pending: tally.pending,
        };
        info!(
            run_id = %self.id,
            state = %report.state,
            admitted = report.admitted,
            reachable = report.reachable,
            unreachable = report.unreachable,
            pending = report.pending,
            elapsed_ms = report.elapsed_ms,
            "validation run finished"
        );
        report
    }
}
