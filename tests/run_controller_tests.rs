use proxy_vet::{
    ConfigError, ProbeOutcome, ProbeStatus, Probe, ProxyRecord, ProxyScheme, RunConfig,
    RunController, RunError, RunState,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Deterministic outcomes keyed on the address
struct ScriptedProbe;

impl Probe for ScriptedProbe {
    async fn probe(
        &self,
        address: &str,
        _scheme: ProxyScheme,
        _target: &str,
        _timeout: Duration,
    ) -> ProbeOutcome {
        match address {
            "bad addr" => ProbeOutcome::invalid_address(Duration::ZERO),
            "1.1.1.1:8080" => ProbeOutcome::success(Duration::from_millis(120)),
            _ => ProbeOutcome::failed(Duration::from_millis(5000)),
        }
    }
}

/// Records peak concurrency while sleeping briefly
#[derive(Default)]
struct TrackingProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl Probe for TrackingProbe {
    async fn probe(
        &self,
        address: &str,
        _scheme: ProxyScheme,
        _target: &str,
        _timeout: Duration,
    ) -> ProbeOutcome {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        if address.len() % 2 == 0 {
            ProbeOutcome::success(Duration::from_millis(3))
        } else {
            ProbeOutcome::failed(Duration::from_millis(3))
        }
    }
}

/// Blocks every probe until the latch is opened
struct LatchProbe {
    started: AtomicUsize,
    latch: Semaphore,
}

impl LatchProbe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicUsize::new(0),
            latch: Semaphore::new(0),
        })
    }

    fn open(&self) {
        self.latch.add_permits(10_000);
    }
}

impl Probe for LatchProbe {
    async fn probe(
        &self,
        _address: &str,
        _scheme: ProxyScheme,
        _target: &str,
        _timeout: Duration,
    ) -> ProbeOutcome {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _ = self.latch.acquire().await;
        ProbeOutcome::success(Duration::from_millis(1))
    }
}

fn addresses(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("10.{}.{}.1:{}", i / 250, i % 250, 1000 + i)).collect()
}

fn assert_partitions_match(records: &[ProxyRecord], reachable: &[String], unreachable: &[String]) {
    let reachable: HashSet<_> = reachable.iter().cloned().collect();
    let unreachable: HashSet<_> = unreachable.iter().cloned().collect();

    for record in records {
        match record.status {
            ProbeStatus::Success => {
                assert!(reachable.contains(&record.address), "{} missing from reachable", record.address);
                assert!(!unreachable.contains(&record.address));
            }
            ProbeStatus::Failed | ProbeStatus::InvalidAddress => {
                assert!(unreachable.contains(&record.address), "{} missing from unreachable", record.address);
                assert!(!reachable.contains(&record.address));
            }
            ProbeStatus::Pending => {
                assert!(!reachable.contains(&record.address));
                assert!(!unreachable.contains(&record.address));
            }
        }
    }
}

#[tokio::test]
async fn scripted_run_classifies_every_record() {
    let controller = RunController::new(ScriptedProbe);
    controller
        .load(["1.1.1.1:8080", "bad addr", "2.2.2.2:3128"], ProxyScheme::Http)
        .await
        .unwrap();

    let config = RunConfig::new()
        .with_scheme(ProxyScheme::Http)
        .with_timeout(Duration::from_secs(5))
        .with_max_concurrent(2);
    let report = controller.run(config).await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.total, 3);
    assert_eq!(report.admitted, 3);
    assert_eq!(report.reachable, 1);
    assert_eq!(report.unreachable, 2);
    assert_eq!(report.pending, 0);
    assert_eq!(controller.state().await, RunState::Completed);

    let records = controller.aggregator().rows().await;
    let status_of = |address: &str| {
        records
            .iter()
            .find(|r| r.address == address)
            .map(|r| r.status)
            .unwrap()
    };
    assert_eq!(status_of("1.1.1.1:8080"), ProbeStatus::Success);
    assert_eq!(status_of("bad addr"), ProbeStatus::InvalidAddress);
    assert_eq!(status_of("2.2.2.2:3128"), ProbeStatus::Failed);

    let exports = controller.exports().await.unwrap();
    assert_eq!(exports.reachable_addresses(), vec!["1.1.1.1:8080"]);
    let mut unreachable = exports.unreachable_addresses();
    unreachable.sort();
    assert_eq!(unreachable, vec!["2.2.2.2:3128", "bad addr"]);
    assert_partitions_match(&records, &exports.reachable_addresses(), &exports.unreachable_addresses());
}

#[tokio::test]
async fn zero_concurrency_is_rejected_and_stays_idle() {
    let controller = RunController::new(ScriptedProbe);
    controller.load(["1.1.1.1:8080"], ProxyScheme::Http).await.unwrap();

    let err = controller
        .start(RunConfig::new().with_max_concurrent(0))
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Config(ConfigError::InvalidConcurrency(0))));
    assert_eq!(controller.state().await, RunState::Idle);

    let tally = controller.aggregator().tally().await;
    assert_eq!(tally.pending, 1);
}

#[tokio::test]
async fn oversized_concurrency_is_rejected_and_stays_idle() {
    let controller = RunController::new(ScriptedProbe);
    controller.load(["1.1.1.1:8080"], ProxyScheme::Http).await.unwrap();

    let err = controller
        .start(RunConfig::new().with_max_concurrent(usize::MAX))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Config(ConfigError::InvalidConcurrency(usize::MAX))
    ));
    assert_eq!(controller.state().await, RunState::Idle);
    assert_eq!(controller.aggregator().tally().await.pending, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn completed_run_leaves_no_pending_records() {
    for max_concurrent in [1, 3, 16] {
        let probe = Arc::new(TrackingProbe::default());
        let controller = RunController::new(Arc::clone(&probe));
        controller.load(addresses(40), ProxyScheme::Socks5).await.unwrap();

        let report = controller
            .run(RunConfig::new().with_max_concurrent(max_concurrent))
            .await
            .unwrap();
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.pending, 0);
        assert_eq!(report.reachable + report.unreachable, 40);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 40);

        let records = controller.aggregator().rows().await;
        assert!(records.iter().all(|r| r.status.is_terminal()));

        let exports = controller.exports().await.unwrap();
        assert_eq!(exports.len(), 40);
        let unique: HashSet<_> = exports
            .reachable_addresses()
            .into_iter()
            .chain(exports.unreachable_addresses())
            .collect();
        assert_eq!(unique.len(), 40);
        assert_partitions_match(&records, &exports.reachable_addresses(), &exports.unreachable_addresses());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrency_bound_is_respected() {
    for max_concurrent in [1, 5, 50] {
        let probe = Arc::new(TrackingProbe::default());
        let controller = RunController::new(Arc::clone(&probe));
        controller.load(addresses(120), ProxyScheme::Http).await.unwrap();

        let report = controller
            .run(RunConfig::new().with_max_concurrent(max_concurrent))
            .await
            .unwrap();
        assert_eq!(report.state, RunState::Completed);

        let peak = probe.peak.load(Ordering::SeqCst);
        assert!(peak >= 1);
        assert!(
            peak <= max_concurrent,
            "peak {} exceeded bound {}",
            peak,
            max_concurrent
        );
    }
}

#[tokio::test]
async fn stop_immediately_after_start_cancels() {
    let probe = LatchProbe::new();
    let controller = RunController::new(Arc::clone(&probe));
    controller.load(addresses(100), ProxyScheme::Http).await.unwrap();

    let handle = controller
        .start(RunConfig::new().with_max_concurrent(10))
        .await
        .unwrap();
    assert!(controller.stop().await);
    probe.open();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.state, RunState::Cancelled);
    assert!(report.admitted <= 10);
    assert!(report.reachable + report.unreachable <= 10);
    assert!(report.pending >= 90);
    assert_eq!(probe.started.load(Ordering::SeqCst), report.admitted);
    assert_eq!(controller.state().await, RunState::Cancelled);

    let records = controller.aggregator().rows().await;
    let exports = controller.exports().await.unwrap();
    assert_eq!(exports.len(), report.admitted);
    assert_partitions_match(&records, &exports.reachable_addresses(), &exports.unreachable_addresses());
}

#[tokio::test]
async fn stop_lets_admitted_probes_finish() {
    let probe = LatchProbe::new();
    let controller = RunController::new(Arc::clone(&probe));
    controller.load(addresses(20), ProxyScheme::Http).await.unwrap();

    let handle = controller
        .start(RunConfig::new().with_max_concurrent(3))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while probe.started.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("three probes should be admitted");

    handle.stop();
    probe.open();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.state, RunState::Cancelled);
    assert_eq!(report.admitted, 3);
    assert_eq!(report.reachable, 3);
    assert_eq!(report.pending, 17);
    assert_eq!(probe.started.load(Ordering::SeqCst), 3);

    // first three in load order were the ones admitted
    let first_three: Vec<_> = addresses(20).into_iter().take(3).collect();
    let mut reachable = controller.exports().await.unwrap().reachable_addresses();
    reachable.sort();
    let mut expected = first_three.clone();
    expected.sort();
    assert_eq!(reachable, expected);
}

#[tokio::test]
async fn second_start_while_running_is_rejected() {
    let probe = LatchProbe::new();
    let controller = RunController::new(Arc::clone(&probe));
    controller.load(addresses(5), ProxyScheme::Http).await.unwrap();

    let handle = controller.start(RunConfig::new().with_max_concurrent(2)).await.unwrap();
    assert_eq!(controller.state().await, RunState::Running);

    assert!(matches!(
        controller.start(RunConfig::new()).await,
        Err(RunError::AlreadyRunning)
    ));
    assert!(matches!(
        controller.load(["x:1"], ProxyScheme::Http).await,
        Err(RunError::AlreadyRunning)
    ));
    assert!(matches!(controller.exports().await, Err(RunError::AlreadyRunning)));

    probe.open();
    let report = handle.wait().await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.reachable, 5);
}

#[tokio::test]
async fn sorting_during_run_does_not_misdirect_results() {
    let probe = LatchProbe::new();
    let controller = RunController::new(Arc::clone(&probe));
    controller
        .load(["c:3", "a:1", "b:2"], ProxyScheme::Http)
        .await
        .unwrap();

    let handle = controller.start(RunConfig::new().with_max_concurrent(1)).await.unwrap();
    controller
        .aggregator()
        .sort_by(proxy_vet::SortColumn::Address, false)
        .await;
    probe.open();
    handle.wait().await.unwrap();

    let rows = controller.aggregator().rows().await;
    let order: Vec<_> = rows.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(order, vec!["c:3", "b:2", "a:1"]);
    assert!(rows.iter().all(|r| r.status == ProbeStatus::Success));
    assert_eq!(controller.exports().await.unwrap().reachable.len(), 3);
}
