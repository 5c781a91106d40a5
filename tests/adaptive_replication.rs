//! Adaptive replication integration tests
//!
//! Drives the scheduler, feedback path and manager through their public API.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;

use replicator::config::{Config, InvalidCostAction};
use replicator::domain::{CandidateOption, FailureCause, Params, ReplicationJob, ReplicationResult, TaskConfig};
use replicator::error::{ReplicatorError, Result};
use replicator::executor::{CommandWorkload, Workload, WorkloadOutput};
use replicator::feedback::{FailureReporter, FeedbackCollector, MemoryReporter, QuarantineReport, ReportDispatcher};
use replicator::manager::ReplicationManager;
use replicator::options::{FnOptionGenerator, OptionGenerator, StaticOptionGenerator};
use replicator::plan::Plan;
use replicator::policy::{BanditPolicy, EpsilonGreedyPolicy, PolicyError, PolicyFactory, RoundRobinPolicy};
use replicator::replication::{ReplicationRecord, ReplicationRegistry, min_replications_or};
use replicator::scheduler::{AdaptiveScheduler, TaskState};

fn options(n: usize) -> Vec<CandidateOption> {
    (0..n).map(|i| CandidateOption::new(format!("opt{}", i), Params::new())).collect()
}

fn round_robin() -> PolicyFactory {
    Arc::new(|| Box::new(RoundRobinPolicy::new()) as Box<dyn BanditPolicy>)
}

fn scheduler_with(generator: Arc<dyn OptionGenerator>, min_reps: usize, factory: PolicyFactory) -> AdaptiveScheduler {
    AdaptiveScheduler::new(
        Arc::new(ReplicationRegistry::new()),
        generator,
        min_replications_or(min_reps),
        factory,
    )
}

/// Plays a fixed script, then picks the eligible option with the lowest mean cost.
struct ScriptedPolicy {
    state: Mutex<ScriptState>,
}

struct ScriptState {
    script: VecDeque<usize>,
    sums: Vec<f64>,
    counts: Vec<u32>,
    quarantined: Vec<bool>,
}

impl ScriptedPolicy {
    fn new(script: &[usize]) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                script: script.iter().copied().collect(),
                sums: Vec::new(),
                counts: Vec::new(),
                quarantined: Vec::new(),
            }),
        }
    }
}

impl BanditPolicy for ScriptedPolicy {
    fn init(&mut self, num_options: usize, _min_reps: usize) -> std::result::Result<(), PolicyError> {
        let state = self.state.get_mut().unwrap();
        state.sums = vec![0.0; num_options];
        state.counts = vec![0; num_options];
        state.quarantined = vec![false; num_options];
        Ok(())
    }

    fn next_choice(&self) -> Option<usize> {
        let mut state = self.state.lock().unwrap();
        if let Some(next) = state.script.pop_front() {
            return Some(next);
        }
        let eligible: Vec<usize> = (0..state.sums.len()).filter(|&i| !state.quarantined[i]).collect();
        eligible
            .iter()
            .copied()
            .filter(|&i| state.counts[i] > 0)
            .min_by(|&a, &b| {
                let ma = state.sums[a] / state.counts[a] as f64;
                let mb = state.sums[b] / state.counts[b] as f64;
                ma.total_cmp(&mb)
            })
            .or_else(|| eligible.first().copied())
    }

    fn receive_reward(&self, index: usize, cost: f64) {
        let mut state = self.state.lock().unwrap();
        state.sums[index] += cost;
        state.counts[index] += 1;
    }

    fn quarantine(&self, index: usize) {
        self.state.lock().unwrap().quarantined[index] = true;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_initialize_once() {
    let generations = Arc::new(AtomicUsize::new(0));
    let policies = Arc::new(AtomicUsize::new(0));

    let generator = {
        let generations = generations.clone();
        Arc::new(FnOptionGenerator::new(move |_task: &TaskConfig| {
            generations.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
            Ok(options(4))
        }))
    };
    let factory: PolicyFactory = {
        let policies = policies.clone();
        Arc::new(move || {
            policies.fetch_add(1, Ordering::SeqCst);
            Box::new(RoundRobinPolicy::new()) as Box<dyn BanditPolicy>
        })
    };
    let scheduler = Arc::new(scheduler_with(generator, 1, factory));
    let task = TaskConfig::new("contended", Params::new());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let scheduler = scheduler.clone();
        let task = task.clone();
        handles.push(tokio::spawn(async move { scheduler.prepare(&task).await.unwrap() }));
    }
    for handle in handles {
        let job = handle.await.unwrap();
        assert!(job.option_index < 4);
    }

    assert_eq!(generations.load(Ordering::SeqCst), 1);
    assert_eq!(policies.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.registry().len(), 1);
    assert_eq!(scheduler.state(&task.id), TaskState::Active);
}

#[tokio::test]
async fn test_scenario_lower_cost_option_preferred_with_scripted_policy() {
    let factory: PolicyFactory = Arc::new(|| Box::new(ScriptedPolicy::new(&[0, 0, 0, 1, 1, 1])) as Box<dyn BanditPolicy>);
    let scheduler = scheduler_with(Arc::new(StaticOptionGenerator::new(options(3))), 2, factory);
    let task = TaskConfig::new("a", Params::new());

    let mut jobs = Vec::new();
    for _ in 0..6 {
        jobs.push(scheduler.prepare(&task).await.unwrap());
    }
    let indexes: Vec<usize> = jobs.iter().map(|j| j.option_index).collect();
    assert_eq!(indexes, vec![0, 0, 0, 1, 1, 1]);

    let record = scheduler.registry().get(&task.id).unwrap();
    for (job, cost) in jobs.iter().zip([5.0, 5.0, 5.0, 1.0, 1.0, 1.0]) {
        record.register_outcome(job.option_index, cost, false).unwrap();
    }
    assert_eq!(record.mean_cost(0), Some(5.0));
    assert_eq!(record.mean_cost(1), Some(1.0));

    let seventh = scheduler.prepare(&task).await.unwrap();
    assert_eq!(seventh.option_index, 1);
}

#[tokio::test]
async fn test_scenario_lower_cost_option_preferred_statistically() {
    let factory: PolicyFactory =
        Arc::new(|| Box::new(EpsilonGreedyPolicy::with_seed(0.1, 7)) as Box<dyn BanditPolicy>);
    let scheduler = scheduler_with(Arc::new(StaticOptionGenerator::new(options(3))), 2, factory);
    let task = TaskConfig::new("a", Params::new());

    // Warm-up: six concurrent requests cover every option twice.
    let mut warm_up = [0usize; 3];
    for _ in 0..6 {
        warm_up[scheduler.prepare(&task).await.unwrap().option_index] += 1;
    }
    assert_eq!(warm_up, [2, 2, 2]);

    let record = scheduler.registry().get(&task.id).unwrap();
    for (index, cost) in [(0, 5.0), (0, 5.0), (0, 5.0), (1, 1.0), (1, 1.0), (1, 1.0)] {
        record.register_outcome(index, cost, false).unwrap();
    }

    let mut counts = [0usize; 3];
    for _ in 0..300 {
        counts[scheduler.prepare(&task).await.unwrap().option_index] += 1;
    }
    assert!(counts[1] > counts[0]);
    assert!(counts[1] > counts[2]);
    assert!(counts[1] > 200);
}

/// Option 0 always fails; the rest succeed at cost 1.
struct OptionZeroFails;

#[async_trait]
impl Workload for OptionZeroFails {
    async fn run(&self, job: &ReplicationJob) -> WorkloadOutput {
        if job.option_index == 0 {
            WorkloadOutput::Failed(FailureCause::Error("always fails".to_string()))
        } else {
            WorkloadOutput::with_cost(1.0)
        }
    }
}

fn single_worker_config() -> Config {
    let mut config = Config::default();
    config.scheduler.max_workers = 1;
    config.scheduler.default_min_replications = 1;
    config
}

#[tokio::test]
async fn test_scenario_failed_option_never_reselected() {
    let reporter = Arc::new(MemoryReporter::new());
    let manager = ReplicationManager::with_policy(
        &single_worker_config(),
        Arc::new(StaticOptionGenerator::new(options(2))),
        Arc::new(OptionZeroFails),
        reporter.clone(),
        Arc::new(|| Box::new(ScriptedPolicy::new(&[0])) as Box<dyn BanditPolicy>),
    );
    let task = TaskConfig::new("b", Params::new());

    let mut indexes = Vec::new();
    for _ in 0..10 {
        let event = manager.schedule_replication(&task).await.unwrap().wait().await.unwrap();
        indexes.push(event.option_index);
    }
    assert_eq!(indexes[0], 0);
    assert!(indexes[1..].iter().all(|&i| i == 1));

    let snapshot = manager.snapshot(&task.id).unwrap();
    assert!(snapshot.options[0].quarantined);
    assert_eq!(snapshot.options[1].replications, 9);

    manager.flush_reports().await;
    let reports = reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].option_name, "opt0");
    assert!(reports[0].newly_quarantined);
    assert!(reports[0].job_id.is_some());
}

#[tokio::test]
async fn test_scenario_empty_options_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let generator = {
        let calls = calls.clone();
        Arc::new(FnOptionGenerator::new(move |_task: &TaskConfig| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }))
    };
    let scheduler = scheduler_with(generator, 1, round_robin());
    let task = TaskConfig::new("c", Params::new());

    for attempt in 1..=3 {
        let err = scheduler.prepare(&task).await.unwrap_err();
        assert!(matches!(err, ReplicatorError::NoOptions(_)));
        assert!(err.is_fatal_for_task());
        assert_eq!(calls.load(Ordering::SeqCst), attempt);
        assert!(scheduler.registry().get(&task.id).is_none());
        assert_eq!(scheduler.state(&task.id), TaskState::Uninitialized);
    }
}

#[tokio::test]
async fn test_generator_error_surfaces_and_retries() {
    let calls = Arc::new(AtomicUsize::new(0));
    let generator = {
        let calls = calls.clone();
        Arc::new(FnOptionGenerator::new(move |task: &TaskConfig| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ReplicatorError::OptionGeneration {
                    task: task.id.clone(),
                    reason: "catalog unavailable".to_string(),
                })
            } else {
                Ok(options(2))
            }
        }))
    };
    let scheduler = scheduler_with(generator, 1, round_robin());
    let task = TaskConfig::new("flaky", Params::new());

    assert!(matches!(
        scheduler.prepare(&task).await,
        Err(ReplicatorError::OptionGeneration { .. })
    ));
    assert!(scheduler.prepare(&task).await.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_exhaustion_is_terminal() {
    let scheduler = scheduler_with(Arc::new(StaticOptionGenerator::new(options(2))), 1, round_robin());
    let task = TaskConfig::new("doomed", Params::new());
    scheduler.prepare(&task).await.unwrap();

    let record = scheduler.registry().get(&task.id).unwrap();
    record.register_outcome(0, 0.0, true).unwrap();
    record.register_outcome(1, 0.0, true).unwrap();

    // Late results from replications still in flight do not revive the task.
    record.register_outcome(1, 3.0, false).unwrap();
    record.register_outcome(0, 0.0, true).unwrap();

    for _ in 0..5 {
        assert!(matches!(
            scheduler.prepare(&task).await,
            Err(ReplicatorError::Exhausted(_))
        ));
        assert_eq!(scheduler.state(&task.id), TaskState::Exhausted);
    }

    scheduler.registry().forget(&task.id);
    assert_eq!(scheduler.state(&task.id), TaskState::Uninitialized);
    assert!(scheduler.prepare(&task).await.is_ok());
}

/// Never finishes a report.
struct StuckReporter {
    started: AtomicUsize,
}

#[async_trait]
impl FailureReporter for StuckReporter {
    async fn report(&self, _report: &QuarantineReport) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_stuck_reporter_does_not_block_feedback() {
    let reporter = Arc::new(StuckReporter {
        started: AtomicUsize::new(0),
    });
    let mut config = single_worker_config();
    config.feedback.report_queue = 1;
    let manager = ReplicationManager::with_policy(
        &config,
        Arc::new(StaticOptionGenerator::new(options(5))),
        Arc::new(AlwaysFails),
        reporter.clone(),
        round_robin(),
    );
    let task = TaskConfig::new("noisy", Params::new());

    let summary = tokio::time::timeout(Duration::from_secs(5), manager.run_task(&task, 5))
        .await
        .expect("feedback path blocked on reporter")
        .unwrap();

    assert!(summary.exhausted());
    assert_eq!(summary.dispatched, 5);
    assert!(manager.dropped_reports() >= 3);
}

struct AlwaysFails;

#[async_trait]
impl Workload for AlwaysFails {
    async fn run(&self, _job: &ReplicationJob) -> WorkloadOutput {
        WorkloadOutput::Failed(FailureCause::Crashed("oom".to_string()))
    }
}

#[tokio::test]
async fn test_invalid_cost_quarantines_through_collector() {
    let registry = Arc::new(ReplicationRegistry::new());
    let reporter = Arc::new(MemoryReporter::new());
    let (dispatcher, _task) = ReportDispatcher::spawn(reporter.clone(), 8);
    let collector = FeedbackCollector::new(registry.clone(), dispatcher, InvalidCostAction::Quarantine);

    let task = TaskConfig::new("neg", Params::new());
    let generator = StaticOptionGenerator::new(options(2));
    registry
        .get_or_create(&task, &generator, &min_replications_or(1), &round_robin())
        .await
        .unwrap();

    collector
        .on_completion(&task.id, 0, &ReplicationResult::success(-0.5))
        .unwrap();
    assert!(registry.get(&task.id).unwrap().is_quarantined(0));

    collector.reports().flush().await;
    assert_eq!(reporter.reports()[0].cause, FailureCause::InvalidCost(-0.5));
}

/// Sleeps, then fails when the adapted params carry `doomed: true`.
struct SlowUnlessHealthy(u64);

#[async_trait]
impl Workload for SlowUnlessHealthy {
    async fn run(&self, job: &ReplicationJob) -> WorkloadOutput {
        tokio::time::sleep(Duration::from_millis(self.0)).await;
        if job.params.get_path("doomed") == Some(&serde_json::json!(true)) {
            WorkloadOutput::Failed(FailureCause::Error("doomed".to_string()))
        } else {
            WorkloadOutput::completed()
        }
    }
}

#[tokio::test]
async fn test_late_feedback_after_forget_does_not_reach_new_record() {
    let calls = Arc::new(AtomicUsize::new(0));
    let generator = {
        let calls = calls.clone();
        Arc::new(FnOptionGenerator::new(move |_task: &TaskConfig| {
            let mut opts = options(2);
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                opts[0].overrides.set_path("doomed", serde_json::json!(true));
            }
            Ok(opts)
        }))
    };
    let reporter = Arc::new(MemoryReporter::new());
    let manager = ReplicationManager::with_policy(
        &single_worker_config(),
        generator,
        Arc::new(SlowUnlessHealthy(30)),
        reporter.clone(),
        round_robin(),
    );
    let task = TaskConfig::new("reset", Params::new());

    let old = manager.schedule_replication(&task).await.unwrap();
    assert_eq!(old.option_index, 0);
    assert!(manager.forget(&task.id));
    let new = manager.schedule_replication(&task).await.unwrap();
    assert_eq!(new.option_index, 0);
    assert_ne!(old.generation, new.generation);

    let old_event = old.wait().await.unwrap();
    assert!(old_event.result.is_failure());
    let new_event = new.wait().await.unwrap();
    assert!(!new_event.result.is_failure());

    let snapshot = manager.snapshot(&task.id).unwrap();
    assert!(snapshot.options.iter().all(|o| !o.quarantined));
    assert_eq!(snapshot.executed_reps, 1);
    assert_eq!(manager.state(&task.id), TaskState::Active);

    manager.flush_reports().await;
    assert!(reporter.is_empty());
}

#[tokio::test]
async fn test_wall_clock_cost_ignores_time_queued() {
    let manager = ReplicationManager::with_policy(
        &single_worker_config(),
        Arc::new(StaticOptionGenerator::new(options(1))),
        Arc::new(SlowUnlessHealthy(40)),
        Arc::new(MemoryReporter::new()),
        round_robin(),
    );
    let task = TaskConfig::new("queued", Params::new());

    let mut handles = Vec::new();
    for _ in 0..4 {
        handles.push(manager.schedule_replication(&task).await.unwrap());
    }
    for handle in handles {
        let cost = handle.wait().await.unwrap().result.cost().unwrap();
        assert!(cost < 0.08, "charged {}s for a 40ms replication", cost);
    }
    let history = manager.registry().get(&task.id).unwrap().history(0);
    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn test_shutdown_leaves_queued_options_unquarantined() {
    let reporter = Arc::new(MemoryReporter::new());
    let manager = ReplicationManager::with_policy(
        &single_worker_config(),
        Arc::new(StaticOptionGenerator::new(options(3))),
        Arc::new(SlowUnlessHealthy(50)),
        reporter.clone(),
        round_robin(),
    );
    let task = TaskConfig::new("closing", Params::new());

    let mut handles = Vec::new();
    for _ in 0..3 {
        handles.push(manager.schedule_replication(&task).await.unwrap());
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    let registry = manager.registry().clone();
    manager.shutdown().await;

    let mut finished = Vec::new();
    for handle in handles {
        if let Some(event) = handle.wait().await {
            finished.push(event);
        }
    }
    assert_eq!(finished.len(), 1);
    assert!(!finished[0].result.is_failure());

    let record = registry.get(&task.id).unwrap();
    assert!(record.quarantined().is_empty());
    assert_eq!(record.executed_reps(), 1);
    assert!(reporter.is_empty());
}

#[tokio::test]
async fn test_plan_run_with_command_workload() {
    let plan = Plan::parse(
        r#"
tasks:
  - id: shell
    replications: 12
    command: 'test "$REPLICATOR_OPTION" != 2 || exit 1; echo "cost=$(( REPLICATOR_OPTION + 1 ))"'
    timeout-ms: 5000
    options:
      - name: one
      - name: two
      - name: broken
"#,
    )
    .unwrap();
    let reporter = Arc::new(MemoryReporter::new());
    let mut config = Config::default();
    config.scheduler.max_workers = 2;
    config.scheduler.default_min_replications = 1;
    config.policy.epsilon = 0.0;
    config.policy.seed = Some(1);

    let manager = ReplicationManager::new(
        &config,
        Arc::new(plan.option_generator().unwrap()),
        Arc::new(CommandWorkload::new()),
        reporter.clone(),
    );
    let plan_task = plan.find("shell").unwrap();
    let summary = manager
        .run_task(&plan_task.task_config(), plan_task.replications)
        .await
        .unwrap();

    assert_eq!(summary.dispatched, 12);
    assert_eq!(summary.state, TaskState::Active);
    let snapshot = summary.snapshot.unwrap();
    assert!(snapshot.options[2].quarantined);
    assert_eq!(snapshot.options[0].mean_cost, Some(1.0));
    assert_eq!(snapshot.options[1].mean_cost, Some(2.0));
    assert_eq!(snapshot.best_option().map(|o| o.index), Some(0));
    assert!(snapshot.options[0].replications > snapshot.options[1].replications);

    manager.flush_reports().await;
    assert!(reporter.reports().iter().all(|r| r.option_index == 2));
    assert!(!reporter.is_empty());
}

#[derive(Debug, Clone)]
enum Feedback {
    Success(usize, f64),
    Failure(usize),
}

fn arb_feedback(n: usize) -> impl Strategy<Value = Feedback> {
    prop_oneof![
        4 => (0..n, 0.0f64..100.0).prop_map(|(i, c)| Feedback::Success(i, c)),
        1 => (0..n).prop_map(Feedback::Failure),
    ]
}

proptest! {
    /// Histories only grow, existing entries never change, and a quarantined
    /// option stays quarantined.
    #[test]
    fn prop_history_is_monotonic(ops in prop::collection::vec(arb_feedback(4), 0..64)) {
        let task = TaskConfig::new("prop", Params::new());
        let record = ReplicationRecord::new(&task, options(4), Box::new(RoundRobinPolicy::new()), 1).unwrap();

        let mut previous: Vec<Vec<f64>> = vec![Vec::new(); 4];
        let mut quarantined = vec![false; 4];
        for op in &ops {
            match *op {
                Feedback::Success(i, cost) => { record.register_outcome(i, cost, false).unwrap(); }
                Feedback::Failure(i) => {
                    record.register_outcome(i, 0.0, true).unwrap();
                    quarantined[i] = true;
                }
            }
            for (i, before) in previous.iter_mut().enumerate() {
                let now = record.history(i);
                prop_assert!(now.len() >= before.len());
                prop_assert_eq!(&now[..before.len()], &before[..]);
                prop_assert_eq!(record.is_quarantined(i), quarantined[i]);
                *before = now;
            }
        }
        prop_assert_eq!(record.executed_reps(), ops.len() as u64);
        prop_assert_eq!(record.is_exhausted(), quarantined.iter().all(|&q| q));
    }
}
