//! Parallel suite scheduling
//!
//! Distributes planned suites over workers according to `ParallelBy`.
//! Finished suite outcomes flow through a channel to a single collector.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::runner::PlannedSuite;
use crate::config::{ParallelBy, RunConfig};
use crate::engine::Listeners;
use crate::models::SuiteOutcome;

type Collected = (usize, SuiteOutcome);

/// Runs planned suites with the configured granularity and worker count
pub struct SuiteScheduler {
    config: Arc<RunConfig>,
    listeners: Listeners,
}

impl SuiteScheduler {
    pub fn new(config: Arc<RunConfig>, listeners: Listeners) -> Self {
        Self { config, listeners }
    }

    /// Run every planned suite, returning outcomes in plan order
    pub async fn schedule(&self, planned: Vec<PlannedSuite>) -> Vec<SuiteOutcome> {
        let expected = planned.len();
        let (tx, mut rx) = mpsc::channel::<Collected>(expected.max(1));

        let collector = tokio::spawn(async move {
            let mut collected = Vec::with_capacity(expected);
            while let Some(item) = rx.recv().await {
                collected.push(item);
            }
            collected
        });

        info!(
            "Scheduling {} suite(s) by {} on {} thread(s)",
            expected, self.config.parallel_by, self.config.threads
        );

        match self.config.parallel_by {
            ParallelBy::Assembly => self.by_assembly(planned, tx).await,
            ParallelBy::Suite => self.by_suite(planned, tx).await,
            ParallelBy::Test => self.serially(planned, tx).await,
        }

        let mut collected = match collector.await {
            Ok(collected) => collected,
            Err(e) => {
                error!("Outcome collector failed: {}", e);
                Vec::new()
            }
        };
        if collected.len() != expected {
            warn!("Collected {} of {} suite outcomes", collected.len(), expected);
        }

        collected.sort_by_key(|(index, _)| *index);
        collected.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Suites of one assembly run serially; assemblies run in parallel
    async fn by_assembly(&self, planned: Vec<PlannedSuite>, tx: mpsc::Sender<Collected>) {
        let semaphore = Arc::new(Semaphore::new(self.config.threads));
        let mut handles = Vec::new();

        for (assembly, suites) in group_by_assembly(planned) {
            let semaphore = semaphore.clone();
            let config = self.config.clone();
            let listeners = self.listeners.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                debug!("Assembly '{}': {} suite(s)", assembly, suites.len());
                for suite in suites {
                    run_and_send(suite, config.clone(), listeners.clone(), &tx).await;
                }
            }));
        }

        await_workers(handles).await;
    }

    /// Every suite is its own task, at most `threads` at a time
    async fn by_suite(&self, planned: Vec<PlannedSuite>, tx: mpsc::Sender<Collected>) {
        let semaphore = Arc::new(Semaphore::new(self.config.threads));
        let mut handles = Vec::new();

        for suite in planned {
            let semaphore = semaphore.clone();
            let config = self.config.clone();
            let listeners = self.listeners.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                run_and_send(suite, config, listeners, &tx).await;
            }));
        }

        await_workers(handles).await;
    }

    /// Suites one after another; each suite runs its tests in parallel
    async fn serially(&self, planned: Vec<PlannedSuite>, tx: mpsc::Sender<Collected>) {
        for suite in planned {
            run_and_send(suite, self.config.clone(), self.listeners.clone(), &tx).await;
        }
    }
}

async fn run_and_send(
    planned: PlannedSuite,
    config: Arc<RunConfig>,
    listeners: Listeners,
    tx: &mpsc::Sender<Collected>,
) {
    let mut suite = planned.instantiate(config, listeners);
    suite.execute().await;

    if tx.send((planned.index, suite.into_outcome())).await.is_err() {
        warn!("Outcome of suite '{}' dropped: collector closed", planned.full_name());
    }
}

async fn await_workers(handles: Vec<JoinHandle<()>>) {
    for joined in join_all(handles).await {
        if let Err(e) = joined {
            error!("Suite worker failed: {}", e);
        }
    }
}

/// Group suites by assembly, keeping first-seen order of assemblies and suites
fn group_by_assembly(planned: Vec<PlannedSuite>) -> Vec<(String, Vec<PlannedSuite>)> {
    let mut groups: Vec<(String, Vec<PlannedSuite>)> = Vec::new();

    for suite in planned {
        match groups
            .iter_mut()
            .find(|(assembly, _)| *assembly == suite.descriptor.assembly)
        {
            Some((_, suites)) => suites.push(suite),
            None => groups.push((suite.descriptor.assembly.clone(), vec![suite])),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SuiteDescriptor, TestDescriptor};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    type Log = Arc<Mutex<Vec<String>>>;

    fn sleepy_suite(log: &Log, name: &str, assembly: &str) -> SuiteDescriptor {
        let start_log = log.clone();
        let end_log = log.clone();
        let start = format!("start {name}");
        let end = format!("end {name}");
        SuiteDescriptor::new(name)
            .assembly(assembly)
            .before_suite("open", move |_| {
                start_log.lock().unwrap().push(start.clone());
                Ok(())
            })
            .test(TestDescriptor::new("work", |_| {
                std::thread::sleep(Duration::from_millis(150));
                Ok(())
            }))
            .after_suite("close", move |_| {
                end_log.lock().unwrap().push(end.clone());
                Ok(())
            })
    }

    fn plan(suites: Vec<SuiteDescriptor>) -> Vec<PlannedSuite> {
        suites
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| PlannedSuite {
                index,
                descriptor,
                data_set: None,
            })
            .collect()
    }

    fn scheduler(parallel_by: ParallelBy, threads: usize) -> SuiteScheduler {
        let config = RunConfig::default()
            .with_parallel_by(parallel_by)
            .with_threads(threads);
        SuiteScheduler::new(Arc::new(config), Listeners::new())
    }

    #[test]
    fn test_group_by_assembly_keeps_order() {
        let log = Log::default();
        let groups = group_by_assembly(plan(vec![
            sleepy_suite(&log, "a1", "alpha"),
            sleepy_suite(&log, "b1", "beta"),
            sleepy_suite(&log, "a2", "alpha"),
        ]));

        let shape: Vec<(String, Vec<usize>)> = groups
            .into_iter()
            .map(|(assembly, suites)| (assembly, suites.iter().map(|s| s.index).collect()))
            .collect();
        assert_eq!(
            shape,
            [("alpha".to_string(), vec![0, 2]), ("beta".to_string(), vec![1])]
        );
    }

    #[tokio::test]
    async fn test_suites_of_one_assembly_run_serially() {
        let log = Log::default();
        let planned = plan(vec![
            sleepy_suite(&log, "first", "shop"),
            sleepy_suite(&log, "second", "shop"),
        ]);

        let outcomes = scheduler(ParallelBy::Assembly, 4).schedule(planned).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            *log.lock().unwrap(),
            ["start first", "end first", "start second", "end second"]
        );
    }

    #[tokio::test]
    async fn test_assemblies_run_concurrently() {
        let log = Log::default();
        let planned = plan(vec![
            sleepy_suite(&log, "first", "shop"),
            sleepy_suite(&log, "second", "admin"),
        ]);

        let started = Instant::now();
        let outcomes = scheduler(ParallelBy::Assembly, 2).schedule(planned).await;

        assert!(started.elapsed() < Duration::from_millis(280));
        assert_eq!(outcomes[0].name, "first");
        assert_eq!(outcomes[1].name, "second");
    }

    #[tokio::test]
    async fn test_suite_mode_respects_thread_limit() {
        let log = Log::default();
        let planned = plan(vec![
            sleepy_suite(&log, "one", "x"),
            sleepy_suite(&log, "two", "x"),
            sleepy_suite(&log, "three", "x"),
        ]);

        let started = Instant::now();
        let outcomes = scheduler(ParallelBy::Suite, 1).schedule(planned).await;

        assert!(started.elapsed() >= Duration::from_millis(450));
        let names: Vec<_> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_suite_mode_runs_suites_concurrently() {
        let log = Log::default();
        let planned = plan(vec![
            sleepy_suite(&log, "one", "x"),
            sleepy_suite(&log, "two", "x"),
            sleepy_suite(&log, "three", "x"),
        ]);

        let started = Instant::now();
        let outcomes = scheduler(ParallelBy::Suite, 3).schedule(planned).await;

        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.passed() == 1));
    }

    #[tokio::test]
    async fn test_test_mode_runs_suites_serially() {
        let log = Log::default();
        let planned = plan(vec![
            sleepy_suite(&log, "first", "a"),
            sleepy_suite(&log, "second", "b"),
        ]);

        scheduler(ParallelBy::Test, 4).schedule(planned).await;

        assert_eq!(
            *log.lock().unwrap(),
            ["start first", "end first", "start second", "end second"]
        );
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let outcomes = scheduler(ParallelBy::Suite, 2).schedule(Vec::new()).await;
        assert!(outcomes.is_empty());
    }
}
