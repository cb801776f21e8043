//! Suite lifecycle listeners
//!
//! Listeners may be called from several workers at once and must do their
//! own synchronization. A failing or panicking listener is logged. Only a
//! failed start notification affects the suite, which is then skipped.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{info, warn};

use super::suite::TestSuite;

/// Suite lifecycle events
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuiteEvent {
    Start,
    Finish,
    Skip,
}

impl fmt::Display for SuiteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuiteEvent::Start => write!(f, "OnSuiteStart"),
            SuiteEvent::Finish => write!(f, "OnSuiteFinish"),
            SuiteEvent::Skip => write!(f, "OnSuiteSkip"),
        }
    }
}

/// Subscriber to suite lifecycle events
pub trait SuiteListener: Send + Sync {
    fn on_suite_start(&self, _suite: &TestSuite) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_suite_finish(&self, _suite: &TestSuite) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_suite_skip(&self, _suite: &TestSuite) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Registered listeners, shared by every suite of a run
#[derive(Clone, Default)]
pub struct Listeners {
    listeners: Vec<Arc<dyn SuiteListener>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn SuiteListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `event` to every listener.
    ///
    /// Start notification stops at the first failing listener and reports it;
    /// other events keep going and only log failures.
    pub fn notify(&self, event: SuiteEvent, suite: &TestSuite) -> Result<(), String> {
        let mut first_failure = None;

        for listener in &self.listeners {
            let delivered = catch_unwind(AssertUnwindSafe(|| match event {
                SuiteEvent::Start => listener.on_suite_start(suite),
                SuiteEvent::Finish => listener.on_suite_finish(suite),
                SuiteEvent::Skip => listener.on_suite_skip(suite),
            }));

            let failure = match delivered {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{err:#}"),
                Err(payload) => payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "listener panicked".to_string()),
            };

            warn!(
                "Exception occurred during {} event invoke for suite '{}': {}",
                event,
                suite.full_name(),
                failure
            );

            if first_failure.is_none() {
                first_failure = Some(failure);
            }
            if event == SuiteEvent::Start {
                break;
            }
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

/// Emits a structured log event for every suite lifecycle change
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingListener;

impl SuiteListener for TracingListener {
    fn on_suite_start(&self, suite: &TestSuite) -> anyhow::Result<()> {
        info!(
            suite_id = %suite.outcome().id,
            tests = suite.tests().len(),
            "suite '{}' started",
            suite.full_name()
        );
        Ok(())
    }

    fn on_suite_finish(&self, suite: &TestSuite) -> anyhow::Result<()> {
        let outcome = suite.outcome();
        info!(
            suite_id = %outcome.id,
            passed = outcome.passed(),
            failed = outcome.failed(),
            skipped = outcome.skipped(),
            "suite '{}' finished: {}",
            suite.full_name(),
            outcome.result
        );
        Ok(())
    }

    fn on_suite_skip(&self, suite: &TestSuite) -> anyhow::Result<()> {
        info!(
            suite_id = %suite.outcome().id,
            reason = suite.outcome().skip_reason.as_deref().unwrap_or_default(),
            "suite '{}' skipped",
            suite.full_name()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::models::SuiteDescriptor;
    use std::sync::Mutex;

    struct Named {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
        fails: bool,
        panics: bool,
    }

    impl Named {
        fn new(name: &'static str, seen: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                seen: seen.clone(),
                fails: false,
                panics: false,
            }
        }

        fn record(&self, event: &str) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(format!("{}:{}", self.name, event));
            if self.panics {
                panic!("{} exploded", self.name);
            }
            anyhow::ensure!(!self.fails, "{} refused {}", self.name, event);
            Ok(())
        }
    }

    impl SuiteListener for Named {
        fn on_suite_start(&self, _suite: &TestSuite) -> anyhow::Result<()> {
            self.record("start")
        }

        fn on_suite_finish(&self, _suite: &TestSuite) -> anyhow::Result<()> {
            self.record("finish")
        }
    }

    fn suite() -> TestSuite {
        TestSuite::new(
            &SuiteDescriptor::new("Listened"),
            None,
            Arc::new(RunConfig::default()),
            Listeners::new(),
        )
    }

    #[test]
    fn test_start_stops_at_first_failure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        listeners.register(Arc::new(Named::new("first", &seen)));
        listeners.register(Arc::new(Named {
            fails: true,
            ..Named::new("second", &seen)
        }));
        listeners.register(Arc::new(Named::new("third", &seen)));

        let result = listeners.notify(SuiteEvent::Start, &suite());

        assert_eq!(result, Err("second refused start".to_string()));
        assert_eq!(*seen.lock().unwrap(), ["first:start", "second:start"]);
    }

    #[test]
    fn test_finish_reaches_every_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        listeners.register(Arc::new(Named {
            panics: true,
            ..Named::new("first", &seen)
        }));
        listeners.register(Arc::new(Named::new("second", &seen)));

        let result = listeners.notify(SuiteEvent::Finish, &suite());

        assert_eq!(result, Err("first exploded".to_string()));
        assert_eq!(*seen.lock().unwrap(), ["first:finish", "second:finish"]);
    }

    #[test]
    fn test_default_methods_succeed() {
        let mut listeners = Listeners::new();
        listeners.register(Arc::new(TracingListener));
        assert_eq!(listeners.len(), 1);

        let suite = suite();
        assert!(listeners.notify(SuiteEvent::Start, &suite).is_ok());
        assert!(listeners.notify(SuiteEvent::Skip, &suite).is_ok());
        assert_eq!(SuiteEvent::Skip.to_string(), "OnSuiteSkip");
    }
}
