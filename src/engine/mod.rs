//! Suite execution engine: runs hooks and tests of a single suite

mod invoke;
mod listener;
mod suite;
mod suite_method;

pub use invoke::{run_guarded, Execution};
pub use listener::{Listeners, SuiteEvent, SuiteListener, TracingListener};
pub use suite::{SuiteState, TestSuite};
pub use suite_method::SuiteMethod;
pub use test::{format_title, Test};
