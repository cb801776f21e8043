//! Output formatters for run outcomes
//!
//! Provides table, JSON, CSV and summary output.

use serde::Serialize;

use crate::executor::TestInfo;
use crate::models::{RunOutcome, Status, SuiteOutcome, TestOutcome};
use crate::results::write_csv;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }

    fn status(&self, status: Status) -> String {
        let text = format!("{} {}", status.symbol(), status);
        if !self.colorize {
            return text;
        }
        match status {
            Status::Passed => format!("\x1b[32m{text}\x1b[0m"),
            Status::Failed => format!("\x1b[31m{text}\x1b[0m"),
            Status::Skipped => format!("\x1b[33m{text}\x1b[0m"),
        }
    }

    /// Format a single test outcome
    pub fn format_test(&self, test: &TestOutcome) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(test),
            OutputFormat::Csv => format!(
                "{},{},{}",
                csv_field(&test.full_method_name),
                test.result,
                test.execution_time.as_millis()
            ),
            OutputFormat::Summary => format!(
                "{} {} ({}ms)",
                test.result.symbol(),
                test.title,
                test.execution_time.as_millis()
            ),
            OutputFormat::Table => self.format_test_table(test),
        }
    }

    fn format_test_table(&self, test: &TestOutcome) -> String {
        let mut line = format!(
            "{:40} {:>12} [{:>6}ms]",
            test.title,
            self.status(test.result),
            test.execution_time.as_millis()
        );
        if let Some(failure) = &test.failure {
            line.push_str(&format!("\n      {failure}"));
        } else if let Some(reason) = &test.skip_reason {
            line.push_str(&format!("\n      {reason}"));
        }
        line
    }

    /// Format one suite outcome
    pub fn format_suite(&self, suite: &SuiteOutcome) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(suite),
            OutputFormat::Table => self.format_suite_table(suite),
            OutputFormat::Csv | OutputFormat::Summary => self.format_suite_brief(suite),
        }
    }

    fn format_suite_table(&self, suite: &SuiteOutcome) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  {:44} {:>15} ║\n",
            suite.full_name(),
            suite.result.to_string()
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        if let Some(reason) = &suite.skip_reason {
            output.push_str(&format!("  {reason}\n"));
        }
        for test in &suite.tests {
            output.push_str(&format!("  {}\n", self.format_test(test)));
        }
        let failed_hooks: Vec<_> = suite
            .suite_methods
            .iter()
            .filter(|m| m.result == Status::Failed)
            .collect();
        for hook in failed_hooks {
            output.push_str(&format!(
                "  {} hook '{}' {}\n",
                hook.method_type,
                hook.title,
                hook.failure.as_ref().map(ToString::to_string).unwrap_or_default()
            ));
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!(
            "║  Total: {:3} | Passed: {:3} | Failed: {:3} | Skipped: {:3}       ║\n",
            suite.total(),
            suite.passed(),
            suite.failed(),
            suite.skipped()
        ));
        output.push_str(&format!(
            "║  Pass Rate: {:5.1}% | Duration: {:8}ms                    ║\n",
            suite.pass_rate(),
            suite.execution_time.as_millis()
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn format_suite_brief(&self, suite: &SuiteOutcome) -> String {
        format!(
            "{} {}: {}/{} passed, {} failed, {} skipped in {}ms",
            suite.result.symbol(),
            suite.full_name(),
            suite.passed(),
            suite.total(),
            suite.failed(),
            suite.skipped(),
            suite.execution_time.as_millis()
        )
    }

    /// Format a whole run
    pub fn format_run(&self, run: &RunOutcome) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(run),
            OutputFormat::Csv => {
                let mut buffer = Vec::new();
                match write_csv(run, &mut buffer) {
                    Ok(()) => String::from_utf8(buffer).unwrap_or_default(),
                    Err(_) => String::new(),
                }
            }
            OutputFormat::Table => {
                let mut output: String = run
                    .suites
                    .iter()
                    .map(|suite| self.format_suite(suite))
                    .collect();
                output.push('\n');
                output.push_str(&self.format_run_brief(run));
                output.push('\n');
                output
            }
            OutputFormat::Summary => {
                let mut output = String::new();
                for suite in &run.suites {
                    output.push_str(&self.format_suite(suite));
                    output.push('\n');
                }
                output.push_str(&self.format_run_brief(run));
                output.push('\n');
                output
            }
        }
    }

    fn format_run_brief(&self, run: &RunOutcome) -> String {
        format!(
            "Run {}: {} suite(s), {}/{} tests passed ({:.1}%), {} failed, {} skipped in {}ms",
            self.status(run.result()),
            run.suites.len(),
            run.passed(),
            run.total(),
            run.pass_rate(),
            run.failed(),
            run.skipped(),
            run.execution_time.as_millis()
        )
    }

    /// Format the tests a run would execute
    pub fn format_tests(&self, tests: &[TestInfo]) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(tests),
            OutputFormat::Csv => {
                let mut output = String::from("suite,full_name,display_name\n");
                for test in tests {
                    output.push_str(&format!(
                        "{},{},{}\n",
                        csv_field(&test.suite_name),
                        csv_field(&test.full_name),
                        csv_field(&test.display_name)
                    ));
                }
                output
            }
            OutputFormat::Summary => format!("{} test(s) planned\n", tests.len()),
            OutputFormat::Table => {
                let mut output = String::new();
                let mut current_suite: Option<&str> = None;
                for test in tests {
                    if current_suite != Some(test.suite_name.as_str()) {
                        output.push_str(&format!("{}\n", test.suite_name));
                        current_suite = Some(&test.suite_name);
                    }
                    output.push_str(&format!("  {:40} {}\n", test.display_name, test.full_name));
                }
                output.push_str(&format!("\n{} test(s) planned\n", tests.len()));
                output
            }
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Failure;
    use chrono::Utc;
    use std::time::Duration;

    fn run() -> RunOutcome {
        let mut suite = SuiteOutcome::new("Checkout", None);
        let mut pay = TestOutcome::new("pay by card", "Checkout.pay", suite.id);
        pay.result = Status::Passed;
        let mut refund = TestOutcome::new("refund", "Checkout.refund", suite.id);
        refund.result = Status::Failed;
        refund.failure = Some(Failure::panic("gateway down"));
        suite.tests = vec![pay, refund];
        suite.result = Status::Failed;
        RunOutcome::new(Utc::now(), vec![suite], Duration::from_millis(40))
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("json-pretty"), Some(OutputFormat::JsonPretty));
        assert_eq!(OutputFormat::from_str("unknown"), None);
    }

    #[test]
    fn test_table_lists_tests_and_failures() {
        let output = ResultFormatter::new(OutputFormat::Table).no_color().format_run(&run());

        assert!(output.contains("Checkout"));
        assert!(output.contains("pay by card"));
        assert!(output.contains("✗ FAILED"));
        assert!(output.contains("[panic] gateway down"));
        assert!(output.contains("Run ✗ FAILED: 1 suite(s), 1/2 tests passed (50.0%)"));
    }

    #[test]
    fn test_json_output_parses_back() {
        let run = run();
        let output = ResultFormatter::new(OutputFormat::Json).format_run(&run);
        let parsed: RunOutcome = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.id, run.id);
        assert_eq!(parsed.suites[0].tests[1].result, Status::Failed);
    }

    #[test]
    fn test_csv_and_summary() {
        let csv = ResultFormatter::new(OutputFormat::Csv).format_run(&run());
        assert_eq!(csv.lines().count(), 3);

        let summary = ResultFormatter::new(OutputFormat::Summary)
            .no_color()
            .format_run(&run());
        assert!(summary.starts_with("✗ Checkout: 1/2 passed, 1 failed, 0 skipped"));
    }

    #[test]
    fn test_format_single_test() {
        let run = run();
        let refund = &run.suites[0].tests[1];

        let summary = ResultFormatter::new(OutputFormat::Summary).format_test(refund);
        assert_eq!(summary, "✗ refund (0ms)");

        let csv = ResultFormatter::new(OutputFormat::Csv).format_test(refund);
        assert_eq!(csv, "Checkout.refund,FAILED,0");

        let table = ResultFormatter::new(OutputFormat::Table).no_color().format_test(refund);
        assert!(table.starts_with("refund"));
        assert!(table.ends_with("\n      [panic] gateway down"));
    }

    #[test]
    fn test_format_single_suite() {
        let run = run();
        let suite = &run.suites[0];

        let json = ResultFormatter::new(OutputFormat::Json).format_suite(suite);
        let parsed: SuiteOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tests.len(), 2);

        let table = ResultFormatter::new(OutputFormat::Table).no_color().format_suite(suite);
        assert!(table.contains("Total:   2 | Passed:   1 | Failed:   1 | Skipped:   0"));

        let brief = ResultFormatter::new(OutputFormat::Csv).format_suite(suite);
        assert!(brief.starts_with("✗ Checkout: 1/2 passed"));
    }

    #[test]
    fn test_format_test_listing() {
        let tests = vec![TestInfo {
            full_name: "Login.login".to_string(),
            display_name: "Login as admin, then logout".to_string(),
            method_name: "login".to_string(),
            suite_name: "Login".to_string(),
        }];

        let csv = ResultFormatter::new(OutputFormat::Csv).format_tests(&tests);
        assert_eq!(
            csv,
            "suite,full_name,display_name\nLogin,Login.login,\"Login as admin, then logout\"\n"
        );

        let table = ResultFormatter::new(OutputFormat::Table).format_tests(&tests);
        assert!(table.starts_with("Login\n"));
        assert!(table.ends_with("1 test(s) planned\n"));
    }
}
