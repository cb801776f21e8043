//! Discovery descriptors
//!
//! Plain data handed to the engine by whatever discovers suites: hook and
//! test method bodies plus the metadata attached to them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Body of a hook or test method. Runs on a blocking thread.
pub type MethodBody = Arc<dyn Fn(&Invocation) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as a [`MethodBody`]
pub fn method_body<F>(body: F) -> MethodBody
where
    F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(body)
}

/// Lifecycle hook kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteMethodType {
    BeforeSuite,
    BeforeTest,
    AfterTest,
    AfterSuite,
}

impl fmt::Display for SuiteMethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuiteMethodType::BeforeSuite => write!(f, "BeforeSuite"),
            SuiteMethodType::BeforeTest => write!(f, "BeforeTest"),
            SuiteMethodType::AfterTest => write!(f, "AfterTest"),
            SuiteMethodType::AfterSuite => write!(f, "AfterSuite"),
        }
    }
}

/// One row of parameters for a parameterized suite or test
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    pub name: String,
    pub params: Vec<serde_json::Value>,
}

impl DataSet {
    pub fn new(name: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// What a method body sees when it is invoked
#[derive(Clone, Debug, Default)]
pub struct Invocation {
    pub suite_name: String,
    pub data_set_name: Option<String>,
    /// Parameters of the suite data set, if the suite is parameterized
    pub suite_args: Vec<serde_json::Value>,
    pub method_name: String,
    /// Parameters of the test data set, if the test is parameterized
    pub args: Vec<serde_json::Value>,
}

impl Invocation {
    /// Positional test argument
    pub fn arg(&self, index: usize) -> Option<&serde_json::Value> {
        self.args.get(index)
    }

    /// Positional suite argument
    pub fn suite_arg(&self, index: usize) -> Option<&serde_json::Value> {
        self.suite_args.get(index)
    }
}

/// A lifecycle hook method
#[derive(Clone)]
pub struct HookDescriptor {
    pub name: String,
    pub kind: SuiteMethodType,
    /// AfterTest only: run even when the test failed
    pub run_always: bool,
    /// AfterTest only: skip the rest of the suite when this hook fails
    pub skip_tests_on_fail: bool,
    pub body: MethodBody,
}

impl HookDescriptor {
    pub fn new<F>(kind: SuiteMethodType, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            run_always: false,
            skip_tests_on_fail: false,
            body: Arc::new(body),
        }
    }

    pub fn run_always(mut self) -> Self {
        self.run_always = true;
        self
    }

    pub fn skip_tests_on_fail(mut self) -> Self {
        self.skip_tests_on_fail = true;
        self
    }
}

impl fmt::Debug for HookDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("run_always", &self.run_always)
            .field("skip_tests_on_fail", &self.skip_tests_on_fail)
            .finish_non_exhaustive()
    }
}

/// A test method with its metadata
#[derive(Clone)]
pub struct TestDescriptor {
    pub name: String,
    /// Display title, may contain `{0}`-style placeholders for data set args
    pub title: Option<String>,
    pub author: Option<String>,
    pub bugs: Vec<String>,
    pub categories: Vec<String>,
    /// Empty for a plain test; one test instance per entry otherwise
    pub data_sets: Vec<DataSet>,
    /// Method name of another test in the same suite
    pub depends_on: Option<String>,
    /// Disabling reason; disabled tests never reach the engine
    pub disabled: Option<String>,
    pub body: MethodBody,
}

impl TestDescriptor {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            title: None,
            author: None,
            bugs: Vec::new(),
            categories: Vec::new(),
            data_sets: Vec::new(),
            depends_on: None,
            disabled: None,
            body: Arc::new(body),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn bug(mut self, bug: impl Into<String>) -> Self {
        self.bugs.push(bug.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn data_set(mut self, data_set: DataSet) -> Self {
        self.data_sets.push(data_set);
        self
    }

    pub fn depends_on(mut self, method: impl Into<String>) -> Self {
        self.depends_on = Some(method.into());
        self
    }

    pub fn disabled(mut self, reason: impl Into<String>) -> Self {
        self.disabled = Some(reason.into());
        self
    }
}

impl fmt::Debug for TestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDescriptor")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("categories", &self.categories)
            .field("data_sets", &self.data_sets.len())
            .field("depends_on", &self.depends_on)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

/// A suite: tags, metadata, hooks and tests in declaration order
#[derive(Clone, Debug)]
pub struct SuiteDescriptor {
    pub name: String,
    /// Group the suite was discovered in, used by assembly-level scheduling
    pub assembly: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    /// Empty for a plain suite; one suite instance per entry otherwise
    pub data_sets: Vec<DataSet>,
    pub hooks: Vec<HookDescriptor>,
    pub tests: Vec<TestDescriptor>,
}

impl SuiteDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assembly: "default".to_string(),
            tags: Vec::new(),
            metadata: BTreeMap::new(),
            data_sets: Vec::new(),
            hooks: Vec::new(),
            tests: Vec::new(),
        }
    }

    pub fn assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = assembly.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// First value for a key wins
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.entry(key.into()).or_insert_with(|| value.into());
        self
    }

    pub fn data_set(mut self, data_set: DataSet) -> Self {
        self.data_sets.push(data_set);
        self
    }

    pub fn hook(mut self, hook: HookDescriptor) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn before_suite<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hook(HookDescriptor::new(SuiteMethodType::BeforeSuite, name, body))
    }

    pub fn before_test<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hook(HookDescriptor::new(SuiteMethodType::BeforeTest, name, body))
    }

    pub fn after_test<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hook(HookDescriptor::new(SuiteMethodType::AfterTest, name, body))
    }

    pub fn after_suite<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hook(HookDescriptor::new(SuiteMethodType::AfterSuite, name, body))
    }

    pub fn test(mut self, test: TestDescriptor) -> Self {
        self.tests.push(test);
        self
    }

    /// Suite tags normalized the way filters are
    pub fn normalized_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}
