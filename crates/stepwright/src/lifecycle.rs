//! Lifecycle orchestrator.
//!
//! A run walks a fixed sequence of states:
//!
//! ```text
//! Created -> Initialized -> Bootstrapped -> TestsLoaded -> Executed    -> TornDown
//!                                                       \-> Introspected -/
//! ```
//!
//! Each operation checks the current state and refuses to run out of order.
//! `teardown` is the exception: it is legal from any state, runs once, and
//! unwinds only the hooks whose bootstrap was attempted. [`Orchestrator::run`]
//! and [`Orchestrator::dry_run`] drive the whole sequence and always reach
//! teardown, whichever phase fails.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{read_structured, EffectiveConfig};
use crate::data_store::{DataStore, DATA_LIST, LOCATOR_LIST};
use crate::discovery::{relative_file, select, TestSelection};
use crate::filter::FilterChain;
use crate::gherkin::{Step, Suite, TestCase};
use crate::plugin::{PluginCatalog, PluginRegistry, PluginSelector};
use crate::report::{DryRunReport, TestResult, TestResults};
use crate::result::{StepwrightError, StepwrightResult};
use crate::steps::StepRegistry;
use crate::world::World;

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Nothing done yet
    Created,
    /// Test root resolved, plugins active
    Initialized,
    /// Hooks bootstrapped
    Bootstrapped,
    /// Suites discovered
    TestsLoaded,
    /// Suites enumerated without running
    Introspected,
    /// Tests ran
    Executed,
    /// Hooks torn down
    TornDown,
}

impl LifecycleState {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initialized => "initialized",
            Self::Bootstrapped => "bootstrapped",
            Self::TestsLoaded => "tests-loaded",
            Self::Introspected => "introspected",
            Self::Executed => "executed",
            Self::TornDown => "torn-down",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What hooks can see of the run
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Canonical test root
    pub test_root: &'a Path,
    /// Effective configuration
    pub config: &'a EffectiveConfig,
}

/// Work done around the whole run, such as provisioning a database.
///
/// Hooks bootstrap in registration order and tear down in reverse. A hook
/// whose bootstrap was attempted is torn down even if that bootstrap failed.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Prepare the environment
    async fn bootstrap(&mut self, ctx: &HookContext<'_>) -> StepwrightResult<()>;

    /// Release what `bootstrap` acquired
    async fn teardown(&mut self, ctx: &HookContext<'_>) -> StepwrightResult<()> {
        let _ = ctx;
        Ok(())
    }
}

/// Runs the config's `bootstrap` / `teardown` shell commands in the test root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellHook {
    bootstrap: Option<String>,
    teardown: Option<String>,
}

impl ShellHook {
    /// Hook with explicit commands
    #[must_use]
    pub fn new(bootstrap: Option<String>, teardown: Option<String>) -> Self {
        Self {
            bootstrap,
            teardown,
        }
    }

    /// Hook for the commands in `config`, or `None` when neither is set
    #[must_use]
    pub fn from_config(config: &EffectiveConfig) -> Option<Self> {
        let bootstrap = config.bootstrap_command().map(str::to_string);
        let teardown = config.teardown_command().map(str::to_string);
        if bootstrap.is_none() && teardown.is_none() {
            return None;
        }
        Some(Self::new(bootstrap, teardown))
    }
}

async fn run_shell(command: &str, dir: &Path) -> Result<(), String> {
    debug!(command, dir = %dir.display(), "running shell command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("'{command}' failed to execute: {e}"))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(format!(
        "'{command}' exited with {}{}",
        output
            .status
            .code()
            .map_or_else(|| "a signal".to_string(), |c| format!("code {c}")),
        if stderr.trim().is_empty() {
            String::new()
        } else {
            format!(": {}", stderr.trim())
        }
    ))
}

#[async_trait]
impl LifecycleHook for ShellHook {
    fn name(&self) -> &str {
        "shell"
    }

    async fn bootstrap(&mut self, ctx: &HookContext<'_>) -> StepwrightResult<()> {
        match &self.bootstrap {
            Some(command) => run_shell(command, ctx.test_root)
                .await
                .map_err(StepwrightError::bootstrap),
            None => Ok(()),
        }
    }

    async fn teardown(&mut self, ctx: &HookContext<'_>) -> StepwrightResult<()> {
        match &self.teardown {
            Some(command) => run_shell(command, ctx.test_root)
                .await
                .map_err(StepwrightError::teardown),
            None => Ok(()),
        }
    }
}

/// Receives progress while tests execute
pub trait RunObserver {
    /// Execution is starting with `total` selected tests
    fn run_started(&mut self, total: usize) {
        let _ = total;
    }

    /// A suite is about to run
    fn suite_started(&mut self, suite: &Suite) {
        let _ = suite;
    }

    /// A test is about to run
    fn test_started(&mut self, name: &str) {
        let _ = name;
    }

    /// A step finished
    fn step_finished(&mut self, step: &Step, passed: bool) {
        let _ = (step, passed);
    }

    /// A test finished
    fn test_finished(&mut self, result: &TestResult) {
        let _ = result;
    }
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl RunObserver for NullObserver {}

/// Result of driving a whole lifecycle
#[derive(Debug)]
pub struct Outcome<T> {
    /// Produced value, when every phase up to it succeeded
    pub value: Option<T>,
    /// First fatal error, if any
    pub error: Option<StepwrightError>,
    /// Teardown error, reported alongside any earlier error
    pub teardown_error: Option<StepwrightError>,
    /// States visited, in order
    pub history: Vec<LifecycleState>,
}

/// Outcome of an executing run
pub type RunOutcome = Outcome<TestResults>;

/// Outcome of a dry run
pub type DryRunOutcome = Outcome<DryRunReport>;

impl<T> Outcome<T> {
    fn new(
        result: StepwrightResult<T>,
        teardown: StepwrightResult<()>,
        history: Vec<LifecycleState>,
    ) -> Self {
        let (value, error) = match result {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            value,
            error,
            teardown_error: teardown.err(),
            history,
        }
    }

    /// Fatal and teardown errors, in the order they happened
    pub fn errors(&self) -> impl Iterator<Item = &StepwrightError> {
        self.error.iter().chain(self.teardown_error.iter())
    }
}

impl RunOutcome {
    /// No fatal error, no teardown error, no failed test
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors().next().is_none()
            && self.value.as_ref().is_some_and(TestResults::all_passed)
    }

    /// Process exit code: 0 on success, 1 otherwise
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }
}

impl DryRunOutcome {
    /// No fatal or teardown error
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors().next().is_none() && self.value.is_some()
    }

    /// Process exit code: 0 on success, 1 otherwise
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }
}

/// Drives one run from config to teardown
pub struct Orchestrator {
    state: LifecycleState,
    history: Vec<LifecycleState>,
    config: EffectiveConfig,
    profile: Option<String>,
    selector: PluginSelector,
    catalog: PluginCatalog,
    selection: TestSelection,
    hooks: Vec<Box<dyn LifecycleHook>>,
    attempted: usize,
    test_root: Option<PathBuf>,
    plugins: PluginRegistry,
    chain: Arc<FilterChain>,
    suites: Vec<Suite>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("test_root", &self.test_root)
            .field("plugins", &self.plugins.names())
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("suites", &self.suites.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator over an effective configuration
    #[must_use]
    pub fn new(config: EffectiveConfig) -> Self {
        Self {
            state: LifecycleState::Created,
            history: vec![LifecycleState::Created],
            config,
            profile: None,
            selector: PluginSelector::None,
            catalog: PluginCatalog::with_builtins(),
            selection: TestSelection::default(),
            hooks: Vec::new(),
            attempted: 0,
            test_root: None,
            plugins: PluginRegistry::default(),
            chain: Arc::new(FilterChain::new()),
            suites: Vec::new(),
        }
    }

    /// Active profile name, exposed to steps
    #[must_use]
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    /// Which declared plugins to activate
    #[must_use]
    pub fn with_plugins(mut self, selector: PluginSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Replace the plugin catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Narrow what `load_tests` keeps
    #[must_use]
    pub fn with_selection(mut self, selection: TestSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Register a hook; it bootstraps after every hook already registered
    #[must_use]
    pub fn with_hook(mut self, hook: Box<dyn LifecycleHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// States visited so far
    #[must_use]
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    /// Canonical test root, once initialized
    #[must_use]
    pub fn test_root(&self) -> Option<&Path> {
        self.test_root.as_deref()
    }

    /// Active plugins
    #[must_use]
    pub const fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// The run's filter chain
    #[must_use]
    pub fn filter_chain(&self) -> Arc<FilterChain> {
        Arc::clone(&self.chain)
    }

    /// Loaded suites
    #[must_use]
    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    fn expect(&self, operation: &str, allowed: LifecycleState) -> StepwrightResult<()> {
        if self.state == allowed {
            Ok(())
        } else {
            Err(StepwrightError::invalid_state(format!(
                "cannot {operation} while {} (expected {allowed})",
                self.state
            )))
        }
    }

    fn advance(&mut self, next: LifecycleState) {
        debug!(from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
        self.history.push(next);
    }

    fn root(&self) -> StepwrightResult<&Path> {
        self.test_root
            .as_deref()
            .ok_or_else(|| StepwrightError::invalid_state("test root is not resolved"))
    }

    /// Resolve the test root and activate plugins.
    ///
    /// # Errors
    ///
    /// [`StepwrightError::Init`] when the root is not a directory or plugin
    /// activation fails.
    pub fn initialize(&mut self, test_root: &Path) -> StepwrightResult<()> {
        self.expect("initialize", LifecycleState::Created)?;
        let root = std::fs::canonicalize(test_root).map_err(|e| {
            StepwrightError::init(format!(
                "cannot resolve test root '{}': {e}",
                test_root.display()
            ))
        })?;
        if !root.is_dir() {
            return Err(StepwrightError::init(format!(
                "test root '{}' is not a directory",
                root.display()
            )));
        }

        self.plugins = PluginRegistry::activate(&self.config, &self.selector, &self.catalog)?;
        self.chain = Arc::new(self.plugins.filter_chain());
        if let Some(shell) = ShellHook::from_config(&self.config) {
            self.hooks.insert(0, Box::new(shell));
        }

        info!(
            root = %root.display(),
            profile = self.profile.as_deref().unwrap_or("-"),
            plugins = ?self.plugins.names(),
            "initialized"
        );
        self.test_root = Some(root);
        self.advance(LifecycleState::Initialized);
        Ok(())
    }

    /// Bootstrap every hook in registration order.
    ///
    /// # Errors
    ///
    /// [`StepwrightError::Bootstrap`] from the first failing hook; later
    /// hooks are not attempted.
    pub async fn bootstrap(&mut self) -> StepwrightResult<()> {
        self.expect("bootstrap", LifecycleState::Initialized)?;
        let root = self
            .test_root
            .as_deref()
            .ok_or_else(|| StepwrightError::invalid_state("test root is not resolved"))?;
        let ctx = HookContext {
            test_root: root,
            config: &self.config,
        };
        for (index, hook) in self.hooks.iter_mut().enumerate() {
            self.attempted = index + 1;
            info!(hook = hook.name(), "bootstrapping");
            hook.bootstrap(&ctx).await.map_err(|e| match e {
                StepwrightError::Bootstrap { .. } => e,
                other => StepwrightError::bootstrap(format!("hook '{}': {other}", hook.name())),
            })?;
        }
        self.advance(LifecycleState::Bootstrapped);
        Ok(())
    }

    /// Move past bootstrap without running hooks (dry runs).
    ///
    /// # Errors
    ///
    /// [`StepwrightError::InvalidState`] unless initialized.
    pub fn skip_bootstrap(&mut self) -> StepwrightResult<()> {
        self.expect("skip bootstrap", LifecycleState::Initialized)?;
        debug!(hooks = self.hooks.len(), "bootstrap hooks skipped");
        self.advance(LifecycleState::Bootstrapped);
        Ok(())
    }

    /// Discover and select suites.
    ///
    /// # Errors
    ///
    /// [`StepwrightError::Discovery`] for invalid globs or malformed files.
    pub fn load_tests(&mut self) -> StepwrightResult<&[Suite]> {
        self.expect("load tests", LifecycleState::Bootstrapped)?;
        let suites = select(self.root()?, self.config.features_pattern(), &self.selection)?;
        let tests: usize = suites.iter().map(|s| s.tests.len()).sum();
        info!(suites = suites.len(), tests, "tests loaded");
        self.suites = suites;
        self.advance(LifecycleState::TestsLoaded);
        Ok(&self.suites)
    }

    /// Enumerate loaded suites without running them.
    ///
    /// With `steps`, each step is checked for a matching definition; step
    /// bodies are never invoked.
    ///
    /// # Errors
    ///
    /// [`StepwrightError::InvalidState`] unless tests are loaded.
    pub fn introspect(&mut self, steps: Option<&StepRegistry>) -> StepwrightResult<DryRunReport> {
        self.expect("introspect", LifecycleState::TestsLoaded)?;
        let report = DryRunReport::from_suites(&self.suites, steps);
        self.advance(LifecycleState::Introspected);
        Ok(report)
    }

    fn seed_store(&self) -> StepwrightResult<DataStore> {
        let root = self.root()?;
        let files = self.config.data_files();
        let mut store = DataStore::new();
        for (namespace, file) in [(LOCATOR_LIST, files.locators), (DATA_LIST, files.data)] {
            if let Some(file) = file {
                let path = root.join(file);
                debug!(namespace, file = %path.display(), "loading data file");
                store.merge_into(namespace, read_structured(&path)?)?;
            }
        }
        Ok(store)
    }

    /// Run every loaded test in order.
    ///
    /// Test failures are collected in the returned results and do not stop
    /// the run.
    ///
    /// # Errors
    ///
    /// Data files that cannot be loaded into the store.
    pub async fn execute(
        &mut self,
        steps: &StepRegistry,
        observer: &mut dyn RunObserver,
    ) -> StepwrightResult<TestResults> {
        self.expect("execute", LifecycleState::TestsLoaded)?;
        let seed = self.seed_store()?;
        let root = self.root()?;
        let start = Instant::now();
        let mut results = TestResults::new();

        observer.run_started(self.suites.iter().map(|s| s.tests.len()).sum());
        for suite in &self.suites {
            observer.suite_started(suite);
            let file = relative_file(root, &suite.file);
            for test in &suite.tests {
                let name = suite.full_title(test);
                let world = World::new(seed.clone(), Arc::clone(&self.chain))
                    .with_profile(self.profile.clone())
                    .with_test_title(name.clone());
                observer.test_started(&name);
                let result = run_test(name, test, steps, world, observer)
                    .await
                    .at(file.clone(), test.line);
                observer.test_finished(&result);
                results.add(result);
            }
        }

        results.duration = start.elapsed();
        info!(
            passed = results.passed(),
            failed = results.failed(),
            "execution finished"
        );
        self.advance(LifecycleState::Executed);
        Ok(results)
    }

    /// Tear down attempted hooks in reverse order.
    ///
    /// Legal from any state; only the first call does work.
    ///
    /// # Errors
    ///
    /// [`StepwrightError::Teardown`] from the first failing hook. Later hooks
    /// are still torn down.
    pub async fn teardown(&mut self) -> StepwrightResult<()> {
        if self.state == LifecycleState::TornDown {
            return Ok(());
        }
        let mut first_error: Option<StepwrightError> = None;
        if let Some(root) = self.test_root.as_deref() {
            let ctx = HookContext {
                test_root: root,
                config: &self.config,
            };
            for hook in self.hooks[..self.attempted].iter_mut().rev() {
                info!(hook = hook.name(), "tearing down");
                if let Err(e) = hook.teardown(&ctx).await {
                    warn!(hook = hook.name(), error = %e, "teardown failed");
                    if first_error.is_none() {
                        first_error = Some(match e {
                            StepwrightError::Teardown { .. } => e,
                            other => StepwrightError::teardown(format!(
                                "hook '{}': {other}",
                                hook.name()
                            )),
                        });
                    }
                }
            }
        }
        self.attempted = 0;
        self.advance(LifecycleState::TornDown);
        first_error.map_or(Ok(()), Err)
    }

    async fn run_phases(
        &mut self,
        test_root: &Path,
        steps: &StepRegistry,
        observer: &mut dyn RunObserver,
    ) -> StepwrightResult<TestResults> {
        self.initialize(test_root)?;
        self.bootstrap().await?;
        self.load_tests()?;
        self.execute(steps, observer).await
    }

    /// Initialize, bootstrap, load, execute, then always tear down
    pub async fn run(
        &mut self,
        test_root: &Path,
        steps: &StepRegistry,
        observer: &mut dyn RunObserver,
    ) -> RunOutcome {
        let result = self.run_phases(test_root, steps, observer).await;
        if let Err(e) = &result {
            warn!(error = %e, "run aborted");
        }
        let teardown = self.teardown().await;
        Outcome::new(result, teardown, self.history.clone())
    }

    fn dry_run_phases(
        &mut self,
        test_root: &Path,
        steps: Option<&StepRegistry>,
    ) -> StepwrightResult<DryRunReport> {
        self.initialize(test_root)?;
        self.skip_bootstrap()?;
        self.load_tests()?;
        self.introspect(steps)
    }

    /// Enumerate what a run would execute, without hooks or step bodies
    pub async fn dry_run(
        &mut self,
        test_root: &Path,
        steps: Option<&StepRegistry>,
    ) -> DryRunOutcome {
        let result = self.dry_run_phases(test_root, steps);
        let teardown = self.teardown().await;
        Outcome::new(result, teardown, self.history.clone())
    }
}

/// Handler arguments: pattern captures, then the doc string, then the data
/// table as a JSON array of rows.
fn step_args(captures: Vec<String>, step: &Step) -> Vec<String> {
    let mut args = captures;
    if let Some(doc) = &step.doc_string {
        args.push(doc.clone());
    }
    if !step.table.is_empty() {
        args.push(serde_json::to_string(&step.table).unwrap_or_default());
    }
    args
}

async fn run_test(
    name: String,
    test: &TestCase,
    steps: &StepRegistry,
    mut world: World,
    observer: &mut dyn RunObserver,
) -> TestResult {
    let start = Instant::now();
    let total = test.steps.len();
    for (index, step) in test.steps.iter().enumerate() {
        let outcome = match steps.find(&step.text) {
            None => Err(format!("undefined step '{}' (line {})", step.display(), step.line)),
            Some(matched) => {
                let args = step_args(matched.args, step);
                matched
                    .definition
                    .invoke(&mut world, &args)
                    .await
                    .map_err(|e| format!("'{}' (line {}): {e}", step.display(), step.line))
            }
        };
        observer.step_finished(step, outcome.is_ok());
        if let Err(message) = outcome {
            let failure = StepwrightError::TestFailure {
                test: name.clone(),
                message,
            };
            debug!(error = %failure, "test failed");
            return TestResult::fail(name, failure.to_string(), index + 1, total, start.elapsed());
        }
    }
    TestResult::pass(name, total, start.elapsed())
}
