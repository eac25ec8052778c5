//! Stepwright: behavior-driven test runner core
//!
//! Runs Gherkin feature files against registered step definitions, with
//! plugins that rewrite element locators before they reach a driver.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ config file  │──►│ Orchestrator │──►│  discovery   │──►│ step registry│
//! │ + profile    │   │ (lifecycle)  │   │  (gherkin)   │   │  + World     │
//! │ + override   │   └──────┬───────┘   └──────────────┘   └──────┬───────┘
//! └──────────────┘          │ plugins                             │ resolve
//!                           ▼                                     ▼
//!                    ┌──────────────┐                     ┌──────────────┐
//!                    │ FilterChain  │◄────────────────────│ DataStore    │
//!                    │ (customLoc.) │  LocatorList.<key>  │ (per test)   │
//!                    └──────────────┘                     └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use stepwright::{config, NullObserver, Orchestrator, PluginSelector, StepRegistry};
//!
//! # async fn demo() -> stepwright::StepwrightResult<()> {
//! let resolved = config::resolve(std::path::Path::new("."), None, None)?;
//! let mut steps = StepRegistry::with_builtins();
//! steps.given("the shop is open", |world, _| {
//!     world.data.set("Shop.open", true)?;
//!     Ok(())
//! })?;
//!
//! let outcome = Orchestrator::new(resolved.config)
//!     .with_plugins(PluginSelector::All)
//!     .run(&resolved.test_root, &steps, &mut NullObserver)
//!     .await;
//! std::process::exit(i32::from(outcome.exit_code()));
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod custom_locator;
pub mod data_store;
pub mod discovery;
pub mod filter;
pub mod gherkin;
pub mod lifecycle;
pub mod locator;
pub mod plugin;
pub mod report;
mod result;
pub mod steps;
mod world;

pub use config::{EffectiveConfig, ResolvedConfig};
pub use custom_locator::CustomLocator;
pub use data_store::{DataStore, DataStoreError};
pub use discovery::TestSelection;
pub use filter::{FilterChain, LocatorFilter};
pub use gherkin::{Step, Suite, TestCase};
pub use lifecycle::{
    DryRunOutcome, HookContext, LifecycleHook, LifecycleState, NullObserver, Orchestrator,
    Outcome, RunObserver, RunOutcome, ShellHook,
};
pub use locator::{Locator, LocatorInput, LocatorKind, LocatorValue};
pub use plugin::{Plugin, PluginCatalog, PluginRegistry, PluginSelector};
pub use report::{
    DryRunReport, FailedRecord, FailedTest, TestResult, TestResults, FAILED_RECORD_FILE,
};
pub use result::{Phase, StepwrightError, StepwrightResult};
pub use steps::{StepHandler, StepKind, StepRegistry};
pub use world::World;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        FilterChain, Locator, LocatorInput, LocatorKind, Orchestrator, PluginSelector,
        StepRegistry, StepwrightError, StepwrightResult, World,
    };
}
