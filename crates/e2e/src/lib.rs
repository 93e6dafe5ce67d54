//! Watchshot screenshot regression runner
//!
//! Drives an SDK emulator through a fixed scenario per test case and keeps a
//! browsable report of the results:
//! - Seeds synthetic sensor readings into the mock backend
//! - Pushes the case's configuration to every emulated platform
//! - Captures a screenshot per platform and diffs it against its gold image
//! - Rewrites the HTML report after every single result
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RunContext (one per run)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ensure_environment()   kill, clean, build, install, mkdir  │
//! │  run_case(case)                                             │
//! │    ├── DataSink::set_data(points)        POST /set-sgv      │
//! │    ├── ConfigPusher::push_config()       Setup, Response    │
//! │    └── per variant                                          │
//! │          ├── SdkCli::screenshot()                           │
//! │          ├── Comparator::compare()       compare -metric AE │
//! │          └── ReportBuilder::record()     rewrite report     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifact;
pub mod compare;
pub mod device;
pub mod error;
pub mod mock;
pub mod process;
pub mod report;
pub mod runner;
pub mod spec;

pub use error::{E2eError, E2eResult};
pub use runner::{CaseOutcome, RunContext, SuiteSummary};
