//! Screenshot test lifecycle
//!
//! A [`RunContext`] owns everything that lives for one run: the one-time
//! environment bootstrap, the collaborators that reach the outside world and
//! the report. Cases and variants are processed strictly one after another.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::artifact::{relative_to, ArtifactPaths};
use crate::compare::Comparator;
use crate::device::{ConfigPusher, EmulatorConnector, TransportConnector};
use crate::error::{E2eError, E2eResult};
use crate::mock::{DataSink, MockServerClient};
use crate::process::{CommandRunner, SdkCli, SystemRunner};
use crate::report::ReportBuilder;
use watchshot_common::{
    load_base_configuration, merged, Configuration, HarnessConfig, TargetVariant, TestCase,
};

/// Why a (case, variant) pair failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No approved reference exists yet
    MissingGold { gold: PathBuf },
    /// The capture differs from the reference
    Mismatch {
        description: String,
        metric: String,
        artifact_url: Option<String>,
    },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::MissingGold { gold } => {
                write!(f, "Test is missing \"gold\" image: {}", gold.display())
            }
            FailureReason::Mismatch {
                description,
                artifact_url,
                ..
            } => {
                write!(f, "Screenshot does not match expected: \"{}\"", description)?;
                if let Some(url) = artifact_url {
                    write!(f, "\n{}", url)?;
                }
                Ok(())
            }
        }
    }
}

/// Result of one case on one variant
#[derive(Debug, Clone)]
pub struct TestResult {
    pub case: String,
    pub variant: TargetVariant,
    pub failure: Option<FailureReason>,
    pub paths: ArtifactPaths,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Results of one case across every variant
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub case: String,
    pub results: Vec<TestResult>,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.results.iter().all(TestResult::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = (TargetVariant, &FailureReason)> {
        self.results
            .iter()
            .filter_map(|r| r.failure.as_ref().map(|f| (r.variant, f)))
    }

    /// One `<variant>: <reason>` line per failing variant
    pub fn failure_message(&self) -> String {
        self.failures()
            .map(|(variant, reason)| format!("{}: {}", variant, reason))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `Err(CaseFailed)` when any variant failed
    pub fn into_result(self) -> E2eResult<()> {
        if self.passed() {
            Ok(())
        } else {
            Err(E2eError::CaseFailed {
                message: self.failure_message(),
                name: self.case,
            })
        }
    }
}

/// Result of running a list of cases
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    /// Failing case names with their failure messages
    pub failures: Vec<(String, String)>,
}

/// State and collaborators of one run
pub struct RunContext {
    config: HarnessConfig,
    base_config: Configuration,
    mock_url: String,
    sdk: SdkCli,
    comparator: Comparator,
    runner: Box<dyn CommandRunner>,
    sink: Box<dyn DataSink>,
    pusher: ConfigPusher,
    report: ReportBuilder,
    bootstrapped: bool,
}

impl RunContext {
    /// Context wired to the real SDK, mock server and emulators
    pub fn from_config(config: HarnessConfig) -> E2eResult<Self> {
        let base_config = load_base_configuration(&config.constants_path)?;
        let sink = MockServerClient::new(config.mock_url()?);

        let mut connector = EmulatorConnector::default();
        for &variant in &config.variants {
            if let Some(port) = config.pinned_phonesim_port(variant) {
                connector = connector.pin_port(variant, port);
            }
        }

        Self::with_parts(
            config,
            base_config,
            Box::new(SystemRunner),
            Box::new(sink),
            Box::new(connector),
        )
    }

    /// Context with explicit collaborators
    pub fn with_parts(
        config: HarnessConfig,
        base_config: Configuration,
        runner: Box<dyn CommandRunner>,
        sink: Box<dyn DataSink>,
        connector: Box<dyn TransportConnector>,
    ) -> E2eResult<Self> {
        let mock_url = config.mock_url()?;
        let report = ReportBuilder::new(config.report_path(), base_config.clone());
        Ok(Self {
            sdk: SdkCli::new(&config.sdk_binary),
            comparator: Comparator::new(&config.compare_binary),
            pusher: ConfigPusher::new(connector, config.delays.clone()),
            config,
            base_config,
            mock_url,
            runner,
            sink,
            report,
            bootstrapped: false,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn report(&self) -> &ReportBuilder {
        &self.report
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    /// Build, install and prepare the output tree, once per context
    pub async fn ensure_environment(&mut self) -> E2eResult<()> {
        if self.bootstrapped {
            return Ok(());
        }

        self.install_and_run().await?;

        self.ensure_empty_dir(self.config.output_dir()).await?;
        tokio::fs::create_dir(self.config.capture_dir()).await?;
        tokio::fs::create_dir(self.config.diff_dir()).await?;
        self.report.write()?;

        self.bootstrapped = true;
        info!("Environment ready, report at {}", self.report.html_path().display());
        Ok(())
    }

    // Output of these commands is not inspected: a failed build goes unnoticed
    // until screenshots stop matching.
    async fn install_and_run(&self) -> E2eResult<()> {
        self.runner.run(&self.sdk.kill()).await?;
        self.runner.run(&self.sdk.clean()).await?;
        self.runner.run(&self.sdk.build()).await?;
        for &variant in &self.config.variants {
            self.runner.run(&self.sdk.install(variant)).await?;
        }

        // Give the watchface time to show up
        sleep(self.config.delays.install_settle()).await;
        Ok(())
    }

    async fn ensure_empty_dir(&self, dir: PathBuf) -> E2eResult<()> {
        if tokio::fs::try_exists(&dir).await? {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| E2eError::Cleanup {
                    path: dir.display().to_string(),
                    reason: e.to_string(),
                })?;
        }
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    /// Base configuration with the mock backend address, then the case's overrides
    pub fn effective_config(&self, case: &TestCase) -> Configuration {
        let mut base = self.base_config.clone();
        base.insert(
            self.config.backend_url_key.clone(),
            serde_json::Value::String(self.mock_url.clone()),
        );
        merged(&base, &case.config)
    }

    /// Seed, configure, capture, compare and record one case on every variant
    pub async fn run_case(&mut self, case: &TestCase) -> E2eResult<CaseOutcome> {
        self.ensure_environment().await?;
        info!("Running {}", case.name);

        self.sink.set_data(&case.points).await?;
        let config = self.effective_config(case);
        self.pusher.push_config(&config, &self.config.variants).await?;

        let variants = self.config.variants.clone();
        let mut results = Vec::with_capacity(variants.len());
        for variant in variants {
            let result = self.capture_and_compare(case, variant).await?;
            self.report
                .record(case, variant, &result.paths, result.passed())?;
            results.push(result);
        }

        Ok(CaseOutcome {
            case: case.name.clone(),
            results,
        })
    }

    async fn capture_and_compare(&self, case: &TestCase, variant: TargetVariant) -> E2eResult<TestResult> {
        let paths = ArtifactPaths::new(&self.config, &case.name, variant);
        self.runner
            .run(&self.sdk.screenshot(variant, &paths.capture))
            .await?;

        // Any failure to stat the reference counts as "no gold", not as a broken run.
        let failure = if let Err(e) = tokio::fs::metadata(&paths.gold).await {
            warn!("{} [{}] has no gold image: {}", case.name, variant, e);
            Some(FailureReason::MissingGold {
                gold: paths.gold.clone(),
            })
        } else {
            let comparison = self
                .comparator
                .compare(self.runner.as_ref(), &paths.capture, &paths.gold, &paths.diff)
                .await?;
            if comparison.matches {
                None
            } else {
                Some(FailureReason::Mismatch {
                    description: case.description.clone(),
                    metric: comparison.metric,
                    artifact_url: self.artifact_url(),
                })
            }
        };

        Ok(TestResult {
            case: case.name.clone(),
            variant,
            failure,
            paths,
        })
    }

    fn artifact_url(&self) -> Option<String> {
        let ci = self.config.ci.as_ref()?;
        let report = relative_to(&self.config.report_path(), &self.config.test_root);
        Some(ci.artifact_url(&report))
    }

    /// Run `cases` in order; infrastructure errors stop the run
    pub async fn run_cases(&mut self, cases: &[TestCase]) -> E2eResult<SuiteSummary> {
        let start = Instant::now();
        let mut summary = SuiteSummary {
            total: cases.len(),
            ..Default::default()
        };

        info!("Running {} test case(s)...", cases.len());

        for case in cases {
            let case_start = Instant::now();
            let outcome = self.run_case(case).await?;
            if outcome.passed() {
                summary.passed += 1;
                info!("✓ {} ({} ms)", case.name, case_start.elapsed().as_millis());
            } else {
                summary.failed += 1;
                let message = outcome.failure_message();
                error!("✗ {}\n{}", case.name, message);
                summary.failures.push((case.name.clone(), message));
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            summary.passed, summary.failed, summary.duration_ms
        );
        Ok(summary)
    }
}
