//! Screenshot comparison through ImageMagick's `compare`

use std::path::Path;
use tracing::{debug, warn};

use crate::error::E2eResult;
use crate::process::{CommandLine, CommandRunner};

/// Outcome of one comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Zero differing pixels
    pub matches: bool,
    /// Raw metric as reported by the comparator
    pub metric: String,
}

/// Invokes the external image comparator
#[derive(Debug, Clone)]
pub struct Comparator {
    binary: String,
}

impl Comparator {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    /// `compare -metric AE <capture> <gold> <diff>`
    pub fn command(&self, capture: &Path, gold: &Path, diff: &Path) -> CommandLine {
        CommandLine::new(&self.binary)
            .arg("-metric")
            .arg("AE")
            .arg(capture.as_os_str())
            .arg(gold.as_os_str())
            .arg(diff.as_os_str())
    }

    /// Compare `capture` against `gold`, writing the visual diff to `diff`
    pub async fn compare(
        &self,
        runner: &dyn CommandRunner,
        capture: &Path,
        gold: &Path,
        diff: &Path,
    ) -> E2eResult<Comparison> {
        let output = runner.run(&self.command(capture, gold, diff)).await?;

        // The absolute-error pixel count is written to stderr.
        let metric = output.stderr.trim().to_string();
        let matches = metric == "0";
        if matches {
            debug!("{} matches gold", capture.display());
        } else {
            warn!("{} differs from gold (AE metric: {})", capture.display(), metric);
        }

        Ok(Comparison { matches, metric })
    }
}
