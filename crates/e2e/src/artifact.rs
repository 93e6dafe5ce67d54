//! Image artifact locations

use std::path::{Path, PathBuf};

use watchshot_common::{HarnessConfig, TargetVariant};

/// The three images belonging to one case on one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Fresh capture, rewritten every run
    pub capture: PathBuf,
    /// Approved reference, never written by the harness
    pub gold: PathBuf,
    /// Comparator output, rewritten every run
    pub diff: PathBuf,
}

impl ArtifactPaths {
    pub fn new(config: &HarnessConfig, case_name: &str, variant: TargetVariant) -> Self {
        let file = file_name(case_name, variant);
        Self {
            capture: config.capture_dir().join(&file),
            gold: config.gold_dir().join(&file),
            diff: config.diff_dir().join(&file),
        }
    }
}

/// `<case>-<variant>.png`
pub fn file_name(case_name: &str, variant: TargetVariant) -> String {
    format!("{}-{}.png", case_name, variant)
}

/// `path` relative to `base` when it lives underneath it
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let config = HarnessConfig {
            test_root: PathBuf::from("/work/test"),
            ..Default::default()
        };
        let paths = ArtifactPaths::new(&config, "LowAlert", TargetVariant::Aplite);

        assert_eq!(paths.capture, PathBuf::from("/work/test/output/img/LowAlert-aplite.png"));
        assert_eq!(paths.gold, PathBuf::from("/work/test/gold/LowAlert-aplite.png"));
        assert_eq!(paths.diff, PathBuf::from("/work/test/output/diff/LowAlert-aplite.png"));
        assert_eq!(
            relative_to(&paths.capture, &config.output_dir()),
            PathBuf::from("img/LowAlert-aplite.png")
        );
    }
}
