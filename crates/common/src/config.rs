//! Harness configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::TargetVariant;
use crate::{Error, Result};

/// Environment variable holding the mock backend port
pub const MOCK_SERVER_PORT_VAR: &str = "MOCK_SERVER_PORT";

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Watch SDK command line tool
    pub sdk_binary: String,

    /// Image comparator (ImageMagick)
    pub compare_binary: String,

    /// Directory holding `gold/` and receiving `output/`
    pub test_root: PathBuf,

    /// Shared constants file with the `DEFAULT_CONFIG` object
    pub constants_path: PathBuf,

    /// Platforms every case is rendered on
    pub variants: Vec<TargetVariant>,

    /// Configuration key that receives the mock backend URL
    pub backend_url_key: String,

    /// Host the mock backend listens on
    pub mock_host: String,

    /// Mock backend port, normally taken from the environment
    pub mock_port: Option<u16>,

    /// Phone simulator ports pinned per platform name, bypassing emulator discovery
    pub phonesim_ports: BTreeMap<String, u16>,

    /// Fixed settle intervals
    pub delays: DelayConfig,

    /// CI identifiers, present only on a CI build
    #[serde(skip)]
    pub ci: Option<CiEnvironment>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            sdk_binary: "pebble".to_string(),
            compare_binary: "compare".to_string(),
            test_root: PathBuf::from("test"),
            constants_path: PathBuf::from("src/js/constants.json"),
            variants: TargetVariant::defaults(),
            backend_url_key: "nightscout_url".to_string(),
            mock_host: "localhost".to_string(),
            mock_port: None,
            phonesim_ports: BTreeMap::new(),
            delays: DelayConfig::default(),
            ci: None,
        }
    }
}

/// Settle intervals in milliseconds. The device protocol has no
/// acknowledgement, so these stand in for synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    /// After installing, before the watchface is on screen
    pub install_settle_ms: u64,

    /// After connecting to a phone simulator
    pub connect_settle_ms: u64,

    /// Between the setup and response messages
    pub message_settle_ms: u64,

    /// After the last push, while the watchface re-renders
    pub render_settle_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            install_settle_ms: 10_000,
            connect_settle_ms: 500,
            message_settle_ms: 500,
            render_settle_ms: 500,
        }
    }
}

impl DelayConfig {
    /// All intervals zero, for driving the harness against fakes
    pub fn none() -> Self {
        Self {
            install_settle_ms: 0,
            connect_settle_ms: 0,
            message_settle_ms: 0,
            render_settle_ms: 0,
        }
    }

    pub fn install_settle(&self) -> Duration {
        Duration::from_millis(self.install_settle_ms)
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }

    pub fn message_settle(&self) -> Duration {
        Duration::from_millis(self.message_settle_ms)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Overlay values from the process environment
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup(MOCK_SERVER_PORT_VAR)
            .ok_or_else(|| Error::MissingEnv(MOCK_SERVER_PORT_VAR.to_string()))?;
        let port = port.trim().parse::<u16>().map_err(|e| {
            Error::InvalidConfig(format!("{}={:?}: {}", MOCK_SERVER_PORT_VAR, port, e))
        })?;

        self.mock_port = Some(port);
        self.ci = CiEnvironment::from_lookup(lookup);
        Ok(self)
    }

    /// Base URL of the mock backend
    pub fn mock_url(&self) -> Result<String> {
        let port = self
            .mock_port
            .ok_or_else(|| Error::MissingEnv(MOCK_SERVER_PORT_VAR.to_string()))?;
        Ok(format!("http://{}:{}", self.mock_host, port))
    }

    /// Phone simulator port pinned for `variant`, if any
    pub fn pinned_phonesim_port(&self, variant: TargetVariant) -> Option<u16> {
        self.phonesim_ports.get(variant.as_str()).copied()
    }

    pub fn gold_dir(&self) -> PathBuf {
        self.test_root.join("gold")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.test_root.join("output")
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.output_dir().join("img")
    }

    pub fn diff_dir(&self) -> PathBuf {
        self.output_dir().join("diff")
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir().join("screenshots.html")
    }
}

/// Identifiers of the CI build, used to link stored artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiEnvironment {
    pub username: String,
    pub repository: String,
    pub build_num: String,
    pub node_index: String,
}

impl CiEnvironment {
    /// `None` unless running on CircleCI with every identifier present
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup("CIRCLECI").filter(|v| !v.is_empty())?;
        Some(Self {
            username: lookup("CIRCLE_PROJECT_USERNAME")?,
            repository: lookup("CIRCLE_PROJECT_REPONAME")?,
            build_num: lookup("CIRCLE_BUILD_NUM")?,
            node_index: lookup("CIRCLE_NODE_INDEX")?,
        })
    }

    /// Artifact URL for a file stored relative to the test root
    pub fn artifact_url(&self, relative: &Path) -> String {
        format!(
            "https://circleci.com/api/v1/project/{}/{}/{}/artifacts/{}/$CIRCLE_ARTIFACTS/{}",
            self.username,
            self.repository,
            self.build_num,
            self.node_index,
            relative.display(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = HarnessConfig::default();
        assert_eq!(config.variants, vec![TargetVariant::Aplite, TargetVariant::Basalt]);
        assert_eq!(config.delays.install_settle_ms, 10_000);
        assert_eq!(config.report_path(), PathBuf::from("test/output/screenshots.html"));
    }

    #[test]
    fn test_mock_port_required() {
        let err = HarnessConfig::default().with_env_from(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::MissingEnv(ref v) if v == MOCK_SERVER_PORT_VAR));

        let err = HarnessConfig::default()
            .with_env_from(lookup(&[("MOCK_SERVER_PORT", "nope")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_mock_url_from_env() {
        let config = HarnessConfig::default()
            .with_env_from(lookup(&[("MOCK_SERVER_PORT", "5555")]))
            .unwrap();
        assert_eq!(config.mock_url().unwrap(), "http://localhost:5555");
        assert!(config.ci.is_none());
    }

    #[test]
    fn test_ci_needs_every_identifier() {
        let partial = lookup(&[
            ("CIRCLECI", "true"),
            ("CIRCLE_PROJECT_USERNAME", "someone"),
            ("CIRCLE_PROJECT_REPONAME", "face"),
            ("CIRCLE_BUILD_NUM", "12"),
        ]);
        assert!(CiEnvironment::from_lookup(partial).is_none());

        let full = lookup(&[
            ("CIRCLECI", "true"),
            ("CIRCLE_PROJECT_USERNAME", "someone"),
            ("CIRCLE_PROJECT_REPONAME", "face"),
            ("CIRCLE_BUILD_NUM", "12"),
            ("CIRCLE_NODE_INDEX", "0"),
        ]);
        let ci = CiEnvironment::from_lookup(full).unwrap();
        assert_eq!(
            ci.artifact_url(Path::new("output/screenshots.html")),
            "https://circleci.com/api/v1/project/someone/face/12/artifacts/0/$CIRCLE_ARTIFACTS/output/screenshots.html"
        );
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchshot.toml");
        std::fs::write(
            &path,
            r#"
sdk_binary = "pebble-dev"
variants = ["basalt", "chalk"]

[delays]
install_settle_ms = 2000

[phonesim_ports]
chalk = 45123
"#,
        )
        .unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.sdk_binary, "pebble-dev");
        assert_eq!(config.variants, vec![TargetVariant::Basalt, TargetVariant::Chalk]);
        assert_eq!(config.delays.install_settle_ms, 2000);
        assert_eq!(config.delays.render_settle_ms, 500);
        assert_eq!(config.pinned_phonesim_port(TargetVariant::Chalk), Some(45123));
        assert_eq!(config.pinned_phonesim_port(TargetVariant::Basalt), None);

        let missing = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(missing.compare_binary, "compare");
    }
}
