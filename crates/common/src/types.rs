//! Core types for Watchshot

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::{Error, Result};

/// Watch platform a test case is rendered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetVariant {
    Aplite,
    Basalt,
    Chalk,
    Diorite,
    Emery,
}

impl TargetVariant {
    pub const ALL: [TargetVariant; 5] = [
        TargetVariant::Aplite,
        TargetVariant::Basalt,
        TargetVariant::Chalk,
        TargetVariant::Diorite,
        TargetVariant::Emery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetVariant::Aplite => "aplite",
            TargetVariant::Basalt => "basalt",
            TargetVariant::Chalk => "chalk",
            TargetVariant::Diorite => "diorite",
            TargetVariant::Emery => "emery",
        }
    }

    /// Platforms exercised when nothing else is configured
    pub fn defaults() -> Vec<TargetVariant> {
        vec![TargetVariant::Aplite, TargetVariant::Basalt]
    }
}

impl std::fmt::Display for TargetVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TargetVariant::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| Error::UnknownVariant(s.to_string()))
    }
}

/// JSON object pushed to the watchface as its settings
pub type Configuration = serde_json::Map<String, serde_json::Value>;

/// Shallow merge: keys from `overrides` replace keys in `base`, the rest survive.
pub fn merged(base: &Configuration, overrides: &Configuration) -> Configuration {
    let mut out = base.clone();
    for (key, value) in overrides {
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Load the `DEFAULT_CONFIG` object from the shared constants file
pub fn load_base_configuration(path: &Path) -> Result<Configuration> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidConfig(format!("Cannot read constants file {}: {}", path.display(), e))
    })?;
    let mut constants: serde_json::Value = serde_json::from_str(&content)?;

    match constants.get_mut("DEFAULT_CONFIG").map(serde_json::Value::take) {
        Some(serde_json::Value::Object(map)) => Ok(map),
        Some(_) => Err(Error::InvalidConfig(format!(
            "DEFAULT_CONFIG in {} is not an object",
            path.display()
        ))),
        None => Err(Error::InvalidConfig(format!(
            "DEFAULT_CONFIG missing from {}",
            path.display()
        ))),
    }
}

/// One synthetic sensor reading served by the mock backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPoint {
    /// Sensor value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sgv: Option<i64>,

    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,

    /// Any other fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SensorPoint {
    pub fn new(sgv: i64, date: i64) -> Self {
        Self {
            sgv: Some(sgv),
            date: Some(date),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A named screenshot scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique name, also used for artifact file names
    pub name: String,

    /// What the screenshot is supposed to show
    #[serde(default)]
    pub description: String,

    /// Settings merged over the base configuration
    #[serde(default)]
    pub config: Configuration,

    /// Readings seeded into the mock backend, oldest last
    #[serde(default, alias = "sgvs")]
    pub points: Vec<SensorPoint>,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            config: Configuration::new(),
            points: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_config(mut self, config: Configuration) -> Self {
        self.config = config;
        self
    }

    pub fn with_points(mut self, points: Vec<SensorPoint>) -> Self {
        self.points = points;
        self
    }
}
