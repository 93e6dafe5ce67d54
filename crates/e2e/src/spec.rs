//! Declarative YAML test cases
//!
//! ```yaml
//! name: HighTrendingUp
//! description: High reading with an up arrow
//! config:
//!   units: mgdl
//! points:
//!   - sgv: 250
//!     date: 1450000000000
//!     direction: SingleUp
//! ```

use std::path::Path;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use watchshot_common::TestCase;

/// Parse a test case from YAML string
pub fn from_yaml(yaml: &str) -> E2eResult<TestCase> {
    let case: TestCase = serde_yaml::from_str(yaml)?;
    validate(&case)?;
    Ok(case)
}

/// Parse a test case from a YAML file
pub fn from_file(path: &Path) -> E2eResult<TestCase> {
    let content = std::fs::read_to_string(path)?;
    from_yaml(&content).map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
}

/// Load every case under `dir`, ordered by path
pub fn load_all(dir: &Path) -> E2eResult<Vec<TestCase>> {
    let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut cases: Vec<TestCase> = Vec::with_capacity(paths.len());
    for path in paths {
        let case = from_file(&path)?;
        if cases.iter().any(|c| c.name == case.name) {
            return Err(E2eError::SpecParse(format!(
                "Duplicate test case name {} in {}",
                case.name,
                path.display()
            )));
        }
        debug!("Loaded test case {} from {}", case.name, path.display());
        cases.push(case);
    }

    Ok(cases)
}

/// Cases whose name contains `pattern`
pub fn filter_by_name<'a>(cases: &'a [TestCase], pattern: &str) -> Vec<&'a TestCase> {
    cases.iter().filter(|c| c.name.contains(pattern)).collect()
}

// Names become artifact file names.
fn validate(case: &TestCase) -> E2eResult<()> {
    let valid = !case.name.is_empty()
        && case
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(E2eError::SpecParse(format!(
            "Invalid test case name {:?}: use letters, digits, '-' and '_'",
            case.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_case() {
        let yaml = r#"
name: HighTrendingUp
description: High reading with an up arrow
config:
  units: mgdl
  bolus_ticks: true
points:
  - sgv: 250
    date: 1450000000000
    direction: SingleUp
  - sgv: 240
    date: 1449999700000
"#;
        let case = from_yaml(yaml).unwrap();
        assert_eq!(case.name, "HighTrendingUp");
        assert_eq!(case.config["bolus_ticks"], json!(true));
        assert_eq!(case.points.len(), 2);
        assert_eq!(case.points[0].extra["direction"], json!("SingleUp"));
    }

    #[test]
    fn test_parse_minimal_case() {
        let case = from_yaml("name: Defaults\n").unwrap();
        assert!(case.config.is_empty());
        assert!(case.points.is_empty());
    }

    #[test]
    fn test_sgvs_alias() {
        let case = from_yaml("name: Legacy\nsgvs:\n  - sgv: 100\n    date: 1\n").unwrap();
        assert_eq!(case.points.len(), 1);
    }

    #[test]
    fn test_rejects_path_like_names() {
        assert!(matches!(from_yaml("name: ../evil\n"), Err(E2eError::SpecParse(_))));
        assert!(from_yaml("name: ''\n").is_err());
    }

    #[test]
    fn test_load_all_sorted_and_unique() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "name: Second\n").unwrap();
        std::fs::write(dir.path().join("a.yml"), "name: First\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let cases = load_all(dir.path()).unwrap();
        let names: Vec<_> = cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(filter_by_name(&cases, "Sec").len(), 1);

        std::fs::write(dir.path().join("c.yaml"), "name: First\n").unwrap();
        assert!(matches!(load_all(dir.path()), Err(E2eError::SpecParse(_))));
    }
}
