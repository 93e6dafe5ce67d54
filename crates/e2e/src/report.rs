//! Incremental screenshot report
//!
//! The whole report is rewritten after every recorded result. Writes go to a
//! temporary file in the same directory which is then renamed over the
//! target, so a reader (or a crash) never observes a half-written document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::artifact::{relative_to, ArtifactPaths};
use crate::error::{E2eError, E2eResult};
use watchshot_common::{Configuration, SensorPoint, TargetVariant, TestCase};

const STYLE: &str = r#"
    td { border: 1px solid #666; padding: 4px; vertical-align: top; }
    table { border-collapse: collapse; margin-bottom: 2em; }
    img.pass { border: 5px solid #aea; }
    img.fail { border: 5px solid red; }
    code { display: block; border-top: 1px solid #999; margin-top: 0.5em; padding-top: 0.5em; }
"#;

/// One recorded (case, variant) row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub case: String,
    pub variant: TargetVariant,
    pub passed: bool,
    pub description: String,
    /// Capture path relative to the report
    pub capture: String,
    /// Diff path relative to the report
    pub diff: String,
    /// The case's overrides, not the merged configuration
    pub config: Configuration,
    /// Seeded points as printed, see [`printed_points`]
    pub points: Vec<serde_json::Value>,
}

/// Machine-readable twin of the HTML report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub fails: Vec<ReportEntry>,
    pub passes: Vec<ReportEntry>,
    pub base_config: Configuration,
}

/// Accumulates results and keeps the on-disk report current
pub struct ReportBuilder {
    html_path: PathBuf,
    json_path: PathBuf,
    snapshot: ReportSnapshot,
}

impl ReportBuilder {
    /// Report at `html_path`; the JSON twin sits next to it
    pub fn new(html_path: impl Into<PathBuf>, base_config: Configuration) -> Self {
        let html_path = html_path.into();
        let json_path = html_path.with_extension("json");
        Self {
            html_path,
            json_path,
            snapshot: ReportSnapshot {
                base_config,
                ..Default::default()
            },
        }
    }

    pub fn html_path(&self) -> &Path {
        &self.html_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    pub fn snapshot(&self) -> &ReportSnapshot {
        &self.snapshot
    }

    /// Append one result and rewrite the report
    pub fn record(
        &mut self,
        case: &TestCase,
        variant: TargetVariant,
        paths: &ArtifactPaths,
        passed: bool,
    ) -> E2eResult<()> {
        self.record_at(case, variant, paths, passed, Utc::now())
    }

    /// [`ReportBuilder::record`] with an explicit clock for the "ago" labels
    pub fn record_at(
        &mut self,
        case: &TestCase,
        variant: TargetVariant,
        paths: &ArtifactPaths,
        passed: bool,
        now: DateTime<Utc>,
    ) -> E2eResult<()> {
        let base = self.report_dir();
        let entry = ReportEntry {
            case: case.name.clone(),
            variant,
            passed,
            description: case.description.clone(),
            capture: relative_to(&paths.capture, &base).to_string_lossy().into_owned(),
            diff: relative_to(&paths.diff, &base).to_string_lossy().into_owned(),
            config: case.config.clone(),
            points: printed_points(&case.points, now)?,
        };

        if passed {
            self.snapshot.passes.push(entry);
        } else {
            self.snapshot.fails.push(entry);
        }
        self.write()
    }

    /// Rewrite both documents from the current state
    pub fn write(&self) -> E2eResult<()> {
        let html = render_html(&self.snapshot)?;
        write_atomic(&self.html_path, html.as_bytes())?;

        let json = serde_json::to_vec_pretty(&self.snapshot)?;
        write_atomic(&self.json_path, &json)?;

        debug!(
            "Report updated: {} failing, {} passing",
            self.snapshot.fails.len(),
            self.snapshot.passes.len()
        );
        Ok(())
    }

    fn report_dir(&self) -> PathBuf {
        self.html_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// Render the complete HTML document
pub fn render_html(snapshot: &ReportSnapshot) -> E2eResult<String> {
    let mut fails = String::new();
    for entry in &snapshot.fails {
        render_row(&mut fails, entry)?;
    }
    let mut passes = String::new();
    for entry in &snapshot.passes {
        render_row(&mut passes, entry)?;
    }

    let mut out = String::new();
    write!(
        out,
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Screenshots</title>
  <style>{style}</style>
</head>
<body>
  <table class="fails">{fails}
  </table>
  <table class="passes">{passes}
  </table>
  <strong>Default config</strong> (each test's config is merged into this):
  <br>
  <code>{base}</code>
</body>
</html>
"#,
        style = STYLE,
        fails = fails,
        passes = passes,
        base = escape_html(&serde_json::to_string(&snapshot.base_config)?),
    )
    .map_err(fmt_error)?;
    Ok(out)
}

fn render_row(out: &mut String, entry: &ReportEntry) -> E2eResult<()> {
    write!(
        out,
        r#"
    <tr>
      <td><img src="{capture}" class="{class}"></td>
      <td><img src="{diff}"></td>
      <td>
        <strong>{case} [{variant}]</strong> {description}
        <code>{config}</code>
        <code>{points}</code>
      </td>
    </tr>"#,
        capture = escape_html(&entry.capture),
        class = if entry.passed { "pass" } else { "fail" },
        diff = escape_html(&entry.diff),
        case = escape_html(&entry.case),
        variant = entry.variant,
        description = escape_html(&entry.description),
        config = escape_html(&serde_json::to_string(&entry.config)?),
        points = escape_html(&serde_json::to_string(&entry.points)?),
    )
    .map_err(fmt_error)
}

fn fmt_error(e: std::fmt::Error) -> E2eError {
    E2eError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// First point verbatim, later points reduced to value and age
pub fn printed_points(points: &[SensorPoint], now: DateTime<Utc>) -> E2eResult<Vec<serde_json::Value>> {
    points
        .iter()
        .enumerate()
        .map(|(i, point)| -> E2eResult<serde_json::Value> {
            if i == 0 {
                Ok(serde_json::to_value(point)?)
            } else {
                Ok(serde_json::json!({
                    "sgv": point.sgv,
                    "ago": point.date.map(|date| format_ago(date, now)),
                }))
            }
        })
        .collect()
}

/// Whole minutes between `date_ms` and `now`: `"42m"`, or `"2h5m"` past an hour.
/// Both divisions floor, so future points come out negative (`"-3m"`).
pub fn format_ago(date_ms: i64, now: DateTime<Utc>) -> String {
    let minutes = (now.timestamp() - date_ms.div_euclid(1000)).div_euclid(60);
    if minutes < 60 {
        format!("{}m", minutes)
    } else {
        format!("{}h{}m", minutes / 60, minutes % 60)
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_atomic(path: &Path, contents: &[u8]) -> E2eResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| E2eError::Io(e.error))?;
    Ok(())
}
