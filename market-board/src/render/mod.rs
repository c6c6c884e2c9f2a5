//! Output rendering: dashboard page, HTML fragments, interactive and static charts.
//!
//! Everything here is pure with respect to the network. Writers create the
//! parent directory on demand and report failures through
//! [`board_common::Error`].

pub mod charts;
pub mod dashboard;
pub mod fragment;
pub mod plotly;
pub mod snippets;

pub use charts::{render_index_kline, render_strategy_chart};
pub use dashboard::{BasisChartView, Dashboard, DashboardContext, RecentSession};
pub use fragment::{email_body, strategy_fragment, AdvisorReport, IndexSummary, RecentRow};
pub use plotly::{basis_figure, candlestick_figure, Figure};
pub use snippets::{concepts_snippet, error_comment, stocks_snippet};

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use board_common::{Result, ResultExt};
use globset::Glob;
use serde::Serialize;
use tracing::{debug, warn};

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).context(format!("creating {}", dir.display()))
        }
        _ => Ok(()),
    }
}

/// Pretty-printed JSON, non-ASCII kept as-is.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .context(format!("writing {}", path.display()))?;
    debug!(path = %path.display(), "Saved JSON");
    Ok(())
}

pub fn save_text(content: &str, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, content)
        .context(format!("writing {}", path.display()))?;
    debug!(path = %path.display(), bytes = content.len(), "Saved file");
    Ok(())
}

/// File contents, or an empty string when the file is missing or unreadable.
pub fn read_or_empty(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read file");
            String::new()
        }
    }
}

/// Most recently modified file in `dir` whose name matches `pattern`.
pub fn latest_matching(dir: &Path, pattern: &str) -> Option<PathBuf> {
    let matcher = match Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher(),
        Err(e) => {
            warn!(pattern, error = %e, "Invalid file pattern");
            return None;
        }
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to list directory");
            return None;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| matcher.is_match(entry.file_name()))
        .filter_map(|entry| {
            let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, entry.path()))
        })
        .max_by_key(|(modified, _): &(SystemTime, PathBuf)| *modified)
        .map(|(_, path)| path)
}

/// File name component as a string, for `src` attributes relative to the page.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_save_json_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.json");
        save_json(&serde_json::json!({"名称": "长江电力"}), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("长江电力"));
    }

    #[test]
    fn test_read_or_empty_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_or_empty(&dir.path().join("missing.html")), "");
    }

    #[test]
    fn test_latest_matching_picks_newest() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("chart_20240101.svg");
        let new = dir.path().join("chart_20240102.svg");
        std::fs::write(&old, "old").unwrap();
        std::fs::write(dir.path().join("other.txt"), "x").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(&new, "new").unwrap();

        assert_eq!(latest_matching(dir.path(), "chart_*.svg"), Some(new));
        assert_eq!(latest_matching(dir.path(), "nothing_*.svg"), None);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/tmp/a/b.svg")), "b.svg");
    }
}
