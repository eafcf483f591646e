//! Changelog generation from conventional commit subjects.
//!
//! The entry for a release lists the commits since the previous tag,
//! grouped by their conventional type, and is inserted above the previous
//! entries of the changelog file. The same text becomes the body of the
//! hosted release note.

use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::git::{self, GitError};
use crate::runner::{CommandRunner, RunOptions};

const TITLE: &str = "# Changelog";

/// Errors from updating the changelog.
#[derive(Error, Debug)]
pub enum ChangelogError {
    /// Reading the commit history failed.
    #[error("failed to read commit history: {0}")]
    Git(#[from] GitError),

    /// The changelog file could not be read or written.
    #[error("failed to update {path}: {source}")]
    Io {
        /// Changelog path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for changelog operations.
pub type ChangelogResult<T> = Result<T, ChangelogError>;

/// The block written for one release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogEntry {
    /// Tag the entry is headed with.
    pub tag: String,
    /// Markdown text, heading included.
    pub text: String,
}

/// Changelog section a commit lands in, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Breaking,
    Features,
    Fixes,
    Performance,
    Reverts,
    Documentation,
    Refactoring,
    Other,
}

impl Section {
    const fn title(self) -> &'static str {
        match self {
            Self::Breaking => "Breaking Changes",
            Self::Features => "Features",
            Self::Fixes => "Bug Fixes",
            Self::Performance => "Performance",
            Self::Reverts => "Reverts",
            Self::Documentation => "Documentation",
            Self::Refactoring => "Refactoring",
            Self::Other => "Other Changes",
        }
    }
}

/// Split `type(scope)!: description` into its section and display text.
///
/// Housekeeping types (chore, ci, build, test, style) return `None`.
fn classify(subject: &str) -> Option<(Section, String)> {
    let Some((head, description)) = subject.split_once(':') else {
        return Some((Section::Other, subject.to_string()));
    };
    let description = description.trim();
    let (head, breaking) = head
        .strip_suffix('!')
        .map_or((head, false), |head| (head, true));
    let (kind, scope) = match head.split_once('(') {
        Some((kind, rest)) => (kind, rest.strip_suffix(')')),
        None => (head, None),
    };
    if kind.is_empty() || kind.contains(char::is_whitespace) {
        return Some((Section::Other, subject.to_string()));
    }

    let text = scope.map_or_else(
        || description.to_string(),
        |scope| format!("**{scope}:** {description}"),
    );
    if breaking {
        return Some((Section::Breaking, text));
    }
    let section = match kind.to_ascii_lowercase().as_str() {
        "feat" | "feature" => Section::Features,
        "fix" => Section::Fixes,
        "perf" => Section::Performance,
        "revert" => Section::Reverts,
        "docs" | "doc" => Section::Documentation,
        "refactor" => Section::Refactoring,
        "chore" | "ci" | "build" | "test" | "tests" | "style" => return None,
        _ => Section::Other,
    };
    Some((section, text))
}

/// Render the entry for `tag` from commit subjects, newest first.
pub fn render_entry(tag: &str, date: NaiveDate, subjects: &[String]) -> ChangelogEntry {
    let mut sections: BTreeMap<Section, Vec<String>> = BTreeMap::new();
    for subject in subjects {
        if let Some((section, text)) = classify(subject) {
            sections.entry(section).or_default().push(text);
        }
    }

    let mut text = format!("## {tag} ({})\n", date.format("%Y-%m-%d"));
    if sections.is_empty() {
        text.push_str("\nNo notable changes.\n");
    }
    for (section, items) in &sections {
        text.push_str(&format!("\n### {}\n\n", section.title()));
        for item in items {
            text.push_str(&format!("- {item}\n"));
        }
    }

    ChangelogEntry {
        tag: tag.to_string(),
        text,
    }
}

/// Insert `entry` above the newest existing entry of `existing`.
fn insert_entry(existing: Option<&str>, entry: &ChangelogEntry) -> String {
    let Some(existing) = existing.filter(|text| !text.trim().is_empty()) else {
        return format!("{TITLE}\n\n{}", entry.text);
    };

    let first_entry = existing
        .match_indices("## ")
        .map(|(i, _)| i)
        .find(|&i| i == 0 || existing.as_bytes()[i - 1] == b'\n');
    match first_entry {
        Some(i) => format!("{}{}\n{}", &existing[..i], entry.text, &existing[i..]),
        None => {
            let head = existing.trim_end();
            format!("{head}\n\n{}", entry.text)
        }
    }
}

/// Write the entry for `tag` into the changelog at `path`.
///
/// Commits are taken from the previous tag (or the whole history when
/// there is none) up to `HEAD`. The file is created when missing.
#[instrument(skip(runner, opts))]
pub fn update(
    runner: &impl CommandRunner,
    path: &Utf8Path,
    tag: &str,
    opts: &RunOptions,
) -> ChangelogResult<ChangelogEntry> {
    let previous = git::latest_tag(runner, opts)?;
    debug!(?previous, "previous tag");
    let subjects = git::commit_subjects(runner, previous.as_deref(), opts)?;

    let today = chrono::Local::now().date_naive();
    let entry = render_entry(tag, today, &subjects);

    let io_err = |source| ChangelogError::Io {
        path: path.to_string(),
        source,
    };
    let existing = match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(io_err(e)),
    };
    fs::write(path, insert_entry(existing.as_deref(), &entry)).map_err(io_err)?;
    info!(%path, commits = subjects.len(), "changelog updated");
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn subjects(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn groups_by_type() {
        let entry = render_entry(
            "1.1.0",
            day(),
            &subjects(&[
                "fix(parser): handle empty input",
                "feat: add widgets",
                "chore: bump deps",
                "feat!: drop node 16",
                "tidy things up",
            ]),
        );
        assert_eq!(
            entry.text,
            "## 1.1.0 (2026-03-14)\n\
             \n### Breaking Changes\n\n- drop node 16\n\
             \n### Features\n\n- add widgets\n\
             \n### Bug Fixes\n\n- **parser:** handle empty input\n\
             \n### Other Changes\n\n- tidy things up\n"
        );
    }

    #[test]
    fn housekeeping_only_is_noted() {
        let entry = render_entry("1.0.1", day(), &subjects(&["chore: lint", "ci: cache"]));
        assert!(entry.text.contains("No notable changes."));
    }

    #[test]
    fn new_file_gets_title() {
        let entry = render_entry("1.0.0", day(), &subjects(&["feat: first"]));
        let text = insert_entry(None, &entry);
        assert!(text.starts_with("# Changelog\n\n## 1.0.0 (2026-03-14)\n"));
    }

    #[test]
    fn entry_goes_above_previous_release() {
        let existing = "# Changelog\n\nSome intro.\n\n## 1.0.0 (2026-01-01)\n\n- old\n";
        let entry = render_entry("1.0.1", day(), &subjects(&["fix: new"]));
        let text = insert_entry(Some(existing), &entry);

        let new_at = text.find("## 1.0.1").unwrap();
        let old_at = text.find("## 1.0.0").unwrap();
        assert!(text.starts_with("# Changelog\n\nSome intro.\n\n## 1.0.1"));
        assert!(new_at < old_at);
        assert!(text.ends_with("- old\n"));
    }

    #[test]
    fn update_reads_commits_since_previous_tag() {
        let tmp = TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let path = root.join("CHANGELOG.md");
        let runner = RecordingRunner::new()
            .reply("git describe", "1.0.0\n")
            .reply("git log", "feat: shiny\n");

        let entry = update(&runner, &path, "1.1.0", &RunOptions::new(&root)).unwrap();

        assert!(entry.text.contains("- shiny"));
        assert_eq!(runner.lines()[1], "git log 1.0.0..HEAD --format=%s");
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains(&entry.text));
    }
}
