//! Run reports and their text and markdown renderings.

use crate::format::format_bytes;
use crate::verdict::{Decision, Outcome, RunSummary};
use serde::Serialize;
use std::fmt::Write;

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Every attempted deletion went through.
    Clean,
    /// At least one deletion or listing failed.
    Partial,
}

impl RunOutcome {
    fn from_summary(summary: &RunSummary) -> Self {
        if summary.is_clean() {
            Self::Clean
        } else {
            Self::Partial
        }
    }
}

/// Result of a cache pruning run.
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    /// `owner/repo` or another label for the store.
    pub scope: String,
    /// Whether deletions were suppressed.
    pub dry_run: bool,
    /// One record per cache entry.
    pub decisions: Vec<Decision>,
    /// Aggregate counters.
    pub summary: RunSummary,
}

impl CacheReport {
    /// Build a report, deriving the summary from the decisions.
    #[must_use]
    pub fn new(scope: impl Into<String>, dry_run: bool, decisions: Vec<Decision>) -> Self {
        let mut summary = RunSummary::default();
        for decision in &decisions {
            summary.record(decision);
        }
        Self {
            scope: scope.into(),
            dry_run,
            decisions,
            summary,
        }
    }

    /// Clean or partial.
    #[must_use]
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome::from_summary(&self.summary)
    }
}

/// Result for one registry package.
#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    /// Package name.
    pub package: String,
    /// One record per image version.
    pub decisions: Vec<Decision>,
    /// Aggregate counters for this package.
    pub summary: RunSummary,
    /// Why the versions could not be listed, if they could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_error: Option<String>,
    /// Refs whose existence could not be determined and were treated as gone.
    pub ambiguous_refs: usize,
}

impl PackageReport {
    /// Build a report, deriving the summary from the decisions.
    #[must_use]
    pub fn new(package: impl Into<String>, decisions: Vec<Decision>, ambiguous_refs: usize) -> Self {
        let mut summary = RunSummary::default();
        for decision in &decisions {
            summary.record(decision);
        }
        Self {
            package: package.into(),
            decisions,
            summary,
            listing_error: None,
            ambiguous_refs,
        }
    }

    /// A package whose versions could not be listed. Counted as one failure.
    #[must_use]
    pub fn listing_failed(package: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            decisions: Vec::new(),
            summary: RunSummary {
                failed: 1,
                ..RunSummary::default()
            },
            listing_error: Some(error.into()),
            ambiguous_refs: 0,
        }
    }
}

/// Result of a registry pruning run.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryReport {
    /// Registry owner.
    pub scope: String,
    /// Whether deletions were suppressed.
    pub dry_run: bool,
    /// Per-package sections, ordered by package name.
    pub packages: Vec<PackageReport>,
    /// Counters across all packages.
    pub summary: RunSummary,
}

impl RegistryReport {
    /// Build a report, sorting sections and merging their summaries.
    #[must_use]
    pub fn new(scope: impl Into<String>, dry_run: bool, mut packages: Vec<PackageReport>) -> Self {
        packages.sort_by(|a, b| a.package.cmp(&b.package));
        let mut summary = RunSummary::default();
        for package in &packages {
            summary.merge(&package.summary);
        }
        Self {
            scope: scope.into(),
            dry_run,
            packages,
            summary,
        }
    }

    /// Clean or partial.
    #[must_use]
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome::from_summary(&self.summary)
    }

    /// Refs treated as gone because the oracle could not answer.
    #[must_use]
    pub fn ambiguous_refs(&self) -> usize {
        self.packages.iter().map(|p| p.ambiguous_refs).sum()
    }
}

/// Anything that can be rendered as a run summary.
pub trait Summarize {
    /// Heading for the rendered summary.
    fn title(&self) -> String;
    /// Counters to print.
    fn summary(&self) -> &RunSummary;
    /// Whether deletions were suppressed.
    fn dry_run(&self) -> bool;
    /// `(section, decisions)` pairs. Cache reports have a single section.
    fn sections(&self) -> Vec<(&str, &[Decision])>;
    /// Extra lines appended after the counters.
    fn notes(&self) -> Vec<String> {
        Vec::new()
    }
}

impl Summarize for CacheReport {
    fn title(&self) -> String {
        format!("Cache cleanup for {}", self.scope)
    }

    fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }

    fn sections(&self) -> Vec<(&str, &[Decision])> {
        vec![("caches", self.decisions.as_slice())]
    }
}

impl Summarize for RegistryReport {
    fn title(&self) -> String {
        format!("Registry cleanup for {}", self.scope)
    }

    fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }

    fn sections(&self) -> Vec<(&str, &[Decision])> {
        self.packages
            .iter()
            .map(|p| (p.package.as_str(), p.decisions.as_slice()))
            .collect()
    }

    fn notes(&self) -> Vec<String> {
        let mut notes: Vec<String> = self
            .packages
            .iter()
            .filter_map(|p| {
                p.listing_error
                    .as_ref()
                    .map(|e| format!("{}: versions could not be listed ({e})", p.package))
            })
            .collect();
        let ambiguous = self.ambiguous_refs();
        if ambiguous > 0 {
            notes.push(format!(
                "{ambiguous} ref(s) could not be resolved and were treated as deleted"
            ));
        }
        notes
    }
}

fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Kept => "kept".to_string(),
        Outcome::Deleted => "deleted".to_string(),
        Outcome::AlreadyGone => "already gone".to_string(),
        Outcome::Skipped => "dry run".to_string(),
        Outcome::Failed(message) => format!("failed: {message}"),
    }
}

/// The verdict reason, followed by the tag classes for image versions.
fn reason_label(decision: &Decision) -> String {
    let reason = decision.verdict.reason();
    if decision.classes.is_empty() {
        return reason.to_string();
    }
    let classes: Vec<&str> = decision.classes.iter().map(|c| c.as_str()).collect();
    format!("{reason} ({})", classes.join(", "))
}

fn size_label(size: Option<u64>) -> String {
    size.map_or_else(|| "-".to_string(), format_bytes)
}

/// Plain-text summary for terminals and logs.
#[must_use]
pub fn render_text(report: &impl Summarize) -> String {
    let mut out = String::new();
    let summary = report.summary();

    let _ = writeln!(out, "{}", report.title());
    if report.dry_run() {
        let _ = writeln!(out, "(dry run: nothing was deleted)");
    }

    for (section, decisions) in report.sections() {
        let deletions: Vec<&Decision> = decisions.iter().filter(|d| d.verdict.is_delete()).collect();
        if deletions.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{section}:");
        for decision in deletions {
            let _ = writeln!(
                out,
                "  {} [{}] {} {}",
                decision.subject,
                reason_label(decision),
                size_label(decision.size_bytes),
                outcome_label(&decision.outcome),
            );
        }
    }

    let _ = writeln!(
        out,
        "\nexamined {}, kept {}, deleted {}, skipped {}, failed {}, reclaimed {}",
        summary.examined,
        summary.kept,
        summary.deleted,
        summary.skipped,
        summary.failed,
        format_bytes(summary.bytes_reclaimed),
    );
    for note in report.notes() {
        let _ = writeln!(out, "note: {note}");
    }

    out
}

/// Markdown summary for `$GITHUB_STEP_SUMMARY`.
#[must_use]
pub fn render_markdown(report: &impl Summarize) -> String {
    let mut md = String::new();
    let summary = report.summary();

    let status = if summary.is_clean() { "✅" } else { "⚠️" };
    let _ = writeln!(md, "## {status} {}\n", report.title());
    if report.dry_run() {
        let _ = writeln!(md, "> Dry run: nothing was deleted.\n");
    }

    md.push_str("| Examined | Kept | Deleted | Skipped | Failed | Reclaimed |\n");
    md.push_str("|----------|------|---------|---------|--------|-----------|\n");
    let _ = writeln!(
        md,
        "| {} | {} | {} | {} | {} | {} |\n",
        summary.examined,
        summary.kept,
        summary.deleted,
        summary.skipped,
        summary.failed,
        format_bytes(summary.bytes_reclaimed),
    );

    for (section, decisions) in report.sections() {
        let deletions: Vec<&Decision> = decisions.iter().filter(|d| d.verdict.is_delete()).collect();
        if deletions.is_empty() {
            continue;
        }
        let _ = writeln!(md, "### `{section}`\n");
        md.push_str("| Subject | Reason | Size | Result |\n");
        md.push_str("|---------|--------|------|--------|\n");
        for decision in deletions {
            let _ = writeln!(
                md,
                "| `{}` | {} | {} | {} |",
                decision.subject,
                reason_label(decision),
                size_label(decision.size_bytes),
                outcome_label(&decision.outcome),
            );
        }
        md.push('\n');
    }

    let notes = report.notes();
    if !notes.is_empty() {
        md.push_str("### Notes\n\n");
        for note in notes {
            let _ = writeln!(md, "- {note}");
        }
    }

    md
}
