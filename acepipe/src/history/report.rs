//! Human-readable playbook evolution report.

use super::HistoryLog;
use crate::playbook::{Playbook, PlaybookSection};
use std::fmt::Write;

/// Title of the per-run section.
pub const EVOLUTION_HEADER: &str = "PLAYBOOK EVOLUTION (Refined Prompt Instructions)";
/// Title of the final playbook section.
pub const FINAL_PLAYBOOK_HEADER: &str = "FINAL PLAYBOOK (These are your new prompt instructions)";

const RULE_WIDTH: usize = 60;

/// Renders per-run strategy counts followed by the final playbook.
#[must_use]
pub fn evolution_report(log: &HistoryLog, playbook: &Playbook) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\n{EVOLUTION_HEADER}\n{rule}");

    if log.is_empty() {
        out.push_str("No history recorded yet.\n");
        return out;
    }

    for entry in log {
        let count = entry.playbook_snapshot().map_or(0, Playbook::len);
        let _ = writeln!(out, "\nAfter Run: {}:\n  Strategies: {count}", entry.pipeline_id());
    }

    let _ = writeln!(out, "\n{rule}\n{FINAL_PLAYBOOK_HEADER}\n{rule}");
    out.push_str(&playbook.format(&PlaybookSection::all()));
    out
}
