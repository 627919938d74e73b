//! Rendering of plans, drift and records

use colored::Colorize;
use reconcile::{Change, DriftReport, FieldChange, FieldValue, Fields, Plan, PlannedAction};
use similar::{ChangeTag, TextDiff};

/// One-line value preview; documents are summarized by size
pub fn preview(value: &FieldValue) -> String {
    match value {
        FieldValue::String(s) => format!("{s:?}"),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Record(fields) => {
            let inner: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{k} = {}", preview(v)))
                .collect();
            format!("{{ {} }}", inner.join(", "))
        }
        FieldValue::Document(text) => format!("<document, {} lines>", text.lines().count()),
    }
}

/// Symbol and label for a planned action
pub fn action_label(action: PlannedAction) -> String {
    match action {
        PlannedAction::Create => format!("{} create", "+".green().bold()),
        PlannedAction::Update => format!("{} update", "~".yellow().bold()),
        PlannedAction::NoChange => format!("{} up to date", "✓".green()),
        PlannedAction::Conflict => format!("{} exists, not managed", "!".red().bold()),
    }
}

/// Print a plan for one resource
pub fn plan(label: &str, plan: &Plan, verbose: bool) {
    println!(
        "  {} {} {}",
        action_label(plan.action),
        label.bold(),
        plan.identity().to_string().dimmed()
    );

    match plan.action {
        PlannedAction::Create | PlannedAction::Update => drift(&plan.drift, verbose),
        PlannedAction::Conflict => {
            println!(
                "      {}",
                "run `converge import` to manage it, or set import_guard = false".dimmed()
            );
        }
        PlannedAction::NoChange => {
            if verbose {
                drift(&plan.drift, verbose);
            }
        }
    }
}

/// Print field changes; equivalent documents show only when verbose
pub fn drift(report: &DriftReport, verbose: bool) {
    for change in report.material() {
        field_change(change);
    }
    if verbose {
        for change in report.suppressed() {
            println!(
                "      {} {} {}",
                "=".dimmed(),
                change.field,
                "(formatting only)".dimmed()
            );
        }
    }
}

fn field_change(change: &FieldChange) {
    match &change.change {
        Change::Added { desired } => {
            println!("      {} {} = {}", "+".green(), change.field, preview(desired));
        }
        Change::Modified { live, desired } => match (live.text(), desired.text()) {
            (Some(old), Some(new)) if is_multiline(old, new) => {
                println!("      {} {}", "~".yellow(), change.field);
                text_diff(old, new);
            }
            _ => println!(
                "      {} {}: {} → {}",
                "~".yellow(),
                change.field,
                preview(live).red(),
                preview(desired).green()
            ),
        },
        Change::Equivalent { .. } => {}
    }
}

fn is_multiline(old: &str, new: &str) -> bool {
    old.contains('\n') || new.contains('\n') || old.len() > 80 || new.len() > 80
}

/// Unified line diff between live and desired text
fn text_diff(old: &str, new: &str) {
    let diff = TextDiff::from_lines(old, new);
    for group in diff.grouped_ops(2) {
        for op in group {
            for change in diff.iter_changes(&op) {
                let line = change.to_string_lossy();
                let line = line.trim_end_matches('\n');
                match change.tag() {
                    ChangeTag::Delete => println!("        {}", format!("- {line}").red()),
                    ChangeTag::Insert => println!("        {}", format!("+ {line}").green()),
                    ChangeTag::Equal => println!("        {}", format!("  {line}").dimmed()),
                }
            }
        }
    }
}

/// Print every field of a record, documents in full
pub fn fields(fields: &Fields) {
    for (name, value) in fields {
        match value {
            FieldValue::Document(text) => {
                println!("  {}:", name.dimmed());
                for line in text.lines() {
                    println!("    {line}");
                }
            }
            other => println!("  {}: {}", name.dimmed(), preview(other)),
        }
    }
}
