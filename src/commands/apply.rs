//! `plan` and `apply`
//!
//! Resources unknown to the ledger are created under the import guard, so an
//! existing remote resource is reported instead of silently adopted. Known
//! resources are converged in place.

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use dialoguer::Confirm;
use reconcile::{
    ExecuteOptions, ExecuteSummary, ExecutionPlan, Operation, OperationContext, Plan,
    PlannedAction, WriteMode, execute,
};
use std::time::Duration;

use super::Session;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::DesiredResource;
use crate::progress::ApplyProgress;
use crate::render;
use crate::ui;

/// Planned actions, tallied
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub create: usize,
    pub update: usize,
    pub unchanged: usize,
    pub conflict: usize,
    pub errors: usize,
}

impl PlanCounts {
    pub fn add(&mut self, action: PlannedAction) {
        match action {
            PlannedAction::Create => self.create += 1,
            PlannedAction::Update => self.update += 1,
            PlannedAction::NoChange => self.unchanged += 1,
            PlannedAction::Conflict => self.conflict += 1,
        }
    }

    pub fn changes(&self) -> usize {
        self.create + self.update
    }
}

/// How a configured resource is written, given what the ledger knows
pub fn write_mode(session: &Session, desired: &DesiredResource) -> WriteMode {
    if session.ledger.contains(&desired.handle()) || !desired.import_guard {
        WriteMode::Upsert
    } else {
        WriteMode::CreateNew
    }
}

// ============================================================================
// Plan Command
// ============================================================================

pub fn plan(ctx: &Context, target: Option<&str>) -> Result<()> {
    let session = Session::open(ctx)?;
    let desired = session.desired(target)?;
    if desired.is_empty() {
        ui::info("No resources configured");
        return Ok(());
    }

    ui::header("Plan");
    let counts = plan_all(&session, &desired, &OperationContext::new(), ctx.verbose > 0);
    print_counts(&counts);
    if target.is_none() {
        warn_orphans(&session, &desired);
    }

    if counts.errors > 0 {
        bail!("{} could not be planned", ui::plural(counts.errors, "resource"));
    }
    Ok(())
}

fn plan_all(
    session: &Session,
    desired: &[DesiredResource],
    op_ctx: &OperationContext,
    verbose: bool,
) -> PlanCounts {
    let mut counts = PlanCounts::default();
    for resource in desired {
        match plan_one(session, resource, op_ctx) {
            Ok(plan) => {
                render::plan(&resource.label, &plan, verbose);
                counts.add(plan.action);
            }
            Err(e) => {
                println!("  {} {} {e:#}", "✗".red(), resource.label.bold());
                counts.errors += 1;
            }
        }
    }
    counts
}

fn plan_one(
    session: &Session,
    resource: &DesiredResource,
    op_ctx: &OperationContext,
) -> Result<Plan> {
    let mode = write_mode(session, resource);
    session
        .engine
        .plan(op_ctx, resource.kind, &resource.record, mode)
        .with_context(|| format!("planning {}", resource.label))
}

fn print_counts(counts: &PlanCounts) {
    println!();
    println!(
        "  {} to create, {} to update, {} unchanged",
        counts.create.to_string().green(),
        counts.update.to_string().yellow(),
        counts.unchanged
    );
    if counts.conflict > 0 {
        println!(
            "  {} already exist and are not managed",
            counts.conflict.to_string().red()
        );
    }
}

fn warn_orphans(session: &Session, desired: &[DesiredResource]) {
    let declared: Vec<String> = desired.iter().map(DesiredResource::handle).collect();
    let orphans = session.ledger.orphans(&declared);
    if orphans.is_empty() {
        return;
    }
    println!();
    ui::warn(&format!(
        "{} managed but no longer configured:",
        ui::plural(orphans.len(), "resource")
    ));
    for (handle, entry) in orphans {
        ui::dim(&format!("{} {handle}", entry.kind));
    }
    ui::dim("Run `converge destroy <kind.name>` to delete or `converge forget <handle>` to release");
}

// ============================================================================
// Apply Command
// ============================================================================

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let desired = session.desired(args.target.as_deref())?;
    if desired.is_empty() {
        ui::info("No resources configured");
        return Ok(());
    }

    let op_ctx = match args.timeout {
        Some(secs) => OperationContext::new().with_timeout(Duration::from_secs(secs)),
        None => OperationContext::new(),
    };

    ui::header("Plan");
    let counts = plan_all(&session, &desired, &op_ctx, ctx.verbose > 0);
    print_counts(&counts);

    if counts.errors > 0 {
        bail!("{} could not be planned", ui::plural(counts.errors, "resource"));
    }
    if args.dry_run {
        println!();
        ui::info("Dry run - nothing was written");
        return Ok(());
    }
    if counts.changes() == 0 && counts.conflict == 0 {
        println!();
        ui::success("Everything is up to date");
        return Ok(());
    }

    if !args.yes && !ctx.quiet {
        println!();
        let confirmed = Confirm::new()
            .with_prompt(format!("Apply {}?", ui::plural(counts.changes(), "change")))
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            ui::info("Cancelled");
            return Ok(());
        }
    }

    let mut plan = ExecutionPlan::new();
    for resource in &desired {
        let op = match write_mode(&session, resource) {
            WriteMode::CreateNew => Operation::create(resource.kind, resource.record.clone()),
            WriteMode::Upsert => Operation::update(resource.kind, resource.record.clone()),
        };
        plan.add(op);
    }

    ui::header("Apply");
    let opts = ExecuteOptions {
        jobs: args.jobs.max(1),
        fail_fast: args.fail_fast,
    };
    let mut progress = ApplyProgress::new(plan.len(), ctx.quiet);
    let report = execute(&session.engine, &plan, &opts, &op_ctx, &mut progress)?;
    progress.finish();

    let recorded = session.ledger.record_report(&report);
    if recorded > 0 {
        session.ledger.save()?;
    }

    print_summary(&report.summary);
    if !report.summary.is_success() {
        bail!(
            "apply finished with {} and {}",
            ui::plural(report.summary.failed, "failure"),
            ui::plural(report.summary.conflicts, "conflict")
        );
    }
    Ok(())
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Done", "✓".green().bold());
    } else {
        println!("  {} Finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} created", ui::plural(summary.created, "resource"));
    }
    if summary.updated > 0 {
        println!("    • {} updated", ui::plural(summary.updated, "resource"));
    }
    if summary.unchanged > 0 {
        println!("    • {} unchanged", ui::plural(summary.unchanged, "resource"));
    }
    if summary.deleted > 0 {
        println!("    • {} deleted", ui::plural(summary.deleted, "resource"));
    }
    if summary.absent > 0 {
        println!("    • {} already absent", ui::plural(summary.absent, "resource"));
    }
    if summary.conflicts > 0 {
        println!(
            "    • {} {}",
            ui::plural(summary.conflicts, "resource"),
            "exist and are not managed".red()
        );
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", ui::plural(summary.skipped, "resource"));
    }
    if summary.failed > 0 {
        println!(
            "    • {} {}",
            ui::plural(summary.failed, "resource"),
            "failed".red()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_counts() {
        let mut counts = PlanCounts::default();
        counts.add(PlannedAction::Create);
        counts.add(PlannedAction::Update);
        counts.add(PlannedAction::NoChange);
        counts.add(PlannedAction::Conflict);
        assert_eq!(counts.changes(), 2);
        assert_eq!(counts.unchanged, 1);
        assert_eq!(counts.conflict, 1);
    }
}
