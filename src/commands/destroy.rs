//! `destroy` - delete managed resources, children first

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use dialoguer::Confirm;
use reconcile::{ExecuteOptions, ExecutionPlan, Operation, OperationContext, catalog, execute};

use super::Session;
use crate::Context;
use crate::cli::DestroyArgs;
use crate::progress::ApplyProgress;
use crate::ui;

pub fn run(ctx: &Context, args: DestroyArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;

    let mut plan = ExecutionPlan::new();
    for (handle, entry) in &session.ledger.resources {
        let kind = catalog::require(&entry.kind)
            .with_context(|| format!("ledger entry {handle}"))?;
        let id = kind
            .parse_handle(handle)
            .with_context(|| format!("ledger entry {handle}"))?;
        plan.add(Operation::delete(kind, id));
    }
    let plan = plan.filter_by_target(args.target.as_deref());

    if plan.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(());
    }

    ui::header("Destroy");
    for op in &plan.operations {
        println!("  {} {} {}", "-".red().bold(), op.kind.name, op.identity().to_string().dimmed());
    }

    if !args.yes {
        println!();
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {}?", ui::plural(plan.len(), "resource")))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            ui::info("Cancelled");
            return Ok(());
        }
    }

    let opts = ExecuteOptions {
        jobs: args.jobs.max(1),
        fail_fast: false,
    };
    let mut progress = ApplyProgress::new(plan.len(), ctx.quiet);
    let report = execute(
        &session.engine,
        &plan,
        &opts,
        &OperationContext::new(),
        &mut progress,
    )?;
    progress.finish();

    if session.ledger.record_report(&report) > 0 {
        session.ledger.save()?;
    }

    super::apply::print_summary(&report.summary);
    if !report.summary.is_success() {
        bail!(
            "destroy finished with {}",
            ui::plural(report.summary.failed, "failure")
        );
    }
    Ok(())
}
