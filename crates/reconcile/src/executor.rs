//! Execution engine - applies plans wave by wave with parallelism

use crate::context::{OperationContext, ProgressCallback};
use crate::engine::ReconciliationEngine;
use crate::error::{Error, Result};
use crate::gateway::BackendGateway;
use crate::identity::ResourceIdentity;
use crate::outcome::{ExecuteSummary, Reconciliation};
use crate::planner::{Action, Chain, ExecutionPlan, Operation};
use rayon::prelude::*;

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of chains run concurrently within a wave
    pub jobs: usize,
    /// Cancel remaining work after the first failure
    pub fail_fast: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            fail_fast: false,
        }
    }
}

/// How one operation ended
#[derive(Debug)]
pub enum OperationStatus {
    Done(Reconciliation),
    Failed(Error),
    Skipped { reason: String },
}

/// Result of one planned operation
#[derive(Debug)]
pub struct OperationReport {
    pub kind: &'static str,
    pub action: &'static str,
    pub identity: ResourceIdentity,
    pub status: OperationStatus,
}

impl OperationReport {
    /// Whether resources below this one must not be touched.
    fn blocks_dependents(&self) -> bool {
        match &self.status {
            OperationStatus::Done(result) => !result.outcome.unblocks_children(),
            OperationStatus::Failed(_) | OperationStatus::Skipped { .. } => true,
        }
    }
}

/// Per-operation results plus totals
#[derive(Debug, Default)]
pub struct ExecuteReport {
    pub summary: ExecuteSummary,
    pub operations: Vec<OperationReport>,
}

/// Execute a plan against an engine
///
/// Waves run in order. Chains in a wave run on up to `opts.jobs` threads;
/// operations within a chain run in sequence. Operations below a failed or
/// conflicting resource are skipped, as are deletes above a failed delete.
///
/// Per-operation failures are reported, not returned: the `Err` case is
/// reserved for failing to start the worker pool.
pub fn execute<G, P>(
    engine: &ReconciliationEngine<G>,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    ctx: &OperationContext,
    progress: &mut P,
) -> Result<ExecuteReport>
where
    G: BackendGateway,
    P: ProgressCallback,
{
    let mut report = ExecuteReport::default();
    if plan.is_empty() {
        return Ok(report);
    }

    let pool = if opts.jobs > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(opts.jobs)
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?,
        )
    } else {
        None
    };

    let mut blocked: Vec<ResourceIdentity> = Vec::new();

    for wave in plan.waves() {
        progress.on_wave_start(wave.len());

        let run = |chain: &Chain<'_>| run_chain(engine, chain, ctx, &blocked, opts.fail_fast);
        let results: Vec<Vec<OperationReport>> = match &pool {
            Some(pool) if wave.len() > 1 => pool.install(|| wave.par_iter().map(run).collect()),
            _ => wave.iter().map(run).collect(),
        };

        for op in results.into_iter().flatten() {
            let id = op.identity.format();
            match &op.status {
                OperationStatus::Done(result) => {
                    report.summary.add_outcome(result.outcome);
                    progress.on_operation_complete(&id, result);
                }
                OperationStatus::Failed(error) => {
                    report.summary.failed += 1;
                    progress.on_operation_failed(&id, error);
                }
                OperationStatus::Skipped { reason } => {
                    report.summary.skipped += 1;
                    progress.on_operation_skipped(&id, reason);
                }
            }
            if op.blocks_dependents() {
                blocked.push(op.identity.clone());
            }
            report.operations.push(op);
        }

        progress.on_wave_complete();
    }

    Ok(report)
}

/// Execute a plan without progress reporting
pub fn execute_simple<G: BackendGateway>(
    engine: &ReconciliationEngine<G>,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
) -> Result<ExecuteReport> {
    use crate::context::NoProgress;

    execute(
        engine,
        plan,
        opts,
        &OperationContext::default(),
        &mut NoProgress,
    )
}

fn run_chain<G: BackendGateway>(
    engine: &ReconciliationEngine<G>,
    chain: &Chain<'_>,
    ctx: &OperationContext,
    blocked: &[ResourceIdentity],
    fail_fast: bool,
) -> Vec<OperationReport> {
    let removal = chain.is_removal();
    let blocker = blocked.iter().find(|b| {
        if removal {
            chain.identity.is_ancestor_of(b)
        } else {
            b.is_ancestor_of(chain.identity)
        }
    });

    let mut skip_reason = blocker.map(|b| format!("{b} did not complete"));
    let mut reports = Vec::with_capacity(chain.operations.len());

    for op in &chain.operations {
        let status = match &skip_reason {
            Some(reason) => OperationStatus::Skipped {
                reason: reason.clone(),
            },
            None => match run_operation(engine, op, ctx) {
                Ok(result) => OperationStatus::Done(result),
                Err(error) => {
                    log::error!("{op} failed: {error}");
                    if fail_fast {
                        ctx.cancel_token().cancel();
                    }
                    OperationStatus::Failed(error)
                }
            },
        };

        let report = OperationReport {
            kind: op.kind.name,
            action: op.action.name(),
            identity: op.identity().clone(),
            status,
        };
        if skip_reason.is_none() && report.blocks_dependents() {
            skip_reason = Some(format!("an earlier {} did not complete", report.action));
        }
        reports.push(report);
    }

    reports
}

fn run_operation<G: BackendGateway>(
    engine: &ReconciliationEngine<G>,
    op: &Operation,
    ctx: &OperationContext,
) -> Result<Reconciliation> {
    match &op.action {
        Action::Create(record) => engine.create(ctx, op.kind, record),
        Action::Update(record) => engine.update(ctx, op.kind, record),
        Action::Read(id) => engine.read(ctx, op.kind, id),
        Action::Delete(id) => engine.delete(ctx, op.kind, id),
    }
}
