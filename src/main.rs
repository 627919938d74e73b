mod cli;
mod commands;
mod config;
mod ledger;
mod progress;
mod render;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, PlanArgs};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Plan(PlanArgs { target }) => commands::apply::plan(&ctx, target.as_deref()),
        Command::Apply(args) => commands::apply::apply(&ctx, args),
        Command::Show { kind, handle, json } => {
            commands::resource::show(&ctx, &kind, &handle, json)
        }
        Command::Import { kind, handle } => commands::resource::import(&ctx, &kind, &handle),
        Command::Destroy(args) => commands::destroy::run(&ctx, args),
        Command::Forget { handle } => commands::resource::forget(&ctx, &handle),
        Command::Id(cmd) => commands::inspect::id(cmd),
        Command::Kinds => commands::inspect::kinds(&ctx),
        Command::Validate => commands::inspect::validate(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "converge", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = &result
        && let Some(category) = error_category(e)
    {
        ui::error(&format!("{e:#}"));
        ui::dim(category.advice());
        std::process::exit(1);
    }
    result
}

/// Category of the first engine or gateway error in the chain
fn error_category(err: &anyhow::Error) -> Option<reconcile::ErrorCategory> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<reconcile::Error>() {
            Some(e.category())
        } else {
            cause
                .downcast_ref::<reconcile::GatewayError>()
                .map(reconcile::GatewayError::category)
        }
    })
}
