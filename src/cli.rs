use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge API gateway resources to a declared state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/converge/config.toml)
    #[arg(short, long, global = true, env = "CONVERGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change, without writing
    Plan(PlanArgs),

    /// Create or update every configured resource
    Apply(ApplyArgs),

    /// Read the live state of one resource
    Show {
        /// Catalog kind (see `converge kinds`)
        kind: String,

        /// Resource identity
        handle: String,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start managing a resource that already exists
    Import {
        /// Catalog kind (see `converge kinds`)
        kind: String,

        /// Resource identity
        handle: String,
    },

    /// Delete every managed resource
    Destroy(DestroyArgs),

    /// Stop managing a resource without deleting it
    Forget {
        /// Resource identity
        handle: String,
    },

    /// Parse and compose resource identities
    #[command(subcommand)]
    Id(IdCommand),

    /// List the built-in resource kinds
    Kinds,

    /// Validate the config file
    Validate,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Apply / Destroy
// ============================================================================

#[derive(Parser)]
pub struct PlanArgs {
    /// Only resources of a kind, or one resource (`kind.name`)
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Only resources of a kind, or one resource (`kind.name`)
    pub target: Option<String>,

    /// Dry run - show the plan and stop
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of resources written concurrently
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Cancel remaining work after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Only resources of a kind, or one resource (`kind.name`)
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of resources deleted concurrently
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

// ============================================================================
// Identity Commands
// ============================================================================

#[derive(Subcommand)]
pub enum IdCommand {
    /// Split an identity into its segments
    Parse {
        /// Identity string; keyword casing is not significant
        handle: String,

        /// Kind to parse as (detected when omitted)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Build a child identity under a parent
    Compose {
        /// Kind of the child
        kind: String,

        /// Parent identity
        parent: String,

        /// Leaf value (optional for policies)
        name: Option<String>,
    },
}
