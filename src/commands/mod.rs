// Desired-state commands
pub mod apply;
pub mod destroy;

// Single-resource commands
pub mod resource;

// Catalog and identity inspection
pub mod inspect;

use crate::Context;
use crate::config::{Config, DesiredResource};
use crate::ledger::Ledger;
use anyhow::Result;
use reconcile::planner::matches_target;
use reconcile::{BackendGateway, ReconciliationEngine};

pub type Engine = ReconciliationEngine<Box<dyn BackendGateway>>;

/// Everything a command needs: config, engine and ledger
pub struct Session {
    pub config: Config,
    pub engine: Engine,
    pub ledger: Ledger,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = Config::load_from(ctx.config.as_deref())?;
        let engine = ReconciliationEngine::new(config.gateway()?)
            .with_read_after_write(config.engine.to_read_after_write());
        let ledger = Ledger::load(&config.ledger_path()?)?;
        Ok(Self {
            config,
            engine,
            ledger,
        })
    }

    /// Configured resources, filtered by `kind` or `kind.name`
    pub fn desired(&self, target: Option<&str>) -> Result<Vec<DesiredResource>> {
        let resources = self.config.desired_resources()?;
        Ok(match target {
            None => resources,
            Some(target) => resources
                .into_iter()
                .filter(|r| matches_target(target, r.kind.name, r.record.identity().name()))
                .collect(),
        })
    }
}
