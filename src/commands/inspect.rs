//! Offline commands: `kinds`, `id parse`, `id compose`, `validate`

use anyhow::{Context as _, Result};
use colored::Colorize;
use reconcile::{IdentitySchema, ResourceKind, catalog};

use crate::Context;
use crate::cli::IdCommand;
use crate::config::Config;
use crate::ui;

/// Identity template of a schema, e.g. `/subscriptions/{subscription}/...`
pub fn template(schema: &IdentitySchema) -> String {
    let mut out = String::new();
    for segment in schema.segments {
        match segment.keyword {
            Some(keyword) => out.push_str(&format!("/{keyword}/{{{}}}", segment.kind)),
            None if out.is_empty() => out.push_str(&format!("{{{}}}", segment.kind)),
            None => out.push_str(&format!("/{{{}}}", segment.kind)),
        }
    }
    out
}

pub fn kinds(ctx: &Context) -> Result<()> {
    ui::header("Resource kinds");
    for kind in catalog::all() {
        println!("  {:<22} {}", kind.name.bold(), kind.summary);
        if ctx.verbose > 0 {
            ui::dim(&template(kind.schema));
            let fields: Vec<String> = kind.fields.iter().map(field_label).collect();
            ui::dim(&format!("fields: {}", fields.join(", ")));
        }
    }
    Ok(())
}

fn field_label(spec: &reconcile::FieldSpec) -> String {
    let mut label = spec.name.to_string();
    if spec.required {
        label.push('*');
    }
    if spec.computed {
        label.push_str(" (computed)");
    }
    if spec.write_only {
        label.push_str(" (write-only)");
    }
    label
}

pub fn id(cmd: IdCommand) -> Result<()> {
    match cmd {
        IdCommand::Parse { handle, kind } => parse(&handle, kind.as_deref()),
        IdCommand::Compose { kind, parent, name } => compose(&kind, &parent, name.as_deref()),
    }
}

fn resolve_kind(handle: &str, kind: Option<&str>) -> Result<&'static ResourceKind> {
    match kind {
        Some(name) => Ok(catalog::require(name)?),
        None => catalog::detect(handle)
            .with_context(|| format!("'{handle}' does not match any known resource kind")),
    }
}

fn parse(handle: &str, kind: Option<&str>) -> Result<()> {
    let kind = resolve_kind(handle, kind)?;
    let id = kind.parse_handle(handle)?;

    ui::kv("kind", kind.name);
    ui::kv("id", &id.format());
    for segment in id.segments() {
        ui::kv(segment.kind(), segment.value());
    }
    Ok(())
}

fn compose(kind: &str, parent: &str, name: Option<&str>) -> Result<()> {
    let kind = catalog::require(kind)?;
    let parent_kind = resolve_kind(parent, None)?;
    let parent = parent_kind.parse_handle(parent)?;
    let id = kind.identity_in(&parent, name)?;
    println!("{id}");
    Ok(())
}

pub fn validate(ctx: &Context) -> Result<()> {
    let config = Config::load_from(ctx.config.as_deref())?;
    config.validate()?;
    let resources = config.desired_resources()?;
    ui::success(&format!(
        "Config is valid ({})",
        ui::plural(resources.len(), "resource")
    ));
    Ok(())
}
