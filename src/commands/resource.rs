//! `show`, `import` and `forget`

use anyhow::{Result, bail};
use reconcile::{OperationContext, Outcome, catalog};

use super::Session;
use crate::Context;
use crate::render;
use crate::ui;

/// Print the live state of one resource
pub fn show(ctx: &Context, kind: &str, handle: &str, json: bool) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let kind = catalog::require(kind)?;

    let result = session
        .engine
        .read_handle(&OperationContext::new(), kind, handle)?;
    let canonical = result.identity.format();

    let Some(record) = result.record else {
        if session.ledger.record(kind.name, &canonical, Outcome::AlreadyAbsent) {
            session.ledger.save()?;
            ui::warn(&format!("{canonical} no longer exists; removed from the ledger"));
        } else {
            ui::warn(&format!("{canonical} does not exist"));
        }
        return Ok(());
    };

    if json {
        let value = serde_json::json!({
            "kind": kind.name,
            "id": record.identity().format(),
            "managed": session.ledger.contains(&canonical),
            "fields": gateway::wire::fields_to_json(record.fields()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    ui::header(&format!("{} {}", kind.name, record.identity().name()));
    ui::kv("id", &record.identity().format());
    match session.ledger.get(&canonical) {
        Some(entry) => ui::kv(
            "managed",
            &format!(
                "since {}{}",
                entry.managed_since.format("%Y-%m-%d %H:%M UTC"),
                if entry.imported { " (imported)" } else { "" }
            ),
        ),
        None => ui::kv("managed", "no"),
    }
    println!();
    render::fields(record.fields());
    Ok(())
}

/// Adopt an existing resource into the ledger
pub fn import(ctx: &Context, kind: &str, handle: &str) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let kind = catalog::require(kind)?;

    let result = session
        .engine
        .read_handle(&OperationContext::new(), kind, handle)?;
    let canonical = result.identity.format();

    if result.outcome == Outcome::AlreadyAbsent {
        bail!("{canonical} does not exist; nothing to import");
    }
    if session.ledger.contains(&canonical) {
        ui::info(&format!("{canonical} is already managed"));
        return Ok(());
    }

    session.ledger.import(kind.name, &canonical);
    session.ledger.save()?;
    ui::success(&format!("Imported {} {canonical}", kind.name));
    Ok(())
}

/// Drop a handle from the ledger; the remote resource is left alone
pub fn forget(ctx: &Context, handle: &str) -> Result<()> {
    let mut session = Session::open(ctx)?;

    // accept any keyword casing, but match the ledger's canonical form
    let canonical = catalog::detect(handle)
        .and_then(|kind| kind.parse_handle(handle).ok())
        .map_or_else(|| handle.to_string(), |id| id.format());

    if session.ledger.forget(&canonical) {
        session.ledger.save()?;
        ui::success(&format!("Forgot {canonical}"));
    } else {
        ui::warn(&format!("{canonical} is not managed"));
    }
    Ok(())
}
