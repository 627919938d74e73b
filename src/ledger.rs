//! Ledger of resources managed by converge
//!
//! The ledger decides whether a configured resource is created under the
//! import guard (unknown handle) or converged in place (known handle). Reads
//! that find a resource gone and successful deletes drop the handle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reconcile::{ExecuteReport, OperationStatus, Outcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the default ledger path (~/.local/state/converge/ledger.toml)
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home
        .join(".local")
        .join("state")
        .join("converge")
        .join("ledger.toml"))
}

// ============================================================================
// Ledger Structures
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Last time the ledger was written
    pub last_updated: Option<DateTime<Utc>>,

    /// Managed resources keyed by canonical handle
    #[serde(default)]
    pub resources: BTreeMap<String, LedgerEntry>,

    #[serde(skip)]
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Catalog kind name
    pub kind: String,

    /// When converge started managing the resource
    pub managed_since: DateTime<Utc>,

    /// Last successful create, update or import
    pub last_applied: DateTime<Utc>,

    pub last_outcome: Outcome,

    /// Adopted with `import` rather than created
    #[serde(default)]
    pub imported: bool,
}

impl Ledger {
    /// Load the ledger, or start an empty one if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let mut ledger = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read ledger: {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("Failed to parse ledger: {}", path.display()))?
        } else {
            log::debug!("Ledger does not exist, starting empty");
            Self::default()
        };
        ledger.path = path.to_path_buf();
        Ok(ledger)
    }

    /// Save the ledger, stamping `last_updated`
    pub fn save(&mut self) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create ledger directory: {}", dir.display()))?;
        }

        self.last_updated = Some(Utc::now());
        let content = toml::to_string_pretty(&self).context("Failed to serialize ledger")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write ledger: {}", self.path.display()))?;

        log::debug!("Saved ledger to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.resources.contains_key(handle)
    }

    pub fn get(&self, handle: &str) -> Option<&LedgerEntry> {
        self.resources.get(handle)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Apply an outcome to the ledger
    ///
    /// Returns whether the ledger changed.
    pub fn record(&mut self, kind: &str, handle: &str, outcome: Outcome) -> bool {
        match outcome {
            Outcome::Created | Outcome::Updated | Outcome::Unchanged => {
                let now = Utc::now();
                self.resources
                    .entry(handle.to_string())
                    .and_modify(|entry| {
                        entry.last_applied = now;
                        entry.last_outcome = outcome;
                    })
                    .or_insert_with(|| LedgerEntry {
                        kind: kind.to_string(),
                        managed_since: now,
                        last_applied: now,
                        last_outcome: outcome,
                        imported: false,
                    });
                true
            }
            Outcome::Deleted | Outcome::AlreadyAbsent => self.forget(handle),
            // never adopt what a create refused to touch
            Outcome::ConflictExists => false,
        }
    }

    /// Start managing an existing resource
    pub fn import(&mut self, kind: &str, handle: &str) {
        let now = Utc::now();
        self.resources.insert(
            handle.to_string(),
            LedgerEntry {
                kind: kind.to_string(),
                managed_since: now,
                last_applied: now,
                last_outcome: Outcome::Unchanged,
                imported: true,
            },
        );
    }

    /// Stop managing a resource without touching it
    pub fn forget(&mut self, handle: &str) -> bool {
        self.resources.remove(handle).is_some()
    }

    /// Record every completed operation of an execution
    ///
    /// Reads are recorded only when they find the resource gone.
    pub fn record_report(&mut self, report: &ExecuteReport) -> usize {
        let mut changed = 0;
        for op in &report.operations {
            let OperationStatus::Done(result) = &op.status else {
                continue;
            };
            let handle = op.identity.format();
            let applies = match op.action {
                "read" => result.outcome == Outcome::AlreadyAbsent,
                _ => true,
            };
            if applies && self.record(op.kind, &handle, result.outcome) {
                changed += 1;
            }
        }
        changed
    }

    /// Handles managed but no longer present in `declared`
    pub fn orphans<'a>(&'a self, declared: &[String]) -> Vec<(&'a str, &'a LedgerEntry)> {
        self.resources
            .iter()
            .filter(|(handle, _)| !declared.contains(handle))
            .map(|(handle, entry)| (handle.as_str(), entry))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HANDLE: &str = "/subscriptions/s/resourceGroups/r/providers/Microsoft.ApiManagement/service/gw/apis/petstore";

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::load(&dir.path().join("ledger.toml")).unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.last_updated.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ledger.toml");

        let mut ledger = Ledger::load(&path).unwrap();
        assert!(ledger.record("api", HANDLE, Outcome::Created));
        ledger.save().unwrap();

        let reloaded = Ledger::load(&path).unwrap();
        let entry = reloaded.get(HANDLE).unwrap();
        assert_eq!(entry.kind, "api");
        assert_eq!(entry.last_outcome, Outcome::Created);
        assert!(!entry.imported);
        assert!(reloaded.last_updated.is_some());
    }

    #[test]
    fn test_record_keeps_managed_since() {
        let mut ledger = Ledger::default();
        ledger.record("api", HANDLE, Outcome::Created);
        let since = ledger.get(HANDLE).unwrap().managed_since;

        ledger.record("api", HANDLE, Outcome::Updated);
        let entry = ledger.get(HANDLE).unwrap();
        assert_eq!(entry.managed_since, since);
        assert_eq!(entry.last_outcome, Outcome::Updated);
    }

    #[test]
    fn test_absence_clears_handle() {
        let mut ledger = Ledger::default();
        ledger.record("api", HANDLE, Outcome::Created);
        assert!(ledger.record("api", HANDLE, Outcome::AlreadyAbsent));
        assert!(!ledger.contains(HANDLE));

        ledger.record("api", HANDLE, Outcome::Created);
        assert!(ledger.record("api", HANDLE, Outcome::Deleted));
        assert!(!ledger.contains(HANDLE));
    }

    #[test]
    fn test_conflict_is_not_adopted() {
        let mut ledger = Ledger::default();
        assert!(!ledger.record("api", HANDLE, Outcome::ConflictExists));
        assert!(!ledger.contains(HANDLE));
    }

    #[test]
    fn test_import_and_forget() {
        let mut ledger = Ledger::default();
        ledger.import("api", HANDLE);
        assert!(ledger.get(HANDLE).unwrap().imported);
        assert!(ledger.forget(HANDLE));
        assert!(!ledger.forget(HANDLE));
    }

    #[test]
    fn test_orphans() {
        let mut ledger = Ledger::default();
        ledger.record("api", HANDLE, Outcome::Created);
        ledger.record("api", "/other", Outcome::Created);

        let orphans = ledger.orphans(&[HANDLE.to_string()]);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].0, "/other");
    }
}
