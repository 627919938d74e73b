//! Local state file gateway.
//!
//! Stands in for a control plane when rehearsing a configuration: resources
//! live in one JSON document keyed by canonical identity. Like a real control
//! plane it assigns server-side values (`etag`, `provisioned_at`), refuses to
//! create a child whose parent does not exist, and deletes children along
//! with their parent.

use chrono::{DateTime, Utc};
use reconcile::{
    BackendGateway, Fields, GatewayError, OperationContext, ResourceIdentity, ResourceRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Identities this shallow are scopes owned by someone else and always exist.
pub const DEFAULT_SCOPE_DEPTH: usize = 2;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    resources: BTreeMap<String, StoredResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredResource {
    fields: Fields,
    etag: String,
    provisioned_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Gateway persisting resources to a JSON file.
pub struct FileGateway {
    path: PathBuf,
    scope_depth: usize,
    lock: Mutex<()>,
}

impl FileGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scope_depth: DEFAULT_SCOPE_DEPTH,
            lock: Mutex::new(()),
        }
    }

    /// Treat identities of at most `depth` segments as pre-existing scopes.
    pub fn with_scope_depth(mut self, depth: usize) -> Self {
        self.scope_depth = depth;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Canonical identities of every stored resource, sorted.
    pub fn identities(&self) -> Result<Vec<String>, GatewayError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.resources.into_keys().collect())
    }

    fn load(&self) -> Result<StateFile, GatewayError> {
        if !self.path.exists() {
            return Ok(StateFile::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| io_error(&self.path, &e))?;
        if content.trim().is_empty() {
            return Ok(StateFile::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            GatewayError::InvalidResponse(format!("{}: {e}", self.path.display()))
        })
    }

    fn save(&self, state: &StateFile) -> Result<(), GatewayError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
        }
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        // write then rename so a crash never leaves a torn file
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content).map_err(|e| io_error(&staging, &e))?;
        fs::rename(&staging, &self.path).map_err(|e| io_error(&self.path, &e))
    }

    fn record(id: &ResourceIdentity, stored: &StoredResource) -> ResourceRecord {
        ResourceRecord::with_fields(id.clone(), stored.fields.clone())
            .with_field("etag", stored.etag.clone())
            .with_field("provisioned_at", stored.provisioned_at.to_rfc3339())
    }
}

impl BackendGateway for FileGateway {
    fn fetch(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
    ) -> Result<Option<ResourceRecord>, GatewayError> {
        ctx.check()?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let state = self.load()?;
        Ok(state
            .resources
            .get(&id.format())
            .map(|stored| Self::record(id, stored)))
    }

    fn put(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
        desired: &ResourceRecord,
    ) -> Result<ResourceRecord, GatewayError> {
        ctx.check()?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.load()?;

        if let Some(parent) = id.parent()
            && parent.depth() > self.scope_depth
            && !state.resources.contains_key(&parent.format())
        {
            return Err(GatewayError::Remote {
                status: 404,
                message: format!("parent resource {parent} does not exist"),
            });
        }

        let now = Utc::now();
        let fields = desired.fields().clone();
        let etag = etag_for(&fields)?;
        let key = id.format();
        let provisioned_at = state
            .resources
            .get(&key)
            .map_or(now, |existing| existing.provisioned_at);

        let stored = StoredResource {
            fields,
            etag,
            provisioned_at,
            updated_at: now,
        };
        let record = Self::record(id, &stored);
        state.resources.insert(key, stored);
        self.save(&state)?;
        log::debug!("stored {id} in {}", self.path.display());
        Ok(record)
    }

    fn remove(&self, ctx: &OperationContext, id: &ResourceIdentity) -> Result<bool, GatewayError> {
        ctx.check()?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.load()?;

        let key = id.format();
        if state.resources.remove(&key).is_none() {
            return Ok(false);
        }
        let prefix = format!("{key}/");
        let before = state.resources.len();
        state.resources.retain(|k, _| !k.starts_with(&prefix));
        let cascaded = before - state.resources.len();
        if cascaded > 0 {
            log::info!("removed {cascaded} resources below {id}");
        }
        self.save(&state)?;
        Ok(true)
    }
}

/// Content hash of the stored fields, quoted like an HTTP entity tag.
fn etag_for(fields: &Fields) -> Result<String, GatewayError> {
    let bytes =
        serde_json::to_vec(fields).map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
    let hash = blake3::hash(&bytes).to_hex();
    Ok(format!("\"{}\"", &hash[..16]))
}

fn io_error(path: &Path, err: &std::io::Error) -> GatewayError {
    GatewayError::transport(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::catalog;
    use tempfile::TempDir;

    fn service_id() -> ResourceIdentity {
        catalog::SERVICE.schema.build(&["s", "r", "gw"]).unwrap()
    }

    fn api_id() -> ResourceIdentity {
        catalog::API
            .schema
            .compose(&service_id(), "api", "petstore")
            .unwrap()
    }

    fn gateway(dir: &TempDir) -> FileGateway {
        FileGateway::new(dir.path().join("state.json"))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        let ctx = OperationContext::default();
        assert!(gateway.fetch(&ctx, &service_id()).unwrap().is_none());
        assert!(!gateway.remove(&ctx, &service_id()).unwrap());
        assert!(gateway.identities().unwrap().is_empty());
    }

    #[test]
    fn test_put_assigns_server_values() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        let ctx = OperationContext::default();
        let record = ResourceRecord::new(service_id()).with_field("sku_name", "Developer_1");

        let stored = gateway.put(&ctx, &service_id(), &record).unwrap();
        let etag = stored.get("etag").and_then(|v| v.as_str()).unwrap();
        assert!(etag.starts_with('"') && etag.len() == 18);
        assert!(stored.get("provisioned_at").is_some());

        let fetched = gateway.fetch(&ctx, &service_id()).unwrap().unwrap();
        assert_eq!(fetched, stored);
    }

    #[test]
    fn test_etag_tracks_content() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        let ctx = OperationContext::default();
        let a = ResourceRecord::new(service_id()).with_field("sku_name", "Developer_1");
        let b = ResourceRecord::new(service_id()).with_field("sku_name", "Premium_1");

        let first = gateway.put(&ctx, &service_id(), &a).unwrap();
        let second = gateway.put(&ctx, &service_id(), &b).unwrap();
        let third = gateway.put(&ctx, &service_id(), &a).unwrap();

        assert_ne!(first.get("etag"), second.get("etag"));
        assert_eq!(first.get("etag"), third.get("etag"));
        assert_eq!(first.get("provisioned_at"), third.get("provisioned_at"));
    }

    #[test]
    fn test_put_requires_parent() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        let ctx = OperationContext::default();

        let err = gateway
            .put(&ctx, &api_id(), &ResourceRecord::new(api_id()))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Remote { status: 404, .. }));

        gateway
            .put(&ctx, &service_id(), &ResourceRecord::new(service_id()))
            .unwrap();
        assert!(gateway.put(&ctx, &api_id(), &ResourceRecord::new(api_id())).is_ok());
    }

    #[test]
    fn test_remove_cascades_to_children() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        let ctx = OperationContext::default();
        gateway
            .put(&ctx, &service_id(), &ResourceRecord::new(service_id()))
            .unwrap();
        gateway
            .put(&ctx, &api_id(), &ResourceRecord::new(api_id()))
            .unwrap();

        assert!(gateway.remove(&ctx, &service_id()).unwrap());
        assert!(gateway.fetch(&ctx, &api_id()).unwrap().is_none());
        assert!(gateway.identities().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_invalid_response() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        fs::write(gateway.path(), "{ not json").unwrap();

        let err = gateway
            .fetch(&OperationContext::default(), &service_id())
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }
}
