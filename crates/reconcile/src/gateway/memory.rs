//! In-process gateway for tests and dry runs.

use super::{BackendGateway, GatewayError};
use crate::context::OperationContext;
use crate::identity::ResourceIdentity;
use crate::record::ResourceRecord;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A recorded gateway call, keyed by canonical identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch(String),
    Put(String),
    Remove(String),
}

/// Gateway operation selector for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOp {
    Fetch,
    Put,
    Remove,
}

#[derive(Debug)]
struct Failure {
    op: GatewayOp,
    skip: usize,
    error: GatewayError,
}

#[derive(Debug, Default)]
struct State {
    records: HashMap<String, ResourceRecord>,
    calls: Vec<Call>,
    failures: VecDeque<Failure>,
    hidden_reads: HashMap<String, u32>,
    visibility_delay: u32,
    version: u64,
}

/// Gateway backed by an in-memory map.
///
/// Clones share state. Every `put` stamps an `etag` field the way a real
/// control plane assigns server-side values, and every call is recorded so
/// tests can assert on the exact call sequence.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<State>>,
}

impl MemoryGateway {
    /// Create a new empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource as if it had been created out-of-band.
    pub fn insert(&self, record: ResourceRecord) {
        let key = record.identity().format();
        self.lock().records.insert(key, record);
    }

    /// Current remote state of `id`, without recording a call.
    pub fn get(&self, id: &ResourceIdentity) -> Option<ResourceRecord> {
        self.lock().records.get(&id.format()).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls of one operation made so far.
    pub fn count(&self, op: GatewayOp) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| {
                matches!(
                    (op, call),
                    (GatewayOp::Fetch, Call::Fetch(_))
                        | (GatewayOp::Put, Call::Put(_))
                        | (GatewayOp::Remove, Call::Remove(_))
                )
            })
            .count()
    }

    /// Make the next call of `op` fail with `error`.
    pub fn fail_next(&self, op: GatewayOp, error: GatewayError) {
        self.fail_after(op, 0, error);
    }

    /// Let `skip` calls of `op` succeed, then fail the following one.
    pub fn fail_after(&self, op: GatewayOp, skip: usize, error: GatewayError) {
        self.lock().failures.push_back(Failure { op, skip, error });
    }

    /// After each `put`, report the resource absent for the next `reads` fetches.
    pub fn delay_visibility(&self, reads: u32) {
        self.lock().visibility_delay = reads;
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn take_failure(&mut self, op: GatewayOp) -> Option<GatewayError> {
        let pos = self.failures.iter().position(|f| f.op == op)?;
        if let Some(pending) = self.failures.get_mut(pos)
            && pending.skip > 0
        {
            pending.skip -= 1;
            return None;
        }
        self.failures.remove(pos).map(|f| f.error)
    }
}

impl BackendGateway for MemoryGateway {
    fn fetch(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
    ) -> Result<Option<ResourceRecord>, GatewayError> {
        ctx.check()?;
        let key = id.format();
        let mut state = self.lock();
        state.calls.push(Call::Fetch(key.clone()));
        if let Some(error) = state.take_failure(GatewayOp::Fetch) {
            return Err(error);
        }
        if let Some(hidden) = state.hidden_reads.get_mut(&key)
            && *hidden > 0
        {
            *hidden -= 1;
            return Ok(None);
        }
        Ok(state.records.get(&key).cloned())
    }

    fn put(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
        desired: &ResourceRecord,
    ) -> Result<ResourceRecord, GatewayError> {
        ctx.check()?;
        let key = id.format();
        let mut state = self.lock();
        state.calls.push(Call::Put(key.clone()));
        if let Some(error) = state.take_failure(GatewayOp::Put) {
            return Err(error);
        }
        state.version += 1;
        let stored = desired
            .clone()
            .with_identity(id.clone())
            .with_field("etag", format!("\"{}\"", state.version));
        state.records.insert(key.clone(), stored.clone());
        let delay = state.visibility_delay;
        if delay > 0 {
            state.hidden_reads.insert(key, delay);
        }
        Ok(stored)
    }

    fn remove(&self, ctx: &OperationContext, id: &ResourceIdentity) -> Result<bool, GatewayError> {
        ctx.check()?;
        let key = id.format();
        let mut state = self.lock();
        state.calls.push(Call::Remove(key.clone()));
        if let Some(error) = state.take_failure(GatewayOp::Remove) {
            return Err(error);
        }
        Ok(state.records.remove(&key).is_some())
    }
}
