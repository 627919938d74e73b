//! Execution planner - orders operations across a resource hierarchy
//!
//! Operations on the same identity form a chain that runs in order. Chains
//! are grouped into waves so that a parent is written before its children
//! and removed after them; chains inside one wave are independent.

use crate::identity::ResourceIdentity;
use crate::kind::ResourceKind;
use crate::record::ResourceRecord;
use std::collections::BTreeMap;
use std::fmt;

/// What to do with one resource
#[derive(Debug, Clone)]
pub enum Action {
    /// Create, refusing to adopt an existing resource
    Create(ResourceRecord),
    /// Converge to the record, creating if missing
    Update(ResourceRecord),
    /// Refresh the live state
    Read(ResourceIdentity),
    /// Remove the resource
    Delete(ResourceIdentity),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Create(_) => "create",
            Action::Update(_) => "update",
            Action::Read(_) => "read",
            Action::Delete(_) => "delete",
        }
    }
}

/// One resource and the action to take on it
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: &'static ResourceKind,
    pub action: Action,
}

impl Operation {
    pub fn create(kind: &'static ResourceKind, record: ResourceRecord) -> Self {
        Self {
            kind,
            action: Action::Create(record),
        }
    }

    pub fn update(kind: &'static ResourceKind, record: ResourceRecord) -> Self {
        Self {
            kind,
            action: Action::Update(record),
        }
    }

    pub fn read(kind: &'static ResourceKind, id: ResourceIdentity) -> Self {
        Self {
            kind,
            action: Action::Read(id),
        }
    }

    pub fn delete(kind: &'static ResourceKind, id: ResourceIdentity) -> Self {
        Self {
            kind,
            action: Action::Delete(id),
        }
    }

    pub fn identity(&self) -> &ResourceIdentity {
        match &self.action {
            Action::Create(record) | Action::Update(record) => record.identity(),
            Action::Read(id) | Action::Delete(id) => id,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.action, Action::Delete(_))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.action.name(), self.kind.name, self.identity())
    }
}

/// Operations on one identity, run in insertion order
#[derive(Debug)]
pub struct Chain<'a> {
    pub identity: &'a ResourceIdentity,
    pub operations: Vec<&'a Operation>,
}

impl Chain<'_> {
    /// Whether every operation in the chain is a delete.
    pub fn is_removal(&self) -> bool {
        self.operations.iter().all(|op| op.is_delete())
    }
}

/// An ordered set of operations
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub operations: Vec<Operation>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation to the plan
    pub fn add(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Filter plan to only include operations matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Operation) -> bool,
    {
        Self {
            operations: self.operations.into_iter().filter(predicate).collect(),
        }
    }

    /// Filter plan to only include operations matching a target pattern
    ///
    /// Target format: "kind" or "kind.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => self.filter(|op| matches_target(t, op.kind.name, op.identity().name())),
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Group operations into dependency-ordered waves of independent chains.
    ///
    /// Writes and reads come first, shallowest identity first. Chains made
    /// only of deletes follow, deepest identity first.
    pub fn waves(&self) -> Vec<Vec<Chain<'_>>> {
        let mut chains: Vec<Chain<'_>> = Vec::new();
        let mut index: BTreeMap<String, usize> = BTreeMap::new();
        for op in &self.operations {
            let key = op.identity().format();
            match index.get(&key) {
                Some(&i) => chains[i].operations.push(op),
                None => {
                    index.insert(key, chains.len());
                    chains.push(Chain {
                        identity: op.identity(),
                        operations: vec![op],
                    });
                }
            }
        }

        let mut writes: BTreeMap<usize, Vec<Chain<'_>>> = BTreeMap::new();
        let mut removals: BTreeMap<usize, Vec<Chain<'_>>> = BTreeMap::new();
        for chain in chains {
            let depth = chain.identity.depth();
            let bucket = if chain.is_removal() {
                &mut removals
            } else {
                &mut writes
            };
            bucket.entry(depth).or_default().push(chain);
        }

        writes
            .into_values()
            .chain(removals.into_values().rev())
            .collect()
    }
}

/// Whether `target` selects a resource.
///
/// `kind` selects every resource of that kind, `kind.name` the one whose
/// leaf segment is `name`.
pub fn matches_target(target: &str, kind: &str, name: &str) -> bool {
    match target.split_once('.') {
        Some((k, n)) => k == kind && n == name,
        None => target == kind,
    }
}
