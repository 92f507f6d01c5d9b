use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::engine::types::*;
use crate::storage::index::Indexes;

#[derive(Default)]
struct StoreState {
    workflows: HashMap<String, WorkflowDefinition>,
    /// Workflow ids in creation order.
    workflow_order: Vec<String>,
    /// Previous versions per workflow, oldest first.
    history: HashMap<String, Vec<WorkflowVersion>>,
    executions: HashMap<String, WorkflowExecution>,
    /// Execution ids in insertion order.
    execution_order: Vec<String>,
    indexes: Indexes,
}

/// Process-resident repository for workflows, executions and their indexes.
///
/// One coarse mutex guards everything, so a primary-store write and the
/// matching index update are never observable half-applied.
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Workflows ---

    pub fn insert_workflow(&self, workflow: WorkflowDefinition) {
        let mut state = self.lock();
        if let Some(previous) = state.workflows.remove(&workflow.id) {
            state.indexes.remove_tags(&previous.id, &previous.tags);
        } else {
            state.workflow_order.push(workflow.id.clone());
        }
        state.indexes.add_tags(&workflow.id, &workflow.tags);
        state.workflows.insert(workflow.id.clone(), workflow);
    }

    pub fn get_workflow(&self, id: &str) -> Option<WorkflowDefinition> {
        self.lock().workflows.get(id).cloned()
    }

    pub fn workflow_count(&self) -> usize {
        self.lock().workflows.len()
    }

    /// Workflows in creation order, optionally restricted to a tag via the
    /// tag index, then filtered by `keep`.
    pub fn find_workflows(
        &self,
        tag: Option<&str>,
        keep: impl Fn(&WorkflowDefinition) -> bool,
    ) -> Vec<WorkflowDefinition> {
        let state = self.lock();
        let tagged = tag.map(|t| state.indexes.workflows_with_tag(t));
        state
            .workflow_order
            .iter()
            .filter(|id| match tagged {
                Some(Some(ids)) => ids.contains(*id),
                Some(None) => false,
                None => true,
            })
            .filter_map(|id| state.workflows.get(id))
            .filter(|wf| keep(wf))
            .cloned()
            .collect()
    }

    /// Apply `change` to a workflow as a new version.
    ///
    /// The previous state is appended to history, the version goes up by
    /// exactly one and the tag index follows the new tags. When `change`
    /// fails nothing is modified. Returns `Ok(None)` if the workflow is absent.
    pub fn update_workflow<E>(
        &self,
        id: &str,
        change: impl FnOnce(&mut WorkflowDefinition) -> Result<(), E>,
    ) -> Result<Option<WorkflowDefinition>, E> {
        let mut state = self.lock();
        let Some(current) = state.workflows.get(id).cloned() else {
            return Ok(None);
        };

        let mut next = current.clone();
        change(&mut next)?;
        next.id = current.id.clone();
        next.created_at = current.created_at;
        next.version = current.version + 1;
        next.updated_at = Utc::now();

        state.history.entry(id.to_string()).or_default().push(WorkflowVersion {
            version: current.version,
            recorded_at: next.updated_at,
            snapshot: current.clone(),
        });
        state.indexes.remove_tags(id, &current.tags);
        state.indexes.add_tags(id, &next.tags);
        state.workflows.insert(id.to_string(), next.clone());

        Ok(Some(next))
    }

    /// Remove a workflow and its history. Executions are kept.
    pub fn remove_workflow(&self, id: &str) -> Option<WorkflowDefinition> {
        let mut state = self.lock();
        let removed = state.workflows.remove(id)?;
        state.workflow_order.retain(|w| w != id);
        state.history.remove(id);
        state.indexes.remove_tags(id, &removed.tags);
        Some(removed)
    }

    /// Previous versions, newest first.
    pub fn history(&self, id: &str) -> Option<Vec<WorkflowVersion>> {
        let state = self.lock();
        if !state.workflows.contains_key(id) {
            return None;
        }
        let mut versions = state.history.get(id).cloned().unwrap_or_default();
        versions.reverse();
        Some(versions)
    }

    pub fn history_entry(&self, id: &str, version: u32) -> Option<WorkflowVersion> {
        self.lock()
            .history
            .get(id)?
            .iter()
            .find(|v| v.version == version)
            .cloned()
    }

    // --- Executions ---

    pub fn insert_execution(&self, execution: WorkflowExecution) {
        let mut state = self.lock();
        if let Some(previous) = state.executions.remove(&execution.id) {
            state.indexes.remove_execution(&previous);
        } else {
            state.execution_order.push(execution.id.clone());
        }
        state.indexes.add_execution(&execution);
        state.executions.insert(execution.id.clone(), execution);
    }

    pub fn get_execution(&self, id: &str) -> Option<WorkflowExecution> {
        self.lock().executions.get(id).cloned()
    }

    /// Mutate an execution in place and re-index it under its new status.
    pub fn update_execution<T>(
        &self,
        id: &str,
        change: impl FnOnce(&mut WorkflowExecution) -> T,
    ) -> Option<T> {
        let mut state = self.lock();
        let state = &mut *state;
        let execution = state.executions.get_mut(id)?;
        state.indexes.remove_execution(execution);
        let out = change(execution);
        execution.id = id.to_string();
        state.indexes.add_execution(execution);
        Some(out)
    }

    /// Executions matching `filter`, newest first, at most `limit`.
    pub fn find_executions(
        &self,
        workflow_id: Option<&str>,
        status: Option<ExecutionStatus>,
        limit: usize,
    ) -> Vec<WorkflowExecution> {
        let state = self.lock();
        let empty = BTreeSet::new();

        let by_workflow = workflow_id.map(|w| state.indexes.executions_of(w).unwrap_or(&empty));
        let by_status = status.map(|s| state.indexes.executions_with_status(s).unwrap_or(&empty));

        let mut found: Vec<&WorkflowExecution> = state
            .execution_order
            .iter()
            .rev()
            .filter(|id| by_workflow.is_none_or(|ids| ids.contains(id.as_str())))
            .filter(|id| by_status.is_none_or(|ids| ids.contains(id.as_str())))
            .filter_map(|id| state.executions.get(id))
            .collect();

        // Stable: equal start times keep newest-inserted first.
        found.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        found.into_iter().take(limit).cloned().collect()
    }

    /// Executions started at or after `since`, in insertion order.
    pub fn executions_since(&self, since: Option<DateTime<Utc>>) -> Vec<WorkflowExecution> {
        let state = self.lock();
        state
            .execution_order
            .iter()
            .filter_map(|id| state.executions.get(id))
            .filter(|e| match (since, e.started_at) {
                (None, _) => true,
                (Some(cutoff), Some(started)) => started >= cutoff,
                (Some(_), None) => false,
            })
            .cloned()
            .collect()
    }

    /// Workflow id -> name for every stored workflow.
    pub fn workflow_names(&self) -> HashMap<String, String> {
        self.lock()
            .workflows
            .values()
            .map(|wf| (wf.id.clone(), wf.name.clone()))
            .collect()
    }

    // --- Indexes & lifecycle ---

    pub fn indexes(&self) -> Indexes {
        self.lock().indexes.clone()
    }

    /// Recompute all secondary indexes from the primary stores.
    pub fn rebuild_indexes(&self) -> Indexes {
        let mut state = self.lock();
        let rebuilt = Indexes::rebuild(state.workflows.values(), state.executions.values());
        state.indexes = rebuilt.clone();
        tracing::debug!(
            tags = rebuilt.by_tag.len(),
            workflows = rebuilt.by_workflow.len(),
            "Rebuilt secondary indexes"
        );
        rebuilt
    }

    /// Wipe every primary store and index.
    pub fn clear(&self) {
        *self.lock() = StoreState::default();
    }
}
