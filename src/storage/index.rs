use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use serde::Serialize;

use crate::engine::types::{ExecutionStatus, WorkflowDefinition, WorkflowExecution};

/// Secondary indexes derived from the primary stores.
///
/// Empty buckets are always pruned, so an incrementally maintained index and
/// one rebuilt from scratch compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Indexes {
    /// tag -> workflow ids
    pub by_tag: HashMap<String, BTreeSet<String>>,
    /// status -> execution ids
    pub by_status: HashMap<ExecutionStatus, BTreeSet<String>>,
    /// workflow id -> execution ids
    pub by_workflow: HashMap<String, BTreeSet<String>>,
}

fn link<K: Eq + Hash>(map: &mut HashMap<K, BTreeSet<String>>, key: K, id: &str) {
    map.entry(key).or_default().insert(id.to_string());
}

fn unlink<K: Eq + Hash>(map: &mut HashMap<K, BTreeSet<String>>, key: &K, id: &str) {
    if let Some(ids) = map.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

impl Indexes {
    /// Recompute every index from the primary stores.
    pub fn rebuild<'a>(
        workflows: impl IntoIterator<Item = &'a WorkflowDefinition>,
        executions: impl IntoIterator<Item = &'a WorkflowExecution>,
    ) -> Self {
        let mut indexes = Self::default();
        for workflow in workflows {
            indexes.add_tags(&workflow.id, &workflow.tags);
        }
        for execution in executions {
            indexes.add_execution(execution);
        }
        indexes
    }

    pub fn add_tags(&mut self, workflow_id: &str, tags: &[String]) {
        for tag in tags {
            link(&mut self.by_tag, tag.clone(), workflow_id);
        }
    }

    pub fn remove_tags(&mut self, workflow_id: &str, tags: &[String]) {
        for tag in tags {
            unlink(&mut self.by_tag, tag, workflow_id);
        }
    }

    pub fn add_execution(&mut self, execution: &WorkflowExecution) {
        link(&mut self.by_status, execution.status, &execution.id);
        link(&mut self.by_workflow, execution.workflow_id.clone(), &execution.id);
    }

    pub fn remove_execution(&mut self, execution: &WorkflowExecution) {
        unlink(&mut self.by_status, &execution.status, &execution.id);
        unlink(&mut self.by_workflow, &execution.workflow_id, &execution.id);
    }

    pub fn workflows_with_tag(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.by_tag.get(tag)
    }

    pub fn executions_with_status(&self, status: ExecutionStatus) -> Option<&BTreeSet<String>> {
        self.by_status.get(&status)
    }

    pub fn executions_of(&self, workflow_id: &str) -> Option<&BTreeSet<String>> {
        self.by_workflow.get(workflow_id)
    }
}
