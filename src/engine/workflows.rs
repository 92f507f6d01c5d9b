//! Workflow store operations: CRUD, versioning, tags, cloning, transfer.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{info, warn};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::executor::WorkflowEngine;
use crate::engine::types::*;
use crate::engine::validate;
use crate::scheduler::parse_cron;

/// Trim a schedule and check it parses. Empty means "no schedule".
fn checked_schedule(schedule: Option<&str>) -> EngineResult<Option<String>> {
    match schedule.map(str::trim) {
        None | Some("") => Ok(None),
        Some(expr) => {
            parse_cron(expr)?;
            Ok(Some(expr.to_string()))
        }
    }
}

impl WorkflowEngine {
    pub fn create_workflow(&self, new: NewWorkflow) -> EngineResult<WorkflowDefinition> {
        let name = validate::workflow_name(&new.name)?;
        let tags = validate::tags(&new.tags)?;
        let mut tasks = new.tasks;
        validate::tasks(&mut tasks)?;
        let schedule = checked_schedule(new.schedule.as_deref())?;

        let now = Utc::now();
        let workflow = WorkflowDefinition {
            id: new_id(),
            name,
            description: new.description,
            tasks,
            schedule,
            tags,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_workflow(workflow.clone());
        self.sync_schedule(&workflow);
        info!(workflow_id = %workflow.id, name = %workflow.name, "Workflow created");
        Ok(workflow)
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Option<WorkflowDefinition> {
        self.store.get_workflow(workflow_id)
    }

    /// Workflows in creation order, filtered by tag and name search, paginated.
    pub fn list_workflows(&self, query: &WorkflowQuery) -> EngineResult<Page<WorkflowDefinition>> {
        let (offset, limit) = validate::page(query.offset, query.limit)?;
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let matching = self.store.find_workflows(query.tag.as_deref(), |wf| {
            needle
                .as_deref()
                .is_none_or(|n| wf.name.to_lowercase().contains(n))
        });

        Ok(Page {
            total: matching.len(),
            items: matching.into_iter().skip(offset).take(limit).collect(),
            offset,
            limit,
        })
    }

    /// Case-insensitive substring match on workflow names.
    pub fn search_workflows(&self, query: &str) -> Vec<WorkflowDefinition> {
        let needle = query.to_lowercase();
        self.store
            .find_workflows(None, |wf| wf.name.to_lowercase().contains(&needle))
    }

    /// Apply a partial update as exactly one new version.
    pub fn update_workflow(
        &self,
        workflow_id: &str,
        update: WorkflowUpdate,
    ) -> EngineResult<WorkflowDefinition> {
        let name = update
            .name
            .as_deref()
            .map(validate::workflow_name)
            .transpose()?;
        let tags = update.tags.as_deref().map(validate::tags).transpose()?;
        let tasks = match update.tasks {
            Some(mut tasks) => {
                validate::tasks(&mut tasks)?;
                Some(tasks)
            }
            None => None,
        };
        let schedule = match update.schedule.as_deref() {
            Some(s) => Some(checked_schedule(Some(s))?),
            None => None,
        };

        let updated = self
            .store
            .update_workflow(workflow_id, |wf| {
                if let Some(name) = name {
                    wf.name = name;
                }
                if let Some(description) = update.description {
                    wf.description = description;
                }
                if let Some(tasks) = tasks {
                    wf.tasks = tasks;
                }
                if let Some(schedule) = schedule {
                    wf.schedule = schedule;
                }
                if let Some(tags) = tags {
                    wf.tags = tags;
                }
                Ok::<(), EngineError>(())
            })?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

        self.sync_schedule(&updated);
        info!(workflow_id = %workflow_id, version = updated.version, "Workflow updated");
        Ok(updated)
    }

    /// Remove a workflow, its history and its schedule. Executions stay.
    pub fn delete_workflow(&self, workflow_id: &str) -> bool {
        match self.store.remove_workflow(workflow_id) {
            Some(_) => {
                self.schedules.remove(workflow_id);
                info!(workflow_id = %workflow_id, "Workflow deleted");
                true
            }
            None => false,
        }
    }

    /// Delete each distinct id once, reporting misses separately.
    pub fn bulk_delete_workflows(&self, ids: &[String]) -> BulkDeleteResult {
        let mut seen = HashSet::new();
        let mut result = BulkDeleteResult::default();
        for id in ids.iter().filter(|id| seen.insert(id.as_str())) {
            if self.delete_workflow(id) {
                result.deleted.push(id.clone());
            } else {
                result.not_found.push(id.clone());
            }
        }
        result
    }

    /// Copy tasks and tags under a fresh id at version 1. Executions and the
    /// schedule are not copied.
    pub fn clone_workflow(&self, workflow_id: &str) -> EngineResult<WorkflowDefinition> {
        let source = self
            .store
            .get_workflow(workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

        let now = Utc::now();
        let copy = WorkflowDefinition {
            id: new_id(),
            name: format!("{} (copy)", source.name),
            description: source.description,
            tasks: source.tasks,
            schedule: None,
            tags: source.tags,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_workflow(copy.clone());
        info!(workflow_id = %copy.id, source = %workflow_id, "Workflow cloned");
        Ok(copy)
    }

    pub fn add_tags(&self, workflow_id: &str, tags: &[String]) -> EngineResult<WorkflowDefinition> {
        let additions = validate::tags(tags)?;
        self.store
            .update_workflow(workflow_id, |wf| {
                let mut merged = wf.tags.clone();
                merged.extend(additions);
                wf.tags = validate::tags(&merged)?;
                Ok::<(), EngineError>(())
            })?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))
    }

    pub fn remove_tag(&self, workflow_id: &str, tag: &str) -> EngineResult<WorkflowDefinition> {
        let tag = tag.trim();
        self.store
            .update_workflow(workflow_id, |wf| {
                let before = wf.tags.len();
                wf.tags.retain(|t| t != tag);
                if wf.tags.len() == before {
                    return Err(EngineError::Precondition(format!(
                        "Tag '{}' is not present on workflow {}; current tags: [{}]",
                        tag,
                        workflow_id,
                        wf.tags.join(", ")
                    )));
                }
                Ok(())
            })?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))
    }

    /// Previous versions, newest first.
    pub fn get_history(&self, workflow_id: &str) -> EngineResult<Vec<WorkflowVersion>> {
        self.store
            .history(workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))
    }

    /// The workflow as it was at `version` (the current version included).
    pub fn get_version(&self, workflow_id: &str, version: u32) -> EngineResult<WorkflowDefinition> {
        let current = self
            .store
            .get_workflow(workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;
        if current.version == version {
            return Ok(current);
        }
        self.store
            .history_entry(workflow_id, version)
            .map(|v| v.snapshot)
            .ok_or_else(|| EngineError::VersionNotFound {
                workflow_id: workflow_id.to_string(),
                version,
            })
    }

    /// Restore the content of an earlier version as a new version.
    pub fn rollback_workflow(&self, workflow_id: &str, version: u32) -> EngineResult<WorkflowDefinition> {
        let target = self.get_version(workflow_id, version)?;
        let restored = self
            .store
            .update_workflow(workflow_id, |wf| {
                wf.name = target.name;
                wf.description = target.description;
                wf.tasks = target.tasks;
                wf.schedule = target.schedule;
                wf.tags = target.tags;
                Ok::<(), EngineError>(())
            })?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

        self.sync_schedule(&restored);
        info!(
            workflow_id = %workflow_id,
            from_version = version,
            version = restored.version,
            "Workflow rolled back"
        );
        Ok(restored)
    }

    /// Portable definition: ids and timestamps stripped, dependencies
    /// rewritten to document-local task keys.
    pub fn export_workflow(&self, workflow_id: &str) -> EngineResult<WorkflowExport> {
        let workflow = self
            .store
            .get_workflow(workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

        let keys: HashMap<&str, String> = workflow
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), format!("t{}", i + 1)))
            .collect();

        let tasks = workflow
            .tasks
            .iter()
            .map(|t| TaskExport {
                key: keys[t.id.as_str()].clone(),
                name: t.name.clone(),
                action: t.action.clone(),
                parameters: t.parameters.clone(),
                depends_on: t
                    .depends_on
                    .iter()
                    .filter_map(|d| keys.get(d.as_str()).cloned())
                    .collect(),
                timeout_seconds: t.timeout_seconds,
                retry_count: t.retry_count,
                priority: t.priority,
                pre_hook: t.pre_hook.clone(),
                post_hook: t.post_hook.clone(),
            })
            .collect();

        Ok(WorkflowExport {
            name: workflow.name,
            description: workflow.description,
            tasks,
            schedule: workflow.schedule,
            tags: workflow.tags,
        })
    }

    /// Ingest an exported definition under entirely fresh ids.
    pub fn import_workflow(&self, export: WorkflowExport) -> EngineResult<WorkflowDefinition> {
        let mut ids: HashMap<&str, String> = HashMap::new();
        for task in &export.tasks {
            if ids.insert(task.key.as_str(), new_id()).is_some() {
                return Err(EngineError::Validation(format!(
                    "duplicate task key '{}'",
                    task.key
                )));
            }
        }

        let tasks = export
            .tasks
            .iter()
            .map(|t| TaskDefinition {
                id: ids[t.key.as_str()].clone(),
                name: t.name.clone(),
                action: t.action.clone(),
                parameters: t.parameters.clone(),
                depends_on: t
                    .depends_on
                    .iter()
                    .filter_map(|k| ids.get(k.as_str()).cloned())
                    .collect(),
                timeout_seconds: t.timeout_seconds,
                retry_count: t.retry_count,
                priority: t.priority,
                pre_hook: t.pre_hook.clone(),
                post_hook: t.post_hook.clone(),
            })
            .collect();

        self.create_workflow(NewWorkflow {
            name: export.name.clone(),
            description: export.description.clone(),
            tasks,
            tags: export.tags.clone(),
            schedule: export.schedule.clone(),
        })
    }

    fn sync_schedule(&self, workflow: &WorkflowDefinition) {
        match &workflow.schedule {
            Some(expr) => {
                if let Err(e) = self.schedules.upsert(&workflow.id, expr, &workflow.tags) {
                    warn!(workflow_id = %workflow.id, error = %e, "Schedule not registered");
                }
            }
            None => {
                self.schedules.remove(&workflow.id);
            }
        }
    }
}
