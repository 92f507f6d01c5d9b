use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::actions::ActionRegistry;
use crate::analytics::{Analytics, DEFAULT_CACHE_TTL};
use crate::engine::dag::topological_sort;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::*;
use crate::engine::validate;
use crate::scheduler::ScheduleRegistry;
use crate::storage::{Indexes, MemoryStore};

/// Engine-level configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Lifetime of cached analytics. Zero disables caching.
    pub cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// The workflow execution engine and owner of all process-resident state.
pub struct WorkflowEngine {
    pub(crate) registry: Arc<ActionRegistry>,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) analytics: Analytics,
    pub(crate) schedules: ScheduleRegistry,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<ActionRegistry>, config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let analytics = Analytics::new(store.clone(), config.cache_ttl);
        Self {
            registry,
            store,
            analytics,
            schedules: ScheduleRegistry::new(),
        }
    }

    /// Engine with the built-in actions and default configuration.
    pub fn with_builtins() -> Self {
        Self::new(
            Arc::new(ActionRegistry::with_builtins()),
            EngineConfig::default(),
        )
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    pub fn schedules(&self) -> &ScheduleRegistry {
        &self.schedules
    }

    /// Wipe workflows, executions, indexes, schedules and cached analytics.
    pub fn reset(&self) {
        self.analytics.invalidate_with(|| {
            self.store.clear();
            self.schedules.clear();
        });
        info!("Engine state reset");
    }

    pub fn indexes(&self) -> Indexes {
        self.store.indexes()
    }

    pub fn rebuild_indexes(&self) -> Indexes {
        self.store.rebuild_indexes()
    }

    // --- Execution ---

    /// Run a workflow's tasks in dependency order and store the execution.
    ///
    /// Tasks run one at a time; the first failing task stops the run.
    pub fn execute_workflow(&self, workflow_id: &str, trigger: &str) -> EngineResult<WorkflowExecution> {
        let workflow = self
            .store
            .get_workflow(workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;
        let order = topological_sort(&workflow.tasks)?;

        let mut execution = WorkflowExecution::new(&workflow.id, trigger, ExecutionStatus::Running);
        execution
            .metadata
            .insert("workflow_version".to_string(), workflow.version.into());
        self.store.insert_execution(execution.clone());

        info!(
            execution_id = %execution.id,
            workflow_id = %workflow.id,
            trigger = %trigger,
            tasks = order.len(),
            "Starting workflow execution"
        );

        self.run_tasks(&mut execution, &order, &HashSet::new());
        Ok(self.finish(execution))
    }

    /// Execute without persisting or indexing the result.
    pub fn dry_run_workflow(&self, workflow_id: &str) -> EngineResult<WorkflowExecution> {
        let workflow = self
            .store
            .get_workflow(workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;
        let order = topological_sort(&workflow.tasks)?;

        let mut execution = WorkflowExecution::new(&workflow.id, "dry_run", ExecutionStatus::Running);
        execution.metadata.insert("dry_run".to_string(), true.into());
        execution
            .metadata
            .insert("workflow_version".to_string(), workflow.version.into());

        self.run_tasks(&mut execution, &order, &HashSet::new());
        info!(workflow_id = %workflow.id, status = %execution.status, "Dry run finished");
        Ok(execution)
    }

    /// Re-run a failed execution as a new execution record.
    ///
    /// Successful results of the original run are carried forward when the
    /// task still exists and every dependency it has is carried forward too;
    /// all other tasks run again in dependency order.
    pub fn retry_execution(&self, execution_id: &str) -> EngineResult<WorkflowExecution> {
        let original = self
            .store
            .get_execution(execution_id)
            .ok_or_else(|| EngineError::ExecutionNotFound(execution_id.to_string()))?;

        if original.status != ExecutionStatus::Failed {
            warn!(execution_id = %execution_id, status = %original.status, "Retry rejected");
            return Err(EngineError::Precondition(format!(
                "Only failed executions can be retried; execution {} is {}",
                execution_id, original.status
            )));
        }

        let workflow = self
            .store
            .get_workflow(&original.workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(original.workflow_id.clone()))?;
        let order = topological_sort(&workflow.tasks)?;

        let known: HashSet<&str> = workflow.tasks.iter().map(|t| t.id.as_str()).collect();
        let mut carried: HashSet<&str> = HashSet::new();
        for task in &order {
            let succeeded = original
                .task_results
                .iter()
                .any(|r| r.task_id == task.id && r.status == TaskStatus::Completed);
            let deps_carried = task
                .depends_on
                .iter()
                .filter(|d| known.contains(d.as_str()))
                .all(|d| carried.contains(d.as_str()));
            if succeeded && deps_carried {
                carried.insert(task.id.as_str());
            }
        }

        let mut execution = WorkflowExecution::new(&workflow.id, "retry", ExecutionStatus::Running);
        execution.task_results = original
            .task_results
            .iter()
            .filter(|r| carried.contains(r.task_id.as_str()))
            .cloned()
            .collect();
        execution
            .metadata
            .insert("retry_of".to_string(), original.id.clone().into());
        execution.metadata.insert(
            "carried_forward".to_string(),
            execution
                .task_results
                .iter()
                .map(|r| serde_json::Value::String(r.task_id.clone()))
                .collect(),
        );
        execution
            .metadata
            .insert("workflow_version".to_string(), workflow.version.into());
        self.store.insert_execution(execution.clone());

        info!(
            execution_id = %execution.id,
            retry_of = %original.id,
            carried = carried.len(),
            "Retrying failed execution"
        );

        self.run_tasks(&mut execution, &order, &carried);
        Ok(self.finish(execution))
    }

    /// Cancel a running or pending execution. Task results are left as they are.
    pub fn cancel_execution(&self, execution_id: &str) -> EngineResult<WorkflowExecution> {
        let outcome = self
            .store
            .update_execution(execution_id, |execution| {
                if execution.status.is_terminal() {
                    return Err(execution.status);
                }
                let now = Utc::now();
                execution.status = ExecutionStatus::Cancelled;
                execution.cancelled_at = Some(now);
                execution.completed_at = Some(now);
                Ok(execution.clone())
            })
            .ok_or_else(|| EngineError::ExecutionNotFound(execution_id.to_string()))?;

        match outcome {
            Ok(execution) => {
                info!(execution_id = %execution_id, "Execution cancelled");
                Ok(execution)
            }
            Err(status) => {
                warn!(execution_id = %execution_id, status = %status, "Cancel rejected");
                Err(EngineError::Precondition(format!(
                    "Only running or pending executions can be cancelled; execution {} is {}",
                    execution_id, status
                )))
            }
        }
    }

    pub fn get_execution(&self, execution_id: &str) -> Option<WorkflowExecution> {
        self.store.get_execution(execution_id)
    }

    /// Executions matching the filter, newest first.
    pub fn list_executions(&self, filter: &ExecutionFilter) -> EngineResult<Vec<WorkflowExecution>> {
        let limit = validate::execution_limit(filter.limit)?;
        Ok(self
            .store
            .find_executions(filter.workflow_id.as_deref(), filter.status, limit))
    }

    /// Diff two executions status-wise and task-by-task.
    pub fn compare_executions(&self, a: &str, b: &str) -> EngineResult<ExecutionComparison> {
        let first = self
            .store
            .get_execution(a)
            .ok_or_else(|| EngineError::ExecutionNotFound(a.to_string()))?;
        let second = self
            .store
            .get_execution(b)
            .ok_or_else(|| EngineError::ExecutionNotFound(b.to_string()))?;

        let mut task_ids: Vec<&str> = Vec::new();
        for r in first.task_results.iter().chain(&second.task_results) {
            if !task_ids.contains(&r.task_id.as_str()) {
                task_ids.push(&r.task_id);
            }
        }

        let find = |e: &WorkflowExecution, id: &str| -> Option<TaskResult> {
            e.task_results.iter().find(|r| r.task_id == id).cloned()
        };

        let tasks = task_ids
            .into_iter()
            .map(|id| {
                let (ra, rb) = (find(&first, id), find(&second, id));
                let status_a = ra.as_ref().map(|r| r.status);
                let status_b = rb.as_ref().map(|r| r.status);
                TaskComparison {
                    task_id: id.to_string(),
                    status_a,
                    status_b,
                    duration_ms_a: ra.as_ref().map(|r| r.duration_ms),
                    duration_ms_b: rb.as_ref().map(|r| r.duration_ms),
                    changed: status_a != status_b,
                }
            })
            .collect();

        let (duration_a, duration_b) = (first.duration_ms(), second.duration_ms());
        Ok(ExecutionComparison {
            execution_a: first.id.clone(),
            execution_b: second.id.clone(),
            status_a: first.status,
            status_b: second.status,
            status_changed: first.status != second.status,
            duration_ms_a: duration_a,
            duration_ms_b: duration_b,
            duration_diff_ms: duration_a.zip(duration_b).map(|(x, y)| y - x),
            tasks,
        })
    }

    /// Execute every due schedule once with trigger `cron` and advance it.
    pub fn trigger_due_schedules(&self, now: DateTime<Utc>) -> Vec<WorkflowExecution> {
        let mut executions = Vec::new();
        for entry in self.schedules.due(now) {
            match self.execute_workflow(&entry.workflow_id, "cron") {
                Ok(execution) => executions.push(execution),
                Err(e) => warn!(
                    workflow_id = %entry.workflow_id,
                    error = %e,
                    "Scheduled execution could not start"
                ),
            }
            self.schedules.mark_run(&entry.workflow_id, now);
        }
        executions
    }

    // --- Task running ---

    /// Run `order` (minus `skip`) into `execution`, stopping at the first
    /// failure, and set the terminal status.
    fn run_tasks(
        &self,
        execution: &mut WorkflowExecution,
        order: &[&TaskDefinition],
        skip: &HashSet<&str>,
    ) {
        for task in order.iter().filter(|t| !skip.contains(t.id.as_str())) {
            let result = self.run_task(task);
            let failed = result.status == TaskStatus::Failed;
            if failed {
                warn!(
                    execution_id = %execution.id,
                    task = %task.id,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Task failed, halting execution"
                );
            }
            execution.task_results.push(result);
            if failed {
                break;
            }
        }

        let failed = execution
            .task_results
            .iter()
            .any(|r| r.status == TaskStatus::Failed);
        execution.status = if failed {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        execution.completed_at = Some(Utc::now());
    }

    fn run_task(&self, task: &TaskDefinition) -> TaskResult {
        let started_at = Utc::now();
        let outcome = self.invoke(task);
        let completed_at = Utc::now();

        let (status, output, error) = match outcome {
            Ok(output) => (TaskStatus::Completed, output, None),
            Err(e) => (TaskStatus::Failed, ActionOutput::new(), Some(format!("{:#}", e))),
        };

        TaskResult {
            task_id: task.id.clone(),
            status,
            started_at,
            completed_at,
            output,
            error,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        }
    }

    /// Pre-hook, main action, post-hook. Hook outputs are nested under fixed keys.
    fn invoke(&self, task: &TaskDefinition) -> anyhow::Result<ActionOutput> {
        let pre = match &task.pre_hook {
            Some(hook) => Some(
                self.call(hook, &task.parameters)
                    .with_context(|| format!("pre_hook '{}' failed", hook))?,
            ),
            None => None,
        };

        let mut output = self.call(&task.action, &task.parameters)?;

        if let Some(hook) = &task.post_hook {
            let mut params = task.parameters.clone();
            params.extend(output.clone());
            let post = self
                .call(hook, &params)
                .with_context(|| format!("post_hook '{}' failed", hook))?;
            output.insert(
                POST_HOOK_OUTPUT_KEY.to_string(),
                serde_json::Value::Object(post.into_iter().collect()),
            );
        }
        if let Some(pre) = pre {
            output.insert(
                PRE_HOOK_OUTPUT_KEY.to_string(),
                serde_json::Value::Object(pre.into_iter().collect()),
            );
        }

        Ok(output)
    }

    fn call(&self, action: &str, params: &Parameters) -> anyhow::Result<ActionOutput> {
        let handler = self.registry.get(action)?;
        handler.run(params)
    }

    /// Store the finished execution unless it was cancelled meanwhile.
    fn finish(&self, execution: WorkflowExecution) -> WorkflowExecution {
        let stored = self.store.update_execution(&execution.id, |current| {
            if current.status == ExecutionStatus::Cancelled {
                return current.clone();
            }
            *current = execution.clone();
            execution.clone()
        });

        let finished = stored.unwrap_or(execution);
        info!(
            execution_id = %finished.id,
            workflow_id = %finished.workflow_id,
            status = %finished.status,
            results = finished.task_results.len(),
            "Workflow execution complete"
        );
        finished
    }
}
