use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parameters handed to an action: a JSON-compatible key-value map.
pub type Parameters = HashMap<String, serde_json::Value>;

/// Output returned by an action.
pub type ActionOutput = HashMap<String, serde_json::Value>;

/// Free-form metadata attached to an execution.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Key under which a task's pre-hook output is embedded.
pub const PRE_HOOK_OUTPUT_KEY: &str = "pre_hook_output";

/// Key under which a task's post-hook output is embedded.
pub const POST_HOOK_OUTPUT_KEY: &str = "post_hook_output";

/// Generate a fresh opaque identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            "cancelled" => Ok(ExecutionStatus::Cancelled),
            _ => Err(format!(
                "Invalid status '{}'. Use: pending, running, completed, failed, cancelled",
                s
            )),
        }
    }
}

/// Status of an individual task result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Informational task priority. Not used for ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

fn default_timeout_seconds() -> u64 {
    300
}

/// Definition of a single task within a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Unique within the workflow. Generated on ingestion when empty.
    #[serde(default)]
    pub id: String,
    /// Defaults to the action name when empty.
    #[serde(default)]
    pub name: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Parameters,
    /// Ids of tasks that must run first. Ids missing from the workflow are ignored.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Advisory; the engine does not enforce it.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Advisory; retries are always explicit, user-triggered operations.
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_hook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_hook: Option<String>,
}

impl TaskDefinition {
    pub fn new(id: &str, action: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            action: action.to_string(),
            parameters: Parameters::new(),
            depends_on: Vec::new(),
            timeout_seconds: default_timeout_seconds(),
            retry_count: 0,
            priority: Priority::default(),
            pre_hook: None,
            post_hook: None,
        }
    }

    pub fn with_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.depends_on.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_hooks(mut self, pre_hook: Option<&str>, post_hook: Option<&str>) -> Self {
        self.pre_hook = pre_hook.map(String::from);
        self.post_hook = post_hook.map(String::from);
        self
    }

    /// Fill in a generated id and a default name.
    pub(crate) fn normalize(&mut self) {
        if self.id.trim().is_empty() {
            self.id = new_id();
        }
        if self.name.trim().is_empty() {
            self.name = self.action.clone();
        }
    }
}

/// A versioned, named DAG of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tasks: Vec<TaskDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    pub tags: Vec<String>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub schedule: Option<String>,
}

impl NewWorkflow {
    pub fn new(name: &str, tasks: Vec<TaskDefinition>) -> Self {
        Self {
            name: name.to_string(),
            tasks,
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_schedule(mut self, cron: &str) -> Self {
        self.schedule = Some(cron.to_string());
        self
    }
}

/// Partial update of a workflow. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tasks: Option<Vec<TaskDefinition>>,
    /// An empty string removes the schedule.
    pub schedule: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Snapshot of a workflow as it was before a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowVersion {
    pub version: u32,
    pub recorded_at: DateTime<Utc>,
    pub snapshot: WorkflowDefinition,
}

/// Result of a single task run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub output: ActionOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: i64,
}

/// One concrete run of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub trigger: String,
    pub task_results: Vec<TaskResult>,
    pub metadata: Metadata,
}

impl WorkflowExecution {
    pub fn new(workflow_id: &str, trigger: &str, status: ExecutionStatus) -> Self {
        Self {
            id: new_id(),
            workflow_id: workflow_id.to_string(),
            status,
            started_at: Some(Utc::now()),
            completed_at: None,
            cancelled_at: None,
            trigger: trigger.to_string(),
            task_results: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Wall-clock duration, when both timestamps are present.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(s), Some(c)) => Some((c - s).num_milliseconds()),
            _ => None,
        }
    }
}

/// Filters for listing executions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExecutionFilter {
    pub workflow_id: Option<String>,
    pub status: Option<ExecutionStatus>,
    pub limit: Option<usize>,
}

/// Filters and pagination for listing workflows.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowQuery {
    pub tag: Option<String>,
    pub search: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkDeleteResult {
    pub deleted: Vec<String>,
    pub not_found: Vec<String>,
}

/// Portable task definition. `key` is local to the export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExport {
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_hook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_hook: Option<String>,
}

/// Portable workflow definition with every internal identity stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExport {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<TaskExport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Per-task side of an execution comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskComparison {
    pub task_id: String,
    pub status_a: Option<TaskStatus>,
    pub status_b: Option<TaskStatus>,
    pub duration_ms_a: Option<i64>,
    pub duration_ms_b: Option<i64>,
    pub changed: bool,
}

/// Diff between two executions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionComparison {
    pub execution_a: String,
    pub execution_b: String,
    pub status_a: ExecutionStatus,
    pub status_b: ExecutionStatus,
    pub status_changed: bool,
    pub duration_ms_a: Option<i64>,
    pub duration_ms_b: Option<i64>,
    pub duration_diff_ms: Option<i64>,
    pub tasks: Vec<TaskComparison>,
}
