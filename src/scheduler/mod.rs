//! Cron bookkeeping for scheduled workflows.
//!
//! This is a planning record only: it tracks when each workflow is next due
//! and how often it has run. Nothing in the execution path depends on it.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::error::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub workflow_id: String,
    pub cron_expression: String,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub tags: Vec<String>,
}

/// Parse a cron expression. Classic five-field expressions get a leading
/// seconds field of `0`; six- and seven-field forms pass through.
pub fn parse_cron(expression: &str) -> EngineResult<cron::Schedule> {
    let fields = expression.split_whitespace().count();
    let normalized = match fields {
        5 => format!("0 {}", expression.trim()),
        6 | 7 => expression.trim().to_string(),
        _ => {
            return Err(EngineError::Validation(format!(
                "invalid cron expression '{}': expected 5 to 7 fields",
                expression
            )));
        }
    };
    cron::Schedule::from_str(&normalized).map_err(|e| {
        EngineError::Validation(format!("invalid cron expression '{}': {}", expression, e))
    })
}

/// Next fire time strictly after `after`.
pub fn next_run_after(expression: &str, after: DateTime<Utc>) -> EngineResult<Option<DateTime<Utc>>> {
    Ok(parse_cron(expression)?.after(&after).next())
}

/// Schedule entries keyed by workflow id.
#[derive(Default)]
pub struct ScheduleRegistry {
    entries: Mutex<HashMap<String, ScheduleEntry>>,
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ScheduleEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or replace the schedule for a workflow.
    ///
    /// Replacing keeps `run_count`, `last_run` and the enabled flag.
    /// `next_run` is only recomputed when the expression changes.
    pub fn upsert(
        &self,
        workflow_id: &str,
        cron_expression: &str,
        tags: &[String],
    ) -> EngineResult<ScheduleEntry> {
        let cron_expression = cron_expression.trim();
        let next_run = next_run_after(cron_expression, Utc::now())?;
        let mut entries = self.lock();
        let entry = entries
            .entry(workflow_id.to_string())
            .or_insert_with(|| ScheduleEntry {
                workflow_id: workflow_id.to_string(),
                cron_expression: String::new(),
                enabled: true,
                last_run: None,
                next_run: None,
                run_count: 0,
                tags: Vec::new(),
            });
        if entry.cron_expression != cron_expression {
            entry.cron_expression = cron_expression.to_string();
            entry.next_run = next_run;
        }
        entry.tags = tags.to_vec();
        Ok(entry.clone())
    }

    pub fn remove(&self, workflow_id: &str) -> Option<ScheduleEntry> {
        self.lock().remove(workflow_id)
    }

    pub fn get(&self, workflow_id: &str) -> Option<ScheduleEntry> {
        self.lock().get(workflow_id).cloned()
    }

    /// All entries ordered by next run (unscheduled last), then workflow id.
    pub fn list(&self) -> Vec<ScheduleEntry> {
        let mut entries: Vec<ScheduleEntry> = self.lock().values().cloned().collect();
        entries.sort_by(|a, b| {
            let key = |e: &ScheduleEntry| (e.next_run.is_none(), e.next_run);
            key(a).cmp(&key(b)).then_with(|| a.workflow_id.cmp(&b.workflow_id))
        });
        entries
    }

    pub fn set_enabled(&self, workflow_id: &str, enabled: bool) -> Option<ScheduleEntry> {
        let mut entries = self.lock();
        let entry = entries.get_mut(workflow_id)?;
        entry.enabled = enabled;
        Some(entry.clone())
    }

    /// Enabled entries whose next run is at or before `now`.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<ScheduleEntry> {
        self.list()
            .into_iter()
            .filter(|e| e.enabled && e.next_run.is_some_and(|next| next <= now))
            .collect()
    }

    /// Record a run at `at` and move `next_run` forward.
    pub fn mark_run(&self, workflow_id: &str, at: DateTime<Utc>) -> Option<ScheduleEntry> {
        let mut entries = self.lock();
        let entry = entries.get_mut(workflow_id)?;
        entry.run_count += 1;
        entry.last_run = Some(at);
        // The expression was validated on upsert.
        entry.next_run = next_run_after(&entry.cron_expression, at).ok().flatten();
        Some(entry.clone())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
