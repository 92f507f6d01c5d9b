//! Aggregations over the execution store, memoized behind a TTL cache.

pub mod cache;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::error::EngineResult;
use crate::engine::types::{ExecutionStatus, WorkflowExecution};
use crate::engine::validate;
use crate::storage::MemoryStore;

use self::cache::TtlCache;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
const RECENT_EXECUTIONS: usize = 10;
const TOP_FAILING: usize = 5;

/// Cache key: the full parameter tuple of an aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnalyticsKey {
    Summary {
        days: u32,
    },
    WorkflowStats {
        workflow_id: String,
        days: u32,
    },
    Timeline {
        workflow_id: Option<String>,
        hours: u32,
        bucket_minutes: u32,
    },
}

#[derive(Clone)]
enum Report {
    Summary(Arc<ExecutionSummary>),
    WorkflowStats(Arc<WorkflowStats>),
    Timeline(Arc<Timeline>),
}

impl Report {
    fn kind(&self) -> &'static str {
        match self {
            Report::Summary(_) => "summary",
            Report::WorkflowStats(_) => "workflow stats",
            Report::Timeline(_) => "timeline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionDigest {
    pub id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub trigger: String,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl From<&WorkflowExecution> for ExecutionDigest {
    fn from(e: &WorkflowExecution) -> Self {
        Self {
            id: e.id.clone(),
            workflow_id: e.workflow_id.clone(),
            status: e.status,
            trigger: e.trigger.clone(),
            started_at: e.started_at,
            duration_ms: e.duration_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailingWorkflow {
    pub workflow_id: String,
    pub workflow_name: Option<String>,
    pub failures: usize,
    pub total: usize,
    pub failure_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub period_days: u32,
    pub total_workflows: usize,
    pub total_executions: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub status_counts: BTreeMap<String, usize>,
    pub recent_executions: Vec<ExecutionDigest>,
    pub top_failing_workflows: Vec<FailingWorkflow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowStats {
    pub workflow_id: String,
    pub period_days: u32,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimelineBucket {
    pub timestamp: DateTime<Utc>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub workflow_id: Option<String>,
    pub hours: u32,
    pub bucket_minutes: u32,
    pub buckets: Vec<TimelineBucket>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

/// Analytics over the execution store.
///
/// The cache is never invalidated by writes on its own: whoever mutates
/// executions or workflows calls [`Analytics::invalidate`].
pub struct Analytics {
    store: Arc<MemoryStore>,
    cache: TtlCache<AnalyticsKey, Report>,
}

impl Analytics {
    pub fn new(store: Arc<MemoryStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new(ttl),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.cache.ttl()
    }

    pub fn set_ttl(&self, ttl: Duration) {
        self.cache.set_ttl(ttl);
    }

    /// Drop every cached aggregate.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Number of cached aggregates, expired ones included.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Run `f` under the cache lock and clear the cache afterwards.
    pub(crate) fn invalidate_with(&self, f: impl FnOnce()) {
        self.cache.invalidate_with(f);
    }

    /// Summary over executions started in the last `days` days.
    pub fn summary(&self, days: u32) -> EngineResult<Arc<ExecutionSummary>> {
        let days = validate::within("days", days, validate::MAX_DAYS)?;
        let report = self
            .cache
            .get_or_insert_with(AnalyticsKey::Summary { days }, || {
                Report::Summary(Arc::new(self.compute_summary(days)))
            });
        Ok(match report {
            Report::Summary(summary) => summary,
            other => unreachable!("summary key holds a {} report", other.kind()),
        })
    }

    /// Per-workflow statistics over the last `days` days.
    pub fn workflow_stats(&self, workflow_id: &str, days: u32) -> EngineResult<Arc<WorkflowStats>> {
        let days = validate::within("days", days, validate::MAX_DAYS)?;
        let key = AnalyticsKey::WorkflowStats {
            workflow_id: workflow_id.to_string(),
            days,
        };
        let report = self.cache.get_or_insert_with(key, || {
            Report::WorkflowStats(Arc::new(self.compute_workflow_stats(workflow_id, days)))
        });
        Ok(match report {
            Report::WorkflowStats(stats) => stats,
            other => unreachable!("workflow stats key holds a {} report", other.kind()),
        })
    }

    /// Execution counts in `bucket_minutes` wide buckets over the last `hours`.
    pub fn timeline(
        &self,
        hours: u32,
        bucket_minutes: u32,
        workflow_id: Option<&str>,
    ) -> EngineResult<Arc<Timeline>> {
        let hours = validate::within("hours", hours, validate::MAX_HOURS)?;
        let bucket_minutes =
            validate::within("bucket_minutes", bucket_minutes, validate::MAX_BUCKET_MINUTES)?;
        let key = AnalyticsKey::Timeline {
            workflow_id: workflow_id.map(String::from),
            hours,
            bucket_minutes,
        };
        let report = self.cache.get_or_insert_with(key, || {
            Report::Timeline(Arc::new(self.compute_timeline(hours, bucket_minutes, workflow_id)))
        });
        Ok(match report {
            Report::Timeline(timeline) => timeline,
            other => unreachable!("timeline key holds a {} report", other.kind()),
        })
    }

    fn compute_summary(&self, days: u32) -> ExecutionSummary {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let executions = self.store.executions_since(Some(cutoff));
        let total = executions.len();

        let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
        for e in &executions {
            *status_counts.entry(e.status.to_string()).or_default() += 1;
        }
        let completed = status_counts
            .get(&ExecutionStatus::Completed.to_string())
            .copied()
            .unwrap_or(0);

        let durations: Vec<i64> = executions.iter().filter_map(|e| e.duration_ms()).collect();
        let average_duration_ms = if durations.is_empty() {
            0.0
        } else {
            round2(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
        };

        let mut recent: Vec<&WorkflowExecution> = executions.iter().rev().collect();
        recent.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let recent_executions = recent
            .into_iter()
            .take(RECENT_EXECUTIONS)
            .map(ExecutionDigest::from)
            .collect();

        ExecutionSummary {
            period_days: days,
            total_workflows: self.store.workflow_count(),
            total_executions: total,
            success_rate: percent(completed, total),
            average_duration_ms,
            status_counts,
            recent_executions,
            top_failing_workflows: self.top_failing(&executions),
        }
    }

    /// Workflows with the most failures; ties keep first-seen order.
    fn top_failing(&self, executions: &[WorkflowExecution]) -> Vec<FailingWorkflow> {
        let mut totals: HashMap<&str, usize> = HashMap::new();
        let mut failures: Vec<(&str, usize)> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();

        for e in executions {
            *totals.entry(e.workflow_id.as_str()).or_default() += 1;
            if e.status == ExecutionStatus::Failed {
                let slot = *position.entry(e.workflow_id.as_str()).or_insert_with(|| {
                    failures.push((e.workflow_id.as_str(), 0));
                    failures.len() - 1
                });
                failures[slot].1 += 1;
            }
        }

        // Stable sort keeps first-seen order among equal counts.
        failures.sort_by(|a, b| b.1.cmp(&a.1));

        let names = self.store.workflow_names();
        failures
            .into_iter()
            .take(TOP_FAILING)
            .map(|(workflow_id, count)| {
                let total = totals.get(workflow_id).copied().unwrap_or(count);
                FailingWorkflow {
                    workflow_id: workflow_id.to_string(),
                    workflow_name: names.get(workflow_id).cloned(),
                    failures: count,
                    total,
                    failure_rate: percent(count, total),
                }
            })
            .collect()
    }

    fn compute_workflow_stats(&self, workflow_id: &str, days: u32) -> WorkflowStats {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let executions: Vec<WorkflowExecution> = self
            .store
            .find_executions(Some(workflow_id), None, usize::MAX)
            .into_iter()
            .filter(|e| e.started_at.is_some_and(|s| s >= cutoff))
            .collect();

        let total = executions.len();
        let completed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count();
        let failed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Failed)
            .count();

        let durations: Vec<f64> = executions
            .iter()
            .filter_map(|e| e.duration_ms())
            .map(|d| d as f64)
            .collect();
        let (avg, min, max) = if durations.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                durations.iter().sum::<f64>() / durations.len() as f64,
                durations.iter().copied().fold(f64::INFINITY, f64::min),
                durations.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        WorkflowStats {
            workflow_id: workflow_id.to_string(),
            period_days: days,
            total,
            completed,
            failed,
            success_rate: percent(completed, total),
            avg_duration_ms: round2(avg),
            min_duration_ms: round2(min),
            max_duration_ms: round2(max),
        }
    }

    fn compute_timeline(
        &self,
        hours: u32,
        bucket_minutes: u32,
        workflow_id: Option<&str>,
    ) -> Timeline {
        let now = Utc::now();
        let start = now - chrono::Duration::hours(i64::from(hours));
        let width = i64::from(bucket_minutes) * 60;

        let first = start.timestamp().div_euclid(width) * width;
        let last = now.timestamp().div_euclid(width) * width;

        let mut buckets: Vec<TimelineBucket> = (first..=last)
            .step_by(width as usize)
            .filter_map(|t| DateTime::<Utc>::from_timestamp(t, 0))
            .map(|timestamp| TimelineBucket {
                timestamp,
                ..Default::default()
            })
            .collect();

        let executions = match workflow_id {
            Some(id) => self.store.find_executions(Some(id), None, usize::MAX),
            None => self.store.executions_since(Some(start)),
        };

        for e in &executions {
            let Some(started) = e.started_at else {
                continue;
            };
            if started < start || started > now {
                continue;
            }
            let slot = (started.timestamp().div_euclid(width) * width - first) / width;
            let Some(bucket) = usize::try_from(slot).ok().and_then(|i| buckets.get_mut(i)) else {
                continue;
            };
            bucket.total += 1;
            match e.status {
                ExecutionStatus::Completed => bucket.completed += 1,
                ExecutionStatus::Failed => bucket.failed += 1,
                ExecutionStatus::Cancelled => bucket.cancelled += 1,
                ExecutionStatus::Pending | ExecutionStatus::Running => {}
            }
        }

        Timeline {
            workflow_id: workflow_id.map(String::from),
            hours,
            bucket_minutes,
            buckets,
        }
    }
}
