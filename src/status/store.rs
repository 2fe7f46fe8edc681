use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::status::model::{
    BranchScope, ProcessRecord, PullRequestSummary, Status, StepKey, StepState,
    WorkflowRunSummary,
};

/// Fields to set on a step when the guard predicate matches. The status is
/// always written; everything else is attached only when present.
#[derive(Debug, Clone)]
pub struct StepUpdate {
    pub status: Status,
    pub run: Option<(BranchScope, WorkflowRunSummary)>,
    pub pr: Option<PullRequestSummary>,
    pub merged_sha: Option<String>,
    pub detail: Option<String>,
}

impl StepUpdate {
    pub fn status(status: Status) -> Self {
        Self {
            status,
            run: None,
            pr: None,
            merged_sha: None,
            detail: None,
        }
    }

    pub fn with_run(mut self, scope: BranchScope, run: WorkflowRunSummary) -> Self {
        self.run = Some((scope, run));
        self
    }

    pub fn with_pr(mut self, pr: PullRequestSummary) -> Self {
        self.pr = Some(pr);
        self
    }

    pub fn with_merged_sha(mut self, sha: &str) -> Self {
        self.merged_sha = Some(sha.to_string());
        self
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    fn apply(&self, step: &mut StepState) {
        step.status = self.status;
        match &self.run {
            Some((BranchScope::Pr, run)) => step.pr_run = Some(run.clone()),
            Some((BranchScope::Main, run)) => step.main_run = Some(run.clone()),
            None => {}
        }
        if let Some(pr) = &self.pr {
            step.pr = Some(pr.clone());
        }
        if let Some(sha) = &self.merged_sha {
            step.merged_sha = Some(sha.clone());
        }
        if let Some(detail) = &self.detail {
            step.detail = Some(detail.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Outcome of a guarded update. `Stale` mirrors a matched-count of zero:
/// either the guard excluded the current status or no record matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    Stale,
}

/// Document store for process records, keyed by repository name.
///
/// The only concurrency primitive the rest of the system relies on is
/// `update_step_guarded`: an atomic single-record conditional write. No
/// multi-record transactions are assumed anywhere.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Atomically insert a new record; never overwrites an existing one.
    async fn insert_if_absent(&self, record: ProcessRecord) -> Result<InsertOutcome>;

    async fn get(&self, repository_name: &str) -> Result<Option<ProcessRecord>>;

    /// Look up the record whose `step` stores the given merge commit.
    async fn find_by_merged_sha(&self, step: StepKey, sha: &str)
        -> Result<Option<ProcessRecord>>;

    /// Look up the record whose `step` stores the given pull request number.
    async fn find_by_pr_number(
        &self,
        step: StepKey,
        number: u64,
    ) -> Result<Option<ProcessRecord>>;

    /// Apply `update` to the step only if its current status is NOT in
    /// `exclude`. Atomic per record.
    async fn update_step_guarded(
        &self,
        repository_name: &str,
        step: StepKey,
        exclude: &[Status],
        update: StepUpdate,
    ) -> Result<UpdateOutcome>;

    /// Guarded update fanned out over every record that tracks `step`.
    /// Returns the repository names that were actually updated.
    async fn update_step_guarded_all(
        &self,
        step: StepKey,
        exclude: &[Status],
        update: StepUpdate,
    ) -> Result<Vec<String>>;

    /// Unconditional write of the derived overall status.
    async fn set_overall(&self, repository_name: &str, status: Status) -> Result<()>;

    /// Names of all processes whose overall status is in-progress or failure,
    /// for out-of-band stuck-process reporting.
    async fn list_unfinished(&self) -> Result<Vec<String>>;
}

/// In-memory store. Each record mutation happens under a single write lock,
/// which gives the same atomic single-document semantics the trait promises.
pub struct InMemoryStatusStore {
    records: RwLock<HashMap<String, ProcessRecord>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn insert_if_absent(&self, record: ProcessRecord) -> Result<InsertOutcome> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.repository_name) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        records.insert(record.repository_name.clone(), record);
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, repository_name: &str) -> Result<Option<ProcessRecord>> {
        let records = self.records.read().await;
        Ok(records.get(repository_name).cloned())
    }

    async fn find_by_merged_sha(
        &self,
        step: StepKey,
        sha: &str,
    ) -> Result<Option<ProcessRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| {
                r.steps
                    .get(&step)
                    .and_then(|s| s.merged_sha.as_deref())
                    .is_some_and(|stored| stored == sha)
            })
            .cloned())
    }

    async fn find_by_pr_number(
        &self,
        step: StepKey,
        number: u64,
    ) -> Result<Option<ProcessRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| {
                r.steps
                    .get(&step)
                    .and_then(|s| s.pr.as_ref())
                    .is_some_and(|pr| pr.number == number)
            })
            .cloned())
    }

    async fn update_step_guarded(
        &self,
        repository_name: &str,
        step: StepKey,
        exclude: &[Status],
        update: StepUpdate,
    ) -> Result<UpdateOutcome> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(repository_name) else {
            return Ok(UpdateOutcome::Stale);
        };
        let Some(state) = record.steps.get_mut(&step) else {
            return Ok(UpdateOutcome::Stale);
        };
        if exclude.contains(&state.status) {
            return Ok(UpdateOutcome::Stale);
        }
        update.apply(state);
        Ok(UpdateOutcome::Updated)
    }

    async fn update_step_guarded_all(
        &self,
        step: StepKey,
        exclude: &[Status],
        update: StepUpdate,
    ) -> Result<Vec<String>> {
        let mut records = self.records.write().await;
        let mut updated = Vec::new();
        for record in records.values_mut() {
            let Some(state) = record.steps.get_mut(&step) else {
                continue;
            };
            if exclude.contains(&state.status) {
                continue;
            }
            update.apply(state);
            updated.push(record.repository_name.clone());
        }
        Ok(updated)
    }

    async fn set_overall(&self, repository_name: &str, status: Status) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(repository_name) {
            record.status = status;
        }
        Ok(())
    }

    async fn list_unfinished(&self) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let mut names: Vec<String> = records
            .values()
            .filter(|r| matches!(r.status, Status::InProgress | Status::Failure))
            .map(|r| r.repository_name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}
