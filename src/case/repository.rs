//! # Case Repository
//!
//! Durable state private to the case steps. Each step decides whether its own
//! effect already happened by looking here, never at the execution context.

use super::domain::PeriodKey;
use crate::context::{GuardianshipStatus, RiskAssessment};
use crate::decision::{DecisionRecord, SamplingDraw};
use crate::error::{CaseworkError, Result};
use crate::state_machine::{CaseTask, TwoPersonReview};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[async_trait]
pub trait CaseRepository: Send + Sync {
    async fn risk_assessment(&self, period: &PeriodKey) -> Result<Option<RiskAssessment>>;

    async fn save_risk_assessment(&self, period: &PeriodKey, risk: &RiskAssessment) -> Result<()>;

    async fn guardianship(&self, period: &PeriodKey) -> Result<Option<GuardianshipStatus>>;

    async fn save_guardianship(&self, period: &PeriodKey, status: &GuardianshipStatus)
        -> Result<()>;

    async fn open_manual_tasks(&self, period: &PeriodKey) -> Result<Option<u32>>;

    async fn save_open_manual_tasks(&self, period: &PeriodKey, count: u32) -> Result<()>;

    async fn sampling_draw(&self, vedtaksperiode_id: Uuid) -> Result<Option<SamplingDraw>>;

    /// Store a draw unless one exists for the case period. Returns the draw
    /// that is on record afterwards, which wins over `draw` if both exist.
    async fn record_sampling_draw(&self, draw: &SamplingDraw) -> Result<SamplingDraw>;

    async fn decision(&self, period: &PeriodKey) -> Result<Option<DecisionRecord>>;

    async fn save_decision(&self, record: &DecisionRecord) -> Result<()>;

    /// Create the manual task for a period, or return the one already open.
    async fn create_task(&self, period: &PeriodKey) -> Result<CaseTask>;

    async fn open_task(&self, vedtaksperiode_id: Uuid) -> Result<Option<CaseTask>>;

    /// The most recent task for exactly this period, in any state
    async fn task_for_period(&self, period: &PeriodKey) -> Result<Option<CaseTask>>;

    async fn save_task(&self, task: &CaseTask) -> Result<()>;

    /// The latest two-person review for the case period
    async fn review(&self, vedtaksperiode_id: Uuid) -> Result<Option<TwoPersonReview>>;

    async fn save_review(&self, review: &TwoPersonReview) -> Result<()>;
}

/// In-memory repository for tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryCaseRepository {
    risk: DashMap<PeriodKey, RiskAssessment>,
    guardianship: DashMap<PeriodKey, GuardianshipStatus>,
    open_manual_tasks: DashMap<PeriodKey, u32>,
    sampling: DashMap<Uuid, SamplingDraw>,
    decisions: DashMap<PeriodKey, DecisionRecord>,
    tasks: Mutex<Vec<CaseTask>>,
    reviews: DashMap<Uuid, TwoPersonReview>,
    failing: AtomicBool,
    fail_next_decision_save: AtomicBool,
    fail_next_task_create: AtomicBool,
}

impl InMemoryCaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a database error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `save_decision` call only
    pub fn fail_next_decision_save(&self) {
        self.fail_next_decision_save.store(true, Ordering::SeqCst);
    }

    /// Fail the next `create_task` call only
    pub fn fail_next_task_create(&self) {
        self.fail_next_task_create.store(true, Ordering::SeqCst);
    }

    pub fn tasks(&self) -> Vec<CaseTask> {
        self.tasks.lock().clone()
    }

    pub fn decision_count(&self) -> usize {
        self.decisions.len()
    }

    pub fn seed_review(&self, review: TwoPersonReview) {
        self.reviews.insert(review.period.vedtaksperiode_id, review);
    }

    pub fn seed_task(&self, task: CaseTask) {
        self.tasks.lock().push(task);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CaseworkError::DatabaseError(
                "case repository unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn check_once(&self, flag: &AtomicBool) -> Result<()> {
        self.check()?;
        if flag.swap(false, Ordering::SeqCst) {
            return Err(CaseworkError::DatabaseError("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CaseRepository for InMemoryCaseRepository {
    async fn risk_assessment(&self, period: &PeriodKey) -> Result<Option<RiskAssessment>> {
        self.check()?;
        Ok(self.risk.get(period).map(|r| r.value().clone()))
    }

    async fn save_risk_assessment(&self, period: &PeriodKey, risk: &RiskAssessment) -> Result<()> {
        self.check()?;
        self.risk.insert(*period, risk.clone());
        Ok(())
    }

    async fn guardianship(&self, period: &PeriodKey) -> Result<Option<GuardianshipStatus>> {
        self.check()?;
        Ok(self.guardianship.get(period).map(|g| *g.value()))
    }

    async fn save_guardianship(
        &self,
        period: &PeriodKey,
        status: &GuardianshipStatus,
    ) -> Result<()> {
        self.check()?;
        self.guardianship.insert(*period, *status);
        Ok(())
    }

    async fn open_manual_tasks(&self, period: &PeriodKey) -> Result<Option<u32>> {
        self.check()?;
        Ok(self.open_manual_tasks.get(period).map(|c| *c.value()))
    }

    async fn save_open_manual_tasks(&self, period: &PeriodKey, count: u32) -> Result<()> {
        self.check()?;
        self.open_manual_tasks.insert(*period, count);
        Ok(())
    }

    async fn sampling_draw(&self, vedtaksperiode_id: Uuid) -> Result<Option<SamplingDraw>> {
        self.check()?;
        Ok(self.sampling.get(&vedtaksperiode_id).map(|d| d.value().clone()))
    }

    async fn record_sampling_draw(&self, draw: &SamplingDraw) -> Result<SamplingDraw> {
        self.check()?;
        let stored = self
            .sampling
            .entry(draw.vedtaksperiode_id)
            .or_insert_with(|| draw.clone());
        Ok(stored.value().clone())
    }

    async fn decision(&self, period: &PeriodKey) -> Result<Option<DecisionRecord>> {
        self.check()?;
        Ok(self.decisions.get(period).map(|d| d.value().clone()))
    }

    async fn save_decision(&self, record: &DecisionRecord) -> Result<()> {
        self.check_once(&self.fail_next_decision_save)?;
        self.decisions.insert(record.period, record.clone());
        Ok(())
    }

    async fn create_task(&self, period: &PeriodKey) -> Result<CaseTask> {
        self.check_once(&self.fail_next_task_create)?;
        let mut tasks = self.tasks.lock();
        if let Some(open) = tasks
            .iter()
            .find(|t| t.period == *period && t.state.is_open())
        {
            return Ok(open.clone());
        }
        let task = CaseTask::new(*period);
        tasks.push(task.clone());
        Ok(task)
    }

    async fn open_task(&self, vedtaksperiode_id: Uuid) -> Result<Option<CaseTask>> {
        self.check()?;
        Ok(self
            .tasks
            .lock()
            .iter()
            .find(|t| t.period.vedtaksperiode_id == vedtaksperiode_id && t.state.is_open())
            .cloned())
    }

    async fn task_for_period(&self, period: &PeriodKey) -> Result<Option<CaseTask>> {
        self.check()?;
        Ok(self
            .tasks
            .lock()
            .iter()
            .filter(|t| t.period == *period)
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn save_task(&self, task: &CaseTask) -> Result<()> {
        self.check()?;
        let mut tasks = self.tasks.lock();
        match tasks.iter_mut().find(|t| t.task_id == task.task_id) {
            Some(existing) => *existing = task.clone(),
            None => tasks.push(task.clone()),
        }
        Ok(())
    }

    async fn review(&self, vedtaksperiode_id: Uuid) -> Result<Option<TwoPersonReview>> {
        self.check()?;
        Ok(self.reviews.get(&vedtaksperiode_id).map(|r| r.value().clone()))
    }

    async fn save_review(&self, review: &TwoPersonReview) -> Result<()> {
        self.check()?;
        self.reviews
            .insert(review.period.vedtaksperiode_id, review.clone());
        Ok(())
    }
}
