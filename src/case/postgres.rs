use super::domain::PeriodKey;
use super::repository::CaseRepository;
use crate::context::{GuardianshipStatus, RiskAssessment};
use crate::decision::{AutomationSignals, Decision, DecisionRecord, SamplingDraw};
use crate::error::{CaseworkError, Result};
use crate::state_machine::{CaseTask, ReviewState, TaskState, TwoPersonReview};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, sqlx::FromRow)]
struct SamplingRow {
    vedtaksperiode_id: Uuid,
    policy: String,
    roll: Option<i32>,
    sampled: bool,
    drawn_at: DateTime<Utc>,
}

impl From<SamplingRow> for SamplingDraw {
    fn from(row: SamplingRow) -> Self {
        Self {
            vedtaksperiode_id: row.vedtaksperiode_id,
            policy: row.policy,
            roll: row.roll.and_then(|r| u16::try_from(r).ok()),
            sampled: row.sampled,
            drawn_at: row.drawn_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DecisionRow {
    vedtaksperiode_id: Uuid,
    utbetaling_id: Uuid,
    automatic: bool,
    reasons: serde_json::Value,
    signals: serde_json::Value,
    decided_at: DateTime<Utc>,
}

impl TryFrom<DecisionRow> for DecisionRecord {
    type Error = CaseworkError;

    fn try_from(row: DecisionRow) -> Result<Self> {
        let decision = if row.automatic {
            Decision::Automatic
        } else {
            Decision::Manual {
                reasons: serde_json::from_value(row.reasons)?,
            }
        };
        let signals: AutomationSignals = serde_json::from_value(row.signals)?;

        Ok(Self {
            period: PeriodKey {
                vedtaksperiode_id: row.vedtaksperiode_id,
                utbetaling_id: row.utbetaling_id,
            },
            decision,
            signals,
            decided_at: row.decided_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    task_id: Uuid,
    vedtaksperiode_id: Uuid,
    utbetaling_id: Uuid,
    state: String,
    assignee: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for CaseTask {
    type Error = CaseworkError;

    fn try_from(row: TaskRow) -> Result<Self> {
        Ok(Self {
            task_id: row.task_id,
            period: PeriodKey {
                vedtaksperiode_id: row.vedtaksperiode_id,
                utbetaling_id: row.utbetaling_id,
            },
            state: row
                .state
                .parse::<TaskState>()
                .map_err(CaseworkError::DatabaseError)?,
            assignee: row.assignee,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    review_id: Uuid,
    vedtaksperiode_id: Uuid,
    utbetaling_id: Uuid,
    state: String,
    submitter: Option<String>,
    reviewer: Option<String>,
    approver: Option<String>,
    returned: bool,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for TwoPersonReview {
    type Error = CaseworkError;

    fn try_from(row: ReviewRow) -> Result<Self> {
        Ok(Self {
            review_id: row.review_id,
            period: PeriodKey {
                vedtaksperiode_id: row.vedtaksperiode_id,
                utbetaling_id: row.utbetaling_id,
            },
            state: row
                .state
                .parse::<ReviewState>()
                .map_err(CaseworkError::DatabaseError)?,
            submitter: row.submitter,
            reviewer: row.reviewer,
            approver: row.approver,
            returned: row.returned,
            payment_reference: row.payment_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const OPEN_TASK_STATES: [&str; 3] = [
    "awaiting_caseworker",
    "awaiting_system",
    "awaiting_second_reviewer",
];

/// Postgres case repository. Every write is an idempotent upsert so a step
/// attempted twice leaves one row.
#[derive(Debug, Clone)]
pub struct PgCaseRepository {
    pool: PgPool,
}

impl PgCaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn open_task_for_period(&self, period: &PeriodKey) -> Result<Option<CaseTask>> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            SELECT task_id, vedtaksperiode_id, utbetaling_id, state, assignee, created_at, updated_at
            FROM case_tasks
            WHERE vedtaksperiode_id = $1 AND utbetaling_id = $2 AND state = ANY($3)
            "#,
        )
        .bind(period.vedtaksperiode_id)
        .bind(period.utbetaling_id)
        .bind(&OPEN_TASK_STATES[..])
        .fetch_optional(&self.pool)
        .await?;

        row.map(CaseTask::try_from).transpose()
    }
}

#[async_trait]
impl CaseRepository for PgCaseRepository {
    async fn risk_assessment(&self, period: &PeriodKey) -> Result<Option<RiskAssessment>> {
        let row: Option<(bool, serde_json::Value)> = sqlx::query_as(
            "SELECT may_auto_approve, findings FROM case_risk_assessments
             WHERE vedtaksperiode_id = $1 AND utbetaling_id = $2",
        )
        .bind(period.vedtaksperiode_id)
        .bind(period.utbetaling_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(may_auto_approve, findings)| -> Result<RiskAssessment> {
            Ok(RiskAssessment {
                vedtaksperiode_id: period.vedtaksperiode_id,
                may_auto_approve,
                findings: serde_json::from_value(findings)?,
            })
        })
        .transpose()
    }

    async fn save_risk_assessment(&self, period: &PeriodKey, risk: &RiskAssessment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO case_risk_assessments (vedtaksperiode_id, utbetaling_id, may_auto_approve, findings)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (vedtaksperiode_id, utbetaling_id) DO UPDATE SET
                may_auto_approve = EXCLUDED.may_auto_approve,
                findings = EXCLUDED.findings,
                recorded_at = now()
            "#,
        )
        .bind(period.vedtaksperiode_id)
        .bind(period.utbetaling_id)
        .bind(risk.may_auto_approve)
        .bind(serde_json::to_value(&risk.findings)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn guardianship(&self, period: &PeriodKey) -> Result<Option<GuardianshipStatus>> {
        let row: Option<(bool, bool)> = sqlx::query_as(
            "SELECT has_guardian, has_power_of_attorney FROM case_guardianships
             WHERE vedtaksperiode_id = $1 AND utbetaling_id = $2",
        )
        .bind(period.vedtaksperiode_id)
        .bind(period.utbetaling_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(has_guardian, has_power_of_attorney)| GuardianshipStatus {
            has_guardian,
            has_power_of_attorney,
        }))
    }

    async fn save_guardianship(
        &self,
        period: &PeriodKey,
        status: &GuardianshipStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO case_guardianships (vedtaksperiode_id, utbetaling_id, has_guardian, has_power_of_attorney)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (vedtaksperiode_id, utbetaling_id) DO UPDATE SET
                has_guardian = EXCLUDED.has_guardian,
                has_power_of_attorney = EXCLUDED.has_power_of_attorney,
                recorded_at = now()
            "#,
        )
        .bind(period.vedtaksperiode_id)
        .bind(period.utbetaling_id)
        .bind(status.has_guardian)
        .bind(status.has_power_of_attorney)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn open_manual_tasks(&self, period: &PeriodKey) -> Result<Option<u32>> {
        let count: Option<i32> = sqlx::query_scalar(
            "SELECT open_count FROM case_open_manual_tasks
             WHERE vedtaksperiode_id = $1 AND utbetaling_id = $2",
        )
        .bind(period.vedtaksperiode_id)
        .bind(period.utbetaling_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.map(|c| c.max(0) as u32))
    }

    async fn save_open_manual_tasks(&self, period: &PeriodKey, count: u32) -> Result<()> {
        let count = i32::try_from(count).map_err(|_| {
            CaseworkError::ValidationError(format!("open manual task count out of range: {count}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO case_open_manual_tasks (vedtaksperiode_id, utbetaling_id, open_count)
            VALUES ($1, $2, $3)
            ON CONFLICT (vedtaksperiode_id, utbetaling_id) DO UPDATE SET
                open_count = EXCLUDED.open_count,
                recorded_at = now()
            "#,
        )
        .bind(period.vedtaksperiode_id)
        .bind(period.utbetaling_id)
        .bind(count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn sampling_draw(&self, vedtaksperiode_id: Uuid) -> Result<Option<SamplingDraw>> {
        let row: Option<SamplingRow> = sqlx::query_as(
            "SELECT vedtaksperiode_id, policy, roll, sampled, drawn_at
             FROM case_sampling_draws WHERE vedtaksperiode_id = $1",
        )
        .bind(vedtaksperiode_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SamplingDraw::from))
    }

    async fn record_sampling_draw(&self, draw: &SamplingDraw) -> Result<SamplingDraw> {
        // An existing row is never overwritten; the stored draw is returned
        let row: SamplingRow = sqlx::query_as(
            r#"
            WITH inserted AS (
                INSERT INTO case_sampling_draws (vedtaksperiode_id, policy, roll, sampled, drawn_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (vedtaksperiode_id) DO NOTHING
                RETURNING vedtaksperiode_id, policy, roll, sampled, drawn_at
            )
            SELECT vedtaksperiode_id, policy, roll, sampled, drawn_at FROM inserted
            UNION ALL
            SELECT vedtaksperiode_id, policy, roll, sampled, drawn_at
            FROM case_sampling_draws WHERE vedtaksperiode_id = $1
            LIMIT 1
            "#,
        )
        .bind(draw.vedtaksperiode_id)
        .bind(&draw.policy)
        .bind(draw.roll.map(i32::from))
        .bind(draw.sampled)
        .bind(draw.drawn_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn decision(&self, period: &PeriodKey) -> Result<Option<DecisionRecord>> {
        let row: Option<DecisionRow> = sqlx::query_as(
            "SELECT vedtaksperiode_id, utbetaling_id, automatic, reasons, signals, decided_at
             FROM case_decisions WHERE vedtaksperiode_id = $1 AND utbetaling_id = $2",
        )
        .bind(period.vedtaksperiode_id)
        .bind(period.utbetaling_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DecisionRecord::try_from).transpose()
    }

    async fn save_decision(&self, record: &DecisionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO case_decisions (vedtaksperiode_id, utbetaling_id, automatic, reasons, signals, decided_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (vedtaksperiode_id, utbetaling_id) DO NOTHING
            "#,
        )
        .bind(record.period.vedtaksperiode_id)
        .bind(record.period.utbetaling_id)
        .bind(record.decision.is_automatic())
        .bind(serde_json::to_value(record.decision.reasons())?)
        .bind(serde_json::to_value(&record.signals)?)
        .bind(record.decided_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_task(&self, period: &PeriodKey) -> Result<CaseTask> {
        if let Some(open) = self.open_task_for_period(period).await? {
            return Ok(open);
        }

        let task = CaseTask::new(*period);
        let inserted = sqlx::query(
            r#"
            INSERT INTO case_tasks (task_id, vedtaksperiode_id, utbetaling_id, state, assignee, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(task.task_id)
        .bind(period.vedtaksperiode_id)
        .bind(period.utbetaling_id)
        .bind(task.state.to_string())
        .bind(&task.assignee)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(task),
            // Lost a race on the open-task index: the winner's task is the task
            Err(e)
                if e.as_database_error().and_then(|db| db.code()).as_deref()
                    == Some(UNIQUE_VIOLATION) =>
            {
                self.open_task_for_period(period)
                    .await?
                    .ok_or_else(|| CaseworkError::DatabaseError(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn open_task(&self, vedtaksperiode_id: Uuid) -> Result<Option<CaseTask>> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            SELECT task_id, vedtaksperiode_id, utbetaling_id, state, assignee, created_at, updated_at
            FROM case_tasks
            WHERE vedtaksperiode_id = $1 AND state = ANY($2)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(vedtaksperiode_id)
        .bind(&OPEN_TASK_STATES[..])
        .fetch_optional(&self.pool)
        .await?;

        row.map(CaseTask::try_from).transpose()
    }

    async fn task_for_period(&self, period: &PeriodKey) -> Result<Option<CaseTask>> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            SELECT task_id, vedtaksperiode_id, utbetaling_id, state, assignee, created_at, updated_at
            FROM case_tasks
            WHERE vedtaksperiode_id = $1 AND utbetaling_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(period.vedtaksperiode_id)
        .bind(period.utbetaling_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CaseTask::try_from).transpose()
    }

    async fn save_task(&self, task: &CaseTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO case_tasks (task_id, vedtaksperiode_id, utbetaling_id, state, assignee, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (task_id) DO UPDATE SET
                state = EXCLUDED.state,
                assignee = EXCLUDED.assignee,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(task.task_id)
        .bind(task.period.vedtaksperiode_id)
        .bind(task.period.utbetaling_id)
        .bind(task.state.to_string())
        .bind(&task.assignee)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn review(&self, vedtaksperiode_id: Uuid) -> Result<Option<TwoPersonReview>> {
        let row: Option<ReviewRow> = sqlx::query_as(
            r#"
            SELECT review_id, vedtaksperiode_id, utbetaling_id, state, submitter, reviewer,
                   approver, returned, payment_reference, created_at, updated_at
            FROM case_reviews
            WHERE vedtaksperiode_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(vedtaksperiode_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TwoPersonReview::try_from).transpose()
    }

    async fn save_review(&self, review: &TwoPersonReview) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO case_reviews (
                review_id, vedtaksperiode_id, utbetaling_id, state, submitter, reviewer,
                approver, returned, payment_reference, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (review_id) DO UPDATE SET
                state = EXCLUDED.state,
                submitter = EXCLUDED.submitter,
                reviewer = EXCLUDED.reviewer,
                approver = EXCLUDED.approver,
                returned = EXCLUDED.returned,
                payment_reference = EXCLUDED.payment_reference,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(review.review_id)
        .bind(review.period.vedtaksperiode_id)
        .bind(review.period.utbetaling_id)
        .bind(review.state.to_string())
        .bind(&review.submitter)
        .bind(&review.reviewer)
        .bind(&review.approver)
        .bind(review.returned)
        .bind(&review.payment_reference)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
