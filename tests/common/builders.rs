//! Test data builders and an in-memory orchestration harness.

#![allow(dead_code)]

use super::observers::RecordingObserver;
use casework_core::case::{
    ApprovalNeed, CasePayload, DecisionMade, InMemoryCaseRepository, PeriodType, SequenceRegistry,
    Warning,
};
use casework_core::config::OrchestrationConfig;
use casework_core::context::{
    Answer, AnswerKind, GuardianshipStatus, OpenManualTasks, RiskAssessment, SequenceKind,
};
use casework_core::decision::{DecisionEngine, DisabledSampling, SamplingPolicy};
use casework_core::messaging::{Envelope, InMemoryPublisher};
use casework_core::orchestration::{DomainEvent, Orchestrator, TaskInvalidationObserver};
use casework_core::store::InMemoryContextStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Builder for approval needs with fresh ids
pub struct ApprovalNeedBuilder {
    warnings: Vec<Warning>,
    period_type: PeriodType,
}

impl ApprovalNeedBuilder {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            period_type: PeriodType::FirstTime,
        }
    }

    pub fn with_warning(mut self, code: &str) -> Self {
        self.warnings.push(Warning {
            code: code.to_string(),
            active: true,
        });
        self
    }

    pub fn with_period_type(mut self, period_type: PeriodType) -> Self {
        self.period_type = period_type;
        self
    }

    pub fn build(self) -> ApprovalNeed {
        ApprovalNeed {
            vedtaksperiode_id: Uuid::new_v4(),
            utbetaling_id: Uuid::new_v4(),
            fnr: "12345678910".to_string(),
            aktor_id: "1000000000001".to_string(),
            organization_number: "987654321".to_string(),
            period_type: self.period_type,
            warnings: self.warnings,
        }
    }
}

pub fn approval_need() -> ApprovalNeed {
    ApprovalNeedBuilder::new().build()
}

pub fn decision_made(vedtaksperiode_id: Uuid, approver: &str) -> DecisionMade {
    DecisionMade {
        vedtaksperiode_id,
        approver: approver.to_string(),
        payment_reference: "ref-42".to_string(),
    }
}

pub fn start_approval(correlation_id: Uuid, need: &ApprovalNeed) -> DomainEvent {
    DomainEvent::start(
        correlation_id,
        SequenceKind::Approval,
        CasePayload::Approval(need.clone()),
    )
}

pub fn start_finalization(correlation_id: Uuid, decision: &DecisionMade) -> DomainEvent {
    DomainEvent::start(
        correlation_id,
        SequenceKind::Finalization,
        CasePayload::Finalization(decision.clone()),
    )
}

pub fn clean_risk(need: &ApprovalNeed) -> Answer {
    Answer::RiskAssessment(RiskAssessment {
        vedtaksperiode_id: need.vedtaksperiode_id,
        may_auto_approve: true,
        findings: Vec::new(),
    })
}

pub fn no_guardian() -> Answer {
    Answer::Guardianship(GuardianshipStatus {
        has_guardian: false,
        has_power_of_attorney: false,
    })
}

pub fn no_open_tasks() -> Answer {
    Answer::OpenManualTasks(OpenManualTasks { count: 0 })
}

/// The three lookup answers for an approval need that blocks nothing
pub fn clean_answers(need: &ApprovalNeed) -> Vec<Answer> {
    vec![clean_risk(need), no_guardian(), no_open_tasks()]
}

pub fn approval_envelope(correlation_id: Uuid, need: &ApprovalNeed) -> Envelope {
    Envelope::new(
        "approval_needed",
        correlation_id,
        serde_json::to_value(need).expect("approval need serializes"),
    )
}

pub fn answer_envelope(correlation_id: Uuid, answer: &Answer) -> Envelope {
    let payload = match answer {
        Answer::RiskAssessment(inner) => serde_json::to_value(inner),
        Answer::Guardianship(inner) => serde_json::to_value(inner),
        Answer::OpenManualTasks(inner) => serde_json::to_value(inner),
    }
    .expect("answer serializes");
    Envelope::answer(correlation_id, answer.kind(), payload)
}

pub fn cancel_envelope(correlation_id: Uuid, reason: &str) -> Envelope {
    Envelope::new("case_cancelled", correlation_id, json!({ "reason": reason }))
}

pub fn body(envelope: &Envelope) -> serde_json::Value {
    serde_json::to_value(envelope).expect("envelope serializes")
}

pub fn answer_kinds(answers: &[Answer]) -> Vec<AnswerKind> {
    answers.iter().map(Answer::kind).collect()
}

/// Orchestrator wired to in-memory collaborators
pub struct Harness {
    pub store: Arc<InMemoryContextStore>,
    pub repository: Arc<InMemoryCaseRepository>,
    pub publisher: Arc<InMemoryPublisher>,
    pub observer: Arc<RecordingObserver>,
    pub orchestrator: Arc<Orchestrator>,
}

pub struct HarnessBuilder {
    sampling: Arc<dyn SamplingPolicy>,
    sequences: Option<SequenceRegistry>,
    config: OrchestrationConfig,
    lock_timeout: Duration,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            sampling: Arc::new(DisabledSampling),
            sequences: None,
            config: OrchestrationConfig::default(),
            lock_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_sampling(mut self, sampling: impl SamplingPolicy + 'static) -> Self {
        self.sampling = Arc::new(sampling);
        self
    }

    /// Replace the case workflows with custom sequences
    pub fn with_sequences(mut self, sequences: SequenceRegistry) -> Self {
        self.sequences = Some(sequences);
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_lock_retry_attempts(mut self, attempts: u32) -> Self {
        self.config.lock_retry_attempts = attempts;
        self.config.lock_retry_backoff_ms = 10;
        self
    }

    pub fn build(self) -> Harness {
        let store = Arc::new(InMemoryContextStore::new(self.lock_timeout));
        let repository = Arc::new(InMemoryCaseRepository::new());
        let publisher = Arc::new(InMemoryPublisher::new());
        let observer = Arc::new(RecordingObserver::new());

        let sequences = self.sequences.unwrap_or_else(|| {
            SequenceRegistry::case_workflows(
                repository.clone(),
                DecisionEngine::default(),
                self.sampling,
            )
        });

        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            sequences,
            publisher.clone(),
            self.config,
        ));
        orchestrator.register_observer(observer.clone());
        orchestrator.register_observer(Arc::new(TaskInvalidationObserver::new(
            repository.clone(),
        )));

        Harness {
            store,
            repository,
            publisher,
            observer,
            orchestrator,
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        HarnessBuilder::new().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }
}
