//! # Automatic/Manual Decision Engine
//!
//! Pure routing of a case period to automatic approval or manual review from
//! the signals accumulated by the approval sequence. Any single blocking
//! predicate forces manual review. Given identical signals the decision is
//! identical; the only random input, sampling, is drawn at most once per case
//! period and persisted before it is used (see [`sampling`]).

pub mod sampling;
pub mod step;

use crate::case::domain::PeriodKey;
use crate::config::DecisionConfig;
use crate::context::{GuardianshipStatus, RiskAssessment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use sampling::{
    policy_from_config, DisabledSampling, FixedSampling, RateSampling, SamplingDraw,
    SamplingPolicy,
};
pub use step::AutomaticApprovalStep;

/// Everything the decision is based on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationSignals {
    pub risk: Option<RiskAssessment>,
    /// Codes of active warnings (varsler) on the period
    pub active_warnings: Vec<String>,
    pub guardianship: Option<GuardianshipStatus>,
    pub open_manual_tasks: Option<u32>,
    /// A caseworker is already handling the period
    pub manual_override_in_flight: bool,
    pub sampled: bool,
}

/// Why a case was routed to manual review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockingReason {
    RiskAssessmentMissing,
    RiskAssessmentBlocks { findings: Vec<String> },
    ActiveWarnings { codes: Vec<String> },
    Guardianship,
    PowerOfAttorney,
    GuardianshipUnknown,
    OpenManualTasks { count: u32 },
    OpenManualTasksUnknown,
    ManualOverrideInFlight,
    Sampled,
}

impl BlockingReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::RiskAssessmentMissing => "risk_assessment_missing",
            Self::RiskAssessmentBlocks { .. } => "risk_assessment_blocks",
            Self::ActiveWarnings { .. } => "active_warnings",
            Self::Guardianship => "guardianship",
            Self::PowerOfAttorney => "power_of_attorney",
            Self::GuardianshipUnknown => "guardianship_unknown",
            Self::OpenManualTasks { .. } => "open_manual_tasks",
            Self::OpenManualTasksUnknown => "open_manual_tasks_unknown",
            Self::ManualOverrideInFlight => "manual_override_in_flight",
            Self::Sampled => "sampled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Decision {
    Automatic,
    Manual { reasons: Vec<BlockingReason> },
}

impl Decision {
    pub fn is_automatic(&self) -> bool {
        matches!(self, Self::Automatic)
    }

    pub fn reasons(&self) -> &[BlockingReason] {
        match self {
            Self::Automatic => &[],
            Self::Manual { reasons } => reasons,
        }
    }
}

/// The durable outcome of the decision step for one case period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub period: PeriodKey,
    pub decision: Decision,
    pub signals: AutomationSignals,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionEngine {
    max_open_manual_tasks: u32,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DecisionEngine {
    pub fn new(max_open_manual_tasks: u32) -> Self {
        Self {
            max_open_manual_tasks,
        }
    }

    pub fn from_config(config: &DecisionConfig) -> Self {
        Self::new(config.max_open_manual_tasks)
    }

    /// Blocking predicates other than sampling, in a fixed order
    pub fn blocking_reasons(&self, signals: &AutomationSignals) -> Vec<BlockingReason> {
        let mut reasons = Vec::new();

        match &signals.risk {
            None => reasons.push(BlockingReason::RiskAssessmentMissing),
            Some(risk) if !risk.may_auto_approve => {
                reasons.push(BlockingReason::RiskAssessmentBlocks {
                    findings: risk.findings.clone(),
                })
            }
            Some(_) => {}
        }

        if !signals.active_warnings.is_empty() {
            reasons.push(BlockingReason::ActiveWarnings {
                codes: signals.active_warnings.clone(),
            });
        }

        match signals.guardianship {
            None => reasons.push(BlockingReason::GuardianshipUnknown),
            Some(status) => {
                if status.has_guardian {
                    reasons.push(BlockingReason::Guardianship);
                }
                if status.has_power_of_attorney {
                    reasons.push(BlockingReason::PowerOfAttorney);
                }
            }
        }

        match signals.open_manual_tasks {
            None => reasons.push(BlockingReason::OpenManualTasksUnknown),
            Some(count) if count > self.max_open_manual_tasks => {
                reasons.push(BlockingReason::OpenManualTasks { count })
            }
            Some(_) => {}
        }

        if signals.manual_override_in_flight {
            reasons.push(BlockingReason::ManualOverrideInFlight);
        }

        reasons
    }

    /// Route the case. Automatic iff no predicate blocks.
    pub fn decide(&self, signals: &AutomationSignals) -> Decision {
        let mut reasons = self.blocking_reasons(signals);
        if signals.sampled {
            reasons.push(BlockingReason::Sampled);
        }

        if reasons.is_empty() {
            Decision::Automatic
        } else {
            Decision::Manual { reasons }
        }
    }
}
