//! # Case Domain Types
//!
//! Originating event payloads the case sequences run against. The payload is
//! persisted with the execution context so a resumed pass sees the same case
//! facts as the first one.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one case period and the payment under consideration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub vedtaksperiode_id: Uuid,
    pub utbetaling_id: Uuid,
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vedtaksperiode_id, self.utbetaling_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    FirstTime,
    Extension,
    Revision,
}

/// Warning (varsel) attached to the case period by upstream systems
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub code: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Approval need (godkjenningsbehov) for one case period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalNeed {
    pub vedtaksperiode_id: Uuid,
    pub utbetaling_id: Uuid,
    pub fnr: String,
    pub aktor_id: String,
    pub organization_number: String,
    pub period_type: PeriodType,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

impl ApprovalNeed {
    pub fn period_key(&self) -> PeriodKey {
        PeriodKey {
            vedtaksperiode_id: self.vedtaksperiode_id,
            utbetaling_id: self.utbetaling_id,
        }
    }

    pub fn active_warning_codes(&self) -> Vec<String> {
        self.warnings
            .iter()
            .filter(|w| w.active)
            .map(|w| w.code.clone())
            .collect()
    }
}

/// A caseworker decision (vedtak fattet) to be finalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionMade {
    pub vedtaksperiode_id: Uuid,
    pub approver: String,
    pub payment_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CasePayload {
    Approval(ApprovalNeed),
    Finalization(DecisionMade),
}

impl CasePayload {
    pub fn vedtaksperiode_id(&self) -> Uuid {
        match self {
            Self::Approval(need) => need.vedtaksperiode_id,
            Self::Finalization(decision) => decision.vedtaksperiode_id,
        }
    }

    pub fn as_approval(&self) -> Option<&ApprovalNeed> {
        match self {
            Self::Approval(need) => Some(need),
            _ => None,
        }
    }

    pub fn as_finalization(&self) -> Option<&DecisionMade> {
        match self {
            Self::Finalization(decision) => Some(decision),
            _ => None,
        }
    }
}
