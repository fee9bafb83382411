//! # Requests (behov)
//!
//! Typed declarations that a step cannot complete without information from
//! another system. Equal requests are the same need: registering one twice
//! before it is answered is a no-op.

use super::answers::AnswerKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum Request {
    RiskAssessment {
        vedtaksperiode_id: Uuid,
        fnr: String,
        organization_number: String,
    },
    Guardianship {
        fnr: String,
    },
    OpenManualTasks {
        aktor_id: String,
    },
}

impl Request {
    /// The kind of answer that satisfies this request
    pub fn kind(&self) -> AnswerKind {
        match self {
            Self::RiskAssessment { .. } => AnswerKind::RiskAssessment,
            Self::Guardianship { .. } => AnswerKind::Guardianship,
            Self::OpenManualTasks { .. } => AnswerKind::OpenManualTasks,
        }
    }

    /// Request parameters without the kind tag, as sent on the bus
    pub fn parameters(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(mut value) => value
                .get_mut("params")
                .map(serde_json::Value::take)
                .unwrap_or(serde_json::Value::Null),
            Err(_) => serde_json::Value::Null,
        }
    }
}
