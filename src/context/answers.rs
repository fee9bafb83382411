//! # Answers (løsninger)
//!
//! Typed payloads satisfying exactly one request kind, held in an
//! [`AnswerRegistry`] keyed by [`AnswerKind`]. Lookup is resolved by the
//! discriminator through [`AnswerPayload`], never by runtime type inspection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Discriminator shared by a request kind and the answer that satisfies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    RiskAssessment,
    Guardianship,
    OpenManualTasks,
}

impl AnswerKind {
    pub const ALL: [AnswerKind; 3] = [
        AnswerKind::RiskAssessment,
        AnswerKind::Guardianship,
        AnswerKind::OpenManualTasks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RiskAssessment => "risk_assessment",
            Self::Guardianship => "guardianship",
            Self::OpenManualTasks => "open_manual_tasks",
        }
    }
}

impl fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnswerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "risk_assessment" => Ok(Self::RiskAssessment),
            "guardianship" => Ok(Self::Guardianship),
            "open_manual_tasks" => Ok(Self::OpenManualTasks),
            _ => Err(format!("Invalid answer kind: {s}")),
        }
    }
}

/// Verdict from the risk assessment service for one case period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub vedtaksperiode_id: Uuid,
    pub may_auto_approve: bool,
    #[serde(default)]
    pub findings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianshipStatus {
    pub has_guardian: bool,
    #[serde(default)]
    pub has_power_of_attorney: bool,
}

/// Externally-tracked manual tasks open for the person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenManualTasks {
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Answer {
    RiskAssessment(RiskAssessment),
    Guardianship(GuardianshipStatus),
    OpenManualTasks(OpenManualTasks),
}

impl Answer {
    pub fn kind(&self) -> AnswerKind {
        match self {
            Self::RiskAssessment(_) => AnswerKind::RiskAssessment,
            Self::Guardianship(_) => AnswerKind::Guardianship,
            Self::OpenManualTasks(_) => AnswerKind::OpenManualTasks,
        }
    }

    /// The case period the answer was produced for, when it names one
    pub fn vedtaksperiode_id(&self) -> Option<Uuid> {
        match self {
            Self::RiskAssessment(risk) => Some(risk.vedtaksperiode_id),
            Self::Guardianship(_) | Self::OpenManualTasks(_) => None,
        }
    }

    /// Decode an answer from its wire tag and payload.
    pub fn from_tagged(kind: AnswerKind, payload: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            AnswerKind::RiskAssessment => Self::RiskAssessment(serde_json::from_value(payload)?),
            AnswerKind::Guardianship => Self::Guardianship(serde_json::from_value(payload)?),
            AnswerKind::OpenManualTasks => Self::OpenManualTasks(serde_json::from_value(payload)?),
        })
    }
}

/// A payload type that lives in exactly one [`Answer`] variant.
pub trait AnswerPayload: Sized {
    const KIND: AnswerKind;

    fn from_answer(answer: &Answer) -> Option<&Self>;

    fn into_answer(self) -> Answer;
}

impl AnswerPayload for RiskAssessment {
    const KIND: AnswerKind = AnswerKind::RiskAssessment;

    fn from_answer(answer: &Answer) -> Option<&Self> {
        match answer {
            Answer::RiskAssessment(inner) => Some(inner),
            _ => None,
        }
    }

    fn into_answer(self) -> Answer {
        Answer::RiskAssessment(self)
    }
}

impl AnswerPayload for GuardianshipStatus {
    const KIND: AnswerKind = AnswerKind::Guardianship;

    fn from_answer(answer: &Answer) -> Option<&Self> {
        match answer {
            Answer::Guardianship(inner) => Some(inner),
            _ => None,
        }
    }

    fn into_answer(self) -> Answer {
        Answer::Guardianship(self)
    }
}

impl AnswerPayload for OpenManualTasks {
    const KIND: AnswerKind = AnswerKind::OpenManualTasks;

    fn from_answer(answer: &Answer) -> Option<&Self> {
        match answer {
            Answer::OpenManualTasks(inner) => Some(inner),
            _ => None,
        }
    }

    fn into_answer(self) -> Answer {
        Answer::OpenManualTasks(self)
    }
}

/// Collected answers, at most one live answer per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerRegistry {
    answers: BTreeMap<AnswerKind, Answer>,
}

impl AnswerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an answer, replacing any earlier answer of the same kind.
    /// Returns the replaced answer.
    pub fn insert(&mut self, answer: Answer) -> Option<Answer> {
        self.answers.insert(answer.kind(), answer)
    }

    pub fn get<T: AnswerPayload>(&self) -> Option<&T> {
        self.answers.get(&T::KIND).and_then(T::from_answer)
    }

    pub fn contains(&self, kind: AnswerKind) -> bool {
        self.answers.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = AnswerKind> + '_ {
        self.answers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}
