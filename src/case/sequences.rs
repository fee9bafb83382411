//! # Sequence Registry
//!
//! The fixed step compositions, one per [`SequenceKind`]. Built once at
//! startup and shared by every orchestration pass.

use super::repository::CaseRepository;
use super::steps::{
    CompleteTaskStep, FetchGuardianshipStep, FetchOpenManualTasksStep, FetchRiskAssessmentStep,
    FinalizeReviewStep,
};
use crate::context::SequenceKind;
use crate::decision::{AutomaticApprovalStep, DecisionEngine, SamplingPolicy};
use crate::orchestration::sequence::{Gather, Sequence};
use std::collections::HashMap;
use std::sync::Arc;

pub struct SequenceRegistry {
    sequences: HashMap<SequenceKind, Arc<Sequence>>,
}

impl SequenceRegistry {
    pub fn new() -> Self {
        Self {
            sequences: HashMap::new(),
        }
    }

    /// The case workflows:
    ///
    /// - approval: the three lookups gathered, then the automatic/manual decision
    /// - finalization: finalize the two-person review, then complete the task
    pub fn case_workflows(
        repository: Arc<dyn CaseRepository>,
        engine: DecisionEngine,
        sampling: Arc<dyn SamplingPolicy>,
    ) -> Self {
        let approval = Sequence::new("approval")
            .then(
                Gather::new("case_lookups")
                    .with(FetchRiskAssessmentStep::new(repository.clone()))
                    .with(FetchGuardianshipStep::new(repository.clone()))
                    .with(FetchOpenManualTasksStep::new(repository.clone())),
            )
            .then(AutomaticApprovalStep::new(
                repository.clone(),
                engine,
                sampling,
            ));

        let finalization = Sequence::new("finalization")
            .then(FinalizeReviewStep::new(repository.clone()))
            .then(CompleteTaskStep::new(repository));

        Self::new()
            .with(SequenceKind::Approval, approval)
            .with(SequenceKind::Finalization, finalization)
    }

    /// Register the sequence for a kind, replacing any earlier one
    pub fn with(mut self, kind: SequenceKind, sequence: Sequence) -> Self {
        self.sequences.insert(kind, Arc::new(sequence));
        self
    }

    pub fn get(&self, kind: SequenceKind) -> Option<Arc<Sequence>> {
        self.sequences.get(&kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = SequenceKind> + '_ {
        self.sequences.keys().copied()
    }
}

impl Default for SequenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
