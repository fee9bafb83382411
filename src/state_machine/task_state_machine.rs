use super::{
    errors::StateMachineResult,
    events::TaskEvent,
    guards::{StateGuard, TaskAssignedGuard},
    states::TaskState,
};
use crate::case::domain::PeriodKey;
use crate::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task (oppgave) created when a case is routed to manual handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseTask {
    pub task_id: Uuid,
    pub period: PeriodKey,
    pub state: TaskState,
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CaseTask {
    pub fn new(period: PeriodKey) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::now_v7(),
            period,
            state: TaskState::default(),
            assignee: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Task state machine for lifecycle management
pub struct TaskStateMachine {
    task: CaseTask,
}

impl TaskStateMachine {
    pub fn new(task: CaseTask) -> Self {
        Self { task }
    }

    pub fn current_state(&self) -> TaskState {
        self.task.state
    }

    /// Attempt to transition the task state
    pub fn transition(&mut self, event: TaskEvent) -> StateMachineResult<TaskState> {
        let current_state = self.current_state();
        let target_state = self.determine_target_state(current_state, event)?;

        self.check_guards(current_state, target_state, event)?;

        tracing::debug!(
            task_id = %self.task.task_id,
            from = %current_state,
            to = %target_state,
            event = event.event_type(),
            "Task transition"
        );

        self.task.state = target_state;
        self.task.updated_at = Utc::now();
        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        &self,
        current_state: TaskState,
        event: TaskEvent,
    ) -> StateMachineResult<TaskState> {
        let target = match (current_state, event) {
            (TaskState::AwaitingCaseworker, TaskEvent::SendToSystem) => TaskState::AwaitingSystem,
            (TaskState::AwaitingCaseworker, TaskEvent::SendToSecondReviewer) => {
                TaskState::AwaitingSecondReviewer
            }
            (TaskState::AwaitingCaseworker, TaskEvent::Complete) => TaskState::Completed,
            (TaskState::AwaitingCaseworker, TaskEvent::Invalidate) => TaskState::Invalidated,

            (TaskState::AwaitingSystem, TaskEvent::Complete) => TaskState::Completed,
            (TaskState::AwaitingSystem, TaskEvent::Abort) => TaskState::Aborted,

            (TaskState::AwaitingSecondReviewer, TaskEvent::Complete) => TaskState::Completed,
            (TaskState::AwaitingSecondReviewer, TaskEvent::Abort) => TaskState::Aborted,
            (TaskState::AwaitingSecondReviewer, TaskEvent::Return) => {
                TaskState::AwaitingCaseworker
            }

            (from_state, _) => {
                return Err(DomainError::InvalidTaskTransition {
                    task_id: self.task.task_id,
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                }
                .into())
            }
        };

        Ok(target)
    }

    fn check_guards(
        &self,
        current_state: TaskState,
        target_state: TaskState,
        event: TaskEvent,
    ) -> StateMachineResult<()> {
        if let (
            TaskState::AwaitingCaseworker,
            TaskState::AwaitingSecondReviewer,
            TaskEvent::SendToSecondReviewer,
        ) = (current_state, target_state, event)
        {
            TaskAssignedGuard.check(&self.task)?;
        }
        Ok(())
    }

    /// The event that takes an open task out of circulation when its case is cancelled
    pub fn cancellation_event(&self) -> Option<TaskEvent> {
        match self.current_state() {
            TaskState::AwaitingCaseworker => Some(TaskEvent::Invalidate),
            TaskState::AwaitingSystem | TaskState::AwaitingSecondReviewer => Some(TaskEvent::Abort),
            _ => None,
        }
    }

    /// Assign the task to a caseworker
    pub fn assign(&mut self, caseworker: impl Into<String>) -> StateMachineResult<()> {
        if let Some(assignee) = &self.task.assignee {
            return Err(DomainError::TaskAlreadyAssigned {
                task_id: self.task.task_id,
                assignee: assignee.clone(),
            }
            .into());
        }
        self.task.assignee = Some(caseworker.into());
        self.task.updated_at = Utc::now();
        Ok(())
    }

    pub fn unassign(&mut self) -> StateMachineResult<()> {
        if self.task.assignee.take().is_none() {
            return Err(DomainError::TaskNotAssigned {
                task_id: self.task.task_id,
            }
            .into());
        }
        self.task.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current_state().is_terminal()
    }

    pub fn task(&self) -> &CaseTask {
        &self.task
    }

    pub fn task_id(&self) -> Uuid {
        self.task.task_id
    }

    pub fn into_task(self) -> CaseTask {
        self.task
    }
}
