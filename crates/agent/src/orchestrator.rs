//! Plan → validate → retry loop.
//!
//! The loop is an explicit state machine over [`Phase`]:
//!
//! ```text
//!   Draft ──► Validate ──► Done
//!     ▲           │
//!     └── error, retries left
//! ```
//!
//! Every rejected draft's error is fed back into the next draft request.
//! At most `max_retries + 1` drafts are requested per build.

use std::sync::Arc;

use blockwright_core::error::{Error, PlanningError, ValidationError};
use blockwright_core::event::{BuildEvent, EventBus};
use blockwright_core::geometry::{Bounds, Size};
use blockwright_core::palette::{MaterialId, Palette};
use blockwright_core::plan::Plan;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::planner::{PlanRequest, Planner};
use crate::validator::validate;

/// Why a draft was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Issue {
    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Working state of one build's planning loop. Never shared across builds.
#[derive(Debug, Clone)]
pub struct OrchestrationRecord {
    pub build_id: String,
    pub prompt: String,
    pub bounds: Bounds,
    pub size: Size,
    pub palette: Palette,
    pub max_operations: usize,
    pub attempts: u32,
    pub plan: Plan,
    /// Error of the current draft; cleared when a draft succeeds.
    pub error: Option<Issue>,
    /// Most recent rejection, kept across attempts as planner feedback.
    pub last_error: Option<String>,
}

impl OrchestrationRecord {
    pub fn new(
        build_id: impl Into<String>,
        prompt: impl Into<String>,
        bounds: Bounds,
        palette: Palette,
        max_operations: usize,
    ) -> Self {
        Self {
            build_id: build_id.into(),
            prompt: prompt.into(),
            size: bounds.size(),
            bounds,
            palette,
            max_operations,
            attempts: 0,
            plan: Plan::default(),
            error: None,
            last_error: None,
        }
    }

    /// The planner only ever sees the relative size, never raw bounds.
    pub fn plan_request(&self) -> PlanRequest {
        PlanRequest {
            description: self.prompt.clone(),
            size: self.size,
            palette: self
                .palette
                .iter()
                .map(MaterialId::as_str)
                .map(String::from)
                .collect(),
            max_operations: self.max_operations,
            feedback: self.last_error.clone(),
        }
    }

    fn reject(&mut self, issue: Issue) {
        self.last_error = Some(issue.to_string());
        self.error = Some(issue);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Draft,
    Validate,
    Done,
}

pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    max_retries: u32,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(planner: Arc<dyn Planner>, max_retries: u32, event_bus: Arc<EventBus>) -> Self {
        Self {
            planner,
            max_retries,
            event_bus,
        }
    }

    /// Drive the loop to `Done`. Returns the accepted plan, or
    /// [`Error::RetryExhausted`] carrying the final rejection.
    pub async fn run(&self, record: &mut OrchestrationRecord) -> Result<Plan, Error> {
        let mut phase = Phase::Draft;
        while phase != Phase::Done {
            phase = self.step(phase, record).await;
        }

        match &record.error {
            None => {
                info!(
                    build_id = %record.build_id,
                    attempts = record.attempts,
                    operations = record.plan.len(),
                    "Plan accepted"
                );
                Ok(record.plan.clone())
            }
            Some(issue) => {
                warn!(build_id = %record.build_id, attempts = record.attempts, error = %issue, "Giving up on plan");
                Err(Error::RetryExhausted {
                    attempts: record.attempts,
                    reason: issue.to_string(),
                })
            }
        }
    }

    async fn step(&self, phase: Phase, record: &mut OrchestrationRecord) -> Phase {
        match phase {
            Phase::Draft => {
                self.draft(record).await;
                Phase::Validate
            }
            Phase::Validate => {
                self.validate(record);
                self.next_after_validate(record)
            }
            Phase::Done => Phase::Done,
        }
    }

    async fn draft(&self, record: &mut OrchestrationRecord) {
        record.attempts += 1;
        let request = record.plan_request();
        debug!(
            build_id = %record.build_id,
            attempt = record.attempts,
            feedback = request.feedback.as_deref().unwrap_or(""),
            "Requesting draft"
        );
        self.event_bus.publish(BuildEvent::DraftRequested {
            build_id: record.build_id.clone(),
            attempt: record.attempts,
            with_feedback: request.feedback.is_some(),
            timestamp: Utc::now(),
        });

        match self.planner.draft(&request).await {
            Ok(plan) => {
                record.plan = plan;
                record.error = None;
            }
            Err(e) => {
                record.plan = Plan::default();
                record.reject(e.into());
            }
        }
    }

    fn validate(&self, record: &mut OrchestrationRecord) {
        if record.error.is_none() {
            match validate(
                &record.plan,
                &record.size,
                &record.palette,
                record.max_operations,
            ) {
                Ok(()) => {
                    record.error = None;
                    record.last_error = None;
                }
                Err(e) => record.reject(e.into()),
            }
        }

        let event = match &record.error {
            Some(issue) => {
                warn!(build_id = %record.build_id, attempt = record.attempts, error = %issue, "Draft rejected");
                BuildEvent::PlanRejected {
                    build_id: record.build_id.clone(),
                    attempt: record.attempts,
                    reason: issue.to_string(),
                    timestamp: Utc::now(),
                }
            }
            None => BuildEvent::PlanAccepted {
                build_id: record.build_id.clone(),
                attempt: record.attempts,
                operations: record.plan.len(),
                timestamp: Utc::now(),
            },
        };
        self.event_bus.publish(event);
    }

    fn next_after_validate(&self, record: &OrchestrationRecord) -> Phase {
        let retries_spent = record.attempts.saturating_sub(1);
        if record.error.is_some() && retries_spent < self.max_retries {
            Phase::Draft
        } else {
            Phase::Done
        }
    }
}
