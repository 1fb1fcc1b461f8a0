//! Build entry point: normalize inputs, plan with retries, execute.

use std::sync::Arc;
use std::time::Duration;

use blockwright_config::BuilderConfig;
use blockwright_core::error::{Error, Result};
use blockwright_core::event::{BuildEvent, EventBus};
use blockwright_core::geometry::{BlockPos, Bounds};
use blockwright_core::palette::{DEFAULT_NAMESPACE, Palette};
use blockwright_core::plan::Plan;
use blockwright_core::world::World;
use chrono::Utc;
use tracing::{info, warn};

use crate::executor::{ExecuteOptions, Executor};
use crate::orchestrator::{OrchestrationRecord, Orchestrator};
use crate::planner::Planner;

/// One build, as asked for by a caller.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub description: String,
    /// Opposite corners of the build volume, in any order.
    pub corner_a: BlockPos,
    pub corner_b: BlockPos,
    /// Material ids; each must carry the namespace prefix.
    pub materials: Vec<String>,
    pub options: ExecuteOptions,
}

pub struct Builder {
    orchestrator: Orchestrator,
    executor: Executor,
    max_operations: usize,
    namespace: String,
    event_bus: Arc<EventBus>,
}

impl Builder {
    pub fn new(planner: Arc<dyn Planner>, event_bus: Arc<EventBus>) -> Self {
        Self {
            orchestrator: Orchestrator::new(planner, 2, event_bus.clone()),
            executor: Executor::new(Duration::from_millis(50)),
            max_operations: 600,
            namespace: DEFAULT_NAMESPACE.to_string(),
            event_bus,
        }
    }

    pub fn from_config(
        planner: Arc<dyn Planner>,
        config: &BuilderConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(planner, config.max_retries, event_bus.clone()),
            executor: Executor::new(config.throttle()),
            max_operations: config.max_operations,
            namespace: config.namespace.clone(),
            event_bus,
        }
    }

    pub fn with_max_operations(mut self, max: usize) -> Self {
        self.max_operations = max;
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.executor = Executor::new(throttle);
        self
    }

    /// Plan and apply one build. Either the whole plan is applied and
    /// returned, or the call fails.
    ///
    /// A plan that never passes validation is reported as
    /// [`Error::RetryExhausted`] and nothing touches the world.
    pub async fn build<W>(&self, world: &mut W, request: &BuildRequest) -> Result<Plan>
    where
        W: World + ?Sized,
    {
        let palette = Palette::new(&request.materials, &self.namespace)?;
        let bounds = Bounds::from_corners(request.corner_a, request.corner_b)?;
        let build_id = uuid::Uuid::new_v4().to_string();

        info!(
            %build_id,
            min = %bounds.min(),
            max = %bounds.max(),
            palette = %palette.joined(),
            "Starting build"
        );

        let mut record = OrchestrationRecord::new(
            &build_id,
            &request.description,
            bounds,
            palette,
            self.max_operations,
        );

        let plan = match self.orchestrator.run(&mut record).await {
            Ok(plan) => plan,
            Err(e) => {
                self.finish(&build_id, false, 0);
                return Err(e);
            }
        };

        let outcome = self
            .executor
            .execute(
                world,
                &plan,
                bounds.min(),
                request.options,
                Some((self.event_bus.as_ref(), build_id.as_str())),
            )
            .await;

        match outcome {
            Ok(applied) => {
                self.finish(&build_id, true, applied);
                Ok(plan)
            }
            Err(aborted) => {
                warn!(%build_id, applied = aborted.applied, error = %aborted.error, "Build aborted");
                self.finish(&build_id, false, aborted.applied);
                Err(Error::Execution(aborted.error))
            }
        }
    }

    fn finish(&self, build_id: &str, success: bool, operations_applied: usize) {
        self.event_bus.publish(BuildEvent::BuildFinished {
            build_id: build_id.to_string(),
            success,
            operations_applied,
            timestamp: Utc::now(),
        });
    }
}
