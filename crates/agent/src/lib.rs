//! The build loop — from a text request to blocks in the world.
//!
//! A build follows a **Draft → Validate → Execute** cycle:
//!
//! 1. **Normalize** the corners into bounds and the materials into a palette
//! 2. **Draft** a plan from the planning service, given the relative size
//! 3. **Validate** it against the operation limit, size and palette
//! 4. **If rejected**: feed the error back and draft again, up to the retry limit
//! 5. **If accepted**: apply every operation to the world, in order
//!
//! Nothing reaches the world unless a draft passes validation.

pub mod builder;
pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod validator;

pub use builder::{BuildRequest, Builder};
pub use executor::{ExecuteOptions, ExecutionAborted, Executor};
pub use orchestrator::{Issue, OrchestrationRecord, Orchestrator, Phase};
pub use planner::{LlmPlanner, PlanRequest, Planner};
pub use validator::validate;
