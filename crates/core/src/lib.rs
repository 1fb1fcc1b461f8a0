//! # Blockwright Core
//!
//! Domain types, traits, and error definitions for Blockwright.
//! This crate has **no transport or HTTP dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The two external collaborators (the planning LLM and the remote world)
//! are traits here. Implementations live in their respective crates. This
//! enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted stubs
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod geometry;
pub mod message;
pub mod palette;
pub mod plan;
pub mod provider;
pub mod world;

// Re-export key types at crate root for ergonomics
pub use error::{
    Error, ExecutionError, PaletteError, PlanningError, ProviderError, Result, TransportError,
    ValidationError,
};
pub use event::{BuildEvent, EventBus};
pub use geometry::{BlockPos, Bounds, Size};
pub use message::{Message, Role};
pub use palette::{MaterialId, Palette};
pub use plan::{Operation, Plan};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, Usage};
pub use world::{Inventory, World};
