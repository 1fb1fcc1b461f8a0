//! World trait — the typed command surface of a remote world.
//!
//! The executor drives a `World` without knowing whether commands go over
//! TCP to a dispatcher or into a test double. Every method takes
//! `&mut self`: at most one command is ever in flight.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::TransportError;

/// Item name → count, as reported by the remote inventory.
pub type Inventory = BTreeMap<String, i64>;

#[async_trait]
pub trait World: Send {
    /// Current agent position.
    async fn position(&mut self) -> Result<[f64; 3], TransportError>;

    /// Teleport the agent.
    async fn move_to(&mut self, x: f64, y: f64, z: f64) -> Result<(), TransportError>;

    /// Place `material` at an absolute cell. `false` means the world refused.
    async fn place_block(
        &mut self,
        x: i64,
        y: i64,
        z: i64,
        material: &str,
    ) -> Result<bool, TransportError>;

    /// Material currently occupying an absolute cell.
    async fn block_at(&mut self, x: i64, y: i64, z: i64) -> Result<String, TransportError>;

    async fn inventory(&mut self) -> Result<Inventory, TransportError>;

    /// Replace the stack count for one item.
    async fn set_inventory(&mut self, item: &str, count: i64) -> Result<(), TransportError>;
}
