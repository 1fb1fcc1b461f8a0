//! In-memory world used by `blockwright listen` and by tests.
//!
//! Storage is namespaced (`minecraft:stone`); reads report bare names the
//! way the game's block registry prints them.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use blockwright_core::geometry::BlockPos;
use blockwright_core::palette::{DEFAULT_NAMESPACE, bare_name};
use blockwright_core::world::Inventory;

use crate::dispatcher::{HostError, WorldHost};

/// Lowest and highest buildable layer.
pub const MIN_BUILD_Y: i64 = -64;
pub const MAX_BUILD_Y: i64 = 319;

const AIR: &str = "air";

#[derive(Debug)]
struct State {
    blocks: HashMap<BlockPos, String>,
    position: [f64; 3],
    inventory: BTreeMap<String, i64>,
}

/// Cloning yields another handle onto the same world.
#[derive(Debug, Clone)]
pub struct SimulatedWorld {
    state: Arc<Mutex<State>>,
}

impl Default for SimulatedWorld {
    fn default() -> Self {
        Self::new([0.5, 64.0, 0.5])
    }
}

impl SimulatedWorld {
    pub fn new(spawn: [f64; 3]) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                blocks: HashMap::new(),
                position: spawn,
                inventory: BTreeMap::new(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, HostError> {
        self.state
            .lock()
            .map_err(|_| HostError("world state poisoned".into()))
    }

    /// Namespaced id at `pos`, if anything but air is there.
    pub fn block(&self, pos: BlockPos) -> Option<String> {
        self.state.lock().ok()?.blocks.get(&pos).cloned()
    }

    /// Number of non-air cells.
    pub fn block_count(&self) -> usize {
        self.state.lock().map(|s| s.blocks.len()).unwrap_or(0)
    }

    pub fn agent_position(&self) -> Option<[f64; 3]> {
        self.state.lock().ok().map(|s| s.position)
    }
}

/// `stone` and `minecraft:stone` name the same block.
fn namespaced(item: &str) -> String {
    let item = item.trim().to_lowercase();
    if item.contains(':') {
        item
    } else {
        format!("{DEFAULT_NAMESPACE}:{item}")
    }
}

#[async_trait]
impl WorldHost for SimulatedWorld {
    async fn position(&mut self) -> Result<[f64; 3], HostError> {
        Ok(self.lock()?.position)
    }

    async fn teleport(&mut self, x: f64, y: f64, z: f64) -> Result<(), HostError> {
        self.lock()?.position = [x, y, z];
        Ok(())
    }

    async fn block_at(&mut self, x: i64, y: i64, z: i64) -> Result<String, HostError> {
        let state = self.lock()?;
        Ok(state
            .blocks
            .get(&BlockPos::new(x, y, z))
            .map(|id| bare_name(id).to_string())
            .unwrap_or_else(|| AIR.to_string()))
    }

    async fn place_block(&mut self, x: i64, y: i64, z: i64, material: &str) -> Result<bool, HostError> {
        if !(MIN_BUILD_Y..=MAX_BUILD_Y).contains(&y) {
            return Ok(false);
        }
        let id = namespaced(material);
        if bare_name(&id).is_empty() {
            return Ok(false);
        }
        let pos = BlockPos::new(x, y, z);
        let mut state = self.lock()?;
        if bare_name(&id) == AIR {
            state.blocks.remove(&pos);
        } else {
            state.blocks.insert(pos, id);
        }
        Ok(true)
    }

    async fn inventory(&mut self) -> Result<Inventory, HostError> {
        let state = self.lock()?;
        let mut counts = Inventory::new();
        for (id, count) in &state.inventory {
            *counts.entry(bare_name(id).to_string()).or_insert(0) += count;
        }
        Ok(counts)
    }

    async fn set_inventory(&mut self, item: &str, count: i64) -> Result<(), HostError> {
        let id = namespaced(item);
        let mut state = self.lock()?;
        state.inventory.remove(&id);
        if count > 0 {
            state.inventory.insert(id, count);
        }
        Ok(())
    }
}
