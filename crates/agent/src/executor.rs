//! Applies an accepted plan to a world, one operation at a time.

use std::time::Duration;

use blockwright_core::error::ExecutionError;
use blockwright_core::event::{BuildEvent, EventBus};
use blockwright_core::geometry::BlockPos;
use blockwright_core::palette::material_matches;
use blockwright_core::plan::{Operation, Plan};
use blockwright_core::world::World;
use chrono::Utc;
use tracing::{debug, info};

/// Agent hovers this many blocks above the cell it is placing.
const AGENT_Y_OFFSET: f64 = 2.0;

/// Per-build execution switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub move_agent: bool,
    pub verify: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            move_agent: true,
            verify: false,
        }
    }
}

/// Execution stopped before the end of the plan.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExecutionAborted {
    /// Operations placed (and verified, if asked) before the failure.
    pub applied: usize,
    #[source]
    pub error: ExecutionError,
}

pub struct Executor {
    throttle: Duration,
}

impl Executor {
    pub fn new(throttle: Duration) -> Self {
        Self { throttle }
    }

    /// Place every operation in order, offset by `origin`.
    ///
    /// Stops at the first failure; cells already placed stay placed.
    /// Returns the number of operations applied, which the error also
    /// carries when execution stops early.
    pub async fn execute<W>(
        &self,
        world: &mut W,
        plan: &Plan,
        origin: BlockPos,
        options: ExecuteOptions,
        events: Option<(&EventBus, &str)>,
    ) -> Result<usize, ExecutionAborted>
    where
        W: World + ?Sized,
    {
        info!(operations = plan.len(), origin = %origin, "Executing plan");

        let mut applied = 0;
        for (index, op) in plan.iter().enumerate() {
            let pos = origin.offset(op.position());
            self.apply(world, op, pos, index, options)
                .await
                .map_err(|error| ExecutionAborted { applied, error })?;
            applied += 1;

            if let Some((bus, build_id)) = events {
                bus.publish(BuildEvent::OperationApplied {
                    build_id: build_id.to_string(),
                    index,
                    position: pos,
                    material: op.material.clone(),
                    timestamp: Utc::now(),
                });
            }

            self.pause().await;
        }

        Ok(applied)
    }

    async fn apply<W>(
        &self,
        world: &mut W,
        op: &Operation,
        pos: BlockPos,
        index: usize,
        options: ExecuteOptions,
    ) -> Result<(), ExecutionError>
    where
        W: World + ?Sized,
    {
        if options.move_agent {
            world
                .move_to(pos.x as f64, pos.y as f64 + AGENT_Y_OFFSET, pos.z as f64)
                .await?;
            self.pause().await;
        }

        debug!(index, x = pos.x, y = pos.y, z = pos.z, material = %op.material, "Placing");
        if !world.place_block(pos.x, pos.y, pos.z, &op.material).await? {
            return Err(ExecutionError::PlacementFailed {
                material: op.material.clone(),
                x: pos.x,
                y: pos.y,
                z: pos.z,
            });
        }

        if options.verify {
            let found = world.block_at(pos.x, pos.y, pos.z).await?;
            if !material_matches(&op.material, &found) {
                return Err(ExecutionError::VerificationFailed {
                    x: pos.x,
                    y: pos.y,
                    z: pos.z,
                    expected: op.material.clone(),
                    found,
                });
            }
        }
        Ok(())
    }

    async fn pause(&self) {
        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blockwright_core::error::TransportError;
    use blockwright_core::world::Inventory;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Move(f64, f64, f64),
        Place(i64, i64, i64, String),
        Read(i64, i64, i64),
    }

    /// Records calls; refuses placement at `refuse_at`, reports `read_as` on reads.
    #[derive(Default)]
    struct RecordingWorld {
        calls: Vec<Call>,
        refuse_at: Option<(i64, i64, i64)>,
        read_as: Option<String>,
    }

    #[async_trait]
    impl World for RecordingWorld {
        async fn position(&mut self) -> Result<[f64; 3], TransportError> {
            Ok([0.0, 0.0, 0.0])
        }

        async fn move_to(&mut self, x: f64, y: f64, z: f64) -> Result<(), TransportError> {
            self.calls.push(Call::Move(x, y, z));
            Ok(())
        }

        async fn place_block(&mut self, x: i64, y: i64, z: i64, material: &str) -> Result<bool, TransportError> {
            self.calls.push(Call::Place(x, y, z, material.to_string()));
            Ok(self.refuse_at != Some((x, y, z)))
        }

        async fn block_at(&mut self, x: i64, y: i64, z: i64) -> Result<String, TransportError> {
            self.calls.push(Call::Read(x, y, z));
            Ok(self.read_as.clone().unwrap_or_else(|| "stone".into()))
        }

        async fn inventory(&mut self) -> Result<Inventory, TransportError> {
            Ok(Inventory::new())
        }

        async fn set_inventory(&mut self, _item: &str, _count: i64) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn plan() -> Plan {
        Plan::new(vec![
            Operation::new(0, 0, 0, "minecraft:stone"),
            Operation::new(1, 0, 0, "minecraft:stone"),
            Operation::new(1, 1, 0, "minecraft:stone"),
        ])
    }

    const NO_MOVE: ExecuteOptions = ExecuteOptions {
        move_agent: false,
        verify: false,
    };

    #[tokio::test]
    async fn places_in_order_at_absolute_positions() {
        let mut world = RecordingWorld::default();
        let applied = Executor::new(Duration::ZERO)
            .execute(&mut world, &plan(), BlockPos::new(100, 64, -5), NO_MOVE, None)
            .await
            .unwrap();

        assert_eq!(applied, 3);
        assert_eq!(
            world.calls,
            vec![
                Call::Place(100, 64, -5, "minecraft:stone".into()),
                Call::Place(101, 64, -5, "minecraft:stone".into()),
                Call::Place(101, 65, -5, "minecraft:stone".into()),
            ]
        );
    }

    #[tokio::test]
    async fn moves_agent_above_each_cell() {
        let mut world = RecordingWorld::default();
        let plan = Plan::new(vec![Operation::new(0, 0, 0, "minecraft:stone")]);
        Executor::new(Duration::ZERO)
            .execute(&mut world, &plan, BlockPos::new(3, 70, 4), ExecuteOptions::default(), None)
            .await
            .unwrap();

        assert_eq!(
            world.calls,
            vec![
                Call::Move(3.0, 72.0, 4.0),
                Call::Place(3, 70, 4, "minecraft:stone".into()),
            ]
        );
    }

    #[tokio::test]
    async fn stops_at_first_refused_placement() {
        let mut world = RecordingWorld {
            refuse_at: Some((1, 0, 0)),
            ..Default::default()
        };
        let aborted = Executor::new(Duration::ZERO)
            .execute(&mut world, &plan(), BlockPos::new(0, 0, 0), NO_MOVE, None)
            .await
            .unwrap_err();

        assert_eq!(aborted.applied, 1);
        assert!(matches!(
            aborted.error,
            ExecutionError::PlacementFailed { x: 1, y: 0, z: 0, .. }
        ));
        assert_eq!(aborted.to_string(), "Failed to place minecraft:stone at (1,0,0).");
        // Nothing after the failing placement reaches the world.
        assert_eq!(world.calls.len(), 2);
    }

    #[tokio::test]
    async fn verification_accepts_bare_name() {
        let mut world = RecordingWorld::default();
        let options = ExecuteOptions {
            move_agent: false,
            verify: true,
        };
        Executor::new(Duration::ZERO)
            .execute(&mut world, &plan(), BlockPos::new(0, 0, 0), options, None)
            .await
            .unwrap();
        assert!(world.calls.contains(&Call::Read(1, 1, 0)));
    }

    #[tokio::test]
    async fn verification_mismatch_aborts() {
        let mut world = RecordingWorld {
            read_as: Some("air".into()),
            ..Default::default()
        };
        let options = ExecuteOptions {
            move_agent: false,
            verify: true,
        };
        let aborted = Executor::new(Duration::ZERO)
            .execute(&mut world, &plan(), BlockPos::new(0, 0, 0), options, None)
            .await
            .unwrap_err();

        assert_eq!(aborted.applied, 0);
        match aborted.error {
            ExecutionError::VerificationFailed { expected, found, .. } => {
                assert_eq!(expected, "minecraft:stone");
                assert_eq!(found, "air");
            }
            other => panic!("Expected VerificationFailed, got {other:?}"),
        }
        assert_eq!(world.calls.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_pauses_between_commands() {
        let mut world = RecordingWorld::default();
        let start = tokio::time::Instant::now();
        Executor::new(Duration::from_millis(50))
            .execute(&mut world, &plan(), BlockPos::new(0, 0, 0), ExecuteOptions::default(), None)
            .await
            .unwrap();
        // Two pauses per operation when the agent moves.
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn publishes_applied_operations() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut world = RecordingWorld::default();
        Executor::new(Duration::ZERO)
            .execute(&mut world, &plan(), BlockPos::new(5, 5, 5), NO_MOVE, Some((&bus, "b1")))
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        match first.as_ref() {
            BuildEvent::OperationApplied { index, position, .. } => {
                assert_eq!(*index, 0);
                assert_eq!(*position, BlockPos::new(5, 5, 5));
            }
            _ => panic!("Expected OperationApplied event"),
        }
    }

    #[tokio::test]
    async fn applied_count_matches_events_when_aborted() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut world = RecordingWorld {
            refuse_at: Some((1, 1, 0)),
            ..Default::default()
        };
        let aborted = Executor::new(Duration::ZERO)
            .execute(&mut world, &plan(), BlockPos::new(0, 0, 0), NO_MOVE, Some((&bus, "b1")))
            .await
            .unwrap_err();

        let mut events = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event.as_ref(), BuildEvent::OperationApplied { .. }) {
                events += 1;
            }
        }
        assert_eq!(aborted.applied, 2);
        assert_eq!(events, 2);
    }
}
