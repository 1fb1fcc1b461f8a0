//! `blockwright smoke` — Place a short line of blocks and read it back.

use std::time::Duration;

use blockwright_agent::{ExecuteOptions, Executor};
use blockwright_config::AppConfig;
use blockwright_core::error::TransportError;
use blockwright_core::geometry::BlockPos;
use blockwright_core::palette::{MaterialId, material_matches};
use blockwright_core::plan::{Operation, Plan};
use blockwright_core::world::{Inventory, World};
use blockwright_world::WorldClient;
use tracing::warn;

/// Stack size handed to the agent before placing.
const STOCK: i64 = 64;

/// What a smoke run found after placing.
struct Report {
    confirmed: u32,
    mismatches: Vec<(BlockPos, String)>,
    inventory: Inventory,
}

pub async fn run(material: String, count: u32) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let material = MaterialId::parse(&material, &config.builder.namespace)?;

    let mut world = WorldClient::connect(config.world.clone()).await?;
    println!("🔌 Connected to {}", world.address());

    let report = place_and_confirm(&mut world, &material, count, config.builder.throttle()).await?;
    world.close().await;

    println!("\n🧪 Smoke test");
    for (pos, found) in &report.mismatches {
        println!("  ❌ {pos}: expected {}, found {found}", material.as_str());
    }
    println!("  Confirmed: {}/{count}", report.confirmed);
    println!("  Inventory: {:?}", report.inventory);

    if report.confirmed != count {
        return Err(format!("only {} of {count} blocks confirmed", report.confirmed).into());
    }
    Ok(())
}

/// Stock the inventory, place `count` blocks in a line from the player
/// and read every cell back.
///
/// A refused placement stops placing; the read-back still covers every cell.
async fn place_and_confirm<W>(
    world: &mut W,
    material: &MaterialId,
    count: u32,
    throttle: Duration,
) -> Result<Report, TransportError>
where
    W: World + ?Sized,
{
    world.set_inventory(material.name(), STOCK).await?;

    let origin = BlockPos::containing(world.position().await?).offset(BlockPos::new(2, 0, 0));
    let plan = Plan::new(
        (0..i64::from(count))
            .map(|i| Operation::new(i, 0, 0, material.as_str()))
            .collect(),
    );

    let options = ExecuteOptions {
        move_agent: true,
        verify: false,
    };
    if let Err(aborted) = Executor::new(throttle)
        .execute(world, &plan, origin, options, None)
        .await
    {
        warn!(applied = aborted.applied, error = %aborted.error, "Placement stopped early");
        println!("  ⚠️  {}", aborted.error);
    }

    let mut confirmed = 0;
    let mut mismatches = Vec::new();
    for op in &plan {
        let pos = origin.offset(op.position());
        let found = world.block_at(pos.x, pos.y, pos.z).await?;
        if material_matches(material.as_str(), &found) {
            confirmed += 1;
        } else {
            mismatches.push((pos, found));
        }
    }

    Ok(Report {
        confirmed,
        mismatches,
        inventory: world.inventory().await?,
    })
}
