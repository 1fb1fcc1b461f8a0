//! `blockwright build` — Plan, validate and place a build.

use std::sync::Arc;

use blockwright_agent::{BuildRequest, Builder, ExecuteOptions, LlmPlanner};
use blockwright_config::AppConfig;
use blockwright_core::event::{BuildEvent, EventBus};
use blockwright_core::geometry::BlockPos;
use blockwright_core::world::World;
use blockwright_world::WorldClient;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

/// Builds default to a 7×5×7 volume starting two blocks east of the agent.
const DEFAULT_OFFSET: BlockPos = BlockPos::new(2, 0, 0);
const DEFAULT_SPAN: BlockPos = BlockPos::new(6, 4, 6);

pub struct BuildArgs {
    pub prompt: String,
    pub corners: Option<(BlockPos, BlockPos)>,
    pub palette: Vec<String>,
    pub move_agent: bool,
    pub verify: bool,
}

pub async fn run(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early — give a clear error
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    BLOCKWRIGHT_API_KEY=sk-...      (generic)");
        eprintln!("    OPENAI_API_KEY=sk-...           (for OpenAI direct)");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-... (for OpenRouter)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = blockwright_providers::router::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let planner = LlmPlanner::new(provider, blockwright_providers::router::model_for(&config))
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens);

    let mut world = WorldClient::connect(config.world.clone()).await?;

    let (corner_a, corner_b) = match args.corners {
        Some(corners) => corners,
        None => {
            let start = BlockPos::containing(world.position().await?).offset(DEFAULT_OFFSET);
            (start, start.offset(DEFAULT_SPAN))
        }
    };

    let event_bus = Arc::new(EventBus::default());
    let progress = tokio::spawn(print_progress(event_bus.subscribe()));

    let builder = Builder::from_config(Arc::new(planner), &config.builder, event_bus);
    let request = BuildRequest {
        description: args.prompt,
        corner_a,
        corner_b,
        materials: args.palette,
        options: ExecuteOptions {
            move_agent: args.move_agent && config.builder.move_agent,
            verify: args.verify || config.builder.verify,
        },
    };

    println!("🧱 Building between {corner_a} and {corner_b}");
    let result = builder.build(&mut world, &request).await;
    // Dropping the builder closes the bus and ends the progress printer.
    drop(builder);
    let _ = progress.await;
    world.close().await;

    let plan = result?;
    println!("✅ Placed {} block(s).", plan.len());
    Ok(())
}

async fn print_progress(mut rx: Receiver<Arc<BuildEvent>>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        match event.as_ref() {
            BuildEvent::DraftRequested { attempt, .. } => println!("  📝 Drafting plan (attempt {attempt})"),
            BuildEvent::PlanRejected { reason, .. } => println!("  ⚠️  Rejected: {reason}"),
            BuildEvent::PlanAccepted { operations, .. } => {
                println!("  ✅ Plan accepted: {operations} operation(s)")
            }
            BuildEvent::OperationApplied { index, position, material, .. } => {
                println!("  {:>4}. {material} at {position}", index + 1)
            }
            BuildEvent::BuildFinished { success, .. } => {
                if !success {
                    println!("  ❌ Build failed");
                }
            }
        }
    }
}
