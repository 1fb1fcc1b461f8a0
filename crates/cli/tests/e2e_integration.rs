//! End-to-end integration tests for Blockwright.
//!
//! These tests exercise the full pipeline: a scripted chat provider behind
//! the LLM planner, the retry loop, the executor, and the newline-delimited
//! JSON channel to a simulated world served on a real local socket.

use std::sync::Arc;
use std::time::Duration;

use blockwright_agent::{BuildRequest, Builder, ExecuteOptions, LlmPlanner};
use blockwright_config::WorldConfig;
use blockwright_core::error::{Error, ProviderError};
use blockwright_core::event::{BuildEvent, EventBus};
use blockwright_core::geometry::BlockPos;
use blockwright_core::message::Message;
use blockwright_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use blockwright_core::world::World;
use blockwright_world::{Dispatcher, SimulatedWorld, WorldClient};
use tokio::net::TcpListener;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that replays scripted replies, repeating the last one.
struct ScriptedProvider {
    replies: Vec<String>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            requests: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The user turn of the n-th request.
    fn prompt(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n].messages[1].content.clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let reply = self.replies[requests.len().min(self.replies.len() - 1)].clone();
        requests.push(request);
        Ok(ProviderResponse {
            message: Message::assistant(reply),
            usage: Some(Usage {
                prompt_tokens: 200,
                completion_tokens: 40,
                total_tokens: 240,
            }),
            model: "e2e-model".into(),
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

/// Serve `world` on an ephemeral port and connect a client to it.
async fn connect(world: SimulatedWorld) -> WorldClient {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = WorldConfig::for_addr(listener.local_addr().unwrap());
    let max_frame = config.max_frame_bytes;
    tokio::spawn(async move {
        let _ = Dispatcher::new(world, max_frame).serve(listener).await;
    });
    WorldClient::connect(config).await.unwrap()
}

fn builder(provider: Arc<ScriptedProvider>, bus: Arc<EventBus>) -> Builder {
    let planner = LlmPlanner::new(provider, "e2e-model");
    Builder::new(Arc::new(planner), bus)
        .with_throttle(Duration::ZERO)
        .with_max_operations(8)
}

fn unit_cube(options: ExecuteOptions) -> BuildRequest {
    BuildRequest {
        description: "two stones side by side".into(),
        corner_a: BlockPos::new(0, 0, 0),
        corner_b: BlockPos::new(1, 1, 1),
        materials: vec!["minecraft:stone".into()],
        options,
    }
}

const TWO_STONES: &str = r#"{"operations":[
    {"x":0,"y":0,"z":0,"material":"minecraft:stone"},
    {"x":1,"y":0,"z":0,"material":"minecraft:stone"}
]}"#;

const OUT_OF_BOUNDS: &str =
    r#"{"operations":[{"x":2,"y":0,"z":0,"material":"minecraft:stone"}]}"#;

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn valid_plan_is_placed_in_the_world() {
    let world = SimulatedWorld::default();
    let mut client = connect(world.clone()).await;
    let provider = ScriptedProvider::new(&[TWO_STONES]);
    let builder = builder(provider.clone(), Arc::new(EventBus::default()));

    let plan = builder
        .build(&mut client, &unit_cube(ExecuteOptions::default()))
        .await
        .unwrap();

    assert_eq!(plan.len(), 2);
    assert_eq!(provider.calls(), 1);
    assert_eq!(world.block_count(), 2);
    assert_eq!(world.block(BlockPos::new(0, 0, 0)).as_deref(), Some("minecraft:stone"));
    assert_eq!(world.block(BlockPos::new(1, 0, 0)).as_deref(), Some("minecraft:stone"));
    // The agent ends up hovering above the last cell.
    assert_eq!(world.agent_position(), Some([1.0, 2.0, 0.0]));
}

#[tokio::test]
async fn out_of_bounds_plan_never_reaches_the_world() {
    let world = SimulatedWorld::default();
    let mut client = connect(world.clone()).await;
    let provider = ScriptedProvider::new(&[OUT_OF_BOUNDS]);
    let builder = builder(provider.clone(), Arc::new(EventBus::default()));

    let err = builder
        .build(&mut client, &unit_cube(ExecuteOptions::default()))
        .await
        .unwrap_err();

    match err {
        Error::RetryExhausted { attempts, reason } => {
            assert_eq!(attempts, 3);
            assert_eq!(reason, "Operation 0 out of bounds (2,0,0).");
        }
        other => panic!("Expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(provider.calls(), 3);
    assert_eq!(world.block_count(), 0);
    assert_eq!(world.agent_position(), Some([0.5, 64.0, 0.5]));
}

#[tokio::test]
async fn rejection_is_fed_back_to_the_model() {
    let world = SimulatedWorld::default();
    let mut client = connect(world.clone()).await;
    let provider = ScriptedProvider::new(&[OUT_OF_BOUNDS, TWO_STONES]);
    let builder = builder(provider.clone(), Arc::new(EventBus::default()));

    builder
        .build(&mut client, &unit_cube(ExecuteOptions::default()))
        .await
        .unwrap();

    assert_eq!(provider.calls(), 2);
    let first = provider.prompt(0);
    assert!(first.contains("Bounds size (relative): width=2, height=2, length=2"));
    assert!(!first.contains("Previous error"));
    assert!(
        provider
            .prompt(1)
            .ends_with("Previous error: Operation 0 out of bounds (2,0,0).")
    );
    assert_eq!(world.block_count(), 2);
}

#[tokio::test]
async fn malformed_reply_is_retried() {
    let world = SimulatedWorld::default();
    let mut client = connect(world.clone()).await;
    let fenced = format!("```json\n{TWO_STONES}\n```");
    let provider = ScriptedProvider::new(&["Sure! Here's a plan.", fenced.as_str()]);
    let builder = builder(provider.clone(), Arc::new(EventBus::default()));

    builder
        .build(&mut client, &unit_cube(ExecuteOptions::default()))
        .await
        .unwrap();

    assert!(provider.prompt(1).contains("Previous error: Structured output failed:"));
    assert_eq!(world.block_count(), 2);
}

#[tokio::test]
async fn verified_build_over_the_wire() {
    let world = SimulatedWorld::default();
    let mut client = connect(world.clone()).await;
    let provider = ScriptedProvider::new(&[TWO_STONES]);
    let bus = Arc::new(EventBus::new(64));
    let mut rx = bus.subscribe();
    let builder = builder(provider, bus);

    let options = ExecuteOptions {
        move_agent: false,
        verify: true,
    };
    builder.build(&mut client, &unit_cube(options)).await.unwrap();

    let mut applied = Vec::new();
    let mut finished = None;
    while let Ok(event) = rx.try_recv() {
        match event.as_ref() {
            BuildEvent::OperationApplied { position, .. } => applied.push(*position),
            BuildEvent::BuildFinished { success, .. } => finished = Some(*success),
            _ => {}
        }
    }
    assert_eq!(applied, vec![BlockPos::new(0, 0, 0), BlockPos::new(1, 0, 0)]);
    assert_eq!(finished, Some(true));
    assert_eq!(world.agent_position(), Some([0.5, 64.0, 0.5]));
}

#[tokio::test]
async fn placement_refused_by_world_fails_the_build() {
    let world = SimulatedWorld::default();
    let mut client = connect(world.clone()).await;
    let provider = ScriptedProvider::new(&[TWO_STONES]);
    let builder = builder(provider, Arc::new(EventBus::default()));

    // Above the build height limit, so the world refuses every placement.
    let request = BuildRequest {
        corner_a: BlockPos::new(0, 400, 0),
        corner_b: BlockPos::new(1, 401, 1),
        ..unit_cube(ExecuteOptions::default())
    };
    let err = builder.build(&mut client, &request).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Execution error: Failed to place minecraft:stone at (0,400,0)."
    );
    assert_eq!(world.block_count(), 0);
}

#[tokio::test]
async fn inventory_round_trip_over_the_wire() {
    let mut client = connect(SimulatedWorld::default()).await;

    assert_eq!(client.ping().await.unwrap(), "pong");
    client.set_inventory("minecraft:stone", 64).await.unwrap();
    client.set_inventory("glass", 2).await.unwrap();
    let inventory = client.inventory().await.unwrap();
    assert_eq!(inventory.get("stone"), Some(&64));
    assert_eq!(inventory.get("glass"), Some(&2));

    assert!(client.place_block(3, 64, 3, "minecraft:glass").await.unwrap());
    assert_eq!(client.block_at(3, 64, 3).await.unwrap(), "glass");
    assert_eq!(client.block_at(3, 65, 3).await.unwrap(), "air");

    client.move_to(10.5, 70.0, -4.5).await.unwrap();
    assert_eq!(client.position().await.unwrap(), [10.5, 70.0, -4.5]);
}

#[tokio::test]
async fn dropped_handshake_fails_connect_and_next_connect_succeeds() {
    let world = SimulatedWorld::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = WorldConfig::for_addr(listener.local_addr().unwrap());
    let max_frame = config.max_frame_bytes;

    // Hang up on the first connection without answering, then serve normally.
    let host = world.clone();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut dispatcher = Dispatcher::new(host, max_frame);
        let (read, write) = stream.into_split();
        drop((read, write));
        let _ = dispatcher.serve(listener).await;
    });

    // The first connect fails its handshake; the second is served.
    assert!(WorldClient::connect(config.clone()).await.is_err());
    let mut client = WorldClient::connect(config).await.unwrap();
    assert!(client.place_block(0, 64, 0, "minecraft:stone").await.unwrap());
    assert_eq!(world.block_count(), 1);
}
