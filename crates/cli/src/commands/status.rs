//! `blockwright status` — Show configuration and world connection.

use blockwright_config::AppConfig;
use blockwright_core::world::World;
use blockwright_world::WorldClient;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🧱 Blockwright Status");
    println!("====================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", blockwright_providers::router::model_for(&config));
    println!("  Temperature:  {}", config.default_temperature);
    println!("  Max blocks:   {}", config.builder.max_operations);
    println!("  Max retries:  {}", config.builder.max_retries);
    println!("  Throttle:     {}ms", config.builder.throttle_ms);
    println!("  Namespace:    {}", config.builder.namespace);
    println!("  World:        {}", config.world.address());

    match WorldClient::connect(config.world.clone()).await {
        Ok(mut world) => {
            println!("\n  ✅ World listener reachable");
            match world.position().await {
                Ok([x, y, z]) => println!("  Agent at:     ({x:.1}, {y:.1}, {z:.1})"),
                Err(e) => println!("  ⚠️  Could not read agent position: {e}"),
            }
            world.close().await;
        }
        Err(e) => println!("\n  ⚠️  World listener unreachable: {e}"),
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found");
    } else {
        println!("  ⚠️  No config file — run `blockwright onboard` first");
    }

    Ok(())
}
