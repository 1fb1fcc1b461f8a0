//! `blockwright doctor` — Diagnose setup problems.

use blockwright_config::AppConfig;
use blockwright_core::Provider;
use blockwright_world::WorldClient;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Blockwright Doctor — Setup Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — using defaults (run `blockwright onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  {} issue(s) found. See above for details.", issues + 1);
            return Ok(());
        }
    };

    // Check API key
    if config.has_api_key() || config.default_provider == "ollama" {
        println!("  ✅ API key configured");

        let router = blockwright_providers::router::build_from_config(&config);
        match router.default() {
            Some(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ Provider `{}` reachable", provider.name()),
                Ok(false) => {
                    println!("  ❌ Provider `{}` rejected the health check", provider.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Provider `{}` unreachable: {e}", provider.name());
                    issues += 1;
                }
            },
            None => {
                println!("  ❌ No default provider configured");
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  No API key configured — add api_key to config.toml");
        issues += 1;
    }

    // Check world listener
    match WorldClient::connect(config.world.clone()).await {
        Ok(mut world) => {
            match world.ping().await {
                Ok(reply) => println!("  ✅ World listener at {} answered {reply}", world.address()),
                Err(e) => {
                    println!("  ❌ World listener ping failed: {e}");
                    issues += 1;
                }
            }
            world.close().await;
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
